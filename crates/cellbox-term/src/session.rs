// SPDX-License-Identifier: MIT
//
// Session controller: owns the terminal for the lifetime of an app.
//
// A `Session` is the explicit context every operation goes through: the
// back buffer the application draws into, the presenter holding the front
// buffer, the input decoder and its event queue, and the current modes.
// It is either live or shut down; once shut down every operation returns
// `Error::NotInitialized`.
//
// Two backends feed it:
//
//   - A TTY: raw mode, alternate screen, and a reader thread that forwards
//     bytes and SIGWINCH sizes over a channel. One per process.
//   - Headless: any `Write` for output and an `InputFeed` handle for input.
//     Any number may coexist; tests and embedders use these.
//
// Decoding happens on the caller's thread inside `poll_event`/`peek_event`,
// so a resize is queued behind every event decoded from bytes read before
// it. `poll_event` wakes every tick to check its `Canceller`.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::io::RawFd;
#[cfg(unix)]
use std::path::Path;

use tracing::{debug, info, warn};

use crate::ansi;
use crate::buffer::CellBuffer;
use crate::color::{self, Attrs, ColorAttr, OutputMode};
use crate::config::Config;
use crate::diff::{CursorRequest, Presenter, RenderStats};
use crate::error::{Error, Result};
use crate::input::{Decoder, Event, InputMode};
use crate::reader::{self, Input};
use crate::terminal::Size;

#[cfg(unix)]
use crate::reader::TtyReader;
#[cfg(unix)]
use crate::terminal::{self, SessionClaim, Tty};

/// Default terminal device for [`Session::init`].
#[cfg(unix)]
const DEFAULT_TTY: &str = "/dev/tty";

// ─── Canceller ───────────────────────────────────────────────────────────────

/// Releases a blocked [`Session::poll_event`] from another thread.
///
/// A cancel is consumed by the poll it releases. A cancel issued while
/// nothing is blocked makes the next blocking poll return immediately.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    /// Make the blocked (or next) poll return [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

// ─── InputFeed ───────────────────────────────────────────────────────────────

/// Input side of a headless session.
///
/// Bytes and sizes pushed here are delivered in order, exactly as the TTY
/// reader would deliver them. Dropping the feed closes the input; a poll
/// then returns an [`Error::Io`] once everything queued is consumed.
#[derive(Debug, Clone)]
pub struct InputFeed {
    tx: Sender<Input>,
}

impl InputFeed {
    /// Deliver raw terminal input.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if the session is gone.
    pub fn push_bytes(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.send(Input::Bytes(bytes.to_vec()))
    }

    /// Report that the terminal now has `size`.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if the session is gone.
    pub fn resize(&self, size: Size) -> Result<()> {
        self.send(Input::Resize(size))
    }

    fn send(&self, input: Input) -> Result<()> {
        self.tx.send(input).map_err(|_| Error::NotInitialized)
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// A live terminal session.
///
/// ```
/// use cellbox_term::{ColorAttr, Config, Session, Size};
///
/// let (mut session, _input) =
///     Session::headless(std::io::sink(), Size::new(80, 24), &Config::default())?;
/// session.print(0, 0, ColorAttr::WHITE, ColorAttr::BLACK, "OK")?;
/// session.present()?;
/// session.shutdown()?;
/// # Ok::<(), cellbox_term::Error>(())
/// ```
pub struct Session {
    /// `None` once shut down.
    inner: Option<Active>,
}

/// Where the session's bytes come from and go to.
enum Backend {
    #[cfg(unix)]
    Tty {
        // Field order is drop order: the reader stops polling the
        // descriptor before the Tty closes it.
        reader: TtyReader,
        tty: Tty,
        _claim: SessionClaim,
    },
    Headless,
}

/// Everything a live session owns.
struct Active {
    backend: Backend,
    out: Box<dyn Write + Send>,
    rx: Receiver<Input>,
    back: CellBuffer,
    presenter: Presenter,
    decoder: Decoder,
    queue: VecDeque<Event>,
    /// When the partial sequence in the decoder resolves on its own.
    escape_deadline: Option<Instant>,
    size: Size,
    cursor: CursorRequest,
    input_mode: InputMode,
    output_mode: OutputMode,
    extended_colors: bool,
    escape_timeout: Duration,
    tick: Duration,
    cancel: Arc<AtomicBool>,
}

impl Session {
    // ── Construction ────────────────────────────────────────────

    /// Open `/dev/tty` with the default configuration.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] if a TTY session is live, and
    /// [`Error::Init`] if the terminal cannot be opened, put into raw
    /// mode, or sized.
    #[cfg(unix)]
    pub fn init() -> Result<Self> {
        Self::init_with_config(&Config::default())
    }

    /// Open `/dev/tty`.
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_with_config(config: &Config) -> Result<Self> {
        Self::init_path_with_config(Path::new(DEFAULT_TTY), config)
    }

    /// Use one caller-owned descriptor for input and output.
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_fd(fd: RawFd) -> Result<Self> {
        Self::init_rw_with_config(fd, fd, &Config::default())
    }

    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_fd_with_config(fd: RawFd, config: &Config) -> Result<Self> {
        Self::init_rw_with_config(fd, fd, config)
    }

    /// Open the terminal device at `path`. It is closed at shutdown.
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_path(path: &Path) -> Result<Self> {
        Self::init_path_with_config(path, &Config::default())
    }

    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_path_with_config(path: &Path, config: &Config) -> Result<Self> {
        let claim = SessionClaim::acquire().ok_or(Error::AlreadyInitialized)?;
        let tty = Tty::open(path)
            .map_err(|err| Error::init(format!("open {}", path.display()), err))?;
        Self::start_tty(tty, claim, config)
    }

    /// Read from `read_fd` and write to `write_fd`. Both stay open after
    /// shutdown.
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_rw(read_fd: RawFd, write_fd: RawFd) -> Result<Self> {
        Self::init_rw_with_config(read_fd, write_fd, &Config::default())
    }

    /// # Errors
    ///
    /// See [`init`](Self::init).
    #[cfg(unix)]
    pub fn init_rw_with_config(read_fd: RawFd, write_fd: RawFd, config: &Config) -> Result<Self> {
        let claim = SessionClaim::acquire().ok_or(Error::AlreadyInitialized)?;
        Self::start_tty(Tty::from_fds(read_fd, write_fd), claim, config)
    }

    #[cfg(unix)]
    fn start_tty(mut tty: Tty, claim: SessionClaim, config: &Config) -> Result<Self> {
        tty.enable_raw_mode()
            .map_err(|err| Error::init("raw mode", err))?;
        let size = tty.size().map_err(|err| Error::init("size query", err))?;

        let (tx, rx) = reader::channel();
        let reader = TtyReader::spawn(tty.read_fd(), tty.size_fd(), config.tick(), tx)
            .map_err(|err| Error::init("input reader", err))?;

        terminal::install_panic_hook();
        terminal::set_emergency_fd(Some(tty.write_fd()));

        let out = Box::new(tty.writer());
        let backend = Backend::Tty {
            reader,
            tty,
            _claim: claim,
        };
        let session = Self::start(backend, out, rx, size, config)?;
        info!(cols = size.cols, rows = size.rows, "terminal session started");
        Ok(session)
    }

    /// A session drawing to `writer` with input pushed through the
    /// returned [`InputFeed`]. Does not touch any terminal.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the setup sequence cannot be written.
    pub fn headless(
        writer: impl Write + Send + 'static,
        size: Size,
        config: &Config,
    ) -> Result<(Self, InputFeed)> {
        let (tx, rx) = reader::channel();
        let session = Self::start(Backend::Headless, Box::new(writer), rx, size, config)?;
        debug!(cols = size.cols, rows = size.rows, "headless session started");
        Ok((session, InputFeed { tx }))
    }

    fn start(
        backend: Backend,
        out: Box<dyn Write + Send>,
        rx: Receiver<Input>,
        size: Size,
        config: &Config,
    ) -> Result<Self> {
        let extended_colors = config.color_support.resolve();
        let output_mode = if config.output_mode.is_extended() && !extended_colors {
            warn!(mode = ?config.output_mode, "configured output mode unsupported, using normal");
            OutputMode::Normal
        } else {
            config.output_mode
        };

        let mut active = Active {
            backend,
            out,
            rx,
            back: CellBuffer::new(size.cols, size.rows),
            presenter: Presenter::new(size.cols, size.rows),
            decoder: Decoder::new(),
            queue: VecDeque::new(),
            escape_deadline: None,
            size,
            cursor: None,
            input_mode: config.input_mode(),
            output_mode,
            extended_colors,
            escape_timeout: config.escape_timeout(),
            tick: config.tick(),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        active.setup()?;
        Ok(Self {
            inner: Some(active),
        })
    }

    /// Restore the terminal and release it.
    ///
    /// Every later call, including another `shutdown`, returns
    /// [`Error::NotInitialized`].
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] if already shut down, [`Error::Io`] if the
    /// restore sequence or the termios restore failed. The session is shut
    /// down either way.
    pub fn shutdown(&mut self) -> Result<()> {
        let active = self.inner.take().ok_or(Error::NotInitialized)?;
        active.teardown()
    }

    /// Whether the session has not been shut down.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    fn active(&self) -> Result<&Active> {
        self.inner.as_ref().ok_or(Error::NotInitialized)
    }

    fn active_mut(&mut self) -> Result<&mut Active> {
        self.inner.as_mut().ok_or(Error::NotInitialized)
    }

    // ── Geometry ────────────────────────────────────────────────

    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn width(&self) -> Result<u16> {
        Ok(self.active()?.size.cols)
    }

    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn height(&self) -> Result<u16> {
        Ok(self.active()?.size.rows)
    }

    /// The most recent known size.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn size(&self) -> Result<Size> {
        Ok(self.active()?.size)
    }

    // ── Drawing ─────────────────────────────────────────────────

    /// The back buffer as drawn so far.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn buffer(&self) -> Result<&CellBuffer> {
        Ok(&self.active()?.back)
    }

    /// Reset every back-buffer cell to a default-colored space.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn clear(&mut self) -> Result<()> {
        self.active_mut()?.back.clear();
        Ok(())
    }

    /// Write one cell. Coordinates outside the screen are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, fg: ColorAttr, bg: ColorAttr) -> Result<()> {
        self.active_mut()?.back.set_cell(x, y, ch, fg, bg);
        Ok(())
    }

    /// Write `text` left to right from `(x, y)`, clipped at the right edge.
    /// Returns the number of columns written.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn print(&mut self, x: u16, y: u16, fg: ColorAttr, bg: ColorAttr, text: &str) -> Result<u16> {
        Ok(self.active_mut()?.back.print(x, y, fg, bg, text))
    }

    /// Send the difference between the back buffer and the screen.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown, [`Error::Io`] if the
    /// terminal write fails. A failed frame is not retried.
    pub fn present(&mut self) -> Result<RenderStats> {
        let active = self.active_mut()?;
        let stats = active.presenter.present(&active.back, active.cursor);
        active.presenter.flush_to(&mut active.out)?;
        Ok(stats)
    }

    /// Show the cursor at `(x, y)` from the next present on. Coordinates
    /// are clamped to the screen.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn set_cursor(&mut self, x: u16, y: u16) -> Result<()> {
        let active = self.active_mut()?;
        let x = x.min(active.size.cols.saturating_sub(1));
        let y = y.min(active.size.rows.saturating_sub(1));
        active.cursor = Some((x, y));
        Ok(())
    }

    /// Hide the cursor from the next present on. Idempotent.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn hide_cursor(&mut self) -> Result<()> {
        self.active_mut()?.cursor = None;
        Ok(())
    }

    /// The cursor the next present will apply.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn cursor(&self) -> Result<CursorRequest> {
        Ok(self.active()?.cursor)
    }

    // ── Modes ───────────────────────────────────────────────────

    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn input_mode(&self) -> Result<InputMode> {
        Ok(self.active()?.input_mode)
    }

    /// Switch input mode. The mode is normalized first; turning
    /// [`InputMode::MOUSE`] on or off tells the terminal immediately.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown, [`Error::Io`] if the
    /// mouse sequence cannot be written.
    pub fn set_input_mode(&mut self, mode: InputMode) -> Result<()> {
        let active = self.active_mut()?;
        let mode = mode.normalized();
        let had_mouse = active.input_mode.contains(InputMode::MOUSE);
        let wants_mouse = mode.contains(InputMode::MOUSE);
        active.input_mode = mode;

        if had_mouse != wants_mouse {
            let mut seq = Vec::new();
            if wants_mouse {
                ansi::enable_mouse(&mut seq)?;
            } else {
                ansi::disable_mouse(&mut seq)?;
            }
            active.out.write_all(&seq)?;
            active.out.flush()?;
        }
        debug!(?mode, "input mode changed");
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn output_mode(&self) -> Result<OutputMode> {
        Ok(self.active()?.output_mode)
    }

    /// Switch output mode. Cells already in the buffer keep their encoded
    /// values.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedMode`] for an extended mode on a terminal
    /// without the 256-color palette; the current mode stays.
    /// [`Error::NotInitialized`] after shutdown.
    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<()> {
        let active = self.active_mut()?;
        if mode.is_extended() && !active.extended_colors {
            warn!(?mode, current = ?active.output_mode, "output mode not supported by terminal");
            return Err(Error::UnsupportedMode(mode));
        }
        active.output_mode = mode;
        debug!(?mode, "output mode changed");
        Ok(())
    }

    /// Encode a logical color under the current output mode.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown, plus the codec errors of
    /// [`color::encode`].
    pub fn encode(&self, color: u16, attrs: Attrs) -> Result<ColorAttr> {
        color::encode(color, attrs, self.active()?.output_mode)
    }

    // ── Events ──────────────────────────────────────────────────

    /// A handle that can release a blocked [`poll_event`](Self::poll_event).
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] after shutdown.
    pub fn canceller(&self) -> Result<Canceller> {
        Ok(Canceller(Arc::clone(&self.active()?.cancel)))
    }

    /// Block until the next event.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] when released by a [`Canceller`], [`Error::Io`]
    /// when the input closes, [`Error::NotInitialized`] after shutdown.
    pub fn poll_event(&mut self) -> Result<Event> {
        loop {
            if let Some(event) = self.active_mut()?.next_event(None)? {
                return Ok(event);
            }
        }
    }

    /// Wait up to `timeout` for the next event. `Ok(None)` means nothing
    /// resolved in time; partial input stays buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] when released by a [`Canceller`], [`Error::Io`]
    /// when the input closes, [`Error::NotInitialized`] after shutdown.
    pub fn peek_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        // A timeout past the clock's range waits like `poll_event`.
        let deadline = Instant::now().checked_add(timeout);
        self.active_mut()?.next_event(deadline)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.shutdown();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(active) => f
                .debug_struct("Session")
                .field("size", &active.size)
                .field("input_mode", &active.input_mode)
                .field("output_mode", &active.output_mode)
                .finish_non_exhaustive(),
            None => f.write_str("Session(shut down)"),
        }
    }
}

// ─── Active ──────────────────────────────────────────────────────────────────

impl Active {
    /// Alternate screen, application keypad, hidden cursor, cleared screen.
    fn setup(&mut self) -> Result<()> {
        let mut seq = Vec::new();
        ansi::enter_alt_screen(&mut seq)?;
        ansi::keypad_transmit(&mut seq)?;
        ansi::cursor_hide(&mut seq)?;
        if self.input_mode.contains(InputMode::MOUSE) {
            ansi::enable_mouse(&mut seq)?;
        }
        self.out.write_all(&seq)?;

        self.presenter.assume_cursor(None);
        self.presenter.clear_screen();
        self.presenter.flush_to(&mut self.out)?;
        Ok(())
    }

    /// Undo `setup` and release the backend.
    fn teardown(mut self) -> Result<()> {
        let mut seq = Vec::new();
        ansi::disable_mouse(&mut seq)?;
        ansi::cursor_show(&mut seq)?;
        ansi::reset(&mut seq)?;
        ansi::clear_screen(&mut seq)?;
        ansi::keypad_local(&mut seq)?;
        ansi::exit_alt_screen(&mut seq)?;
        let written = self.out.write_all(&seq).and_then(|()| self.out.flush());

        let restored = match self.backend {
            #[cfg(unix)]
            Backend::Tty {
                mut reader,
                mut tty,
                _claim,
            } => {
                reader.stop();
                let restored = tty.restore();
                terminal::set_emergency_fd(None);
                info!("terminal session ended");
                restored
            }
            Backend::Headless => {
                debug!("headless session ended");
                Ok(())
            }
        };

        written?;
        restored?;
        Ok(())
    }

    /// Next event, or `None` once `deadline` passes.
    fn next_event(&mut self, deadline: Option<Instant>) -> Result<Option<Event>> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            if self.cancel.swap(false, Ordering::AcqRel) {
                debug!("event poll cancelled");
                return Err(Error::Cancelled);
            }

            let now = Instant::now();
            if self.escape_deadline.is_some_and(|at| now >= at) {
                // Bytes already queued arrived in time; only a quiet
                // channel resolves the partial sequence.
                match self.rx.try_recv() {
                    Ok(bytes @ Input::Bytes(_)) => self.handle_input(bytes),
                    Ok(resize) => {
                        self.flush_decoder();
                        self.handle_input(resize);
                    }
                    Err(_) => self.flush_decoder(),
                }
                continue;
            }
            if deadline.is_some_and(|at| now >= at) {
                return Ok(None);
            }

            let wait = [deadline, self.escape_deadline]
                .into_iter()
                .flatten()
                .map(|at| at.saturating_duration_since(now))
                .fold(self.tick, Duration::min);

            match self.rx.recv_timeout(wait) {
                Ok(input) => self.handle_input(input),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if self.decoder.has_pending() {
                        self.flush_decoder();
                        continue;
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "terminal input closed",
                    )
                    .into());
                }
            }
        }
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Bytes(bytes) => {
                let events = self.decoder.advance(&bytes, self.input_mode);
                self.queue.extend(events);
                self.escape_deadline = self
                    .decoder
                    .has_pending()
                    .then(|| Instant::now().checked_add(self.escape_timeout))
                    .flatten();
            }
            Input::Resize(size) => self.resize(size),
        }
    }

    fn flush_decoder(&mut self) {
        let events = self.decoder.flush(self.input_mode);
        self.queue.extend(events);
        self.escape_deadline = None;
    }

    /// Reallocate both buffers, queue a screen clear for the next present,
    /// and queue the resize behind everything decoded so far.
    fn resize(&mut self, size: Size) {
        debug!(cols = size.cols, rows = size.rows, "terminal resized");
        self.size = size;
        self.back.resize(size.cols, size.rows);
        self.presenter.resize(size.cols, size.rows);
        self.presenter.clear_screen();
        if let Some((x, y)) = self.cursor {
            self.cursor = Some((
                x.min(size.cols.saturating_sub(1)),
                y.min(size.rows.saturating_sub(1)),
            ));
        }
        self.queue.push_back(Event::Resize(size));
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyCode, KeyEvent, Modifiers};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// A writer the test can read back after handing it to the session.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn take(&self) -> Vec<u8> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session(cols: u16, rows: u16) -> (Session, InputFeed, Capture) {
        let capture = Capture::default();
        let (session, feed) =
            Session::headless(capture.clone(), Size::new(cols, rows), &Config::default()).unwrap();
        (session, feed, capture)
    }

    fn key(ch: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(ch), Modifiers::empty()))
    }

    #[test]
    fn setup_enters_alt_screen_and_clears() {
        let (_session, _feed, capture) = session(10, 2);
        assert_eq!(
            String::from_utf8(capture.take()).unwrap(),
            "\x1b[?1049h\x1b[?1h\x1b=\x1b[?25l\x1b[0m\x1b[H\x1b[2J"
        );
    }

    #[test]
    fn mouse_config_enables_reporting_at_setup() {
        let capture = Capture::default();
        let config = Config {
            mouse: true,
            ..Config::default()
        };
        let (session, _feed) = Session::headless(capture.clone(), Size::new(4, 4), &config).unwrap();
        assert!(session.input_mode().unwrap().contains(InputMode::MOUSE));
        let out = String::from_utf8(capture.take()).unwrap();
        assert!(out.contains("\x1b[?1006h"));
    }

    #[test]
    fn teardown_restores_terminal() {
        let (mut session, _feed, capture) = session(10, 2);
        capture.take();
        session.shutdown().unwrap();
        let out = String::from_utf8(capture.take()).unwrap();
        assert!(out.starts_with("\x1b[?1006l"));
        assert!(out.contains("\x1b[?25h"));
        assert!(out.ends_with("\x1b[?1l\x1b>\x1b[?1049l"));
    }

    #[test]
    fn drop_shuts_down() {
        let (session, _feed, capture) = session(10, 2);
        capture.take();
        drop(session);
        assert!(String::from_utf8(capture.take()).unwrap().ends_with("\x1b[?1049l"));
    }

    #[test]
    fn geometry() {
        let (session, _feed, _capture) = session(80, 24);
        assert_eq!(session.width().unwrap(), 80);
        assert_eq!(session.height().unwrap(), 24);
        assert_eq!(session.size().unwrap(), Size::new(80, 24));
    }

    #[test]
    fn set_cursor_clamps_to_screen() {
        let (mut session, _feed, _capture) = session(10, 5);
        session.set_cursor(50, 2).unwrap();
        assert_eq!(session.cursor().unwrap(), Some((9, 2)));
        session.hide_cursor().unwrap();
        session.hide_cursor().unwrap();
        assert_eq!(session.cursor().unwrap(), None);
    }

    #[test]
    fn present_shows_cursor_last() {
        let (mut session, _feed, capture) = session(10, 5);
        capture.take();
        session.print(0, 0, ColorAttr::WHITE, ColorAttr::BLACK, "a").unwrap();
        session.set_cursor(3, 1).unwrap();
        session.present().unwrap();
        let out = String::from_utf8(capture.take()).unwrap();
        assert!(out.ends_with("\x1b[?25h\x1b[2;4H"));
    }

    #[test]
    fn clear_resets_back_buffer() {
        let (mut session, _feed, _capture) = session(4, 1);
        session.print(0, 0, ColorAttr::RED, ColorAttr::DEFAULT, "abcd").unwrap();
        session.clear().unwrap();
        assert!(session.buffer().unwrap().cells().iter().all(|c| c.ch == u32::from(' ')));
    }

    #[test]
    fn mouse_toggle_writes_sequences() {
        let (mut session, _feed, capture) = session(4, 1);
        capture.take();
        session.set_input_mode(InputMode::ESC | InputMode::MOUSE).unwrap();
        assert_eq!(capture.take(), b"\x1b[?1000h\x1b[?1002h\x1b[?1015h\x1b[?1006h");
        session.set_input_mode(InputMode::ESC | InputMode::MOUSE).unwrap();
        assert!(capture.take().is_empty());
        session.set_input_mode(InputMode::ESC).unwrap();
        assert_eq!(capture.take(), b"\x1b[?1006l\x1b[?1015l\x1b[?1002l\x1b[?1000l");
    }

    #[test]
    fn input_mode_is_normalized() {
        let (mut session, _feed, _capture) = session(4, 1);
        session.set_input_mode(InputMode::ESC | InputMode::ALT).unwrap();
        assert_eq!(session.input_mode().unwrap(), InputMode::ESC);
        session.set_input_mode(InputMode::empty()).unwrap();
        assert_eq!(session.input_mode().unwrap(), InputMode::ESC);
    }

    #[test]
    fn extended_output_mode_needs_color_support() {
        let config = Config {
            color_support: crate::config::ColorSupport::Basic,
            ..Config::default()
        };
        let (mut session, _feed) = Session::headless(io::sink(), Size::new(4, 1), &config).unwrap();
        let err = session.set_output_mode(OutputMode::Colors256).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMode(OutputMode::Colors256)));
        assert_eq!(session.output_mode().unwrap(), OutputMode::Normal);
        session.set_output_mode(OutputMode::Normal).unwrap();
    }

    #[test]
    fn encode_follows_output_mode() {
        let config = Config {
            color_support: crate::config::ColorSupport::Extended,
            ..Config::default()
        };
        let (mut session, _feed) = Session::headless(io::sink(), Size::new(4, 1), &config).unwrap();
        let normal = session.encode(2, Attrs::empty()).unwrap();
        session.set_output_mode(OutputMode::Grayscale).unwrap();
        let gray = session.encode(2, Attrs::empty()).unwrap();
        assert_ne!(normal, gray);
        assert!(session.encode(25, Attrs::empty()).is_err());
    }

    #[test]
    fn unsupported_configured_mode_falls_back() {
        let config = Config {
            output_mode: OutputMode::Colors216,
            color_support: crate::config::ColorSupport::Basic,
            ..Config::default()
        };
        let (session, _feed) = Session::headless(io::sink(), Size::new(4, 1), &config).unwrap();
        assert_eq!(session.output_mode().unwrap(), OutputMode::Normal);
    }

    #[test]
    fn events_decode_across_pushes() {
        let (mut session, feed, _capture) = session(4, 1);
        feed.push_bytes(b"x\xc3").unwrap();
        feed.push_bytes(b"\xa9").unwrap();
        assert_eq!(session.poll_event().unwrap(), key('x'));
        assert_eq!(session.poll_event().unwrap(), key('é'));
    }

    #[test]
    fn peek_times_out_with_none() {
        let (mut session, _feed, _capture) = session(4, 1);
        assert_eq!(session.peek_event(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn peek_with_unbounded_timeout_waits_for_input() {
        let (mut session, feed, _capture) = session(4, 1);
        feed.push_bytes(b"a").unwrap();
        assert_eq!(session.peek_event(Duration::MAX).unwrap(), Some(key('a')));
    }

    #[test]
    fn unbounded_escape_timeout_keeps_escape_pending() {
        let config = Config {
            escape_timeout_ms: u64::MAX,
            ..Config::default()
        };
        let (mut session, feed) = Session::headless(io::sink(), Size::new(4, 1), &config).unwrap();
        feed.push_bytes(b"\x1b").unwrap();
        assert_eq!(session.peek_event(Duration::from_millis(20)).unwrap(), None);
    }

    #[test]
    fn resize_resends_visible_cursor() {
        let (mut session, feed, capture) = session(10, 5);
        session.set_cursor(3, 1).unwrap();
        session.present().unwrap();
        capture.take();

        feed.resize(Size::new(12, 6)).unwrap();
        assert_eq!(session.poll_event().unwrap(), Event::Resize(Size::new(12, 6)));
        session.present().unwrap();
        let out = String::from_utf8(capture.take()).unwrap();
        assert!(out.contains("\x1b[2J"));
        assert!(out.ends_with("\x1b[2;4H"));
    }

    #[test]
    fn resize_updates_geometry_and_queues_event() {
        let (mut session, feed, _capture) = session(4, 1);
        feed.push_bytes(b"a").unwrap();
        feed.resize(Size::new(6, 3)).unwrap();
        assert_eq!(session.poll_event().unwrap(), key('a'));
        assert_eq!(session.poll_event().unwrap(), Event::Resize(Size::new(6, 3)));
        assert_eq!(session.width().unwrap(), 6);
        assert_eq!(session.buffer().unwrap().height(), 3);
    }

    #[test]
    fn cancel_before_poll_is_consumed() {
        let (mut session, _feed, _capture) = session(4, 1);
        session.canceller().unwrap().cancel();
        assert!(matches!(session.poll_event(), Err(Error::Cancelled)));
        assert_eq!(session.peek_event(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn closed_input_is_an_io_error() {
        let (mut session, feed, _capture) = session(4, 1);
        feed.push_bytes(b"q").unwrap();
        drop(feed);
        assert_eq!(session.poll_event().unwrap(), key('q'));
        assert!(matches!(session.poll_event(), Err(Error::Io(_))));
    }

    #[test]
    fn every_operation_fails_after_shutdown() {
        let (mut session, feed, _capture) = session(4, 1);
        session.shutdown().unwrap();
        assert!(!session.is_active());
        assert!(matches!(session.shutdown(), Err(Error::NotInitialized)));
        assert!(matches!(session.width(), Err(Error::NotInitialized)));
        assert!(matches!(session.present(), Err(Error::NotInitialized)));
        assert!(matches!(session.poll_event(), Err(Error::NotInitialized)));
        assert!(matches!(
            session.set_cell(0, 0, 'x', ColorAttr::DEFAULT, ColorAttr::DEFAULT),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(feed.push_bytes(b"x"), Err(Error::NotInitialized)));
    }
}
