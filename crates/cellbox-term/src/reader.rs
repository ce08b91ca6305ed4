// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background TTY reader: collects raw bytes and resize notifications.
//
// A dedicated thread polls two descriptors: the terminal's input side and
// the read end of a self-pipe that the SIGWINCH handler writes one byte
// into. Everything it sees goes down a single channel as `Input` messages,
// so a resize is always queued behind the bytes that were read before it.
//
// The decoder does not run here. The session decodes on the caller's
// thread, which keeps all state behind `&mut Session`.
//
// Shutdown: `poll()` uses a short timeout and the thread checks an
// `AtomicBool` stop flag between polls, so it never stays stuck in a
// blocking `read()`.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::terminal::Size;

#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
#[cfg(unix)]
use std::sync::Arc;
#[cfg(unix)]
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
#[cfg(unix)]
use std::thread::{self, JoinHandle};

#[cfg(unix)]
use tracing::{debug, trace};

/// Byte chunk read from the terminal.
///
/// A keypress is 1-6 bytes, a paste can be kilobytes. 4 KB handles both.
#[cfg(unix)]
const READ_BUF_SIZE: usize = 4096;

/// Raw input delivered to the session, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A non-empty chunk of terminal input.
    Bytes(Vec<u8>),
    /// The terminal now has this size.
    Resize(Size),
}

/// Create the channel a session receives [`Input`] on.
#[must_use]
pub fn channel() -> (Sender<Input>, Receiver<Input>) {
    mpsc::channel()
}

// ─── SIGWINCH self-pipe ─────────────────────────────────────────────────────

/// Write end of the active self-pipe, or -1. Read by the signal handler.
#[cfg(unix)]
static SIGWINCH_PIPE: AtomicI32 = AtomicI32::new(-1);

/// Install the SIGWINCH handler, returning the disposition it replaced.
#[cfg(unix)]
fn install_sigwinch_handler() -> io::Result<libc::sigaction> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        let mut previous: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(libc::SIGWINCH, &raw const sa, &raw mut previous) == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(previous)
    }
}

/// Put back a disposition saved by [`install_sigwinch_handler`].
#[cfg(unix)]
fn restore_sigwinch_handler(previous: &libc::sigaction) {
    let rc = unsafe { libc::sigaction(libc::SIGWINCH, previous, std::ptr::null_mut()) };
    if rc == -1 {
        debug!(err = %io::Error::last_os_error(), "SIGWINCH restore failed");
    }
}

/// Async-signal-safe: one atomic load and one `write()`.
#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    let fd = SIGWINCH_PIPE.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = 1u8;
        unsafe {
            let _ = libc::write(fd, (&raw const byte).cast::<libc::c_void>(), 1);
        }
    }
}

/// A non-blocking pipe whose write end the signal handler targets.
#[cfg(unix)]
struct SelfPipe {
    read: OwnedFd,
    write: OwnedFd,
}

#[cfg(unix)]
impl SelfPipe {
    fn new() -> io::Result<Self> {
        let mut fds: [libc::c_int; 2] = [0; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // Both descriptors are fresh from pipe() and owned by nobody else.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        for fd in [fds[0], fds[1]] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
            if flags == -1
                || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1
            {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(Self { read, write })
    }

    /// Consume every pending wakeup byte.
    fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe {
                libc::read(self.read.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
            };
            if n <= 0 {
                break;
            }
        }
    }
}

// ─── TtyReader ──────────────────────────────────────────────────────────────

/// Background reader thread for one TTY session.
///
/// Runs until [`stop`](Self::stop) is called (or the reader is dropped),
/// the input reaches EOF, or the receiver is dropped.
#[cfg(unix)]
pub struct TtyReader {
    /// The reader thread handle. `None` after `stop()` joins it.
    handle: Option<JoinHandle<()>>,
    /// Shared flag to signal the thread to exit.
    stop: Arc<AtomicBool>,
    /// SIGWINCH disposition before `spawn`. `None` once restored.
    previous_handler: Option<libc::sigaction>,
}

#[cfg(unix)]
impl TtyReader {
    /// Spawn the reader thread.
    ///
    /// Bytes from `input_fd` and window-size changes of `size_fd` are sent
    /// on `tx`. The stop flag is checked every `tick`.
    ///
    /// # Errors
    ///
    /// Returns an error if the self-pipe or the thread cannot be created.
    pub fn spawn(
        input_fd: RawFd,
        size_fd: RawFd,
        tick: Duration,
        tx: Sender<Input>,
    ) -> io::Result<Self> {
        let pipe = SelfPipe::new()?;
        SIGWINCH_PIPE.store(pipe.write.as_raw_fd(), Ordering::Relaxed);
        let previous_handler = match install_sigwinch_handler() {
            Ok(previous) => previous,
            Err(err) => {
                SIGWINCH_PIPE.store(-1, Ordering::Relaxed);
                return Err(err);
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let timeout_ms = libc::c_int::try_from(tick.as_millis()).unwrap_or(libc::c_int::MAX);

        let spawned = thread::Builder::new()
            .name("cellbox-reader".into())
            .spawn(move || {
                reader_loop(input_fd, size_fd, timeout_ms, &pipe, &tx, &stop_flag);
                // Detach the handler before the pipe closes.
                SIGWINCH_PIPE.store(-1, Ordering::Relaxed);
            });

        match spawned {
            Ok(handle) => Ok(Self {
                handle: Some(handle),
                stop,
                previous_handler: Some(previous_handler),
            }),
            Err(err) => {
                SIGWINCH_PIPE.store(-1, Ordering::Relaxed);
                restore_sigwinch_handler(&previous_handler);
                Err(err)
            }
        }
    }

    /// Signal the reader thread to stop, wait for it to exit, and put back
    /// the SIGWINCH disposition that was active before [`spawn`](Self::spawn).
    ///
    /// Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if let Some(previous) = self.previous_handler.take() {
            restore_sigwinch_handler(&previous);
        }
    }
}

#[cfg(unix)]
impl Drop for TtyReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The reader thread's main loop.
#[cfg(unix)]
fn reader_loop(
    input_fd: RawFd,
    size_fd: RawFd,
    timeout_ms: libc::c_int,
    pipe: &SelfPipe,
    tx: &Sender<Input>,
    stop: &AtomicBool,
) {
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        let mut fds = [
            libc::pollfd {
                fd: input_fd,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: pipe.read.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), 2, timeout_ms) };

        // Timeout or EINTR: loop back to check the stop flag.
        if ready <= 0 {
            continue;
        }

        // Input first: bytes already waiting were typed before the resize.
        if fds[0].revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
            let n = unsafe { libc::read(input_fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                debug!("terminal input closed");
                break;
            }
            #[allow(clippy::cast_sign_loss)] // n > 0 checked above.
            let chunk = buf[..n as usize].to_vec();
            trace!(len = chunk.len(), "read input");
            if tx.send(Input::Bytes(chunk)).is_err() {
                break;
            }
        }

        if fds[1].revents & libc::POLLIN != 0 {
            pipe.drain();
            match crate::terminal::get_size(size_fd) {
                Ok(size) => {
                    if tx.send(Input::Resize(size)).is_err() {
                        break;
                    }
                }
                Err(err) => debug!(%err, "size query after SIGWINCH failed"),
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// Readers swap a process-wide signal disposition; one at a time.
    static SIGNAL_LOCK: Mutex<()> = Mutex::new(());

    fn exclusive() -> MutexGuard<'static, ()> {
        SIGNAL_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_sigwinch_handler() -> usize {
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            assert_eq!(libc::sigaction(libc::SIGWINCH, std::ptr::null(), &raw mut sa), 0);
            sa.sa_sigaction
        }
    }

    /// A pipe standing in for a terminal: (read end for the reader, write end for the test).
    fn fake_tty() -> (OwnedFd, std::fs::File) {
        let pipe = SelfPipe::new().unwrap();
        // The reader only polls and reads; blocking mode is irrelevant for it.
        (pipe.read, std::fs::File::from(pipe.write))
    }

    #[test]
    fn forwards_bytes_in_order() {
        use std::io::Write;

        let _guard = exclusive();
        let (input, mut writer) = fake_tty();
        let (tx, rx) = channel();
        let mut reader =
            TtyReader::spawn(input.as_raw_fd(), input.as_raw_fd(), Duration::from_millis(10), tx)
                .unwrap();

        writer.write_all(b"ab").unwrap();
        let mut got = Vec::new();
        while got.len() < 2 {
            match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                Input::Bytes(bytes) => got.extend(bytes),
                Input::Resize(_) => {}
            }
        }
        assert_eq!(got, b"ab");
        reader.stop();
    }

    #[test]
    fn stop_is_idempotent_and_closes_channel() {
        let _guard = exclusive();
        let (input, _writer) = fake_tty();
        let (tx, rx) = channel();
        let mut reader =
            TtyReader::spawn(input.as_raw_fd(), input.as_raw_fd(), Duration::from_millis(10), tx)
                .unwrap();
        reader.stop();
        reader.stop();
        while let Ok(Input::Bytes(_)) = rx.try_recv() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn eof_ends_the_thread() {
        let _guard = exclusive();
        let (input, writer) = fake_tty();
        let (tx, rx) = channel();
        let _reader =
            TtyReader::spawn(input.as_raw_fd(), input.as_raw_fd(), Duration::from_millis(10), tx)
                .unwrap();
        drop(writer);
        // The sender is dropped when the thread exits.
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
    }

    #[test]
    fn stop_restores_previous_sigwinch_disposition() {
        let _guard = exclusive();
        let before = current_sigwinch_handler();
        let (input, _writer) = fake_tty();
        let (tx, _rx) = channel();
        let mut reader =
            TtyReader::spawn(input.as_raw_fd(), input.as_raw_fd(), Duration::from_millis(10), tx)
                .unwrap();
        assert_eq!(current_sigwinch_handler(), sigwinch_handler as *const () as usize);

        reader.stop();
        assert_eq!(current_sigwinch_handler(), before);
    }
}
