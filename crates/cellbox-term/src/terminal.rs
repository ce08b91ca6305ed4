// SPDX-License-Identifier: MIT
//
// Terminal control: raw mode, size queries, and panic-safe restore.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, and raw fd writes. These are
// the standard POSIX interfaces for terminal control; there is no safe
// alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// A `Tty` owns the descriptors a session talks to: either one read/write
// descriptor or a split pair, opened by us (closed on drop) or borrowed
// from the caller (left open). It puts the input side into raw mode and
// restores the saved termios on drop.
//
// The panic hook writes a pre-built restore sequence straight to the
// session's output descriptor, bypassing any Rust-level lock, then restores
// termios from a global backup before the original hook prints its message.

use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::fs::OpenOptions;
#[cfg(unix)]
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use std::sync::atomic::AtomicI32;
#[cfg(unix)]
use std::sync::{Mutex, Once};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Total number of cells (`cols × rows`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

// ─── Terminal Queries ───────────────────────────────────────────────────────

/// Query the size of the terminal behind `fd` via `ioctl(TIOCGWINSZ)`.
///
/// # Errors
///
/// Returns the OS error if the ioctl fails, or `InvalidData` if the
/// terminal reports a zero dimension.
#[cfg(unix)]
pub fn get_size(fd: RawFd) -> io::Result<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    if ws.ws_col == 0 || ws.ws_row == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "terminal reported a zero size",
        ));
    }
    Ok(Size::new(ws.ws_col, ws.ws_row))
}

/// Check whether `fd` refers to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

// ─── Single Session Claim ───────────────────────────────────────────────────

/// Set while a TTY-backed session exists.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Proof that this process holds the one TTY session slot.
///
/// Released on drop.
#[derive(Debug)]
pub struct SessionClaim(());

impl SessionClaim {
    /// Take the slot, or `None` if another session holds it.
    #[must_use]
    pub fn acquire() -> Option<Self> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(()))
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// Global backup of `(fd, original termios)` for panic recovery.
///
/// The [`Tty`] owns its own copy, but the panic hook can't reach it.
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Output descriptor of the active session, or -1.
#[cfg(unix)]
static EMERGENCY_FD: AtomicI32 = AtomicI32::new(-1);

/// Restore termios from the global backup. Best-effort, ignores errors.
#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSANOW, original);
            }
        }
    }
}

/// Complete terminal restore sequence for emergency use.
///
/// Disable mouse reporting, reset SGR, show cursor, numeric keypad, then
/// leave the alternate screen last so the shell's content reappears clean.
#[rustfmt::skip]
pub(crate) const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?1006l\x1b[?1015l\x1b[?1002l\x1b[?1000l\
    \x1b[0m\
    \x1b[?25h\
    \x1b[?1l\x1b>\
    \x1b[?1049l";

#[cfg(unix)]
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before printing the error.
///
/// Installed at most once per process. It only acts while a session has
/// registered its output descriptor.
#[cfg(unix)]
pub(crate) fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();
            restore_termios_from_backup();
            original(info);
        }));
    });
}

/// Point the panic hook at a session's output, or detach it with `None`.
#[cfg(unix)]
pub(crate) fn set_emergency_fd(fd: Option<RawFd>) {
    EMERGENCY_FD.store(fd.unwrap_or(-1), Ordering::Release);
}

/// Write the restore sequence directly to the registered descriptor.
#[cfg(unix)]
fn emergency_restore() {
    let fd = EMERGENCY_FD.load(Ordering::Acquire);
    if fd < 0 {
        return;
    }
    unsafe {
        let _ = libc::write(
            fd,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// The descriptors a TTY session reads from and writes to.
///
/// Raw mode is restored on drop; descriptors opened by [`Tty::open`] are
/// closed with it.
#[cfg(unix)]
pub struct Tty {
    read_fd: RawFd,
    write_fd: RawFd,
    /// Set when we opened the descriptor ourselves.
    owned: Option<OwnedFd>,
    /// Original termios saved before entering raw mode.
    original_termios: Option<libc::termios>,
}

#[cfg(unix)]
impl Tty {
    /// Open a terminal device for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let owned = OwnedFd::from(file);
        let fd = owned.as_raw_fd();
        Ok(Self {
            read_fd: fd,
            write_fd: fd,
            owned: Some(owned),
            original_termios: None,
        })
    }

    /// Use caller-owned descriptors. They are left open on drop.
    #[must_use]
    pub const fn from_fds(read_fd: RawFd, write_fd: RawFd) -> Self {
        Self {
            read_fd,
            write_fd,
            owned: None,
            original_termios: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    #[inline]
    #[must_use]
    pub const fn write_fd(&self) -> RawFd {
        self.write_fd
    }

    /// Whether this handle opened (and will close) its descriptor.
    #[inline]
    #[must_use]
    pub const fn owns_fd(&self) -> bool {
        self.owned.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.original_termios.is_some()
    }

    /// The descriptor to ask for the window size: the output side if it is
    /// a terminal, else the input side.
    #[must_use]
    pub fn size_fd(&self) -> RawFd {
        if is_tty(self.write_fd) {
            self.write_fd
        } else {
            self.read_fd
        }
    }

    /// Query the current window size.
    ///
    /// # Errors
    ///
    /// Returns an error if neither descriptor reports a size.
    pub fn size(&self) -> io::Result<Size> {
        get_size(self.size_fd())
    }

    /// Put the input side into raw mode.
    ///
    /// cfmakeraw equivalent with VMIN=1, VTIME=0. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if `tcgetattr` or `tcsetattr` fails (for example
    /// when the descriptor is not a terminal).
    pub fn enable_raw_mode(&mut self) -> io::Result<()> {
        if self.original_termios.is_some() {
            return Ok(());
        }

        let fd = self.read_fd;

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            let original = termios;

            // cfmakeraw equivalent: disable all line processing.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            // VMIN=1, VTIME=0: read() blocks until at least 1 byte available.
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(original);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some((fd, original));
            }
        }

        Ok(())
    }

    /// Restore the termios saved by [`enable_raw_mode`](Self::enable_raw_mode).
    ///
    /// # Errors
    ///
    /// Returns an error if `tcsetattr` fails.
    pub fn restore(&mut self) -> io::Result<()> {
        let Some(original) = self.original_termios.take() else {
            return Ok(());
        };

        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = None;
        }

        unsafe {
            if libc::tcsetattr(self.read_fd, libc::TCSAFLUSH, &raw const original) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// A writer for the output side.
    #[must_use]
    pub const fn writer(&self) -> FdWriter {
        FdWriter(self.write_fd)
    }
}

#[cfg(unix)]
impl Drop for Tty {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Unbuffered writer over a raw descriptor. Does not close it.
///
/// Only valid while the owning [`Tty`] is alive.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct FdWriter(RawFd);

#[cfg(unix)]
impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::write(self.0, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };
            if n >= 0 {
                #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
