// SPDX-License-Identifier: MIT
//
// Differential presenter: reconciles the visible screen with the back buffer.
//
// The presenter keeps a front buffer holding what the terminal is believed
// to show. Each `present()` walks the back and front buffers in lockstep and
// emits escapes only for cells that differ, then copies those rows into the
// front buffer.
//
// The pipeline per frame:
//
//   1. The application draws into the session's back buffer.
//   2. Presenter.present() diffs back against front, row by row.
//   3. Changed cells go through CellWriter, which drops cursor moves inside
//      contiguous runs and SGR sequences while the style is unchanged.
//   4. The cursor request is applied last so row writes cannot clobber it.
//   5. flush_to() issues a single write() of the accumulated bytes.
//
// A present with no changed cell and no cursor change emits zero bytes.

use std::io::{self, Write};

use crate::ansi;
use crate::buffer::CellBuffer;
use crate::cell::Cell;
use crate::color::ColorAttr;
use crate::output::{CellWriter, OutputBuffer};

/// A front cell that no back cell can equal (`u32::MAX` is not a scalar).
/// Filling the front buffer with it forces every cell to be redrawn.
const STALE: Cell = Cell {
    ch: u32::MAX,
    fg: ColorAttr::DEFAULT,
    bg: ColorAttr::DEFAULT,
};

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// Statistics from a present pass, for profiling and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells that differed from the front buffer and were emitted.
    pub cells_rendered: usize,
    /// Cells that matched the front buffer and were skipped.
    pub cells_skipped: usize,
    /// Bytes of escape output generated by this pass.
    pub bytes_written: usize,
}

impl RenderStats {
    /// Total cells processed (rendered + skipped).
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_rendered + self.cells_skipped
    }
}

// ─── Presenter ───────────────────────────────────────────────────────────────

/// Requested cursor state: `None` hides it, `Some((x, y))` shows it there.
pub type CursorRequest = Option<(u16, u16)>;

/// Differential renderer owning the front buffer.
///
/// ```
/// use cellbox_term::buffer::CellBuffer;
/// use cellbox_term::color::ColorAttr;
/// use cellbox_term::diff::Presenter;
///
/// let mut presenter = Presenter::new(20, 2);
/// let mut back = CellBuffer::new(20, 2);
/// back.print(0, 0, ColorAttr::WHITE, ColorAttr::BLACK, "hi");
///
/// let stats = presenter.present(&back, None);
/// assert_eq!(stats.cells_rendered, 2);
///
/// let mut tty = Vec::new();
/// presenter.flush_to(&mut tty).unwrap();
/// assert!(presenter.present(&back, None).bytes_written == 0);
/// ```
pub struct Presenter {
    front: CellBuffer,
    output: OutputBuffer,
    writer: CellWriter,
    /// Cursor state last applied to the terminal.
    cursor: CursorRequest,
    /// The terminal cursor was moved outside `apply_cursor` (a screen
    /// clear homes it), so its position must be sent again.
    cursor_moved: bool,
}

impl Presenter {
    /// A presenter for a freshly cleared screen of the given size with the
    /// cursor hidden.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let mut writer = CellWriter::new();
        writer.assume_reset_style();
        Self {
            front: CellBuffer::new(width, height),
            output: OutputBuffer::new(),
            writer,
            cursor: None,
            cursor_moved: false,
        }
    }

    /// What the terminal is believed to show.
    #[inline]
    #[must_use]
    pub const fn front(&self) -> &CellBuffer {
        &self.front
    }

    /// Bytes queued since the last flush (for tests and debugging).
    #[inline]
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        self.output.as_bytes()
    }

    /// Reconcile the terminal with `back` and apply `cursor`.
    ///
    /// A `back` buffer of a different size than the front buffer resizes
    /// the front and redraws everything.
    pub fn present(&mut self, back: &CellBuffer, cursor: CursorRequest) -> RenderStats {
        let start = self.output.len();
        let mut stats = RenderStats::default();

        if back.width() != self.front.width() || back.height() != self.front.height() {
            self.resize(back.width(), back.height());
        }

        // The application may have moved the real cursor since last time.
        self.writer.invalidate_position();

        for y in 0..back.height() {
            let (Some(back_row), Some(front_row)) = (back.row(y), self.front.row(y)) else {
                continue;
            };
            if back_row == front_row {
                stats.cells_skipped += back_row.len();
                continue;
            }
            for (x, (cell, shown)) in (0u16..).zip(back_row.iter().zip(front_row)) {
                if cell == shown {
                    stats.cells_skipped += 1;
                } else {
                    self.writer.render_cell(&mut self.output, x, y, cell);
                    stats.cells_rendered += 1;
                }
            }
            self.front.copy_row_from(back, y);
        }

        self.apply_cursor(cursor, stats.cells_rendered > 0);

        stats.bytes_written = self.output.len() - start;
        stats
    }

    fn apply_cursor(&mut self, cursor: CursorRequest, cells_written: bool) {
        match cursor {
            Some((x, y)) => {
                let was_hidden = self.cursor.is_none();
                if was_hidden {
                    ansi::cursor_show(&mut self.output).ok();
                }
                if was_hidden || cells_written || self.cursor_moved || self.cursor != cursor {
                    ansi::cursor_to(&mut self.output, x, y).ok();
                }
            }
            None => {
                if self.cursor.is_some() {
                    ansi::cursor_hide(&mut self.output).ok();
                }
            }
        }
        self.cursor = cursor;
        self.cursor_moved = false;
    }

    /// Queue an SGR reset and a full screen clear, and record that the
    /// terminal now shows empty cells.
    pub fn clear_screen(&mut self) {
        ansi::reset(&mut self.output).ok();
        ansi::clear_screen(&mut self.output).ok();
        self.front.clear();
        self.writer.reset_state();
        self.writer.assume_reset_style();
        self.cursor_moved = true;
    }

    /// Forget what the terminal shows; the next present redraws every cell.
    pub fn invalidate(&mut self) {
        self.front.fill(STALE);
        self.writer.reset_state();
    }

    /// Resize the front buffer. Its content is unknown afterwards.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.front = CellBuffer::filled(width, height, STALE);
        self.writer.reset_state();
    }

    /// Record the terminal's cursor visibility after an out-of-band change
    /// (the session hides the cursor at init and shows it at shutdown).
    pub const fn assume_cursor(&mut self, cursor: CursorRequest) {
        self.cursor = cursor;
    }

    /// Write queued bytes to `w` in one call and clear the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut (impl Write + ?Sized)) -> io::Result<()> {
        self.output.flush_to(w)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
