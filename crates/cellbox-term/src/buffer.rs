// SPDX-License-Identifier: MIT
//
// CellBuffer: the 2D cell grid the application draws into.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing. A row's cells are
//     contiguous, so the presenter's left-to-right walk is a linear scan
//     and whole-row comparisons are a single slice equality.
//
//   - Writes outside the grid are silently dropped. A rendering layer
//     favors availability over strictness: a status line that overflows a
//     narrow terminal should clip, not crash.
//
//   - Wide characters occupy two columns: the codepoint cell plus a
//     continuation cell (ch = 0). Overwriting either half breaks the pair
//     and the orphaned half becomes a space.
//
// The session owns one of these as the back buffer; the presenter owns a
// second as the front (last-presented) buffer.

use unicode_width::UnicodeWidthChar;

use crate::cell::Cell;
use crate::color::ColorAttr;

/// A `width × height` grid of cells.
///
/// ```
/// use cellbox_term::buffer::CellBuffer;
/// use cellbox_term::color::ColorAttr;
///
/// let mut buf = CellBuffer::new(80, 24);
/// buf.set_cell(5, 3, 'X', ColorAttr::RED, ColorAttr::DEFAULT);
/// assert_eq!(buf.get(5, 3).unwrap().character(), Some('X'));
///
/// // Off-grid writes are ignored.
/// buf.set_cell(80, 0, 'Y', ColorAttr::RED, ColorAttr::DEFAULT);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CellBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    /// A buffer of empty cells.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self::filled(width, height, Cell::EMPTY)
    }

    /// A buffer where every cell is `cell`.
    #[must_use]
    pub fn filled(width: u16, height: u16, cell: Cell) -> Self {
        let size = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            cells: vec![cell; size],
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Cell at `(x, y)`, or `None` off-grid.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// All cells, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row as a slice, or `None` if `y` is off-grid.
    #[inline]
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    // ─── Clear, Resize, Copy ─────────────────────────────────────────────

    /// Reset every cell to a space on default colors.
    pub fn clear(&mut self) {
        self.fill(Cell::EMPTY);
    }

    /// Overwrite every cell with `cell`.
    pub fn fill(&mut self, cell: Cell) {
        self.cells.fill(cell);
    }

    /// Reallocate to a new size. All content is discarded.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = usize::from(width) * usize::from(height);
        self.cells.clear();
        self.cells.resize(size, Cell::EMPTY);
    }

    /// Copy one row from `other`. Dimensions must match.
    pub(crate) fn copy_row_from(&mut self, other: &Self, y: u16) {
        if self.width != other.width || y >= self.height {
            return;
        }
        if let Some(src) = other.row(y) {
            let start = self.index(0, y);
            self.cells[start..start + usize::from(self.width)].copy_from_slice(src);
        }
    }

    // ─── Writes ──────────────────────────────────────────────────────────

    /// Write one cell. Off-grid coordinates are a no-op.
    ///
    /// Returns `true` if the write landed.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, fg: ColorAttr, bg: ColorAttr) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        self.break_wide_char_at(x, y);
        let idx = self.index(x, y);
        self.cells[idx] = Cell::new(ch, fg, bg);
        true
    }

    /// Write `text` left to right from `(x, y)`, one cell per Unicode
    /// scalar, clipping at the right edge. Never wraps.
    ///
    /// A scalar of display width 2 also claims the next column as a
    /// continuation cell; if it does not fit in the last column, a space is
    /// written instead. Zero-width and control scalars take one column.
    ///
    /// Returns the number of columns written.
    pub fn print(&mut self, x: u16, y: u16, fg: ColorAttr, bg: ColorAttr, text: &str) -> u16 {
        if y >= self.height {
            return 0;
        }

        let mut col = x;
        for ch in text.chars() {
            if col >= self.width {
                break;
            }

            let wide = ch.width() == Some(2);
            if wide && col + 1 >= self.width {
                self.set_cell(col, y, ' ', fg, bg);
                col += 1;
                break;
            }

            self.set_cell(col, y, ch, fg, bg);
            if wide {
                let cont = col + 1;
                self.break_wide_char_at(cont, y);
                let idx = self.index(cont, y);
                self.cells[idx] = Cell::continuation(fg, bg);
                col += 2;
            } else {
                col += 1;
            }
        }

        col.saturating_sub(x)
    }

    /// Break any wide character touching `(x, y)`.
    fn break_wide_char_at(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);

        if self.cells[idx].is_continuation() && x > 0 {
            let prev = self.index(x - 1, y);
            self.cells[prev].ch = u32::from(b' ');
        }

        if x + 1 < self.width {
            let next = self.index(x + 1, y);
            if self.cells[next].is_continuation() {
                self.cells[next].ch = u32::from(b' ');
            }
        }
    }
}

impl std::fmt::Debug for CellBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CellBuffer({}x{})", self.width, self.height)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_of_row(buf: &CellBuffer, y: u16) -> String {
        buf.row(y)
            .unwrap()
            .iter()
            .filter_map(|c| c.character())
            .collect()
    }

    #[test]
    fn new_buffer_is_empty() {
        let buf = CellBuffer::new(10, 3);
        assert_eq!(buf.cells().len(), 30);
        assert!(buf.cells().iter().all(|c| *c == Cell::EMPTY));
    }

    #[test]
    fn zero_size_buffer() {
        let buf = CellBuffer::new(0, 0);
        assert!(buf.cells().is_empty());
        assert!(buf.get(0, 0).is_none());
    }

    #[test]
    fn set_cell_in_bounds() {
        let mut buf = CellBuffer::new(4, 2);
        assert!(buf.set_cell(3, 1, 'z', ColorAttr::GREEN, ColorAttr::BLACK));
        let cell = buf.get(3, 1).unwrap();
        assert_eq!(cell.character(), Some('z'));
        assert_eq!(cell.fg, ColorAttr::GREEN);
        assert_eq!(cell.bg, ColorAttr::BLACK);
    }

    #[test]
    fn set_cell_out_of_bounds_changes_nothing() {
        let mut buf = CellBuffer::new(4, 2);
        let before = buf.clone();
        assert!(!buf.set_cell(4, 0, 'x', ColorAttr::RED, ColorAttr::RED));
        assert!(!buf.set_cell(0, 2, 'x', ColorAttr::RED, ColorAttr::RED));
        assert!(!buf.set_cell(u16::MAX, u16::MAX, 'x', ColorAttr::RED, ColorAttr::RED));
        assert_eq!(buf, before);
    }

    #[test]
    fn print_writes_consecutive_cells() {
        let mut buf = CellBuffer::new(10, 1);
        let used = buf.print(2, 0, ColorAttr::WHITE, ColorAttr::BLACK, "abc");
        assert_eq!(used, 3);
        assert_eq!(text_of_row(&buf, 0), "  abc     ");
        assert_eq!(buf.get(3, 0).unwrap().fg, ColorAttr::WHITE);
    }

    #[test]
    fn print_clips_at_right_edge_without_wrapping() {
        let mut buf = CellBuffer::new(5, 2);
        let used = buf.print(3, 0, ColorAttr::DEFAULT, ColorAttr::DEFAULT, "hello");
        assert_eq!(used, 2);
        assert_eq!(text_of_row(&buf, 0), "   he");
        assert_eq!(text_of_row(&buf, 1), "     ");
    }

    #[test]
    fn print_off_grid_row_is_noop() {
        let mut buf = CellBuffer::new(5, 2);
        assert_eq!(buf.print(0, 2, ColorAttr::RED, ColorAttr::RED, "x"), 0);
        assert_eq!(buf, CellBuffer::new(5, 2));
    }

    #[test]
    fn print_wide_char_claims_two_columns() {
        let mut buf = CellBuffer::new(6, 1);
        let used = buf.print(0, 0, ColorAttr::DEFAULT, ColorAttr::BLUE, "中a");
        assert_eq!(used, 3);
        assert_eq!(buf.get(0, 0).unwrap().character(), Some('中'));
        assert!(buf.get(1, 0).unwrap().is_continuation());
        assert_eq!(buf.get(1, 0).unwrap().bg, ColorAttr::BLUE);
        assert_eq!(buf.get(2, 0).unwrap().character(), Some('a'));
    }

    #[test]
    fn print_wide_char_in_last_column_becomes_space() {
        let mut buf = CellBuffer::new(3, 1);
        let used = buf.print(2, 0, ColorAttr::DEFAULT, ColorAttr::DEFAULT, "中");
        assert_eq!(used, 1);
        assert_eq!(buf.get(2, 0).unwrap().character(), Some(' '));
    }

    #[test]
    fn print_combining_mark_takes_a_column() {
        let mut buf = CellBuffer::new(4, 1);
        let used = buf.print(0, 0, ColorAttr::DEFAULT, ColorAttr::DEFAULT, "e\u{301}");
        assert_eq!(used, 2);
        assert_eq!(buf.get(1, 0).unwrap().character(), Some('\u{301}'));
    }

    #[test]
    fn overwriting_continuation_breaks_wide_char() {
        let mut buf = CellBuffer::new(4, 1);
        buf.print(0, 0, ColorAttr::DEFAULT, ColorAttr::DEFAULT, "中");
        buf.set_cell(1, 0, 'x', ColorAttr::DEFAULT, ColorAttr::DEFAULT);
        assert_eq!(buf.get(0, 0).unwrap().character(), Some(' '));
        assert_eq!(buf.get(1, 0).unwrap().character(), Some('x'));
    }

    #[test]
    fn nul_cell_is_not_a_continuation() {
        let mut buf = CellBuffer::new(4, 1);
        buf.set_cell(0, 0, 'A', ColorAttr::DEFAULT, ColorAttr::DEFAULT);
        buf.set_cell(1, 0, '\0', ColorAttr::DEFAULT, ColorAttr::DEFAULT);
        assert!(!buf.get(1, 0).unwrap().is_continuation());
        buf.set_cell(1, 0, 'B', ColorAttr::DEFAULT, ColorAttr::DEFAULT);
        assert_eq!(buf.get(0, 0).unwrap().character(), Some('A'));
        assert_eq!(buf.get(1, 0).unwrap().character(), Some('B'));
    }

    #[test]
    fn overwriting_wide_start_clears_continuation() {
        let mut buf = CellBuffer::new(4, 1);
        buf.print(0, 0, ColorAttr::DEFAULT, ColorAttr::DEFAULT, "中");
        buf.set_cell(0, 0, 'x', ColorAttr::DEFAULT, ColorAttr::DEFAULT);
        assert_eq!(buf.get(1, 0).unwrap().character(), Some(' '));
    }

    #[test]
    fn clear_resets_every_cell() {
        let mut buf = CellBuffer::new(3, 3);
        buf.print(0, 1, ColorAttr::RED, ColorAttr::GREEN, "abc");
        buf.clear();
        assert_eq!(buf, CellBuffer::new(3, 3));
    }

    #[test]
    fn resize_reallocates_and_clears() {
        let mut buf = CellBuffer::new(3, 3);
        buf.set_cell(1, 1, 'q', ColorAttr::RED, ColorAttr::RED);
        buf.resize(5, 2);
        assert_eq!(buf.width(), 5);
        assert_eq!(buf.height(), 2);
        assert_eq!(buf, CellBuffer::new(5, 2));
    }

    #[test]
    fn copy_row_from_matches_source() {
        let mut src = CellBuffer::new(4, 2);
        src.print(0, 1, ColorAttr::RED, ColorAttr::DEFAULT, "wxyz");
        let mut dst = CellBuffer::new(4, 2);
        dst.copy_row_from(&src, 1);
        assert_eq!(dst.row(1), src.row(1));
        assert_eq!(dst.row(0), CellBuffer::new(4, 2).row(0));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", CellBuffer::new(80, 24)), "CellBuffer(80x24)");
    }
}
