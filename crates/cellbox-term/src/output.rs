// SPDX-License-Identifier: MIT
//
// Output buffering and stateful cell rendering.
//
// Two components work together to minimize terminal I/O:
//
//   OutputBuffer; accumulates all ANSI bytes in memory so the entire frame
//   can be written in a single write() syscall.
//
//   CellWriter; tracks the terminal's current state (cursor position and
//   the last emitted fg/bg pair) and skips redundant escape sequences. A
//   horizontal run of same-style changed cells costs one cursor move, one
//   SGR sequence, and the characters themselves.

use std::io::{self, Write};

use unicode_width::UnicodeWidthChar;

use crate::ansi;
use crate::cell::Cell;
use crate::color::ColorAttr;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// A byte buffer that accumulates ANSI output for a single `write()` syscall.
///
/// Default capacity: 16 KB; enough for most frames without reallocation.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Write a codepoint as UTF-8.
    ///
    /// Control characters become a space so a stray `\n` in a cell cannot
    /// move the real cursor. Invalid scalars (including 0, the
    /// continuation marker) produce `?`.
    pub fn write_codepoint(&mut self, cp: u32) {
        match char::from_u32(cp) {
            Some(ch) if cp != 0 && ch.is_control() => self.buf.push(b' '),
            Some(ch) if cp != 0 => {
                let mut enc = [0u8; 4];
                self.buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
            }
            _ => self.buf.push(b'?'),
        }
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to `w`, flush it, and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails. The buffer is cleared
    /// either way: a half-written frame cannot be resumed.
    pub fn flush_to(&mut self, w: &mut (impl Write + ?Sized)) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = w.write_all(&self.buf).and_then(|()| w.flush());
        self.buf.clear();
        result
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Real flushing goes through flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── CellWriter ──────────────────────────────────────────────────────────────

/// Stateful cell renderer that tracks terminal state to skip redundant escapes.
///
/// - **Cursor**: skipped when the next cell is where the terminal cursor
///   already is, i.e. right after the previous glyph (two columns after a
///   wide one).
/// - **Style**: one combined SGR sequence, skipped while the `(fg, bg)`
///   pair is unchanged. Style tracking survives across frames; position
///   tracking does not, since the caller may move the cursor between them.
/// - **Wide chars**: a continuation cell directly after its wide char
///   emits nothing.
#[allow(clippy::struct_field_names)] // The `last_` prefix IS the semantic grouping.
pub struct CellWriter {
    last_x: i32,
    last_y: i32,
    last_style: Option<(ColorAttr, ColorAttr)>,
}

impl CellWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_x: -1,
            last_y: -1,
            last_style: None,
        }
    }

    /// Forget everything. Call after a terminal reset or screen clear.
    pub const fn reset_state(&mut self) {
        *self = Self::new();
    }

    /// Forget where the terminal cursor is, keeping the style.
    pub const fn invalidate_position(&mut self) {
        self.last_x = -1;
        self.last_y = -1;
    }

    /// Record that the terminal is known to be at SGR 0.
    pub const fn assume_reset_style(&mut self) {
        self.last_style = Some((ColorAttr::DEFAULT, ColorAttr::DEFAULT));
    }

    /// Render a single cell, emitting only the escape sequences needed.
    pub fn render_cell(&mut self, out: &mut OutputBuffer, x: u16, y: u16, cell: &Cell) {
        let xi = i32::from(x);
        let yi = i32::from(y);

        if cell.is_continuation() {
            // The wide char just written already covered this column.
            if self.last_y == yi && self.last_x == xi {
                return;
            }
            self.move_to(out, x, y);
            self.apply_style(out, cell);
            out.buf.push(b' ');
            self.last_x = xi;
            self.last_y = yi;
            return;
        }

        self.move_to(out, x, y);
        self.apply_style(out, cell);
        out.write_codepoint(cell.ch);

        let wide = cell.character().and_then(UnicodeWidthChar::width) == Some(2);
        self.last_x = if wide { xi + 1 } else { xi };
        self.last_y = yi;
    }

    fn move_to(&self, out: &mut OutputBuffer, x: u16, y: u16) {
        if i32::from(y) != self.last_y || i32::from(x) != self.last_x + 1 {
            ansi::cursor_to(out, x, y).ok();
        }
    }

    fn apply_style(&mut self, out: &mut OutputBuffer, cell: &Cell) {
        let style = (cell.fg, cell.bg);
        if self.last_style != Some(style) {
            ansi::sgr(out, cell.fg, cell.bg).ok();
            self.last_style = Some(style);
        }
    }
}

impl Default for CellWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Attrs;
    use pretty_assertions::assert_eq;

    // ── OutputBuffer ────────────────────────────────────────────────────

    #[test]
    fn output_buffer_write_trait() {
        let mut buf = OutputBuffer::new();
        write!(buf, "hello {}", 42).unwrap();
        assert_eq!(buf.as_bytes(), b"hello 42");
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn write_codepoint_unicode() {
        let mut buf = OutputBuffer::new();
        buf.write_codepoint(u32::from('中'));
        assert_eq!(buf.as_bytes(), "中".as_bytes());
    }

    #[test]
    fn write_codepoint_zero_and_invalid() {
        let mut buf = OutputBuffer::new();
        buf.write_codepoint(0);
        buf.write_codepoint(0xD800);
        assert_eq!(buf.as_bytes(), b"??");
    }

    #[test]
    fn write_codepoint_control_becomes_space() {
        let mut buf = OutputBuffer::new();
        buf.write_codepoint(u32::from('\n'));
        assert_eq!(buf.as_bytes(), b" ");
    }

    #[test]
    fn flush_to_clears() {
        let mut buf = OutputBuffer::new();
        write!(buf, "frame").unwrap();
        let mut dest = Vec::new();
        buf.flush_to(&mut dest).unwrap();
        assert_eq!(dest, b"frame");
        assert!(buf.is_empty());
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn flush_to_broken_pipe_errors_and_discards() {
        let mut buf = OutputBuffer::new();
        write!(buf, "frame").unwrap();
        let err = buf.flush_to(&mut Broken).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(buf.is_empty());
    }

    // ── CellWriter ──────────────────────────────────────────────────────

    fn render_seq(cells: &[(u16, u16, Cell)]) -> String {
        let mut out = OutputBuffer::new();
        let mut writer = CellWriter::new();
        for &(x, y, ref cell) in cells {
            writer.render_cell(&mut out, x, y, cell);
        }
        String::from_utf8(out.as_bytes().to_vec()).unwrap()
    }

    fn plain(ch: char) -> Cell {
        Cell::new(ch, ColorAttr::DEFAULT, ColorAttr::DEFAULT)
    }

    #[test]
    fn horizontal_run_is_one_move_one_style() {
        let out = render_seq(&[(0, 0, plain('A')), (1, 0, plain('B')), (2, 0, plain('C'))]);
        assert_eq!(out, "\x1b[1;1H\x1b[0mABC");
    }

    #[test]
    fn gap_needs_a_second_move() {
        let out = render_seq(&[(0, 0, plain('A')), (5, 0, plain('B'))]);
        assert_eq!(out, "\x1b[1;1H\x1b[0mA\x1b[1;6HB");
    }

    #[test]
    fn new_row_needs_a_move() {
        let out = render_seq(&[(0, 0, plain('A')), (0, 1, plain('B'))]);
        assert_eq!(out.matches('H').count(), 2);
    }

    #[test]
    fn style_change_emits_sgr_between_chars() {
        let red = Cell::new('r', ColorAttr::RED | Attrs::BOLD, ColorAttr::DEFAULT);
        let out = render_seq(&[(0, 0, plain('a')), (1, 0, red)]);
        assert_eq!(out, "\x1b[1;1H\x1b[0ma\x1b[0;1;31mr");
    }

    #[test]
    fn known_reset_style_skips_sgr() {
        let mut out = OutputBuffer::new();
        let mut writer = CellWriter::new();
        writer.assume_reset_style();
        writer.render_cell(&mut out, 2, 0, &plain('x'));
        assert_eq!(out.as_bytes(), b"\x1b[1;3Hx");
    }

    #[test]
    fn wide_char_then_continuation_emits_once() {
        let wide = plain('中');
        let cont = Cell::continuation(ColorAttr::DEFAULT, ColorAttr::DEFAULT);
        let out = render_seq(&[(0, 0, wide), (1, 0, cont), (2, 0, plain('a'))]);
        assert_eq!(out, "\x1b[1;1H\x1b[0m中a");
    }

    #[test]
    fn orphan_continuation_paints_space() {
        let cont = Cell::continuation(ColorAttr::DEFAULT, ColorAttr::BLUE);
        let out = render_seq(&[(3, 0, cont)]);
        assert_eq!(out, "\x1b[1;4H\x1b[0;44m ");
    }

    #[test]
    fn invalidate_position_keeps_style() {
        let mut out = OutputBuffer::new();
        let mut writer = CellWriter::new();
        writer.render_cell(&mut out, 0, 0, &plain('a'));
        writer.invalidate_position();
        out.clear();
        writer.render_cell(&mut out, 1, 0, &plain('b'));
        assert_eq!(out.as_bytes(), b"\x1b[1;2Hb");
    }
}
