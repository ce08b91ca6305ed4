// SPDX-License-Identifier: MIT
//
// Cell: one character position on screen.
//
// A cell is a codepoint plus two encoded `ColorAttr` values. Identity is
// purely positional: cells are overwritten in place and reset by `clear`.
//
// Wide characters (CJK, some emoji) occupy two columns. The first cell
// holds the codepoint; the second is a continuation cell (ch = 0) that the
// presenter never emits, because the terminal already advanced past it.

use crate::color::ColorAttr;

/// Continuation marker for the trailing column of a wide character.
const CONTINUATION: u32 = 0;

/// Default character for empty cells.
const SPACE: u32 = b' ' as u32;

/// A single terminal cell: `(codepoint, fg, bg)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Unicode scalar value, or `0` for a continuation cell.
    pub ch: u32,
    /// Encoded foreground color and style flags.
    pub fg: ColorAttr,
    /// Encoded background color and style flags.
    pub bg: ColorAttr,
}

impl Cell {
    /// Space on the terminal default colors.
    pub const EMPTY: Self = Self {
        ch: SPACE,
        fg: ColorAttr::DEFAULT,
        bg: ColorAttr::DEFAULT,
    };

    /// A cell with a character and colors.
    ///
    /// U+0000 is stored as a space: `0` is reserved for continuation cells.
    #[inline]
    #[must_use]
    pub const fn new(ch: char, fg: ColorAttr, bg: ColorAttr) -> Self {
        let ch = if ch == '\0' { SPACE } else { ch as u32 };
        Self { ch, fg, bg }
    }

    /// Trailing half of a wide character. Keeps the owner's colors so the
    /// background reads as one block.
    #[inline]
    #[must_use]
    pub const fn continuation(fg: ColorAttr, bg: ColorAttr) -> Self {
        Self {
            ch: CONTINUATION,
            fg,
            bg,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// The codepoint as a `char`; `None` for continuation cells.
    #[inline]
    #[must_use]
    pub const fn character(self) -> Option<char> {
        if self.ch == CONTINUATION {
            return None;
        }
        char::from_u32(self.ch)
    }

    /// Whether two cells would be drawn with the same SGR state.
    #[inline]
    #[must_use]
    pub fn same_style(self, other: &Self) -> bool {
        self.fg == other.fg && self.bg == other.bg
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_continuation() {
            return write!(f, "Cell(continuation)");
        }
        let ch = char::from_u32(self.ch).unwrap_or('?');
        write!(f, "Cell({ch:?}")?;
        if self.fg != ColorAttr::DEFAULT {
            write!(f, ", fg={:#x}", self.fg.raw())?;
        }
        if self.bg != ColorAttr::DEFAULT {
            write!(f, ", bg={:#x}", self.bg.raw())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Attrs;

    #[test]
    fn cell_is_12_bytes() {
        assert_eq!(std::mem::size_of::<Cell>(), 12);
    }

    #[test]
    fn empty_is_space_on_default() {
        assert_eq!(Cell::EMPTY.character(), Some(' '));
        assert_eq!(Cell::default(), Cell::EMPTY);
    }

    #[test]
    fn continuation_has_no_character() {
        let c = Cell::continuation(ColorAttr::RED, ColorAttr::BLUE);
        assert!(c.is_continuation());
        assert_eq!(c.character(), None);
        assert_eq!(c.bg, ColorAttr::BLUE);
    }

    #[test]
    fn nul_is_stored_as_space() {
        let c = Cell::new('\0', ColorAttr::RED, ColorAttr::DEFAULT);
        assert!(!c.is_continuation());
        assert_eq!(c.character(), Some(' '));
    }

    #[test]
    fn same_style_ignores_character() {
        let a = Cell::new('a', ColorAttr::RED | Attrs::BOLD, ColorAttr::BLACK);
        let b = Cell::new('b', ColorAttr::RED | Attrs::BOLD, ColorAttr::BLACK);
        assert!(a.same_style(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn debug_shows_colors_only_when_set() {
        assert_eq!(format!("{:?}", Cell::EMPTY), "Cell(' ')");
        let s = format!("{:?}", Cell::new('x', ColorAttr::RED, ColorAttr::DEFAULT));
        assert!(s.contains("fg=0x2"));
        assert!(!s.contains("bg="));
    }
}
