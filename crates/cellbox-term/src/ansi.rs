// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit; that's the `CellWriter`'s job. This module
// just knows the byte-level encoding of every terminal command we need: the
// fixed xterm/VT100 set, no terminfo lookup.
//
// All cursor positions are 0-indexed in our API and converted to 1-indexed
// for the terminal (ANSI standard uses 1-based coordinates).
use std::io::{self, Write};

use crate::color::{Attrs, ColorAttr, Paint};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` using the CUP (Cursor Position) sequence.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Home the cursor and clear the entire screen (CUP + ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H\x1b[2J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Emit the complete SGR state for a `(fg, bg)` pair as one sequence.
///
/// Always starts from SGR 0 so no attribute from the previous style leaks
/// through, then foreground attributes, then the colors. Default colors
/// add nothing after the reset.
///
/// Foreground: bold, dim, italic, underline, blink, reverse.
/// Background: only reverse (and bright, via the color itself).
pub fn sgr(w: &mut impl Write, fg: ColorAttr, bg: ColorAttr) -> io::Result<()> {
    w.write_all(b"\x1b[0")?;

    let fg_attrs = fg.attrs();
    let reverse = fg_attrs.contains(Attrs::REVERSE) || bg.attrs().contains(Attrs::REVERSE);

    macro_rules! emit {
        ($cond:expr, $code:expr) => {
            if $cond {
                w.write_all($code)?;
            }
        };
    }

    emit!(fg_attrs.contains(Attrs::BOLD), b";1");
    emit!(fg_attrs.contains(Attrs::DIM), b";2");
    emit!(fg_attrs.contains(Attrs::ITALIC), b";3");
    emit!(fg_attrs.contains(Attrs::UNDERLINE), b";4");
    emit!(fg_attrs.contains(Attrs::BLINK), b";5");
    emit!(reverse, b";7");

    match fg.paint() {
        Paint::Default => {}
        Paint::Basic(n) => write!(w, ";{}", 30 + u16::from(n))?,
        Paint::Bright(n) => write!(w, ";{}", 90 + u16::from(n))?,
        Paint::Palette(n) => write!(w, ";38;5;{n}")?,
    }
    match bg.paint() {
        Paint::Default => {}
        Paint::Basic(n) => write!(w, ";{}", 40 + u16::from(n))?,
        Paint::Bright(n) => write!(w, ";{}", 100 + u16::from(n))?,
        Paint::Palette(n) => write!(w, ";48;5;{n}")?,
    }

    w.write_all(b"m")
}

// ─── Alternate Screen & Keypad ──────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer and restore original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

/// Application cursor keys + application keypad (DECCKM, DECKPAM).
///
/// Arrow keys then arrive as SS3 (`ESC O A`), which the decoder handles
/// alongside the CSI forms.
#[inline]
pub fn keypad_transmit(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1h\x1b=")
}

/// Normal cursor keys + numeric keypad (DECCKM reset, DECKPNM).
#[inline]
pub fn keypad_local(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1l\x1b>")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Enable mouse reporting: clicks (1000), drag motion (1002), and both the
/// urxvt (1015) and SGR (1006) extended coordinate encodings.
///
/// Terminals that understand SGR answer in SGR; older ones fall back to
/// urxvt or X10 reports, all of which the decoder accepts.
pub fn enable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h\x1b[?1002h\x1b[?1015h\x1b[?1006h")
}

/// Disable all mouse reporting, in reverse order of enabling.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l\x1b[?1015l\x1b[?1002l\x1b[?1000l")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{OutputMode, encode};
    use pretty_assertions::assert_eq;

    /// Helper: run an ANSI function and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_origin() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
    }

    #[test]
    fn cursor_to_position() {
        assert_eq!(emit(|w| cursor_to(w, 10, 20)), "\x1b[21;11H");
    }

    #[test]
    fn cursor_to_max_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(emit(|w| cursor_hide(w)), "\x1b[?25l");
        assert_eq!(emit(|w| cursor_show(w)), "\x1b[?25h");
    }

    // ── Screen ──────────────────────────────────────────────────────────

    #[test]
    fn clear_screen_homes_first() {
        assert_eq!(emit(|w| clear_screen(w)), "\x1b[H\x1b[2J");
    }

    // ── SGR ─────────────────────────────────────────────────────────────

    #[test]
    fn sgr_defaults_is_plain_reset() {
        assert_eq!(
            emit(|w| sgr(w, ColorAttr::DEFAULT, ColorAttr::DEFAULT)),
            "\x1b[0m"
        );
    }

    #[test]
    fn sgr_white_on_black() {
        assert_eq!(
            emit(|w| sgr(w, ColorAttr::WHITE, ColorAttr::BLACK)),
            "\x1b[0;37;40m"
        );
    }

    #[test]
    fn sgr_bold_red_on_default() {
        assert_eq!(
            emit(|w| sgr(w, ColorAttr::RED | Attrs::BOLD, ColorAttr::DEFAULT)),
            "\x1b[0;1;31m"
        );
    }

    #[test]
    fn sgr_all_fg_attributes_in_order() {
        let fg = ColorAttr::DEFAULT
            | Attrs::BOLD
            | Attrs::DIM
            | Attrs::ITALIC
            | Attrs::UNDERLINE
            | Attrs::BLINK
            | Attrs::REVERSE;
        assert_eq!(emit(|w| sgr(w, fg, ColorAttr::DEFAULT)), "\x1b[0;1;2;3;4;5;7m");
    }

    #[test]
    fn sgr_bg_ignores_fg_only_attributes() {
        let bg = ColorAttr::BLUE | Attrs::BOLD | Attrs::UNDERLINE;
        assert_eq!(emit(|w| sgr(w, ColorAttr::DEFAULT, bg)), "\x1b[0;44m");
    }

    #[test]
    fn sgr_bg_reverse_applies() {
        let bg = ColorAttr::DEFAULT | Attrs::REVERSE;
        assert_eq!(emit(|w| sgr(w, ColorAttr::DEFAULT, bg)), "\x1b[0;7m");
    }

    #[test]
    fn sgr_bright_on_either_side() {
        let fg = ColorAttr::YELLOW | Attrs::BRIGHT;
        let bg = ColorAttr::BLACK | Attrs::BRIGHT;
        assert_eq!(emit(|w| sgr(w, fg, bg)), "\x1b[0;93;100m");
    }

    #[test]
    fn sgr_palette_colors() {
        let fg = encode(1, Attrs::empty(), OutputMode::Colors256).unwrap();
        let bg = encode(24, Attrs::empty(), OutputMode::Grayscale).unwrap();
        assert_eq!(emit(|w| sgr(w, fg, bg)), "\x1b[0;38;5;0;48;5;255m");
    }

    // ── Modes ───────────────────────────────────────────────────────────

    #[test]
    fn alt_screen_pair() {
        assert_eq!(emit(|w| enter_alt_screen(w)), "\x1b[?1049h");
        assert_eq!(emit(|w| exit_alt_screen(w)), "\x1b[?1049l");
    }

    #[test]
    fn keypad_pair() {
        assert_eq!(emit(|w| keypad_transmit(w)), "\x1b[?1h\x1b=");
        assert_eq!(emit(|w| keypad_local(w)), "\x1b[?1l\x1b>");
    }

    #[test]
    fn mouse_disable_reverses_enable() {
        let on = emit(|w| enable_mouse(w));
        let off = emit(|w| disable_mouse(w));
        for mode in ["1000", "1002", "1015", "1006"] {
            assert!(on.contains(&format!("\x1b[?{mode}h")));
            assert!(off.contains(&format!("\x1b[?{mode}l")));
        }
        assert!(off.starts_with("\x1b[?1006l"));
    }
}
