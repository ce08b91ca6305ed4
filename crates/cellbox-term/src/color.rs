// SPDX-License-Identifier: MIT
//
// Color/attribute codec.
//
// Every cell stores its foreground and background as a single `ColorAttr`
// integer: a color selector in the low 16 bits, an `EXTENDED` marker at
// bit 16, and style flags in the top byte (the termbox2 32-bit attribute
// layout). Callers think in *logical*, mode-relative indices; `encode`
// turns those into the stored integer for the active output mode:
//
//   Normal      1..=8    black … white         stored as-is
//   Colors256   1        black                 EXTENDED | HI_BLACK, selector 0
//               2..=256  xterm palette n - 1   EXTENDED | (n - 1)
//   Colors216   1..=216  cube entry            EXTENDED | (n + 15)
//   Grayscale   1..=24   gray ramp entry       EXTENDED | (n + 231)
//
// Zero is the terminal default color in every mode. Because extended
// values carry the absolute palette index, rendering never consults the
// current mode: switching modes changes how *future* writes encode, while
// cells already in the buffer keep rendering exactly as they were written.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─── Attributes ─────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Style flags, bitwise-combined with a color selector.
    ///
    /// On a foreground every flag applies. On a background only
    /// [`REVERSE`](Attrs::REVERSE) and [`BRIGHT`](Attrs::BRIGHT) take
    /// effect; the rest are ignored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attrs: u32 {
        const BOLD      = 1 << 24;
        const UNDERLINE = 1 << 25;
        const REVERSE   = 1 << 26;
        const ITALIC    = 1 << 27;
        const BLINK     = 1 << 28;
        /// Palette entry 0 in 256-color mode, where a zero selector
        /// already means "default". Set by [`encode`], not by callers.
        const HI_BLACK  = 1 << 29;
        /// Bright variant of the eight normal-mode colors (SGR 90–97 /
        /// 100–107). Normal mode only.
        const BRIGHT    = 1 << 30;
        const DIM       = 1 << 31;
    }
}

// ─── Output Mode ────────────────────────────────────────────────────────────

/// How logical color indices are interpreted by [`encode`].
///
/// The integer codes (`Normal = 1` … `Grayscale = 4`) are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutputMode {
    /// Eight colors plus default.
    #[default]
    #[serde(rename = "normal")]
    Normal = 1,
    /// The full xterm palette, index 1 = black.
    #[serde(rename = "256")]
    Colors256 = 2,
    /// The 6×6×6 cube of the xterm palette, zero-based offset.
    #[serde(rename = "216")]
    Colors216 = 3,
    /// The 24-step gray ramp of the xterm palette, zero-based offset.
    #[serde(rename = "grayscale")]
    Grayscale = 4,
}

impl OutputMode {
    /// Stable integer code for this mode.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Mode for a stable integer code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::Colors256),
            3 => Some(Self::Colors216),
            4 => Some(Self::Grayscale),
            _ => None,
        }
    }

    /// Largest logical color index accepted by [`encode`] in this mode.
    #[must_use]
    pub const fn max_color(self) -> u16 {
        match self {
            Self::Normal => 8,
            Self::Colors256 => 256,
            Self::Colors216 => 216,
            Self::Grayscale => 24,
        }
    }

    /// Whether this mode needs the terminal's 256-color palette.
    #[inline]
    #[must_use]
    pub const fn is_extended(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

// ─── ColorAttr ──────────────────────────────────────────────────────────────

/// The encoded color + attribute integer stored in a cell.
///
/// ```
/// use cellbox_term::color::{Attrs, ColorAttr};
///
/// let fg = ColorAttr::RED | Attrs::BOLD;
/// assert_eq!(fg.selector(), 2);
/// assert!(fg.attrs().contains(Attrs::BOLD));
/// assert!(ColorAttr::DEFAULT.is_default_color());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorAttr(u32);

const SELECTOR_MASK: u32 = 0xFFFF;
const EXTENDED: u32 = 1 << 16;

impl ColorAttr {
    pub const DEFAULT: Self = Self(0);
    pub const BLACK: Self = Self(1);
    pub const RED: Self = Self(2);
    pub const GREEN: Self = Self(3);
    pub const YELLOW: Self = Self(4);
    pub const BLUE: Self = Self(5);
    pub const MAGENTA: Self = Self(6);
    pub const CYAN: Self = Self(7);
    pub const WHITE: Self = Self(8);

    /// Wrap a raw integer (e.g. one received over an FFI or config layer).
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw stored integer.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The color selector bits.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Masked to 16 bits.
    pub const fn selector(self) -> u16 {
        (self.0 & SELECTOR_MASK) as u16
    }

    /// Whether the selector is an absolute xterm palette index.
    #[inline]
    #[must_use]
    pub const fn is_extended(self) -> bool {
        self.0 & EXTENDED != 0
    }

    /// The style flags.
    #[inline]
    #[must_use]
    pub const fn attrs(self) -> Attrs {
        Attrs::from_bits_truncate(self.0)
    }

    /// Whether this value selects the terminal's default color.
    #[inline]
    #[must_use]
    pub const fn is_default_color(self) -> bool {
        self.selector() == 0 && !self.attrs().contains(Attrs::HI_BLACK)
    }

    /// Resolve to the color the terminal should paint.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Palette selectors are < 256.
    pub const fn paint(self) -> Paint {
        let sel = self.selector();
        if sel == 0 {
            return if self.attrs().contains(Attrs::HI_BLACK) {
                Paint::Palette(0)
            } else {
                Paint::Default
            };
        }
        if self.is_extended() {
            return if sel <= 255 {
                Paint::Palette(sel as u8)
            } else {
                Paint::Default
            };
        }
        match sel {
            1..=8 if self.attrs().contains(Attrs::BRIGHT) => Paint::Bright(sel as u8 - 1),
            1..=8 => Paint::Basic(sel as u8 - 1),
            _ => Paint::Default,
        }
    }
}

impl BitOr<Attrs> for ColorAttr {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Attrs) -> Self {
        Self(self.0 | rhs.bits())
    }
}

/// A resolved terminal color, ready for SGR emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    /// Leave the terminal default in place.
    Default,
    /// One of the eight normal colors, 0 = black.
    Basic(u8),
    /// Bright variant of a normal color, 0 = bright black.
    Bright(u8),
    /// xterm 256-palette index.
    Palette(u8),
}

// ─── Codec ──────────────────────────────────────────────────────────────────

/// Encode a logical color and style flags for `mode`.
///
/// # Errors
///
/// [`Error::ColorOutOfRange`] if `color` exceeds [`OutputMode::max_color`],
/// and [`Error::AttributeUnavailable`] for [`Attrs::BRIGHT`] outside
/// normal mode.
pub fn encode(color: u16, attrs: Attrs, mode: OutputMode) -> Result<ColorAttr> {
    if color > mode.max_color() {
        return Err(Error::ColorOutOfRange { color, mode });
    }
    if mode.is_extended() && attrs.contains(Attrs::BRIGHT) {
        return Err(Error::AttributeUnavailable {
            attr: "bright",
            mode,
        });
    }

    let style = (attrs - Attrs::HI_BLACK).bits();
    if color == 0 {
        return Ok(ColorAttr(style));
    }

    let color = u32::from(color);
    let raw = match mode {
        OutputMode::Normal => color,
        OutputMode::Colors256 if color == 1 => EXTENDED | Attrs::HI_BLACK.bits(),
        OutputMode::Colors256 => EXTENDED | (color - 1),
        OutputMode::Colors216 => EXTENDED | (color + 15),
        OutputMode::Grayscale => EXTENDED | (color + 231),
    };
    Ok(ColorAttr(raw | style))
}

/// Recover the logical color and style flags from a value encoded in `mode`.
///
/// Returns `None` when `value` could not have been produced by
/// [`encode`] in that mode.
#[must_use]
pub fn decode(value: ColorAttr, mode: OutputMode) -> Option<(u16, Attrs)> {
    let attrs = value.attrs() - Attrs::HI_BLACK;
    if value.is_default_color() {
        return Some((0, attrs));
    }

    let sel = value.selector();
    let color = match mode {
        OutputMode::Normal => (!value.is_extended() && (1..=8).contains(&sel)).then_some(sel),
        OutputMode::Colors256 if !value.is_extended() => None,
        OutputMode::Colors256 if sel == 0 => Some(1),
        OutputMode::Colors256 => (sel <= 255).then_some(sel + 1),
        OutputMode::Colors216 => {
            (value.is_extended() && (16..=231).contains(&sel)).then(|| sel - 15)
        }
        OutputMode::Grayscale => {
            (value.is_extended() && (232..=255).contains(&sel)).then(|| sel - 231)
        }
    }?;
    Some((color, attrs))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
