// SPDX-License-Identifier: MIT
//
// Session configuration.
//
// Every field has a default, so an empty file (or no file) is valid:
//
// ```toml
// # How a lone ESC is read: "esc" (Escape key) or "alt" (Meta prefix)
// input_mode = "esc"
// mouse = false
//
// # "normal", "256", "216" or "grayscale"
// output_mode = "normal"
//
// # How long to wait after ESC for the rest of a sequence
// escape_timeout_ms = 25
//
// # How often a blocked poll checks for cancellation
// tick_ms = 50
//
// # "auto" reads TERM/COLORTERM; "basic" or "extended" overrides it
// color_support = "auto"
// ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::OutputMode;
use crate::error::Result;
use crate::input::InputMode;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How a lone ESC is interpreted.
    pub input_mode: EscapeMode,
    /// Enable mouse reporting at init.
    pub mouse: bool,
    /// Output mode selected at init.
    pub output_mode: OutputMode,
    /// Wait after ESC before resolving it on its own.
    pub escape_timeout_ms: u64,
    /// Cancellation check interval for a blocked poll.
    pub tick_ms: u64,
    /// Whether the terminal has the 256-color palette.
    pub color_support: ColorSupport,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_mode: EscapeMode::Esc,
            mouse: false,
            output_mode: OutputMode::Normal,
            escape_timeout_ms: 25,
            tick_ms: 50,
            color_support: ColorSupport::Auto,
        }
    }
}

/// The ESC half of [`InputMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    #[default]
    Esc,
    Alt,
}

/// Whether extended output modes are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSupport {
    /// Decide from `TERM` and `COLORTERM`.
    #[default]
    Auto,
    /// Eight colors only.
    Basic,
    /// The full xterm palette.
    Extended,
}

impl ColorSupport {
    /// Resolve against the process environment.
    #[must_use]
    pub fn resolve(self) -> bool {
        match self {
            Self::Basic => false,
            Self::Extended => true,
            Self::Auto => detect_extended_colors(
                std::env::var("TERM").ok().as_deref(),
                std::env::var("COLORTERM").ok().as_deref(),
            ),
        }
    }
}

/// Guess palette support from `TERM` and `COLORTERM`.
///
/// Any `COLORTERM` (truecolor, 24bit) implies 256 colors; otherwise `TERM`
/// must name a 256-color or direct-color entry, or a terminal known to
/// ship with one.
#[must_use]
pub fn detect_extended_colors(term: Option<&str>, colorterm: Option<&str>) -> bool {
    if colorterm.is_some_and(|c| !c.is_empty()) {
        return true;
    }
    let Some(term) = term else {
        return false;
    };
    term.contains("256color")
        || term.contains("direct")
        || ["xterm-kitty", "alacritty", "wezterm", "foot", "tmux-256color"]
            .iter()
            .any(|known| term.starts_with(known))
}

impl Config {
    /// Parse a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) if the document is malformed.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the file cannot be read,
    /// [`Error::Config`](crate::Error::Config) if it is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The initial input mode, already normalized.
    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        let mut mode = match self.input_mode {
            EscapeMode::Esc => InputMode::ESC,
            EscapeMode::Alt => InputMode::ALT,
        };
        if self.mouse {
            mode |= InputMode::MOUSE;
        }
        mode.normalized()
    }

    #[must_use]
    pub const fn escape_timeout(&self) -> Duration {
        Duration::from_millis(self.escape_timeout_ms)
    }

    /// The cancellation tick, never zero.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(if self.tick_ms == 0 { 1 } else { self.tick_ms })
    }
}
