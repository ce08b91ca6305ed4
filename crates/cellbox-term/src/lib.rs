// SPDX-License-Identifier: MIT
//
// cellbox-term: a termbox-style terminal core.
//
// The application draws characters into a grid of cells; `present()` diffs
// that grid against what the terminal already shows and sends only the
// changed cells, coalescing runs and skipping redundant SGR sequences.
// Input bytes from the TTY are decoded into key, mouse, and resize events.
//
// There is no terminfo: escape sequences are the fixed xterm/VT100 set,
// written directly, with raw mode set up through termios.
//
// Layers, bottom up:
//
//   color    logical colors + style flags <-> encoded `ColorAttr`
//   cell     one grid position
//   buffer   the grid, clipping and wide-character handling
//   ansi     escape sequence writers
//   output   byte accumulator and per-cell cursor/SGR tracking
//   diff     front buffer and the present pass
//   input    byte stream -> events
//   reader   background TTY reader and SIGWINCH self-pipe
//   terminal raw mode, size queries, panic-safe restore
//   session  the context object tying it together

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod config;
pub mod diff;
pub mod error;
pub mod input;
pub mod output;
pub mod reader;
pub mod session;
pub mod terminal;

pub use buffer::CellBuffer;
pub use cell::Cell;
pub use color::{Attrs, ColorAttr, OutputMode};
pub use config::Config;
pub use diff::RenderStats;
pub use error::{Error, Result};
pub use input::{Event, EventKind, InputMode, Key, KeyCode, KeyEvent, Modifiers, MouseButton, MouseEvent};
pub use session::{Canceller, InputFeed, Session};
pub use terminal::Size;
