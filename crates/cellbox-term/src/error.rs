// SPDX-License-Identifier: MIT
//
// Error taxonomy for the session, codec, and presenter.
//
// Out-of-range cell writes are not errors: they are silently ignored by the
// buffer. A `peek_event` timeout is not an error either: it is `Ok(None)`.

use std::io;

use thiserror::Error;

use crate::color::OutputMode;

/// Everything that can go wrong talking to the terminal.
#[derive(Error, Debug)]
pub enum Error {
    /// Raw mode could not be entered or the terminal size could not be
    /// queried. Fatal to the session; there is no retry.
    #[error("failed to initialize terminal: {context}")]
    Init {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The session was shut down (or never finished initializing).
    #[error("session is not initialized")]
    NotInitialized,

    /// A TTY-backed session is already live in this process.
    #[error("a terminal session is already active")]
    AlreadyInitialized,

    /// The terminal cannot honor the requested output mode. The session
    /// keeps running in its previous mode.
    #[error("output mode {0:?} is not supported by this terminal")]
    UnsupportedMode(OutputMode),

    /// A logical color index outside the range of the given output mode.
    #[error("color {color} is out of range for output mode {mode:?}")]
    ColorOutOfRange { color: u16, mode: OutputMode },

    /// A style attribute the given output mode cannot express.
    #[error("attribute {attr} is not available in output mode {mode:?}")]
    AttributeUnavailable { attr: &'static str, mode: OutputMode },

    /// Terminal I/O failed mid-frame or mid-read. Partial frames cannot
    /// be recovered, so this propagates.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blocked `poll_event` was released by a [`Canceller`](crate::session::Canceller).
    #[error("event poll was cancelled")]
    Cancelled,

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Wrap an OS error raised while bringing the terminal up.
    pub(crate) fn init(context: impl Into<String>, source: io::Error) -> Self {
        Self::Init {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
