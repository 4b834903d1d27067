//! Error type for the joystick subsystem

use std::io;

/// Errors produced while locating, opening or reading the joystick
#[derive(Debug, thiserror::Error)]
pub enum StickError {
    /// No input device carries the requested name
    #[error("No input device named {0:?}")]
    NotFound(String),

    /// A syscall against the registry or the device node failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The caller handed in a null pointer, a short buffer or a bad path
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The session never became usable (open or grab failed)
    #[error("Session failed to open: {0}")]
    SessionFailed(String),

    /// The session was already closed
    #[error("Session is closed")]
    Closed,
}

impl StickError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        StickError::Io {
            context: context.into(),
            source,
        }
    }
}
