//! Unified error type.

use std::fmt;

/// The error type returned by fakeserve's fallible operations.
///
/// Assertion mismatches and unhandled requests are not `Error`s: they are
/// reported through the server's [`FailHandler`](crate::FailHandler). This
/// type surfaces infrastructure failures (binding the listener) and misuse
/// of the handler queue during test setup.
#[derive(Debug)]
pub enum Error {
    /// Binding or inspecting the listener failed.
    Io(std::io::Error),
    /// A handler slot was addressed outside the registered range.
    HandlerIndex { index: usize, len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::HandlerIndex { index, len } => {
                write!(f, "no handler slot at index {index} (queue holds {len})")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::HandlerIndex { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
