//! Error types shared by generation, analysis, and bundle persistence.

use std::fmt;
use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised by the generation or analysis core.
#[derive(Debug)]
pub enum Error {
    /// A required input (bar grid, groove template, section plan) was not supplied.
    MissingInput(&'static str),
    /// An index fell outside the collection it addresses.
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// Input was present but structurally invalid.
    InvalidInput(String),
    /// A stored bundle was written by a newer major schema than this reader supports.
    SchemaTooNew { found: String, supported: u32 },
    /// A stored bundle could not be parsed.
    MalformedBundle(String),
    /// File I/O failed.
    Io(io::Error),
}

impl Error {
    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::OutOfRange { what, index, len }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBundle(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingInput(what) => write!(f, "missing required input: {what}"),
            Error::OutOfRange { what, index, len } => {
                write!(f, "{what} index {index} out of range (len {len})")
            }
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::SchemaTooNew { found, supported } => write!(
                f,
                "bundle schema version {found} is newer than supported major version {supported}"
            ),
            Error::MalformedBundle(msg) => write!(f, "malformed feature bundle: {msg}"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
