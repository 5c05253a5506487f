use std::io;

/// Errors encountered while reading a coredump.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Coredump magic not found")]
    NotFound,
    #[error("Truncated data at offset {offset:#x}: needed {needed} bytes, only {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Unsupported pointer width (2^{exponent} bits)")]
    UnsupportedPointerWidth { exponent: u8 },
    #[error("Section version mismatch: expected {expected}, found {got}")]
    VersionMismatch { expected: u16, got: u16 },
    #[error("Invalid memory range: end {end:#x} is below start {start:#x}")]
    InvalidRange { start: u64, end: u64 },
    #[error("I/O error: {0}")]
    IoFailure(io::ErrorKind),
}

impl Error {
    /// Returns just the name of the error, as a more human-friendly version of
    /// an error-code for error logging.
    pub fn name(&self) -> &'static str {
        match self {
            Error::NotFound => "NotFound",
            Error::Truncated { .. } => "Truncated",
            Error::UnsupportedPointerWidth { .. } => "UnsupportedPointerWidth",
            Error::VersionMismatch { .. } => "VersionMismatch",
            Error::InvalidRange { .. } => "InvalidRange",
            Error::IoFailure(_) => "IoFailure",
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoFailure(err.kind())
    }
}
