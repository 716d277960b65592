//! Error types for MEF 3.0 operations.
//!
//! This module defines the [`Error`] enum which represents all possible failures
//! that can occur when reading, writing, or processing MEF sessions.
//!
//! # Example
//!
//! ```no_run
//! use mef3_rs::{MefReader, Error, Result};
//!
//! fn open_session(path: &str) -> Result<()> {
//!     match MefReader::open(path) {
//!         Ok(reader) => {
//!             println!("Loaded {} channel(s)", reader.channels().len());
//!             Ok(())
//!         }
//!         Err(Error::InvalidPath(p)) => {
//!             eprintln!("Not a MEF session: {}", p);
//!             Err(Error::InvalidPath(p))
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use core::fmt;

/// Errors that can occur during MEF session operations.
///
/// This enum covers all failure modes including I/O errors, parsing failures,
/// codec errors and structural issues in the session tree.
#[derive(Debug)]
pub enum Error {
    /// Buffer provided for parsing was too small.
    ///
    /// This typically indicates file corruption or an incomplete read.
    TooShortBuffer {
        /// Actual number of bytes available
        actual: usize,
        /// Minimum number of bytes required
        expected: usize,
        /// Source file where the error was detected
        file: &'static str,
        /// Line number where the error was detected
        line: u32,
    },

    /// The session path is missing, not a directory, or could not be created.
    InvalidPath(String),

    /// A file violates the MEF 3.0 layout.
    ///
    /// Raised on file-type magic mismatches, unsupported MEF versions,
    /// non-native byte order and structure-size violations.
    InvalidFormat(String),

    /// A stored CRC-32 did not match the recomputed value.
    CrcMismatch {
        /// CRC stored in the file
        expected: u32,
        /// CRC recomputed over the bytes
        actual: u32,
        /// What was being checked (e.g. "universal header", "RED block")
        context: &'static str,
    },

    /// A reader property name is not in the recognized set.
    UnknownProperty(String),

    /// A query named a channel that does not exist in the session.
    ChannelNotFound(String),

    /// Two writes to the same channel used different sampling frequencies.
    SamplingFrequencyMismatch {
        /// Channel the write was addressed to
        channel: String,
        /// Frequency the channel was created with
        expected: f64,
        /// Frequency passed by the offending write
        actual: f64,
    },

    /// The RED encoder could not produce a block.
    CompressionFailed(String),

    /// A RED block could not be decoded.
    ///
    /// Raised when the declared sizes are inconsistent, the payload is
    /// truncated, or an unknown prefix code is encountered.
    DecompressionFailed(String),

    /// The provided password does not match the password validation field.
    WrongPassword,

    /// The writer was used after [`close()`](crate::MefWriter::close).
    WriterClosed,

    /// An I/O error occurred while reading or writing session files.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooShortBuffer {
                actual,
                expected,
                file,
                line,
            } => write!(
                f,
                "Buffer too small at {file}:{line}: need at least {expected} bytes, got {actual}"
            ),
            Error::InvalidPath(p) => write!(f, "Invalid session path: {p}"),
            Error::InvalidFormat(s) => write!(f, "Invalid MEF format: {s}"),
            Error::CrcMismatch {
                expected,
                actual,
                context,
            } => write!(
                f,
                "CRC mismatch in {context}: stored {expected:#010x}, computed {actual:#010x}"
            ),
            Error::UnknownProperty(name) => write!(f, "Unknown property: {name}"),
            Error::ChannelNotFound(name) => write!(f, "Channel not found: {name}"),
            Error::SamplingFrequencyMismatch {
                channel,
                expected,
                actual,
            } => write!(
                f,
                "Sampling frequency mismatch for channel {channel}: expected {expected} Hz, got {actual} Hz"
            ),
            Error::CompressionFailed(s) => write!(f, "RED compression failed: {s}"),
            Error::DecompressionFailed(s) => write!(f, "RED decompression failed: {s}"),
            Error::WrongPassword => write!(f, "Password does not match validation field"),
            Error::WriterClosed => write!(f, "Writer is closed"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
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

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A specialized Result type for MEF operations.
///
/// This is defined as `core::result::Result<T, Error>` for convenience.
pub type Result<T> = core::result::Result<T, Error>;
