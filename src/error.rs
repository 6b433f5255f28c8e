//! Error types for configuration and stream failures.
use std::io;

use thiserror::Error;

use crate::Code;

/// A fatal problem with a compressed stream.
///
/// None of these are recoverable; the decoder stays failed once one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LzwError {
    /// A codeword names neither a populated table slot nor the next code to be assigned.
    #[error("invalid codeword {code} (next code to be assigned is {next_code})")]
    InvalidCode { code: Code, next_code: u32 },
    /// The leading mode tag is not one of the known modes.
    #[error("unknown mode tag {0:#04x}")]
    InvalidMode(u8),
    /// The input ended before the end-of-stream code was read.
    #[error("stream ended without an end-of-stream code")]
    Truncated,
}

/// An invalid setting, detected before any data is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no compression mode given, expected one of 'n', 'r' or 'm'")]
    MissingMode,
    #[error("unknown compression mode '{0}', expected one of 'n', 'r' or 'm'")]
    UnknownMode(String),
    #[error("unknown direction '{0}', expected '-' to compress or '+' to expand")]
    UnknownDirection(String),
    #[error("monitor threshold must be a finite factor of at least 1.0, got {0}")]
    InvalidThreshold(f64),
}

/// Any failure of a whole compress or expand run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("corrupt stream: {0}")]
    Corrupt(#[from] LzwError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the failure was caused by the compressed data itself.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt(_))
    }
}
