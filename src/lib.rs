//! # Adaptive LZW decoder and encoder
//!
//! This crate provides an [`Encoder`] and a [`Decoder`] for an LZW byte stream whose code words
//! grow from 9 to 16 bits as the dictionary fills. Once the dictionary is full at 16 bits one of
//! three [`Mode`]s decides what happens: the dictionary is frozen, it is rebuilt from scratch, or
//! it is rebuilt only when the compression ratio has degraded by more than a [`Threshold`].
//!
//! A stream is laid out most significant bit first as
//!
//!  * one byte holding the mode tag,
//!  * the code words, each as wide as the code width at the time it was written,
//!  * the end code `END_CODE == 256`, padded with zero bits to a full byte.
//!
//! Examplary use of the encoder:
//!
//! ```
//! use adalzw::{encode::Encoder, Mode};
//! let data = b"TOBEORNOTTOBEORTOBEORNOT";
//! let mut compressed = vec![];
//!
//! let mut enc = Encoder::new(Mode::Reset);
//! let result = enc.into_stream(&mut compressed).encode_all(&data[..]);
//! result.status.unwrap();
//!
//! assert_eq!(adalzw::expand(&compressed).unwrap(), data);
//! ```
use core::fmt;
use core::str::FromStr;

pub mod decode;
pub mod dict;
pub mod encode;
pub mod observe;

mod error;
mod state;

pub use crate::decode::Decoder;
pub use crate::encode::Encoder;
pub use crate::error::{ConfigError, Error, LzwError};
pub use crate::observe::{Event, Observer};
pub use crate::state::{Threshold, DEFAULT_THRESHOLD};

/// Alias for a LZW code point
pub type Code = u16;

/// The smallest code width, used at the start of every epoch.
pub const MIN_WIDTH: u8 = 9;
/// The largest code width.
pub const MAX_WIDTH: u8 = 16;
/// The code marking the end of the stream.
pub const END_CODE: Code = 256;

/// Number of single byte codes.
pub(crate) const ALPHABET: usize = 256;
/// The first code assigned to a multi-byte sequence.
pub(crate) const FIRST_CODE: Code = END_CODE + 1;

/// What to do once the dictionary is full at the maximum code width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keep using the full dictionary without adding entries.
    Freeze,
    /// Rebuild the dictionary from the single byte entries.
    Reset,
    /// Rebuild only when the compression ratio degrades past the threshold.
    Monitor,
}

impl Mode {
    /// The tag written as the first byte of a stream.
    pub fn tag(self) -> u8 {
        match self {
            Mode::Freeze => 0,
            Mode::Reset => 1,
            Mode::Monitor => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Mode::Freeze),
            1 => Some(Mode::Reset),
            2 => Some(Mode::Monitor),
            _ => None,
        }
    }

    /// Parse the command line letter of a mode: `n`, `r` or `m`.
    pub fn from_letter(letter: &str) -> Result<Self, ConfigError> {
        match letter {
            "n" => Ok(Mode::Freeze),
            "r" => Ok(Mode::Reset),
            "m" => Ok(Mode::Monitor),
            "" => Err(ConfigError::MissingMode),
            other => Err(ConfigError::UnknownMode(other.to_owned())),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "freeze" => Ok(Mode::Freeze),
            "reset" => Ok(Mode::Reset),
            "monitor" => Ok(Mode::Monitor),
            other => Mode::from_letter(other),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Freeze => write!(f, "freeze"),
            Mode::Reset => write!(f, "reset"),
            Mode::Monitor => write!(f, "monitor"),
        }
    }
}

/// The result of a single coding call on slices.
#[derive(Debug)]
pub struct StreamResult {
    /// The number of bytes consumed from the input buffer.
    pub consumed_in: usize,
    /// The number of bytes written into the output buffer.
    pub consumed_out: usize,
    /// The status after returning from the call.
    pub status: Result<LzwStatus, LzwError>,
}

/// The result of coding a whole reader into a writer.
#[derive(Debug)]
pub struct AllResult {
    /// The total number of bytes consumed from the reader.
    pub bytes_read: usize,
    /// The total number of bytes written into the writer.
    pub bytes_written: usize,
    /// The possible error that occurred.
    pub status: Result<(), Error>,
}

/// The status after a successful coding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzwStatus {
    /// Everything went well.
    Ok,
    /// No bytes were read or written, more input or output space is required.
    NoProgress,
    /// The end code was written or read.
    Done,
}

/// Size of the intermediate buffer of the reader and writer adapters.
pub(crate) const STREAM_BUFFER: usize = 1 << 16;

/// Compress all of `data` into a new vector.
pub fn compress(data: &[u8], mode: Mode) -> Vec<u8> {
    let mut encoder = Encoder::new(mode);
    encoder.finish();

    let mut compressed = Vec::with_capacity(data.len() / 2 + 8);
    let mut outbuf = vec![0; STREAM_BUFFER];
    let mut inp = data;
    loop {
        let result = encoder.encode_bytes(inp, &mut outbuf);
        inp = &inp[result.consumed_in..];
        compressed.extend_from_slice(&outbuf[..result.consumed_out]);
        match result.status {
            Ok(LzwStatus::Ok) => {}
            _ => break,
        }
    }

    compressed
}

/// Expand a complete compressed stream into a new vector.
pub fn expand(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = Decoder::new();
    let mut expanded = Vec::with_capacity(data.len() * 2);
    let mut outbuf = vec![0; STREAM_BUFFER];
    let mut inp = data;
    loop {
        let result = decoder.decode_bytes(inp, &mut outbuf);
        inp = &inp[result.consumed_in..];
        expanded.extend_from_slice(&outbuf[..result.consumed_out]);
        match result.status? {
            LzwStatus::Ok => {}
            LzwStatus::Done => return Ok(expanded),
            LzwStatus::NoProgress => return Err(LzwError::Truncated.into()),
        }
    }
}
