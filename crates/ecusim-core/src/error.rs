//! Error types shared across the simulator core.

use thiserror::Error;

/// Errors raised while decoding a wire telegram.
///
/// These are always recoverable: the session loop drops the telegram,
/// flushes its input buffer and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before the declared telegram length.
    #[error("telegram truncated: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes the declared length requires.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The trailing checksum byte does not match the recomputed value.
    #[error("checksum mismatch: telegram carries {found:#04x}, calculated {calculated:#04x}")]
    Checksum {
        /// Checksum byte found on the wire.
        found: u8,
        /// Checksum recomputed over the telegram.
        calculated: u8,
    },

    /// The header byte is not valid for the selected format.
    #[error("invalid header byte {0:#04x}")]
    Header(u8),

    /// A length field carries a value the format cannot represent.
    #[error("invalid length field: {0}")]
    Length(usize),
}

/// Errors that end a session.
#[derive(Error, Debug)]
pub enum SimError {
    /// Serial port open or configuration failure.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Socket or stream failure on the underlying transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A telegram could not be decoded.
    #[error("telegram format error: {0}")]
    Codec(#[from] CodecError),

    /// The response table file could not be parsed.
    #[error("response table error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
