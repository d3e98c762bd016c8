//! # Error Types
//!
//! Errors raised while decoding drone traffic or interpreting user choices.

use thiserror::Error;

/// Result alias used throughout tello-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the tello-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Datagram is shorter than the smallest valid packet.
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    /// First byte is not the packet start marker.
    #[error("bad start byte 0x{0:02x}")]
    BadStart(u8),

    /// Length field disagrees with the datagram size.
    #[error("declared length {declared} but received {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// Header CRC-8 did not match.
    #[error("header crc mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    HeaderCrc { expected: u8, actual: u8 },

    /// Trailing CRC-16 did not match.
    #[error("packet crc mismatch: expected 0x{expected:04x}, got 0x{actual:04x}")]
    PacketCrc { expected: u16, actual: u16 },

    /// A message payload was too short for its layout.
    #[error("{message} payload needs {needed} bytes, got {actual}")]
    ShortPayload {
        message: &'static str,
        needed: usize,
        actual: usize,
    },

    /// Unrecognised controller name.
    #[error("unknown controller '{0}' (expected keyboard, dualshock4 or tflightHotasX)")]
    UnknownController(String),

    /// Video bitrate outside the supported range.
    #[error("video bitrate {0} out of range (0 = auto, 1..=5 fixed)")]
    InvalidBitrate(u8),
}
