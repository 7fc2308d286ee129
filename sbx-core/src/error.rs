//! Domain-specific error types for the device protocol engine.
//!
//! All fallible operations return `Result<T, SbxError>`.
//! Decode failures are recoverable: the reader discards bytes and keeps
//! scanning. Authentication failure is the one fatal protocol error.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the device protocol.
#[derive(Debug, Error)]
pub enum SbxError {
    // ── Decode Errors ────────────────────────────────────────────
    /// Fewer bytes than the minimal five-byte frame.
    #[error("frame too short")]
    FrameTooShort,

    /// No 0x7E start marker anywhere in the buffer.
    #[error("frame start marker not found")]
    FrameStartNotFound,

    /// The declared payload extends past the received bytes.
    #[error("frame truncated")]
    FrameTruncated,

    /// The command byte is not in the recognized command set.
    #[error("unknown command: {value:#04x}")]
    UnknownCommand { value: u8 },

    /// The byte at the computed end offset is not 0xEF.
    #[error("frame missing end marker")]
    FrameUnterminated,

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#04x}")]
    UnknownVariant { type_name: &'static str, value: u8 },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The server's login echo did not match the expected digest.
    #[error("authentication echo mismatch")]
    AuthMismatch,

    /// The payload does not fit the 16-bit length field.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SbxError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SbxError::ChannelClosed
    }
}
