//! Wire framing for the device protocol.
//!
//! # Frame layout
//!
//! ```text
//! 0x7E | cmd:1 | len:2 (BE) | payload: len bytes | 0xEF
//! ```
//!
//! Package frames (`cmd == 0xA1`) omit the length field to save bandwidth
//! on the highest-frequency message type. Their data field is a fixed
//! 258-byte span immediately after the command byte: a 2-byte package
//! index, 255 data bytes and a trailing checksum byte. The terminator
//! position is consumed without validation; the fixed span already bounds
//! the frame.
//!
//! Decode never resynchronizes beyond locating the next `0x7E`: an
//! invalid frame is discarded with a diagnostic and scanning continues.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::SbxError;
use crate::message::{Command, Message};

/// Start-of-frame marker.
pub const FRAME_START: u8 = 0x7E;
/// End-of-frame marker.
pub const FRAME_END: u8 = 0xEF;
/// Smallest possible frame: start + command + length + end.
pub const MIN_FRAME_LEN: usize = 5;
/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;
/// Fixed data-field span of a package frame: index(2) + data(255) + checksum(1).
pub const PACKAGE_SPAN: usize = 258;

/// Framed codec for the device connection.
pub struct SbxCodec;

/// Parse a single frame out of `buf`.
///
/// On success returns the decoded message and the number of bytes consumed
/// from the front of `buf` (leading garbage plus the frame itself).
///
/// `FrameTooShort` and `FrameTruncated` mean the buffer may still grow into
/// a valid frame; the remaining errors mean the located frame is invalid.
pub fn parse_frame(buf: &[u8]) -> Result<(Message, usize), SbxError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(SbxError::FrameTooShort);
    }

    let start = buf
        .iter()
        .position(|&b| b == FRAME_START)
        .ok_or(SbxError::FrameStartNotFound)?;

    let Some(&command_byte) = buf.get(start + 1) else {
        return Err(SbxError::FrameTruncated);
    };

    // Package frames carry no length field; the data span is fixed.
    if command_byte == Command::Package.code() {
        let end = start + 2 + PACKAGE_SPAN;
        if end >= buf.len() {
            return Err(SbxError::FrameTruncated);
        }
        let payload = buf[start + 2..end].to_vec();
        return Ok((Message::new(Command::Package, payload), end + 1));
    }

    if buf.len() < start + 4 {
        return Err(SbxError::FrameTruncated);
    }
    let length = u16::from_be_bytes([buf[start + 2], buf[start + 3]]) as usize;
    let end = start + 4 + length;
    if end >= buf.len() {
        return Err(SbxError::FrameTruncated);
    }

    let command = Command::try_from(command_byte)?;

    if buf[end] != FRAME_END {
        return Err(SbxError::FrameUnterminated);
    }

    Ok((Message::new(command, buf[start + 4..end].to_vec()), end + 1))
}

impl Decoder for SbxCodec {
    type Item = Message;
    type Error = SbxError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, SbxError> {
        loop {
            match parse_frame(src) {
                Ok((message, consumed)) => {
                    src.advance(consumed);
                    return Ok(Some(message));
                }
                Err(SbxError::FrameTooShort) | Err(SbxError::FrameTruncated) => {
                    return Ok(None);
                }
                Err(SbxError::FrameStartNotFound) => {
                    src.clear();
                    return Ok(None);
                }
                Err(e) => {
                    // Invalid frame: skip its start marker and rescan.
                    warn!("discarding invalid frame: {e}");
                    let start = src
                        .iter()
                        .position(|&b| b == FRAME_START)
                        .unwrap_or(0);
                    src.advance(start + 1);
                }
            }
        }
    }
}

impl Encoder<Message> for SbxCodec {
    type Error = SbxError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), SbxError> {
        if item.payload.len() > MAX_PAYLOAD_LEN {
            return Err(SbxError::PayloadTooLarge {
                size: item.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        dst.reserve(MIN_FRAME_LEN + item.payload.len());
        dst.put_u8(FRAME_START);
        dst.put_u8(item.command.code());
        dst.put_u16(item.payload.len() as u16);
        dst.put_slice(&item.payload);
        dst.put_u8(FRAME_END);
        Ok(())
    }
}
