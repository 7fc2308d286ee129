//! Protocol command table and the decoded message unit.
//!
//! Uses proper enums with `TryFrom`, no panics on unknown values.
//! Unknown command bytes are rejected at decode time, so everything past
//! the codec works with a validated `Command`.

use crate::error::SbxError;
use std::fmt;

// ── Command ──────────────────────────────────────────────────────

/// All commands understood by the device protocol.
///
/// Organized by category:
/// - `0x01..0x02` — Session (login, heartbeat)
/// - `0x10..0x11` — Device control
/// - `0x20..0x25` — Scheduling
/// - `0xA0..0xA5` — File transfer
/// - `0xF0..0xF9` — Audio control
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // ── Session (0x0x) ───────────────────────────────────────────
    /// Login request / server login echo.
    Login = 0x01,
    /// Periodic keepalive.
    Heartbeat = 0x02,

    // ── Device control (0x1x) ────────────────────────────────────
    Reboot = 0x10,
    FactoryReset = 0x11,

    // ── Scheduling (0x2x) ────────────────────────────────────────
    LoopMode = 0x20,
    QueryTimingMode = 0x21,
    QueryTimingSet = 0x22,
    SetTimingAlarm = 0x23,
    SetTimingAfter = 0x24,
    TimingReport = 0x25,

    // ── File transfer (0xAx) ─────────────────────────────────────
    /// Server announces a segmented file download.
    DownloadStart = 0xA0,
    /// One 255-byte file package plus index and checksum.
    Package = 0xA1,
    /// Transfer error report (reserved).
    TransferError = 0xA2,
    /// Server marks the download finished.
    DownloadEnd = 0xA3,
    /// Server pushes a file token; the device pulls the stream over HTTP.
    PushFileNotify = 0xA4,
    PushFileReport = 0xA5,

    // ── Audio control (0xFx) ─────────────────────────────────────
    Play = 0xF0,
    Pause = 0xF1,
    Next = 0xF2,
    Previous = 0xF3,
    Volume = 0xF4,
    FastForward = 0xF5,
    FastBackward = 0xF6,
    PlayIndex = 0xF7,
    ReadFileList = 0xF8,
    DeleteFile = 0xF9,
}

impl TryFrom<u8> for Command {
    type Error = SbxError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Login),
            0x02 => Ok(Command::Heartbeat),

            0x10 => Ok(Command::Reboot),
            0x11 => Ok(Command::FactoryReset),

            0x20 => Ok(Command::LoopMode),
            0x21 => Ok(Command::QueryTimingMode),
            0x22 => Ok(Command::QueryTimingSet),
            0x23 => Ok(Command::SetTimingAlarm),
            0x24 => Ok(Command::SetTimingAfter),
            0x25 => Ok(Command::TimingReport),

            0xA0 => Ok(Command::DownloadStart),
            0xA1 => Ok(Command::Package),
            0xA2 => Ok(Command::TransferError),
            0xA3 => Ok(Command::DownloadEnd),
            0xA4 => Ok(Command::PushFileNotify),
            0xA5 => Ok(Command::PushFileReport),

            0xF0 => Ok(Command::Play),
            0xF1 => Ok(Command::Pause),
            0xF2 => Ok(Command::Next),
            0xF3 => Ok(Command::Previous),
            0xF4 => Ok(Command::Volume),
            0xF5 => Ok(Command::FastForward),
            0xF6 => Ok(Command::FastBackward),
            0xF7 => Ok(Command::PlayIndex),
            0xF8 => Ok(Command::ReadFileList),
            0xF9 => Ok(Command::DeleteFile),

            _ => Err(SbxError::UnknownCommand { value }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Command {
    /// The wire byte for this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the audio-control range (`0xF0..=0xF9`).
    pub fn is_audio_control(self) -> bool {
        (0xF0..=0xF9).contains(&(self as u8))
    }

    /// Returns `true` for the file-transfer range (`0xA0..=0xA5`).
    pub fn is_file_transfer(self) -> bool {
        (0xA0..=0xA5).contains(&(self as u8))
    }
}

// ── Message ──────────────────────────────────────────────────────

/// A decoded, protocol-agnostic unit passed between workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(command: Command, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// The keepalive message sent while no download is in progress.
    pub fn heartbeat() -> Self {
        Self::new(Command::Heartbeat, vec![0x00, 0x00])
    }

    /// The login request carrying the derived token.
    pub fn login(token: Vec<u8>) -> Self {
        Self::new(Command::Login, token)
    }

    /// An acknowledgement with an empty payload.
    pub fn empty_reply(command: Command) -> Self {
        Self::new(command, Vec::new())
    }
}
