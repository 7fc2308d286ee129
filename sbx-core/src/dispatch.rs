//! Inbound message dispatch.
//!
//! Classifies each decoded message by command and produces actions for
//! the engine to route: direct replies go to the outbound writer,
//! session events go to the file-assembler worker, and the push-file
//! notification triggers the HTTP callout. The dispatcher itself holds
//! no mutable state.

use tracing::{debug, warn};

use crate::auth::{self, Credentials};
use crate::message::{Command, Message};
use crate::transfer::SessionEvent;

// ── Action ───────────────────────────────────────────────────────

/// What the engine should do with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a reply frame.
    Reply(Message),
    /// Forward an event to the file-assembler worker.
    Session(SessionEvent),
    /// Fire the notify-by-URL callout with this file token.
    Notify(String),
    /// Authentication failed: the connection must be closed.
    CloseConnection,
}

/// Lowest index an audio slot command will echo.
const AUDIO_INDEX_MIN: u16 = 1;
/// Highest index an audio slot command will echo.
const AUDIO_INDEX_MAX: u16 = 6;

// ── Dispatcher ───────────────────────────────────────────────────

/// Stateless classifier for inbound messages.
pub struct Dispatcher {
    credentials: Credentials,
}

impl Dispatcher {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Classify one message into the actions it demands.
    ///
    /// Messages with payloads too short for their command are dropped
    /// with a diagnostic.
    pub fn dispatch(&self, message: Message) -> Vec<Action> {
        match message.command {
            Command::Login => {
                if auth::validate_login_reply(
                    &message.payload,
                    &self.credentials.serial_number,
                    &self.credentials.api_key,
                ) {
                    vec![Action::Session(SessionEvent::LoginAccepted)]
                } else {
                    warn!("server login echo rejected");
                    vec![Action::CloseConnection]
                }
            }

            Command::DownloadStart => {
                let Some((&file_index, rest)) = message.payload.split_first() else {
                    warn!("download start with empty payload");
                    return Vec::new();
                };
                if rest.len() < 2 {
                    warn!("download start payload too short");
                    return Vec::new();
                }
                let package_count = u16::from_be_bytes([rest[0], rest[1]]);
                vec![Action::Session(SessionEvent::DownloadStart {
                    file_index,
                    package_count,
                })]
            }

            Command::Package => {
                // index(2) + data(255) + checksum(1)
                if message.payload.len() < 258 {
                    warn!(len = message.payload.len(), "package payload too short");
                    return Vec::new();
                }
                let package_index =
                    u16::from_be_bytes([message.payload[0], message.payload[1]]);
                vec![Action::Session(SessionEvent::Package {
                    package_index,
                    data: message.payload[2..257].to_vec(),
                    checksum: message.payload[257],
                })]
            }

            Command::DownloadEnd => {
                let Some(&file_index) = message.payload.get(1) else {
                    warn!("download end payload too short");
                    return Vec::new();
                };
                vec![Action::Session(SessionEvent::DownloadEnd { file_index })]
            }

            Command::PushFileNotify => {
                let token = String::from_utf8_lossy(&message.payload).into_owned();
                vec![
                    Action::Reply(Message::empty_reply(Command::PushFileNotify)),
                    Action::Notify(token),
                ]
            }

            Command::PlayIndex | Command::DeleteFile => {
                vec![Action::Reply(Self::slot_reply(message))]
            }

            Command::ReadFileList => {
                vec![Action::Reply(Message::new(
                    Command::ReadFileList,
                    vec![0x00, 0x06],
                ))]
            }

            Command::Reboot
            | Command::FactoryReset
            | Command::SetTimingAlarm
            | Command::SetTimingAfter => {
                vec![Action::Reply(Message::empty_reply(message.command))]
            }

            cmd if cmd.is_audio_control() => {
                vec![Action::Reply(Message::empty_reply(cmd))]
            }

            // Recognized commands with no device-side behavior.
            cmd => {
                debug!(%cmd, "inbound command ignored");
                Vec::new()
            }
        }
    }

    /// Audio slot commands echo the payload back when the index is in
    /// range, and reply with a single zero byte otherwise.
    fn slot_reply(message: Message) -> Message {
        let index = match message.payload[..] {
            [hi, lo, ..] => u16::from_be_bytes([hi, lo]),
            _ => 0,
        };
        if (AUDIO_INDEX_MIN..=AUDIO_INDEX_MAX).contains(&index) {
            message
        } else {
            Message::new(message.command, vec![0x00])
        }
    }
}
