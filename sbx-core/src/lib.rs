//! # sbx-core
//!
//! Device-side protocol engine for networked audio devices managed over
//! a persistent TCP connection.
//!
//! This crate contains:
//! - **Codec**: `SbxCodec` for the length-prefixed binary frame protocol
//!   via `tokio_util`
//! - **Auth**: time-windowed HMAC-MD5 login token derivation and
//!   server-echo validation
//! - **Message**: `Command` table and the decoded `Message` unit
//! - **Session**: the per-connection record (authentication, active
//!   download)
//! - **Dispatch**: inbound command classification
//! - **Transfer**: segmented file download with per-package checksums
//! - **Engine**: worker tasks joined by channels over one connection
//! - **Notify**: fire-and-forget HTTP trigger for pushed file streams
//! - **Error**: `SbxError`, a typed `thiserror`-based hierarchy

pub mod auth;
pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod message;
pub mod notify;
pub mod session;
pub mod transfer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use auth::{Credentials, DeviceClass};
pub use codec::{FRAME_END, FRAME_START, MAX_PAYLOAD_LEN, SbxCodec};
pub use connection::{ConnectInfo, DeviceConnection, OutboundSender};
pub use dispatch::{Action, Dispatcher};
pub use engine::{DeviceEngine, HEARTBEAT_INTERVAL, LOGIN_DEADLINE};
pub use error::SbxError;
pub use message::{Command, Message};
pub use notify::StreamNotifier;
pub use session::{PACKAGE_DATA_LEN, Session};
pub use transfer::{FileAssembler, SessionEvent};
