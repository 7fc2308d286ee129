//! Segmented file download: checksum verification, reassembly, acks.
//!
//! # Wire protocol
//!
//! ```text
//! Server ──[0xA0 {file_index, package_count}]──► Device
//! Device ──[0xA0 {0x0000}]─────────────────────► Server   (ack)
//!
//! Server ──[0xA1 {index, 255 data bytes, crc}]─► Device   (repeated)
//! Device ──[0xA0 {index}]──────────────────────► Server   (per package)
//!
//! Server ──[0xA3 {file_index}]─────────────────► Device
//! Device ──[0xA3 {file_index}]─────────────────► Server   (ack, pre-reset index)
//! ```
//!
//! The transport is assumed reliable and in-order. Sequence and checksum
//! mismatches are logged diagnostics: the package is appended regardless
//! and no retransmission is requested. The session always returns to idle
//! on the end event, whatever happened before it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::message::{Command, Message};
use crate::session::{PACKAGE_DATA_LEN, Session};

// ── SessionEvent ─────────────────────────────────────────────────

/// Events the dispatcher hands to the file-assembler worker.
///
/// All session mutation happens on that worker, so the dispatcher stays
/// free of shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server's login echo validated.
    LoginAccepted,
    /// A segmented download is starting.
    DownloadStart { file_index: u8, package_count: u16 },
    /// One file package.
    Package {
        package_index: u16,
        data: Vec<u8>,
        checksum: u8,
    },
    /// The download is finished (not necessarily successfully).
    DownloadEnd { file_index: u8 },
}

/// Additive checksum over the package data, truncated to one byte.
pub fn verify_checksum(data: &[u8], checksum: u8) -> bool {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == checksum
}

// ── FileAssembler ────────────────────────────────────────────────

/// Owns the session record and drives the download state machine.
pub struct FileAssembler {
    session: Session,
    downloading: Arc<AtomicBool>,
}

impl FileAssembler {
    /// `downloading` is published for the heartbeat ticker, which skips
    /// its tick while a transfer is active.
    pub fn new(downloading: Arc<AtomicBool>) -> Self {
        Self {
            session: Session::new(),
            downloading,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Process one event, returning the ack to send, if any.
    pub fn handle(&mut self, event: SessionEvent) -> Option<Message> {
        match event {
            SessionEvent::LoginAccepted => {
                self.session.set_authenticated();
                info!("login accepted by server");
                None
            }

            SessionEvent::DownloadStart {
                file_index,
                package_count,
            } => {
                if self.session.is_downloading() {
                    warn!(
                        previous = self.session.file_index(),
                        "new download replaces an active one"
                    );
                }
                self.session.begin_download(file_index, package_count);
                self.downloading.store(true, Ordering::SeqCst);
                info!(
                    file_index,
                    package_count,
                    size_kib = package_count as f64 * PACKAGE_DATA_LEN as f64 / 1024.0,
                    "entering download mode"
                );
                Some(Message::new(Command::DownloadStart, vec![0x00, 0x00]))
            }

            SessionEvent::Package {
                package_index,
                data,
                checksum,
            } => {
                if !self.session.is_downloading() {
                    debug!(package_index, "package received outside an active download");
                }
                let expected = self.session.expected_package_index();
                if package_index != expected {
                    warn!(package_index, expected, "package sequence mismatch");
                }
                if !verify_checksum(&data, checksum) {
                    warn!(package_index, "package checksum mismatch");
                }
                // Append regardless: mismatches are diagnostics only.
                self.session.append_package_data(&data);
                if self.session.package_count() > 0 {
                    debug!(
                        "download progress {:.1}%",
                        expected as f64 / self.session.package_count() as f64 * 100.0
                    );
                }
                self.session.advance_package();
                Some(Message::new(
                    Command::DownloadStart,
                    expected.to_be_bytes().to_vec(),
                ))
            }

            SessionEvent::DownloadEnd { file_index } => {
                let active = self.session.file_index();
                if file_index != 0 && file_index != active {
                    warn!(file_index, active, "download end for a different file");
                }
                if file_index == active {
                    if let Some(started) = self.session.started_at() {
                        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
                        let kib_per_s = self.session.buffer().len() as f64 / 1024.0 / elapsed;
                        info!(
                            file_index = active,
                            bytes = self.session.buffer().len(),
                            elapsed_s = elapsed,
                            kib_per_s,
                            "file received"
                        );
                    }
                }
                let ack = Message::new(
                    Command::DownloadEnd,
                    (active as u16).to_be_bytes().to_vec(),
                );
                self.session.reset_download();
                self.downloading.store(false, Ordering::SeqCst);
                Some(ack)
            }
        }
    }
}
