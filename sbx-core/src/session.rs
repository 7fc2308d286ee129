//! Per-connection session record.
//!
//! Tracks the authenticated flag and the in-progress download. The record
//! is owned by the file-assembler worker; other workers never touch it
//! directly and learn about the download flag through the shared atomic
//! published by the assembler.

use std::time::Instant;

/// Data bytes carried by one file package.
pub const PACKAGE_DATA_LEN: usize = 255;

/// Mutable per-connection state.
///
/// Idle defaults: not downloading, file index 0, package count 0,
/// expected package index 0, empty buffer. The record returns to these
/// defaults on construction and after every download end, successful or
/// not.
#[derive(Debug)]
pub struct Session {
    authenticated: bool,
    downloading: bool,
    file_index: u8,
    package_count: u16,
    expected_package_index: u16,
    buffer: Vec<u8>,
    started_at: Option<Instant>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            authenticated: false,
            downloading: false,
            file_index: 0,
            package_count: 0,
            expected_package_index: 0,
            buffer: Vec::new(),
            started_at: None,
        }
    }

    // ── Authentication ───────────────────────────────────────────

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self) {
        self.authenticated = true;
    }

    // ── Download state ───────────────────────────────────────────

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    pub fn file_index(&self) -> u8 {
        self.file_index
    }

    pub fn package_count(&self) -> u16 {
        self.package_count
    }

    /// The package index the next inbound package should carry.
    pub fn expected_package_index(&self) -> u16 {
        self.expected_package_index
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Enter download mode. An already-active download is discarded:
    /// the last start wins.
    pub fn begin_download(&mut self, file_index: u8, package_count: u16) {
        self.downloading = true;
        self.file_index = file_index;
        self.package_count = package_count;
        self.expected_package_index = 1;
        self.buffer.clear();
        self.started_at = Some(Instant::now());
    }

    /// Append one package's data to the reassembly buffer.
    pub fn append_package_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Advance past the package just acknowledged.
    pub fn advance_package(&mut self) {
        self.expected_package_index = self.expected_package_index.wrapping_add(1);
    }

    /// Return to the idle defaults, dropping any partial buffer.
    pub fn reset_download(&mut self) {
        self.downloading = false;
        self.file_index = 0;
        self.package_count = 0;
        self.expected_package_index = 0;
        self.buffer = Vec::new();
        self.started_at = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
