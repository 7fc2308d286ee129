//! Login token derivation and server-echo validation.
//!
//! Both sides derive tokens from a two-stage HMAC-MD5 over a timestamp
//! quantized to 10-second windows:
//!
//! ```text
//! k1 = HMAC-MD5(key, serial_number)          as lowercase hex
//! k2 = HMAC-MD5(k1, timestamp_string)        as lowercase hex
//! ```
//!
//! The device signs with its secret key; the server's echo is checked
//! against the shared API key. The timestamp is aligned to the nearest
//! 10-second boundary so minor clock drift between the peers cancels out.
//! A token derived near a window boundary can still mismatch if skew or
//! latency crosses the boundary between generation and verification; that
//! is an inherent property of the scheme, not a recoverable condition.

use chrono::{Local, TimeZone};
use hmac::{Hmac, Mac};
use md5::Md5;

use crate::error::SbxError;

type HmacMd5 = Hmac<Md5>;

// ── DeviceClass ──────────────────────────────────────────────────

/// Hardware class byte appended to the login token.
///
/// Cellular devices render the login timestamp as a local-time string;
/// everything else uses the decimal Unix form.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    WiFi = 0x01,
    Cellular = 0x11,
}

impl DeviceClass {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DeviceClass {
    type Error = SbxError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(DeviceClass::WiFi),
            0x11 => Ok(DeviceClass::Cellular),
            _ => Err(SbxError::UnknownVariant {
                type_name: "DeviceClass",
                value,
            }),
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────

/// Identity material for one device connection.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Eight-character device serial number.
    pub serial_number: String,
    /// Device-side signing key for the login token.
    pub secret_key: String,
    /// Shared key the server signs its echo with.
    pub api_key: String,
    pub device_class: DeviceClass,
}

// ── Timestamp alignment ──────────────────────────────────────────

/// Round `t` to the nearest 10-second boundary.
///
/// Remainders below 5 round down, 5 and above round up.
pub fn align_timestamp(t: i64) -> i64 {
    t + (if t % 10 < 5 { 0 } else { 10 }) - t % 10
}

fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

fn timestamp_string(class: DeviceClass, aligned: i64) -> String {
    match class {
        DeviceClass::WiFi => aligned.to_string(),
        DeviceClass::Cellular => match Local.timestamp_opt(aligned, 0).single() {
            Some(dt) => dt.format("%y/%m/%d, %H:%M:%S").to_string(),
            // Ambiguous or invalid local time: fall back to the decimal form.
            None => aligned.to_string(),
        },
    }
}

fn hmac_md5_hex(key: &[u8], message: &[u8]) -> String {
    let mut mac = HmacMd5::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

// ── Token derivation ─────────────────────────────────────────────

/// Derive the login token payload for the current alignment window.
///
/// Layout: serial-number bytes, 32 hex-digit second-stage digest, device
/// class byte.
pub fn login_token(credentials: &Credentials) -> Vec<u8> {
    login_token_at(credentials, unix_now())
}

/// Deterministic form of [`login_token`] for a pinned timestamp.
pub fn login_token_at(credentials: &Credentials, unix: i64) -> Vec<u8> {
    let k1 = hmac_md5_hex(
        credentials.secret_key.as_bytes(),
        credentials.serial_number.as_bytes(),
    );
    let ts = timestamp_string(credentials.device_class, align_timestamp(unix));
    let k2 = hmac_md5_hex(k1.as_bytes(), ts.as_bytes());

    let sn = credentials.serial_number.as_bytes();
    let mut token = Vec::with_capacity(sn.len() + k2.len() + 1);
    token.extend_from_slice(sn);
    token.extend_from_slice(k2.as_bytes());
    token.push(credentials.device_class.code());
    token
}

/// The digest the server is expected to echo after a successful login.
///
/// Always uses the decimal timestamp form, regardless of device class.
pub fn expected_login_echo(serial_number: &str, api_key: &str) -> String {
    expected_login_echo_at(serial_number, api_key, unix_now())
}

/// Deterministic form of [`expected_login_echo`] for a pinned timestamp.
pub fn expected_login_echo_at(serial_number: &str, api_key: &str, unix: i64) -> String {
    let k1 = hmac_md5_hex(api_key.as_bytes(), serial_number.as_bytes());
    let ts = align_timestamp(unix).to_string();
    hmac_md5_hex(k1.as_bytes(), ts.as_bytes())
}

/// Check the server's login echo against the expected digest.
///
/// A mismatch is fatal for the connection; the caller must close it.
pub fn validate_login_reply(echoed: &[u8], serial_number: &str, api_key: &str) -> bool {
    match std::str::from_utf8(echoed) {
        Ok(s) => s == expected_login_echo(serial_number, api_key),
        Err(_) => false,
    }
}
