//! Configuration for the device agent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use sbx_core::{Credentials, DeviceClass};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Management server endpoint.
    pub network: NetworkConfig,
    /// Device identity and keys.
    pub device: IdentityConfig,
    /// Stream-notify callout.
    pub notify: NotifyConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Management server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server host name or address.
    pub host: String,
    /// TCP port of the device-management listener.
    pub port: u16,
}

/// Device identity and keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Eight-character device serial number.
    pub serial_number: String,
    /// Device-side signing key for the login token.
    pub secret_key: String,
    /// Shared key the server signs its login echo with.
    pub api_key: String,
    /// Hardware class: "wifi" or "cellular".
    pub device_class: String,
}

/// Stream-notify callout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Fire the HTTP callout when the server pushes a file token.
    pub enabled: bool,
    /// Host of the server's HTTP API. Empty means the network host.
    pub host: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            device: IdentityConfig::default(),
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 10808,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            serial_number: String::new(),
            secret_key: String::new(),
            api_key: String::new(),
            device_class: "wifi".into(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl DeviceConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Build the protocol credentials from the identity section.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            serial_number: self.device.serial_number.clone(),
            secret_key: self.device.secret_key.clone(),
            api_key: self.device.api_key.clone(),
            device_class: self.device_class(),
        }
    }

    /// Parsed hardware class; anything but "cellular" means WiFi.
    pub fn device_class(&self) -> DeviceClass {
        if self.device.device_class.eq_ignore_ascii_case("cellular") {
            DeviceClass::Cellular
        } else {
            DeviceClass::WiFi
        }
    }

    /// Host the notify callout should target.
    pub fn notify_host(&self) -> &str {
        if self.notify.host.is_empty() {
            &self.network.host
        } else {
            &self.notify.host
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = DeviceConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("serial_number"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = DeviceConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DeviceConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.host, "127.0.0.1");
        assert_eq!(parsed.network.port, 10808);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn device_class_parsing() {
        let mut cfg = DeviceConfig::default();
        assert_eq!(cfg.device_class(), DeviceClass::WiFi);
        cfg.device.device_class = "Cellular".into();
        assert_eq!(cfg.device_class(), DeviceClass::Cellular);
        cfg.device.device_class = "anything".into();
        assert_eq!(cfg.device_class(), DeviceClass::WiFi);
    }

    #[test]
    fn notify_host_falls_back_to_network() {
        let mut cfg = DeviceConfig::default();
        assert_eq!(cfg.notify_host(), "127.0.0.1");
        cfg.notify.host = "api.example.net".into();
        assert_eq!(cfg.notify_host(), "api.example.net");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: DeviceConfig = toml::from_str(
            r#"
            [device]
            serial_number = "02387448"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.device.serial_number, "02387448");
        assert_eq!(cfg.network.port, 10808);
    }
}
