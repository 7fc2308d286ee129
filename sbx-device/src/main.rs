//! Device agent — entry point.
//!
//! ```text
//! sbx-device                    Run with sbx-device.toml if present
//! sbx-device --config <path>    Load a custom config TOML
//! sbx-device --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sbx_core::{ConnectInfo, DeviceEngine, StreamNotifier};
use sbx_device::config::DeviceConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sbx-device", about = "sound-box device management agent")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "sbx-device.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&DeviceConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = DeviceConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("sbx-device v{}", env!("CARGO_PKG_VERSION"));
    info!("server: {}:{}", config.network.host, config.network.port);
    info!("serial number: {}", config.device.serial_number);
    info!("device class: {:?}", config.device_class());

    let mut engine = DeviceEngine::new(config.credentials());
    if config.notify.enabled {
        engine = engine.with_notifier(StreamNotifier::new(config.notify_host()));
    }

    let info = ConnectInfo::new(config.network.host.clone(), config.network.port);

    // Ctrl-C handler.
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        shutdown_clone.cancel();
    });

    engine.connect_and_run(&info, shutdown).await?;

    Ok(())
}
