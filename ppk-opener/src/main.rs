//! Parcel box opener (ppk-opener) - Main entry point
//!
//! Terminal front end for the scan cycle: reads box codes from a barcode
//! reader (or stdin), opens the box through the access API and plays the
//! returned audio token.

use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ppk_common::config::ensure_directory;
use ppk_common::events::{CycleEvent, EventBus};
use ppk_opener::api::AccessClient;
use ppk_opener::audio::AudioOutput;
use ppk_opener::config::{Config, ConfigOverrides};
use ppk_opener::player::CpalPlayer;
use ppk_opener::scanner::{DeviceScanner, LineScanner, ScanOptions, Scanner};
use ppk_opener::session::run_scan_session;
use ppk_opener::unpack::Unpacker;
use ppk_opener::CycleRunner;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Command-line arguments for ppk-opener
#[derive(Parser, Debug)]
#[command(name = "ppk-opener")]
#[command(about = "Open a parcel box by scanning its QR code")]
#[command(version, long_version = LONG_VERSION)]
struct Args {
    /// Configuration file (default: platform config dir)
    #[arg(short, long, env = "PPK_CONFIG")]
    config: Option<PathBuf>,

    /// Private storage folder for the downloaded archive
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Cache folder for extracted files
    #[arg(long)]
    cache_folder: Option<PathBuf>,

    /// Open-box endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// API bearer token
    #[arg(long, env = "PPK_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one cycle for an already known box code
    Open {
        /// Scanned box code
        box_id: String,
    },
    /// Scan codes interactively until cancelled
    Scan,
    /// List audio output devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Devices = args.command {
        for name in AudioOutput::list_devices().context("Failed to list audio devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = Config::load(ConfigOverrides {
        config_file: args.config,
        root_folder: args.root_folder,
        cache_folder: args.cache_folder,
        endpoint: args.endpoint,
        token: args.token,
        log_level: args.log_level,
    })
    .context("Failed to load configuration")?;

    init_tracing(&config.log_level, config.log_file.as_ref())?;
    info!("Starting ppk-opener {}", LONG_VERSION);

    if let Some(parent) = config.archive_path.parent() {
        ensure_directory(parent).context("Failed to create storage folder")?;
    }

    let events = EventBus::new(64);
    let printer = tokio::spawn(print_status(events.subscribe()));

    let client = AccessClient::from_config(&config).context("Failed to create API client")?;
    info!(endpoint = client.endpoint(), "Access API client ready");
    let unpacker = Unpacker::new(&config.archive_path, &config.extract_dir);
    let player = Arc::new(CpalPlayer::new(config.audio.device.clone(), config.audio.volume));
    let runner = CycleRunner::new(client, unpacker, player, events, config.audio.expected_entry.clone())
        .keep_artifacts(config.keep_artifacts);

    let result = match args.command {
        Command::Open { box_id } => open_once(&runner, &box_id).await,
        Command::Scan => scan_loop(&runner, &config).await,
        Command::Devices => Ok(()),
    };

    drop(runner);
    let _ = printer.await;
    result
}

async fn open_once(runner: &CycleRunner<AccessClient>, box_id: &str) -> Result<()> {
    let outcome = runner.run(box_id).await?;
    outcome.playback.finished().await?;
    Ok(())
}

async fn scan_loop(runner: &CycleRunner<AccessClient>, config: &Config) -> Result<()> {
    let options = ScanOptions::from(&config.scanner);
    let mut scanner: Box<dyn Scanner> = match &config.scanner.device {
        Some(device) => Box::new(DeviceScanner::new(device)),
        None => Box::new(LineScanner::stdin()),
    };

    let summary = run_scan_session(runner, scanner.as_mut(), &options, confirm_retry).await?;
    info!(
        scanned = summary.scanned,
        opened = summary.opened,
        failed = summary.failed,
        "Scan session ended"
    );
    Ok(())
}

/// Ask before reopening a scanner that refused access
fn confirm_retry(reason: &str) -> bool {
    println!("Scanner access denied: {}", reason);
    println!("Grant access, then press Enter to scan again (Ctrl-D to quit)");

    let mut line = String::new();
    matches!(io::stdin().lock().read_line(&mut line), Ok(n) if n > 0)
}

/// Render cycle states as status lines
async fn print_status(mut rx: broadcast::Receiver<CycleEvent>) {
    loop {
        match rx.recv().await {
            Ok(CycleEvent::StateChanged { state, .. }) => println!("{}", state),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Status display skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn init_tracing(level: &str, file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ppk_opener={0},ppk_common={0}", level)));

    match file {
        Some(path) => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(log_file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}
