mod console;
mod utils;

pub mod audio;
pub mod catalog;
pub mod models;
pub mod playback;
pub mod settings;
pub mod timing;
pub mod viewport;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

use audio::AudioEngineHandle;
use catalog::CollectionCatalog;
use console::Console;
use settings::SettingsStore;
use viewport::DeviceClass;

pub use utils::format_clock;

#[derive(Debug, Parser)]
#[command(name = "recital", version, about = "Play verse collections and time them against a recording")]
struct Cli {
    /// Directory holding the collection files and recordings.
    #[arg(long, env = "RECITAL_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Settings file; defaults to `settings.json` in the data directory.
    #[arg(long, env = "RECITAL_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available collections.
    List,
    /// Listen to a collection verse by verse or all the way through.
    Play { collection: String },
    /// Capture verse timings against the collection's master recording.
    Annotate { collection: String },
}

pub fn run() -> Result<()> {
    // Info by default; RUST_LOG still wins
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    log::info!("recital starting up with data in {}", cli.data_dir.display());

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("settings.json"));
    let settings = Arc::new(SettingsStore::new(settings_path)?);
    let catalog = CollectionCatalog::open(&cli.data_dir)
        .with_context(|| format!("Failed to open collections in {}", cli.data_dir.display()))?;
    let console = Console::new(
        catalog,
        settings,
        AudioEngineHandle::new(),
        DeviceClass::detect(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        match cli.command {
            Command::List => {
                console.print_collections();
                Ok(())
            }
            Command::Play { collection } => console.run_viewer(&collection, cancel).await,
            Command::Annotate { collection } => console.run_editor(&collection, cancel).await,
        }
    })
}
