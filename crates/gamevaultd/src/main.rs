use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gamevault::{load_config, Actor, Vault, VaultConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "gamevault=info,gamevaultd=info";

#[derive(Parser)]
#[command(name = "gamevaultd")]
#[command(about = "Game image store: ingestion, background hashing and integrity reports")]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "GAMEVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured database path
    #[arg(long, env = "GAMEVAULT_DATABASE")]
    database: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run background hashing until interrupted (default)
    Serve {
        /// Rescan every registered directory before hashing starts
        #[arg(long)]
        rescan: bool,
    },
    /// Scan a directory once and register new game files
    Scan { path: PathBuf },
    /// Register a directory as a scan root
    AddDir { path: PathBuf },
    /// List registered scan roots
    Dirs,
    /// Run a single hash sweep and exit
    Sweep,
    /// Print the moderation queue
    Corrupt,
    /// Print recent activity
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
}

fn init_logging(json: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer()))
    };
    installed.context("Failed to install tracing subscriber")?;

    // The library logs through the `log` facade.
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;
    Ok(())
}

fn load(cli: &Cli) -> Result<VaultConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => VaultConfig::default(),
    };
    if let Some(db) = &cli.database {
        config.database_path = Some(db.clone());
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn serve(mut vault: Vault, config: &VaultConfig, rescan: bool) -> Result<()> {
    let actor = Actor::system();

    if rescan {
        let summary = vault.rescan_all(&actor)?;
        info!(
            added = summary.added,
            skipped = summary.skipped,
            failed = summary.failed,
            "Startup rescan finished"
        );
    }

    if !config.hashing.enabled {
        warn!("Background hashing disabled by config; nothing to do");
        return Ok(());
    }

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let handle = vault.start_hashing()?;
    info!(
        initial_delay_secs = config.hashing.initial_delay_secs,
        interval_secs = config.hashing.interval_secs,
        "Hash scheduler running; press Ctrl-C to stop"
    );

    let _ = stop_rx.recv();
    info!("Shutting down, waiting for the current entry to finish");
    vault.stop_hashing();
    if handle.join().is_err() {
        warn!("Hash scheduler thread panicked");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    let config = load(&cli)?;
    let vault = Vault::open(&config).context("Failed to open the store")?;
    let actor = Actor::system();

    info!("gamevaultd v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve { rescan: false }) {
        Command::Serve { rescan } => serve(vault, &config, rescan)?,
        Command::Scan { path } => print_json(&vault.scan_directory(&path, &actor)?)?,
        Command::AddDir { path } => print_json(&vault.register_directory(&path, &actor)?)?,
        Command::Dirs => print_json(&vault.list_directories()?)?,
        Command::Sweep => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build runtime")?;
            print_json(&rt.block_on(vault.sweep_once())?)?;
        }
        Command::Corrupt => print_json(&vault.list_corrupt_entries()?)?,
        Command::Activity { limit } => print_json(&vault.recent_activity(limit)?)?,
    }

    Ok(())
}
