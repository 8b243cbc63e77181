mod seed;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use incident_coordination::{EngineConfig, EngineContext, IncidentEngine, MemoryStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use seed::SeedFile;

/// Environment variable consulted when `--config` is not given
const CONFIG_ENV: &str = "SLA_SWEEPER_CONFIG";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine configuration file (TOML); defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Technicians and incidents to load into the in-memory store (TOML)
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Seconds between sweeps, overriding the configuration
    #[arg(long)]
    interval: Option<u64>,

    /// Run a single sweep, print its report as JSON and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            info!("Loading engine config from {}", path.display());
            EngineConfig::from_file(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(secs) = args.interval {
        config.sweep_interval_secs = secs;
        config.validate()?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sla_sweeper=info,incident_coordination=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    info!(
        max_tier = config.max_tier,
        basis = ?config.breach_basis,
        interval_secs = config.sweep_interval_secs,
        "SLA sweeper starting"
    );

    let store = MemoryStore::new().shared();
    let engine = IncidentEngine::new(EngineContext::new(store, config)?);

    if let Some(path) = &args.seed {
        SeedFile::load(path)?
            .apply(&engine, chrono::Utc::now())
            .await?;
    }

    if args.once {
        let report = engine.sweep(&CancellationToken::new()).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let sweeper = engine.spawn_sweeper(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Shutdown requested; stopping sweeper");
    cancel.cancel();
    sweeper.await?;

    let delivered = engine.retry_failed_notifications(3).await;
    if delivered > 0 {
        info!(delivered, "Flushed pending notifications before exit");
    }
    Ok(())
}
