//! RUM Probe
//!
//! Standalone binary that runs the latency measurement engine once (or on a
//! repeat interval) and prints the engine counters when done.
//!
//! Usage:
//!   rum_probe --key <32-char key> [--config settings.toml] [--repeat-ms 60000]
//!
//! Environment Variables:
//!   RUM_KEY - Report key (alternative to --key)
//!   RUM_CONFIG_URL, RUM_ROOT_DOMAIN, RUM_REQUEST_TIMEOUT_MS,
//!   RUM_REPEAT_INTERVAL_MS, RUM_USER_AGENT - Settings when no --config is given

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rum_latency::rum::{HttpTransport, RumEngine, RumSettings, RunPhase};

#[derive(Parser, Debug)]
#[command(name = "rum_probe")]
#[command(about = "Measure real-user latency to the configured endpoints and report it")]
struct Args {
    /// Report key (32 characters)
    #[arg(short, long, env = "RUM_KEY")]
    key: String,

    /// Path to TOML settings file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the catalog URL
    #[arg(long)]
    config_url: Option<String>,

    /// Keep measuring every N milliseconds until Ctrl+C
    #[arg(long)]
    repeat_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut settings = load_settings(args.config.as_deref()).await?;
    if let Some(url) = args.config_url {
        settings.config_url = url;
    }
    if let Some(ms) = args.repeat_ms.filter(|&ms| ms > 0) {
        settings.repeat_interval = Some(Duration::from_millis(ms));
    }
    let repeating = settings.repeat_interval.is_some();

    info!("Catalog: {}", settings.config_url);
    info!("Root domain: {}", settings.root_domain);

    let transport = Arc::new(HttpTransport::new(&settings)?);
    let engine = RumEngine::new(settings, transport).context("Failed to create RUM engine")?;

    engine.set_key(&args.key).context("Rejected RUM key")?;

    let mut phases = engine.subscribe();
    engine.set_enabled(true).context("Failed to enable RUM engine")?;

    if repeating {
        info!("Measuring until Ctrl+C");
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    } else {
        tokio::select! {
            phase = phases.wait_for(|p| p.is_terminal()) => {
                match phase.map(|p| *p) {
                    Ok(RunPhase::Completed) => info!("Run completed"),
                    Ok(other) => warn!("Run ended as {:?}", other),
                    Err(_) => warn!("Engine stopped publishing phases"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    engine.set_enabled(false)?;
    if engine.phase() != RunPhase::Disabled {
        // Give a canceled run a moment to wind down
        let _ = tokio::time::timeout(
            Duration::from_secs(2),
            phases.wait_for(|p| *p == RunPhase::Disabled),
        )
        .await;
    }

    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    Ok(())
}

async fn load_settings(path: Option<&str>) -> Result<RumSettings> {
    match path {
        Some(path) => {
            info!("Loading settings from {}", path);
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path))?;
            RumSettings::from_toml_str(&content)
                .with_context(|| format!("Failed to parse {}", path))
        }
        None => Ok(RumSettings::from_env()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root_domain = \"rum.example.org\"").unwrap();
        writeln!(file, "repeat_interval = 5000").unwrap();

        let settings = load_settings(file.path().to_str()).await.unwrap();
        assert_eq!(settings.root_domain, "rum.example.org");
        assert_eq!(settings.repeat_interval, Some(Duration::from_millis(5000)));
        assert_eq!(settings.config_url, RumSettings::default().config_url);
    }

    #[tokio::test]
    async fn test_load_settings_rejects_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout = \"soon\"").unwrap();
        assert!(load_settings(file.path().to_str()).await.is_err());

        assert!(load_settings(Some("/nonexistent/rum.toml")).await.is_err());
    }
}
