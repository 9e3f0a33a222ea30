//! matchd -- network job scheduler for MATCH `calcsfh` runs.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:42424, 8 workers
//! matchd
//!
//! # Config file plus overrides
//! matchd --config config/matchd.toml --port 5000 --workers 4
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;

use matchd_core::Config;
use matchd_scheduler::{BatchWriter, FileBatchWriter, Scheduler, SchedulerConfig, ShellExecutor};

/// Accepts job lines over TCP and runs them on a bounded worker pool.
#[derive(Parser, Debug)]
#[command(name = "matchd", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "MATCHD_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Maximum concurrent jobs (overrides config).
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds to wait for canceled jobs on shutdown.
    #[arg(long, default_value_t = 10)]
    shutdown_grace: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(workers) = cli.workers {
        config.scheduler.worker_limit = workers;
    }
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let batch: Option<Arc<dyn BatchWriter>> = match (&config.batch.path, config.batch.enabled) {
        (Some(path), true) => Some(Arc::new(
            FileBatchWriter::open(path, config.batch.max_entries).context("failed to open batch file")?,
        )),
        _ => None,
    };
    let scheduler = Scheduler::new(SchedulerConfig::from(&config), Arc::new(ShellExecutor), batch);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(matchd_server::serve(listener, scheduler.clone(), shutdown_rx));

    shutdown_signal().await;
    tracing::info!("shutdown signal received; canceling jobs");
    let _ = shutdown_tx.send(true);
    scheduler.shutdown(Duration::from_secs(cli.shutdown_grace)).await;
    server.await.context("server task panicked")??;

    tracing::info!("matchd exited");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
