//! Live-board analysis host.
//!
//! Reads board snapshots as JSON lines on stdin, analyses each settled
//! position with a UCI engine at increasing depths, and writes progress,
//! final results and diagnostics as JSON lines on stdout. Logs go to stderr.

mod config;
mod session;
mod watcher;

use anyhow::Context;
use chess_analysis::{AnalysisUpdate, BoardSnapshot};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use config::AssistConfig;
use watcher::Watcher;

/// Live-board analysis host.
#[derive(Parser)]
#[command(name = "assist-bridge")]
#[command(about = "Analyses board snapshots from stdin with a UCI engine")]
struct Args {
    /// Path to the configuration file (default: search for assist.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine command line, overriding the configured one
    #[arg(long)]
    engine: Option<String>,

    /// Comma-separated search depths, e.g. 8,12,15
    #[arg(long, value_delimiter = ',')]
    depths: Option<Vec<u32>>,

    /// Debounce period in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut AssistConfig) {
        if let Some(engine) = self.engine {
            config.engine.command = engine;
        }
        if let Some(depths) = self.depths {
            config.depths = depths;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    let args = Args::parse();

    let mut config = AssistConfig::load(args.config.as_deref())
        .await
        .context("loading configuration")?;
    args.apply(&mut config);
    config.validate()?;

    tracing::info!("Starting assist-bridge");
    tracing::info!("Engine: {}", config.engine.command);
    tracing::info!("Depths: {:?}", config.depths);
    tracing::info!("Debounce: {}ms", config.debounce_ms);

    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_results(results_rx));

    // A blocking stdin read cannot be cancelled, so it lives on a thread
    // that is never joined and dies with the process.
    let (snapshot_tx, snapshot_rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("snapshot-reader".to_string())
        .spawn(move || read_snapshots(snapshot_tx))
        .context("starting stdin reader")?;

    let (line_tx, line_rx) = mpsc::channel(256);
    let (watcher, process) = Watcher::new(config.depths.clone(), config.debounce(), results_tx)
        .spawn_engine(&config.engine.command, line_tx);

    tokio::select! {
        _ = watcher.run(snapshot_rx, line_rx) => {
            tracing::info!("Input closed");
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Some(process) = process {
        process.stop().await;
    }
    writer.await??;
    Ok(())
}

/// Parses one snapshot per stdin line. Malformed lines are logged and skipped.
fn read_snapshots(tx: mpsc::Sender<BoardSnapshot>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BoardSnapshot>(&line) {
            Ok(snapshot) => {
                if tx.blocking_send(snapshot).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("Ignoring malformed snapshot: {}", e),
        }
    }
}

async fn write_results(mut rx: mpsc::UnboundedReceiver<AnalysisUpdate>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(update) = rx.recv().await {
        let mut line = serde_json::to_string(&update)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
