//! dhstore service binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dhstore_server::{build_router, metrics, AppState};
use dhstore_storage::{DhStore, RocksConfig, RocksDhStore};

#[derive(Parser)]
#[command(name = "dhstore", version)]
#[command(about = "Indexing store for privacy-preserving content discovery")]
struct Args {
    /// Directory the store data is persisted under.
    #[arg(long, default_value = "./dhstore/store")]
    store_path: PathBuf,

    /// HTTP API listen address.
    #[arg(long, default_value = "0.0.0.0:40080")]
    listen_addr: SocketAddr,

    /// Prometheus metrics listen address.
    #[arg(long, default_value = "0.0.0.0:40081")]
    metrics_addr: SocketAddr,

    /// Logging directives. Only applied if RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable the write-ahead log. Unflushed writes are lost on crash.
    #[arg(long)]
    disable_wal: bool,

    /// Block cache capacity. Plain bytes, or with an Mi/Gi suffix.
    #[arg(long, default_value = "1Gi", value_parser = parse_bytes_iec)]
    block_cache_size: u64,

    /// Memtable size. Plain bytes, or with an Mi/Gi suffix.
    #[arg(long, default_value = "64Mi", value_parser = parse_bytes_iec)]
    write_buffer_size: u64,

    /// Maximum concurrent background flushes and compactions. As a rule of
    /// thumb set it to the number of CPU cores.
    #[arg(long, default_value_t = 10)]
    max_background_jobs: i32,

    /// L0 file count that triggers a compaction.
    #[arg(long, default_value_t = 2)]
    l0_compaction_threshold: i32,

    /// L0 file count at which writes are stopped.
    #[arg(long, default_value_t = 12)]
    l0_stop_writes_threshold: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = RocksConfig::new()
        .disable_wal(args.disable_wal)
        .block_cache_size(args.block_cache_size as usize)
        .write_buffer_size(args.write_buffer_size as usize)
        .max_background_jobs(args.max_background_jobs)
        .l0_compaction_threshold(args.l0_compaction_threshold)
        .l0_stop_writes_threshold(args.l0_stop_writes_threshold);
    let store = RocksDhStore::open(&args.store_path, config).context("failed to open store")?;
    info!(path = %args.store_path.display(), "store opened");

    metrics::install_prometheus(args.metrics_addr)
        .context("failed to start metrics exporter")?;
    info!(addr = %args.metrics_addr, "metrics exporter started");

    let state = Arc::new(AppState { store });
    let sampler = metrics::spawn_backend_sampler(Arc::clone(&state), Duration::from_secs(10));

    let app = build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(args.listen_addr)
        .await
        .context("failed to bind listen address")?;
    info!(addr = %listener.local_addr()?, "server started");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("terminating");

    sampler.abort();
    match state.store.close() {
        Ok(()) => info!("closed store successfully"),
        Err(e) => warn!(error = %e, "failure occurred while closing store"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("install SIGINT handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };
    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Parses a byte count that may carry an IEC suffix: "1024", "64Mi", "1Gi".
fn parse_bytes_iec(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (number, multiplier) = match s.len().checked_sub(2).map(|at| s.split_at(at)) {
        Some((head, tail)) if tail.eq_ignore_ascii_case("mi") => (head, 1u64 << 20),
        Some((head, tail)) if tail.eq_ignore_ascii_case("gi") => (head, 1u64 << 30),
        _ => (s, 1),
    };
    let n: u64 = number.parse().map_err(|_| format!("invalid byte size: {s}"))?;
    n.checked_mul(multiplier).ok_or_else(|| format!("byte size overflows: {s}"))
}
