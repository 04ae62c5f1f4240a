//! Prometheus exporter and request instrumentation.
//!
//! The exporter listens on its own address, separate from the API. Backend
//! health counters are sampled on an interval and republished as gauges;
//! the store's role ends at exposing the snapshot. HTTP latency histograms
//! are recorded by [`track_http_metrics`], installed as router middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::task::JoinHandle;

use dhstore_storage::BackendMetrics;

use crate::routes::AppState;

/// Starts the Prometheus scrape endpoint on `addr`.
///
/// # Errors
///
/// Returns [`BuildError`] when the exporter cannot be installed, e.g. when
/// the address is already bound.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Periodically republishes the backend's health counters as gauges.
///
/// Runs until aborted.
pub fn spawn_backend_sampler(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            record_backend_metrics(&state.store.backend_metrics());
        }
    })
}

fn record_backend_metrics(snapshot: &BackendMetrics) {
    let gauges = [
        ("dhstore_backend_l0_files", snapshot.l0_files),
        ("dhstore_backend_running_flushes", snapshot.running_flushes),
        ("dhstore_backend_running_compactions", snapshot.running_compactions),
        ("dhstore_backend_pending_compaction_bytes", snapshot.pending_compaction_bytes),
        ("dhstore_backend_block_cache_usage_bytes", snapshot.block_cache_usage),
        ("dhstore_backend_block_cache_capacity_bytes", snapshot.block_cache_capacity),
        ("dhstore_backend_memtable_bytes", snapshot.memtable_bytes),
        ("dhstore_backend_estimated_keys", snapshot.estimated_keys),
        ("dhstore_backend_live_data_bytes", snapshot.live_data_size),
        ("dhstore_backend_background_errors", snapshot.background_errors),
    ];
    for (name, value) in gauges {
        if let Some(value) = value {
            ::metrics::gauge!(name).set(value as f64);
        }
    }
}

/// Router middleware recording a latency histogram per route, method and
/// status.
pub async fn track_http_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path().to_owned(), |matched| matched.as_str().to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    ::metrics::histogram!(
        "dhstore_http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => response.status().as_u16().to_string(),
    )
    .record(start.elapsed().as_secs_f64());

    response
}
