//! Prometheus metrics for retailstore.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides an axum middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "retailstore_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "retailstore_http_request_duration_seconds";

/// Total storage façade operations (counter). Labels: kind, operation, status.
pub const STORAGE_OPERATIONS_TOTAL: &str = "retailstore_storage_operations_total";

/// Total bytes accepted through blob and file uploads (counter). Labels: kind.
pub const UPLOAD_BYTES_TOTAL: &str = "retailstore_upload_bytes_total";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.  Idempotent.  Fails only if some
/// other recorder was installed first.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        STORAGE_OPERATIONS_TOTAL,
        "Total storage operations by kind and outcome"
    );
    describe_counter!(UPLOAD_BYTES_TOTAL, "Total bytes uploaded to blobs and files");
}

/// Count one façade call.  A no-op until a recorder is installed.
pub fn record_storage_op(kind: &'static str, operation: &'static str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    counter!(STORAGE_OPERATIONS_TOTAL, "kind" => kind, "operation" => operation, "status" => status)
        .increment(1);
}

/// Count bytes written by an upload.
pub fn record_upload_bytes(kind: &'static str, bytes: usize) {
    counter!(UPLOAD_BYTES_TOTAL, "kind" => kind).increment(bytes as u64);
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize an actual request path to a route template for metric labels.
///
/// Customer identifiers are the only variable path segment:
/// - `/customers/3f2a.../edit` -> `/customers/{row_key}/edit`
/// - `/customers/3f2a.../delete` -> `/customers/{row_key}/delete`
///
/// Unknown paths collapse into `/other`.
fn normalize_path(path: &str) -> String {
    const FIXED: &[&str] = &[
        "/",
        "/health",
        "/metrics",
        "/customers",
        "/blobs",
        "/blobs/upload",
        "/blobs/delete",
        "/blobs/rename",
        "/files",
        "/files/upload",
        "/files/delete",
        "/files/rename",
        "/queue",
        "/queue/send",
        "/queue/delete",
    ];
    if FIXED.contains(&path) {
        return path.to_string();
    }
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["customers", _, action @ ("edit" | "delete")] => format!("/customers/{{row_key}}/{action}"),
        _ => "/other".to_string(),
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

// -- Tests --------------------------------------------------------------------
