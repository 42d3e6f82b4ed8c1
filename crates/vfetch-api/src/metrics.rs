//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

/// Install the global Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vfetch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vfetch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vfetch_http_requests_in_flight";

    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "vfetch_jobs_submitted_total";
    pub const FILES_SERVED_TOTAL: &str = "vfetch_files_served_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vfetch_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a download job accepted for processing.
pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record an artifact handed out to a client.
pub fn record_file_served() {
    counter!(names::FILES_SERVED_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

fn uuid_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(
            r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        )
        .expect("valid uuid pattern")
    })
}

fn filename_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"^/downloads/([^/]+)/[^/]+$").expect("valid filename pattern")
    })
}

/// Sanitize path for metrics labels (remove job ids and file names).
fn sanitize_path(path: &str) -> String {
    let path = filename_pattern().replace(path, "/downloads/$1/:filename");
    uuid_pattern().replace_all(&path, ":id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
