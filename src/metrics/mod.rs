use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Items handled by workers, by outcome (success, failure)
    pub static ref ITEMS_TOTAL: CounterVec = register_counter_vec!(
        "catalog_migrate_items_total",
        "Total number of work items processed by batch workers",
        &["job", "outcome"]
    ).unwrap();

    /// Wall time of each worker from context creation to sink close
    pub static ref WORKER_DURATION: HistogramVec = register_histogram_vec!(
        "catalog_migrate_worker_duration_seconds",
        "Time taken by a single batch worker",
        &["job"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    ).unwrap();

    /// Workers currently running
    pub static ref ACTIVE_WORKERS: GaugeVec = register_gauge_vec!(
        "catalog_migrate_active_workers",
        "Number of batch workers currently running",
        &["job"]
    ).unwrap();

    /// Workers that stopped on a fatal error
    pub static ref WORKER_FATAL_TOTAL: CounterVec = register_counter_vec!(
        "catalog_migrate_worker_fatal_total",
        "Total number of batch workers that stopped on a fatal error",
        &["job"]
    ).unwrap();

    /// Rows written to merged output artifacts
    pub static ref MERGED_ROWS_TOTAL: CounterVec = register_counter_vec!(
        "catalog_migrate_merged_rows_total",
        "Total number of rows written to merged output files",
        &["job"]
    ).unwrap();

    /// REST calls made against source and target environments
    pub static ref API_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "catalog_migrate_api_requests_total",
        "Total number of API requests",
        &["method", "status"]
    ).unwrap();

    /// REST call duration
    pub static ref API_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "catalog_migrate_api_request_duration_seconds",
        "API request duration in seconds",
        &["method"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}

/// Record one processed item
pub fn record_item(job: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ITEMS_TOTAL.with_label_values(&[job, outcome]).inc();
}

/// Track a worker starting
pub fn worker_started(job: &str) {
    ACTIVE_WORKERS.with_label_values(&[job]).inc();
}

/// Track a worker returning its summary
pub fn worker_finished(job: &str, duration: Duration, fatal: bool) {
    ACTIVE_WORKERS.with_label_values(&[job]).dec();
    WORKER_DURATION
        .with_label_values(&[job])
        .observe(duration.as_secs_f64());
    if fatal {
        WORKER_FATAL_TOTAL.with_label_values(&[job]).inc();
    }
}

/// Track a worker whose thread never started
pub fn worker_spawn_failed(job: &str) {
    WORKER_FATAL_TOTAL.with_label_values(&[job]).inc();
}

/// Record rows written by a merge
pub fn record_merged_rows(job: &str, rows: usize) {
    MERGED_ROWS_TOTAL
        .with_label_values(&[job])
        .inc_by(rows as f64);
}

/// Record API request
pub fn record_api_request(method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    API_REQUESTS_TOTAL
        .with_label_values(&[method, &status_str])
        .inc();
    API_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
}

/// Export metrics in Prometheus format
pub fn export_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
