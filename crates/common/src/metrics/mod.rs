//! Metrics and observability utilities
//!
//! Prometheus metric descriptions and recording helpers with standardized
//! naming. The exporter itself is installed by the API binary.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Paper Curator metrics
pub const METRICS_PREFIX: &str = "paper_curator";

/// Histogram buckets for search latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of hits returned from the last search"
    );

    // Database session metrics
    describe_counter!(
        format!("{}_db_sessions_total", METRICS_PREFIX),
        Unit::Count,
        "Database sessions opened"
    );

    describe_gauge!(
        format!("{}_db_sessions_active", METRICS_PREFIX),
        Unit::Count,
        "Database sessions currently open"
    );

    // Indexing metrics
    describe_counter!(
        format!("{}_papers_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Papers indexed into OpenSearch"
    );

    describe_counter!(
        format!("{}_index_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Papers that failed to index"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, latest_papers: bool, result_count: usize) {
    let order = if latest_papers { "date" } else { "relevance" };

    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "order" => order
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "order" => order
    )
    .record(duration_secs);

    gauge!(format!("{}_search_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Helper to record the number of open database sessions
pub fn record_sessions(active: usize, opened: bool) {
    if opened {
        counter!(format!("{}_db_sessions_total", METRICS_PREFIX)).increment(1);
    }
    gauge!(format!("{}_db_sessions_active", METRICS_PREFIX)).set(active as f64);
}

/// Helper to record indexing results
pub fn record_indexing(success: usize, failed: usize) {
    counter!(format!("{}_papers_indexed_total", METRICS_PREFIX)).increment(success as u64);
    counter!(format!("{}_index_failures_total", METRICS_PREFIX)).increment(failed as u64);
}
