//! Metric recording helpers organized by phase
//!
//! These use the `metrics` facade; without an installed recorder every call
//! is a no-op, so library code records unconditionally.

/// Cleaning stage metrics
pub mod cleaning {
    /// Rows loaded from the input artifact
    pub fn rows_read(count: usize) {
        ::metrics::counter!("cleaning_rows_read_total").increment(count as u64);
    }

    /// Rows removed by the price filter
    pub fn rows_dropped(count: usize) {
        ::metrics::counter!("cleaning_rows_dropped_total").increment(count as u64);
    }

    /// Rows written to the cleaned artifact
    pub fn rows_written(count: usize) {
        ::metrics::counter!("cleaning_rows_written_total").increment(count as u64);
    }

    /// Dates replaced by missing values under the coerce policy
    pub fn dates_coerced(count: usize) {
        ::metrics::counter!("cleaning_dates_coerced_total").increment(count as u64);
    }

    pub fn run_succeeded() {
        ::metrics::counter!("cleaning_runs_total", "outcome" => "succeeded").increment(1);
    }

    pub fn run_failed(kind: &'static str) {
        ::metrics::counter!("cleaning_runs_total", "outcome" => "failed", "error" => kind)
            .increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!("cleaning_run_duration_seconds").record(secs);
    }
}

/// Artifact store metrics
pub mod store {
    pub fn publish_success(bytes: u64) {
        ::metrics::counter!("artifact_store_publish_total", "result" => "new_version").increment(1);
        ::metrics::counter!("artifact_store_bytes_published_total").increment(bytes);
    }

    /// Publish of content identical to the latest version
    pub fn publish_deduplicated() {
        ::metrics::counter!("artifact_store_publish_total", "result" => "deduplicated").increment(1);
    }

    pub fn resolve_error() {
        ::metrics::counter!("artifact_store_resolve_errors_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        cleaning::rows_read(3);
        cleaning::run_failed("parse");
        cleaning::duration(0.01);
        store::publish_success(128);
        store::publish_deduplicated();
    }
}
