//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

/// Files currently holding at least one occurrence.
pub static INDEXED_FILES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tagindex_indexed_files", "Files with at least one marker").unwrap()
});

/// Occurrences across the whole index.
pub static OCCURRENCES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tagindex_occurrences", "Total marker occurrences").unwrap()
});

/// Tasks waiting in the scheduler.
pub static PENDING_TASKS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tagindex_pending_tasks", "Scan tasks waiting to be drained").unwrap()
});

/// Files whose content was read and scanned.
pub static FILES_SCANNED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tagindex_files_scanned_total", "Files read and scanned").unwrap()
});

/// Files skipped as unreadable, binary, or oversized.
pub static FILES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tagindex_files_skipped_total",
        "Files skipped as unreadable, binary, or oversized"
    )
    .unwrap()
});

/// Successful cache saves.
pub static CACHE_SAVES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tagindex_cache_saves_total", "Successful cache saves").unwrap()
});

/// Failed cache saves.
pub static CACHE_SAVE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("tagindex_cache_save_failures_total", "Failed cache saves").unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*INDEXED_FILES;
    let _ = &*OCCURRENCES;
    let _ = &*PENDING_TASKS;
    let _ = &*FILES_SCANNED;
    let _ = &*FILES_SKIPPED;
    let _ = &*CACHE_SAVES;
    let _ = &*CACHE_SAVE_FAILURES;

    tracing::debug!("Prometheus metrics initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();

        INDEXED_FILES.set(3);
        assert_eq!(INDEXED_FILES.get(), 3);

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "tagindex_indexed_files"));
    }
}
