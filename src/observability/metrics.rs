//! Prune metrics.
//!
//! Recorded through the `metrics` facade when the `prometheus` feature is
//! enabled; the host application installs the exporter. Without the feature
//! every function here compiles to nothing.

#[cfg(feature = "prometheus")]
use metrics::counter;

/// Record records removed by a prune run.
///
/// # Arguments
/// * `model` - The model whose records were removed
/// * `count` - The number of records removed
pub fn record_prune_deletion(model: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "prune_records_removed_total",
            "model" => model.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (model, count);
    }
}

/// Record a prune run refused because of misconfiguration.
pub fn record_prune_refusal(model: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "prune_refusals_total",
            "model" => model.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = model;
    }
}

/// Record a prune run that failed in the storage layer.
pub fn record_prune_failure(model: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "prune_failures_total",
            "model" => model.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = model;
    }
}
