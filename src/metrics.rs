//! Process-wide MIX metrics: a group of `prometheus` vectors registered
//! behind a `once_cell::sync::Lazy`, the way a long-running service exposes
//! its internal counters for scraping without threading a registry handle
//! through every call site.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGaugeVec};

pub struct MixMetrics {
    /// Completed MIX rounds, by model type.
    pub rounds_total: IntCounterVec,
    /// Peers skipped in a MIX round due to a get_diff/put_diff error.
    pub peer_errors_total: IntCounterVec,
    /// Current size of the LSH diff pool, by owner.
    pub lsh_diff_pool_size: IntGaugeVec,
    /// Current row count, by column table name.
    pub column_table_rows: IntGaugeVec,
}

pub static MIX_METRICS: Lazy<MixMetrics> = Lazy::new(|| MixMetrics {
    rounds_total: prometheus::register_int_counter_vec!(
        "jubatus_mix_rounds_total",
        "Completed MIX rounds",
        &["model_type"]
    )
    .expect("metric registration is infallible at process start"),
    peer_errors_total: prometheus::register_int_counter_vec!(
        "jubatus_mix_peer_errors_total",
        "MIX peers skipped due to a get_diff/put_diff error",
        &["model_type"]
    )
    .expect("metric registration is infallible at process start"),
    lsh_diff_pool_size: prometheus::register_int_gauge_vec!(
        "jubatus_lsh_diff_pool_size",
        "Entries pending fold into the LSH inverted index, by owner",
        &["owner"]
    )
    .expect("metric registration is infallible at process start"),
    column_table_rows: prometheus::register_int_gauge_vec!(
        "jubatus_column_table_rows",
        "Live rows in a column table",
        &["table"]
    )
    .expect("metric registration is infallible at process start"),
});
