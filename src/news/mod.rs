// src/news/mod.rs
pub mod aggregator;
pub mod error;
pub mod listing;
pub mod scheduler;
pub mod types;
pub mod upstream;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use aggregator::{Aggregator, AggregatorCfg, RunReport};
pub use error::{CategoryError, CategoryErrorKind, FetchError, JoinedError, RunError};
pub use types::{Category, NewsRecord, CATEGORIES};
pub use upstream::{HeadlineClient, NewsSource};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_runs_total", "Completed aggregation runs.");
        describe_counter!(
            "news_records_upserted_total",
            "News rows written by aggregation runs."
        );
        describe_counter!(
            "news_category_errors_total",
            "Per-category failures, labelled by kind."
        );
        describe_histogram!("news_run_duration_ms", "Aggregation run time in milliseconds.");
        describe_gauge!("news_last_run_ts", "Unix ts when the last aggregation run finished.");
    });
}
