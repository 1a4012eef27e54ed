// src/news/aggregator.rs
//! One aggregation run: fan out a fetch per category, persist each batch, join the failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, Span};

use crate::news::ensure_metrics_described;
use crate::news::error::{CategoryError, CategoryErrorKind, JoinedError, RunError};
use crate::news::types::{Category, CATEGORIES};
use crate::news::upstream::NewsSource;
use crate::store::NewsStore;

pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(180 * 60);

#[derive(Clone, Copy, Debug)]
pub struct AggregatorCfg {
    /// Whole-run deadline shared by every category task.
    pub run_timeout: Duration,
    /// Period of the recurring schedule.
    pub interval: Duration,
}

impl Default for AggregatorCfg {
    fn default() -> Self {
        Self {
            run_timeout: DEFAULT_RUN_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Outcome of one run. Populated as category tasks finish, in completion order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub categories: usize,
    pub upserted: usize,
    errors: Vec<CategoryError>,
}

impl RunReport {
    fn new(categories: usize) -> Self {
        Self {
            started_at: Utc::now(),
            categories,
            upserted: 0,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, outcome: Result<usize, CategoryError>) {
        match outcome {
            Ok(n) => self.upserted += n,
            Err(e) => self.errors.push(e),
        }
    }

    pub fn errors(&self) -> &[CategoryError] {
        &self.errors
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// All-or-nothing view: any category error turns the run into one joined failure.
    pub fn into_result(self) -> Result<RunReport, RunError> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(RunError::Categories(JoinedError(self.errors)))
        }
    }
}

pub struct Aggregator {
    source: Arc<dyn NewsSource>,
    store: Arc<dyn NewsStore>,
    categories: Vec<Category>,
    pub(crate) cfg: AggregatorCfg,
    running: tokio::sync::Mutex<()>,
    pub(crate) span: Span,
}

impl Aggregator {
    pub fn new(source: Arc<dyn NewsSource>, store: Arc<dyn NewsStore>, cfg: AggregatorCfg) -> Self {
        Self {
            source,
            store,
            categories: CATEGORIES.to_vec(),
            cfg,
            running: tokio::sync::Mutex::new(()),
            span: Span::none(),
        }
    }

    pub fn with_categories(mut self, categories: &[Category]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    /// Parent span for runs and scheduler events.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Run one full fetch-and-persist cycle across all categories.
    ///
    /// Returns `RunError::AlreadyRunning` if another run holds the guard. Otherwise
    /// always returns the report; category failures live inside it.
    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| RunError::AlreadyRunning)?;
        ensure_metrics_described();

        let span = tracing::info_span!(parent: &self.span, "news_run");
        let report = self.fan_out().instrument(span).await;

        counter!("news_runs_total").increment(1);
        counter!("news_records_upserted_total").increment(report.upserted as u64);
        for e in report.errors() {
            counter!("news_category_errors_total", "kind" => e.kind.as_str()).increment(1);
        }
        gauge!("news_last_run_ts").set(Utc::now().timestamp() as f64);

        Ok(report)
    }

    async fn fan_out(&self) -> RunReport {
        let t0 = std::time::Instant::now();
        let deadline = Instant::now() + self.cfg.run_timeout;
        let mut report = RunReport::new(self.categories.len());

        let mut tasks = JoinSet::new();
        let mut labels = HashMap::new();
        for category in self.categories.iter().copied() {
            let source = Arc::clone(&self.source);
            let store = Arc::clone(&self.store);
            let span = tracing::info_span!("category", category = category.label);
            let handle = tasks.spawn(
                fetch_and_store(source, store, category, deadline).instrument(span),
            );
            labels.insert(handle.id(), category.label);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => report.record(outcome),
                Err(e) => {
                    let label = labels.get(&e.id()).copied().unwrap_or("unknown");
                    report.record(Err(CategoryError {
                        label: label.to_string(),
                        kind: CategoryErrorKind::Aborted(e.to_string()),
                    }));
                }
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_run_duration_ms").record(ms);
        tracing::info!(
            categories = report.categories,
            upserted = report.upserted,
            failed = report.errors().len(),
            duration_ms = ms as u64,
            "news run finished"
        );
        report
    }
}

/// One category: deadline check, fetch, then persist. Fetch strictly precedes persist.
async fn fetch_and_store(
    source: Arc<dyn NewsSource>,
    store: Arc<dyn NewsStore>,
    category: Category,
    deadline: Instant,
) -> Result<usize, CategoryError> {
    let tag = |kind: CategoryErrorKind| CategoryError {
        label: category.label.to_string(),
        kind,
    };

    if Instant::now() >= deadline {
        tracing::warn!("run deadline elapsed, skipping fetch");
        return Err(tag(CategoryErrorKind::Timeout));
    }

    let records = match source.fetch(&category).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "fetching news failed");
            return Err(tag(e.into()));
        }
    };

    if records.is_empty() {
        tracing::info!("no news returned");
        return Ok(0);
    }

    let count = records.len();
    let written = tokio::task::spawn_blocking(move || store.upsert_batch(&records))
        .await
        .map_err(|e| tag(CategoryErrorKind::Aborted(e.to_string())))?
        .map_err(|e| {
            tracing::warn!(error = %e, "saving news failed");
            tag(CategoryErrorKind::Persistence(e.to_string()))
        })?;

    tracing::info!(count, "news saved");
    Ok(written)
}
