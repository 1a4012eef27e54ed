// src/news/scheduler.rs
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::Span;

use crate::news::aggregator::{Aggregator, RunReport};
use crate::news::error::RunError;

impl Aggregator {
    /// Start the recurring schedule, optionally after one awaited run.
    ///
    /// Ticks every `cfg.interval` measured from the moment the schedule starts. Runs
    /// never overlap: the loop awaits each run, and ticks that fall due meanwhile are
    /// skipped rather than queued. Failures are logged; the loop never exits.
    pub async fn start(self: Arc<Self>, run_immediately: bool) -> JoinHandle<()> {
        if run_immediately {
            log_outcome(&self.span, "initial", self.run_once().await);
        }

        let period = self.cfg.interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                parent: &self.span,
                interval_mins = period.as_secs() / 60,
                "news schedule started"
            );
            loop {
                ticker.tick().await;
                log_outcome(&self.span, "scheduled", self.run_once().await);
            }
        })
    }
}

fn log_outcome(span: &Span, trigger: &'static str, outcome: Result<RunReport, RunError>) {
    match outcome.and_then(RunReport::into_result) {
        Ok(report) => tracing::info!(parent: span, trigger, upserted = report.upserted, "news run ok"),
        Err(RunError::AlreadyRunning) => {
            tracing::warn!(parent: span, trigger, "previous news run still in progress, tick skipped")
        }
        Err(e) => tracing::error!(parent: span, trigger, error = %e, "news run failed"),
    }
}
