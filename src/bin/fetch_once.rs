//! Run one news aggregation against the configured store and print the outcome.

use std::process::ExitCode;

use newsfeed_api::config::AppConfig;
use newsfeed_api::news::RunReport;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let app = match newsfeed_api::app(&cfg) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("startup error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match app.aggregator.run_once().await.and_then(RunReport::into_result) {
        Ok(report) => {
            println!(
                "fetch-once ok: {} categories, {} rows upserted",
                report.categories, report.upserted
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("fetch-once failed: {e}");
            ExitCode::FAILURE
        }
    }
}
