// tests/aggregator_run.rs
//
// One aggregation run against a scripted source and an in-memory store.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{record, records, ScriptedSource};
use newsfeed_api::news::{
    Aggregator, AggregatorCfg, Category, CategoryErrorKind, FetchError, RunError, CATEGORIES,
};
use newsfeed_api::store::{NewsStore, SqliteStore};

const TOP: Category = Category::new("", "top");
const SPORTS: Category = Category::new("tiyu", "sports");

fn aggregator(
    source: Arc<ScriptedSource>,
    store: Arc<SqliteStore>,
    categories: &[Category],
) -> Aggregator {
    Aggregator::new(source, store, AggregatorCfg::default()).with_categories(categories)
}

#[tokio::test]
async fn rerun_with_identical_data_keeps_n_rows() {
    let source = ScriptedSource::new();
    source.set("", Ok(records("top", 4, "头条")));
    source.set("tiyu", Ok(records("sp", 3, "体育")));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let agg = aggregator(source.clone(), store.clone(), &[TOP, SPORTS]);

    let first = agg.run_once().await.unwrap();
    assert!(first.is_ok());
    assert_eq!(first.upserted, 7);
    assert_eq!(store.count_news().unwrap(), 7);

    agg.run_once().await.unwrap().into_result().unwrap();
    assert_eq!(store.count_news().unwrap(), 7, "second run must not duplicate rows");
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn failing_category_does_not_block_sibling() {
    let source = ScriptedSource::new();
    source.set("", Err(FetchError::Decode("truncated body".into())));
    source.set("tiyu", Ok(records("sp", 2, "体育")));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let agg = aggregator(source, store.clone(), &[TOP, SPORTS]);

    let report = agg.run_once().await.unwrap();
    assert_eq!(store.count_news().unwrap(), 2);
    assert!(store.get_by_key("sp-0").unwrap().is_some());

    match report.into_result() {
        Err(RunError::Categories(joined)) => {
            assert_eq!(joined.labels(), vec!["top"]);
            assert!(matches!(joined.errors()[0].kind, CategoryErrorKind::Decode(_)));
            assert!(!joined.to_string().contains("sports"));
        }
        other => panic!("expected joined failure, got {other:?}"),
    }
}

#[tokio::test]
async fn later_run_overwrites_fields_of_same_key() {
    let source = ScriptedSource::new();
    source.set("tiyu", Ok(vec![record("k1", "first headline", "体育")]));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let agg = aggregator(source.clone(), store.clone(), &[SPORTS]);

    agg.run_once().await.unwrap();
    source.set("tiyu", Ok(vec![record("k1", "corrected headline", "体育")]));
    agg.run_once().await.unwrap();

    assert_eq!(store.count_news().unwrap(), 1);
    let row = store.get_by_key("k1").unwrap().unwrap();
    assert_eq!(row.title, "corrected headline");
}

#[tokio::test]
async fn elapsed_deadline_skips_every_fetch() {
    let source = ScriptedSource::new();
    source.set("", Ok(records("top", 3, "头条")));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let cfg = AggregatorCfg {
        run_timeout: Duration::ZERO,
        ..AggregatorCfg::default()
    };
    let agg = Aggregator::new(source.clone(), store.clone(), cfg).with_categories(&[TOP, SPORTS]);

    let report = agg.run_once().await.unwrap();
    assert_eq!(source.calls(), 0, "no fetch may start after the deadline");
    assert_eq!(store.count_news().unwrap(), 0);
    assert_eq!(report.errors().len(), 2);
    assert!(report
        .errors()
        .iter()
        .all(|e| e.kind == CategoryErrorKind::Timeout));
}

#[tokio::test]
async fn all_failing_lists_every_label_exactly_once() {
    let source = ScriptedSource::new();
    for c in CATEGORIES {
        source.set(c.code, Err(FetchError::Network("connection refused".into())));
    }
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let agg = Aggregator::new(source, store, AggregatorCfg::default());

    let err = agg.run_once().await.unwrap().into_result().unwrap_err();
    let RunError::Categories(joined) = err else {
        panic!("expected category failures");
    };
    let mut labels = joined.labels();
    labels.sort();
    let mut expected: Vec<_> = CATEGORIES.iter().map(|c| c.label).collect();
    expected.sort();
    assert_eq!(labels, expected);
}

#[tokio::test]
async fn all_succeeding_including_empty_is_ok() {
    let source = ScriptedSource::new();
    source.set("", Ok(records("top", 2, "头条")));
    source.set("tiyu", Ok(Vec::new()));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let agg = aggregator(source.clone(), store.clone(), &[TOP, SPORTS]);

    let report = agg.run_once().await.unwrap().into_result().unwrap();
    assert_eq!(report.upserted, 2);
    assert_eq!(source.calls(), 2);
    assert_eq!(store.count_news().unwrap(), 2);
}

#[tokio::test]
async fn top_succeeds_while_sports_times_out() {
    let source = ScriptedSource::new();
    source.set("", Ok(records("top", 5, "头条")));
    source.set(
        "tiyu",
        Err(FetchError::Network("operation timed out".into())),
    );
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let agg = aggregator(source, store.clone(), &[TOP, SPORTS]);

    let err = agg.run_once().await.unwrap().into_result().unwrap_err();
    assert_eq!(store.count_news().unwrap(), 5);
    assert_eq!(store.find_by_category(Some("头条"), 0, 10).unwrap().len(), 5);

    let text = err.to_string();
    assert!(text.contains("sports"), "{text}");
    assert!(!text.contains("top"), "{text}");
}
