// tests/helpers/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use newsfeed_api::news::{Category, FetchError, NewsRecord, NewsSource};

/// Source whose answer per category code is scripted by the test.
/// Codes without a script answer with an empty list.
#[derive(Default)]
pub struct ScriptedSource {
    answers: Mutex<HashMap<String, Result<Vec<NewsRecord>, FetchError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, code: &str, answer: Result<Vec<NewsRecord>, FetchError>) {
        self.answers.lock().unwrap().insert(code.to_string(), answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsSource for ScriptedSource {
    async fn fetch(&self, category: &Category) -> Result<Vec<NewsRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(category.code.to_string());
        self.answers
            .lock()
            .unwrap()
            .get(category.code)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn record(key: &str, title: &str, category: &str) -> NewsRecord {
    NewsRecord {
        uniquekey: key.to_string(),
        title: title.to_string(),
        date: "2025-03-01 10:00:00".to_string(),
        category: category.to_string(),
        author_name: "desk".to_string(),
        url: format!("https://example.com/{key}"),
        is_content: "1".to_string(),
        ..Default::default()
    }
}

pub fn records(prefix: &str, n: usize, category: &str) -> Vec<NewsRecord> {
    (0..n)
        .map(|i| record(&format!("{prefix}-{i}"), &format!("{prefix} story {i}"), category))
        .collect()
}

/// Poll `cond` on the (possibly paused) tokio clock, one second per step.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..120 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    cond()
}
