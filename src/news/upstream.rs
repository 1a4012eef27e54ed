// src/news/upstream.rs
//! Upstream news provider client: one bounded GET per category, decoded into `NewsRecord`s.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{Instrument, Span};

use crate::news::error::FetchError;
use crate::news::types::{Category, NewsRecord};

pub const DEFAULT_ENDPOINT: &str = "http://v.juhe.cn/toutiao/index";
pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce the current news list for a category.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, category: &Category) -> Result<Vec<NewsRecord>, FetchError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    reason: String,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    result: Option<ProviderResult>,
}

#[derive(Debug, Deserialize)]
struct ProviderResult {
    data: Vec<NewsRecord>,
}

/// HTTP client for the toutiao headline API.
pub struct HeadlineClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    page_size: u32,
    span: Span,
}

impl HeadlineClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("newsfeed-api/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building upstream http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            span: Span::none(),
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Parent span for every request this client makes.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn decode(body: &[u8]) -> Result<Vec<NewsRecord>, FetchError> {
        let parsed: ProviderResponse =
            serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

        if let Some(code) = parsed.error_code.filter(|c| *c != 0) {
            return Err(FetchError::Decode(format!(
                "provider reported failure: {} (error_code {code})",
                parsed.reason
            )));
        }

        match parsed.result {
            Some(r) => Ok(r.data),
            None => Err(FetchError::Decode(format!(
                "response carries no result: {}",
                parsed.reason
            ))),
        }
    }
}

#[async_trait]
impl NewsSource for HeadlineClient {
    async fn fetch(&self, category: &Category) -> Result<Vec<NewsRecord>, FetchError> {
        let span = tracing::info_span!(parent: &self.span, "upstream_fetch", category = category.label);

        async move {
            let page_size = self.page_size.to_string();
            let query = [
                ("key", self.api_key.as_str()),
                ("type", category.code),
                ("page", "1"),
                ("page_size", page_size.as_str()),
                ("is_filter", "0"),
            ];

            let body = self
                .http
                .get(&self.endpoint)
                .query(&query)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(FetchError::from)?
                .bytes()
                .await
                .map_err(FetchError::from)?;

            let records = Self::decode(&body)?;
            tracing::debug!(count = records.len(), "provider response decoded");
            Ok::<_, FetchError>(records)
        }
        .instrument(span)
        .await
    }

    fn name(&self) -> &'static str {
        "toutiao"
    }
}
