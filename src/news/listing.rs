// src/news/listing.rs
//! Paged news listing consumed by the HTTP layer.

use serde::Deserialize;

use crate::news::types::{stored_category_for, NewsRecord};
use crate::store::{NewsStore, StoreResult};

#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub min_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            min_page_size: 5,
            max_page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRequest {
    /// Provider category code; empty or unknown lists the headline feed.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

/// Resolved (category, offset, limit) for a request.
pub fn resolve(req: &ListRequest, limits: PageLimits) -> (&'static str, usize, usize) {
    let size = req
        .page_size
        .clamp(limits.min_page_size as i64, limits.max_page_size as i64) as usize;
    // SQLite takes OFFSET as i64; huge pages saturate to an empty page.
    let skipped = (req.page.max(1) - 1) as u64;
    let offset = skipped
        .saturating_mul(size as u64)
        .min(i64::MAX as u64);
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    (stored_category_for(&req.kind), offset, size)
}

pub fn list_news(
    store: &dyn NewsStore,
    req: &ListRequest,
    limits: PageLimits,
) -> StoreResult<Vec<NewsRecord>> {
    let (category, offset, limit) = resolve(req, limits);
    store.find_by_category(Some(category), offset, limit)
}
