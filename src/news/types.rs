// src/news/types.rs
use serde::{Deserialize, Serialize};

/// A single news item as delivered by the provider and persisted in the store.
///
/// `uniquekey` is the provider's stable id and the upsert key. Every other field
/// is overwritten on re-fetch. Fields the provider omits decode as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NewsRecord {
    pub uniquekey: String,
    pub title: String,
    pub date: String, // provider format, e.g. "2025-03-01 10:24:00"; never parsed
    pub category: String,
    pub author_name: String,
    pub url: String,
    pub thumbnail_pic_s: String,
    pub thumbnail_pic_s02: String,
    pub thumbnail_pic_s03: String,
    pub is_content: String,
}

/// Provider category code (empty string = recommended/top) plus its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub code: &'static str,
    pub label: &'static str,
}

impl Category {
    pub const fn new(code: &'static str, label: &'static str) -> Self {
        Self { code, label }
    }
}

/// The fixed category set refreshed on every run.
pub const CATEGORIES: &[Category] = &[
    Category::new("", "推荐"),
    Category::new("guonei", "国内"),
    Category::new("tiyu", "体育"),
    Category::new("keji", "科技"),
    Category::new("youxi", "游戏"),
];

/// Category label the provider stamps on records for a given listing code.
/// Unknown and empty codes fall back to the headline feed.
pub fn stored_category_for(code: &str) -> &'static str {
    match code {
        "guonei" => "国内",
        "tiyu" => "体育",
        "keji" => "科技",
        "youxi" => "游戏",
        _ => "头条",
    }
}
