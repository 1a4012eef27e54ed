// src/news/error.rs
//! Error taxonomy of the aggregation pipeline.

use std::fmt;

use thiserror::Error;

/// Failure of one upstream call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure, timeout, or non-2xx status.
    #[error("network error: {0}")]
    Network(String),
    /// Malformed body or a provider-reported logical failure.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CategoryErrorKind {
    #[error("fetching news failed: {0}")]
    Network(String),
    #[error("decoding provider response failed: {0}")]
    Decode(String),
    #[error("saving news failed: {0}")]
    Persistence(String),
    #[error("run deadline elapsed before the fetch started")]
    Timeout,
    #[error("category task aborted: {0}")]
    Aborted(String),
}

impl CategoryErrorKind {
    /// Stable short name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryErrorKind::Network(_) => "network",
            CategoryErrorKind::Decode(_) => "decode",
            CategoryErrorKind::Persistence(_) => "persistence",
            CategoryErrorKind::Timeout => "timeout",
            CategoryErrorKind::Aborted(_) => "aborted",
        }
    }
}

impl From<FetchError> for CategoryErrorKind {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Network(m) => CategoryErrorKind::Network(m),
            FetchError::Decode(m) => CategoryErrorKind::Decode(m),
        }
    }
}

/// One category's failure, tagged with the category's display label.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{label}] {kind}")]
pub struct CategoryError {
    pub label: String,
    pub kind: CategoryErrorKind,
}

/// All category failures of one run, joined into a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedError(pub Vec<CategoryError>);

impl JoinedError {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn errors(&self) -> &[CategoryError] {
        &self.0
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedError {}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("{n} news categories failed:\n{0}", n = .0.len())]
    Categories(JoinedError),
    #[error("a news run is already in progress")]
    AlreadyRunning,
}
