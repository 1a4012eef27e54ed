// src/store/mod.rs
//! Persistence seams. The aggregator and the HTTP handlers only see these traits.

pub mod sqlite;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::news::types::NewsRecord;
use crate::users::User;

pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("email already registered")]
    EmailTaken,

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-addressable news store. Writes are keyed by `uniquekey`, never by category.
pub trait NewsStore: Send + Sync {
    /// Insert or fully overwrite every record; returns the number of rows written.
    fn upsert_batch(&self, records: &[NewsRecord]) -> StoreResult<usize>;

    /// Newest first. `category = None` lists everything.
    fn find_by_category(
        &self,
        category: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<NewsRecord>>;

    fn get_by_key(&self, uniquekey: &str) -> StoreResult<Option<NewsRecord>>;

    fn count_news(&self) -> StoreResult<usize>;
}

/// Login bookkeeping written on every successful sign-in.
#[derive(Debug, Clone)]
pub struct LoginUpdate {
    pub token: String,
    pub at: DateTime<Utc>,
    pub ip: String,
}

pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::EmailTaken` when the email is already registered.
    fn create_user(&self, user: &User) -> StoreResult<()>;
    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn user_by_uid(&self, uid: &str) -> StoreResult<Option<User>>;
    fn record_login(&self, uid: &str, update: &LoginUpdate) -> StoreResult<()>;
}
