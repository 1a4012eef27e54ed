// src/config.rs
//! Application config: TOML file with env overrides for secrets.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::auth::jwt::{DEFAULT_ISSUER, DEFAULT_TOKEN_TTL_HOURS};
use crate::news::aggregator::AggregatorCfg;
use crate::news::listing::PageLimits;
use crate::news::upstream::{DEFAULT_ENDPOINT, DEFAULT_PAGE_SIZE};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_CONFIG_PATH: &str = "APP_CONFIG_PATH";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";
pub const ENV_CONFIG_HOT_RELOAD: &str = "CONFIG_HOT_RELOAD";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub page: PageConfig,
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/newsfeed.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub min_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        let l = PageLimits::default();
        Self {
            min_page_size: l.min_page_size,
            max_page_size: l.max_page_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub interval_minutes: u64,
    pub run_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub page_size: u32,
    pub run_immediately: bool,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            interval_minutes: 180,
            run_timeout_secs: 300,
            request_timeout_secs: 30,
            page_size: DEFAULT_PAGE_SIZE,
            run_immediately: false,
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, then apply env overrides and sanitize.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// $APP_CONFIG_PATH, then config/app.toml, then built-in defaults.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::resolve_path() {
            return Self::load_from(&path);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    /// The file `load()` reads, if any. $APP_CONFIG_PATH is returned even when missing.
    pub fn resolve_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Some(PathBuf::from(p));
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        default_path.exists().then(|| default_path.to_path_buf())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_NEWS_API_KEY) {
            self.news.api_key = v;
        }
        if let Ok(v) = std::env::var(ENV_JWT_SECRET) {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = std::env::var(ENV_DATABASE_PATH) {
            self.database.path = PathBuf::from(v);
        }
    }

    fn sanitize(&mut self) {
        let d = NewsConfig::default();
        if self.news.interval_minutes == 0 {
            self.news.interval_minutes = d.interval_minutes;
        }
        if self.news.run_timeout_secs == 0 {
            self.news.run_timeout_secs = d.run_timeout_secs;
        }
        if self.news.request_timeout_secs == 0 {
            self.news.request_timeout_secs = d.request_timeout_secs;
        }
        if self.news.page_size == 0 {
            self.news.page_size = d.page_size;
        }
        if self.auth.token_ttl_hours <= 0 {
            self.auth.token_ttl_hours = DEFAULT_TOKEN_TTL_HOURS;
        }
        if self.page.min_page_size > self.page.max_page_size {
            // swap to keep a valid interval
            std::mem::swap(&mut self.page.min_page_size, &mut self.page.max_page_size);
        }
        if self.page.min_page_size == 0 {
            self.page.min_page_size = 1;
        }
        if self.page.max_page_size == 0 {
            self.page.max_page_size = 1;
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            min_page_size: self.page.min_page_size,
            max_page_size: self.page.max_page_size,
        }
    }

    pub fn aggregator_cfg(&self) -> AggregatorCfg {
        AggregatorCfg {
            run_timeout: Duration::from_secs(self.news.run_timeout_secs),
            interval: Duration::from_secs(self.news.interval_minutes * 60),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.news.request_timeout_secs)
    }
}

/* ----------------------------
Reloadable page limits
---------------------------- */

/// Page limits shared with the request handlers. Read on every listing request,
/// swapped in place when the config file is reloaded.
#[derive(Clone, Debug, Default)]
pub struct PageLimitsHandle {
    inner: Arc<RwLock<PageLimits>>,
}

impl PageLimitsHandle {
    pub fn new(limits: PageLimits) -> Self {
        Self {
            inner: Arc::new(RwLock::new(limits)),
        }
    }

    pub fn get(&self) -> PageLimits {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, limits: PageLimits) {
        match self.inner.write() {
            Ok(mut guard) => *guard = limits,
            Err(poisoned) => *poisoned.into_inner() = limits,
        }
    }
}

/// Mtime-based change detection for one config file.
pub struct ConfigWatcher {
    path: PathBuf,
    handle: PageLimitsHandle,
    last_mtime: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Starts from the file's current mtime, so only later edits trigger a reload.
    pub fn new(path: impl Into<PathBuf>, handle: PageLimitsHandle) -> Self {
        let path = path.into();
        let last_mtime = modified(&path);
        Self {
            path,
            handle,
            last_mtime,
        }
    }

    /// Reload when the file changed since the last check. Returns true when the
    /// limits were swapped. A file that fails to parse keeps the previous values.
    pub fn poll(&mut self) -> bool {
        let Some(mtime) = modified(&self.path) else {
            return false;
        };
        if self.last_mtime == Some(mtime) {
            return false;
        }
        self.last_mtime = Some(mtime);

        let parsed = fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|content| AppConfig::from_toml_str(&content));
        match parsed {
            Ok(cfg) => {
                let limits = cfg.page_limits();
                self.handle.set(limits);
                tracing::info!(
                    path = %self.path.display(),
                    min_page_size = limits.min_page_size,
                    max_page_size = limits.max_page_size,
                    "config reloaded"
                );
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "config reload failed, keeping previous values");
                false
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_CONFIG_HOT_RELOAD)
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Poll `path` every 2s and push page limit changes into `handle`.
/// Only runs with CONFIG_HOT_RELOAD=1; returns whether the watcher was started.
pub fn start_hot_reload_thread(handle: PageLimitsHandle, path: PathBuf) -> bool {
    if !hot_reload_enabled() {
        return false;
    }

    let mut watcher = ConfigWatcher::new(path, handle);
    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        loop {
            watcher.poll();
            thread::sleep(poll);
        }
    });
    true
}
