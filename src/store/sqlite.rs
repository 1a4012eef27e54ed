// src/store/sqlite.rs
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::news::types::NewsRecord;
use crate::store::{LoginUpdate, NewsStore, StoreError, StoreResult, UserStore};
use crate::users::User;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS news (
    uniquekey         TEXT PRIMARY KEY NOT NULL,
    title             TEXT NOT NULL DEFAULT '',
    date              TEXT NOT NULL DEFAULT '',
    category          TEXT NOT NULL DEFAULT '',
    author_name       TEXT NOT NULL DEFAULT '',
    url               TEXT NOT NULL DEFAULT '',
    thumbnail_pic_s   TEXT NOT NULL DEFAULT '',
    thumbnail_pic_s02 TEXT NOT NULL DEFAULT '',
    thumbnail_pic_s03 TEXT NOT NULL DEFAULT '',
    is_content        TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_news_category_date ON news (category, date);

CREATE TABLE IF NOT EXISTS users (
    uid           TEXT PRIMARY KEY NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    username      TEXT,
    phone         TEXT,
    avatar        TEXT,
    role          TEXT NOT NULL DEFAULT 'user',
    password_hash TEXT NOT NULL,
    salt          TEXT NOT NULL,
    token         TEXT,
    last_login_at TEXT,
    last_login_ip TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
"#;

const UPSERT_NEWS: &str = "
INSERT INTO news (uniquekey, title, date, category, author_name, url,
                  thumbnail_pic_s, thumbnail_pic_s02, thumbnail_pic_s03, is_content)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(uniquekey) DO UPDATE SET
    title = excluded.title,
    date = excluded.date,
    category = excluded.category,
    author_name = excluded.author_name,
    url = excluded.url,
    thumbnail_pic_s = excluded.thumbnail_pic_s,
    thumbnail_pic_s02 = excluded.thumbnail_pic_s02,
    thumbnail_pic_s03 = excluded.thumbnail_pic_s03,
    is_content = excluded.is_content";

const NEWS_COLUMNS: &str = "uniquekey, title, date, category, author_name, url,
    thumbnail_pic_s, thumbnail_pic_s02, thumbnail_pic_s03, is_content";

const USER_COLUMNS: &str = "uid, email, username, phone, avatar, role, password_hash, salt,
    token, last_login_at, last_login_ip, created_at, updated_at";

/// SQLite-backed store. One connection behind a mutex: handlers and the
/// aggregator's category tasks take turns, each batch commits in one transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn news_from_row(row: &Row<'_>) -> rusqlite::Result<NewsRecord> {
        Ok(NewsRecord {
            uniquekey: row.get(0)?,
            title: row.get(1)?,
            date: row.get(2)?,
            category: row.get(3)?,
            author_name: row.get(4)?,
            url: row.get(5)?,
            thumbnail_pic_s: row.get(6)?,
            thumbnail_pic_s02: row.get(7)?,
            thumbnail_pic_s03: row.get(8)?,
            is_content: row.get(9)?,
        })
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            uid: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            phone: row.get(3)?,
            avatar: row.get(4)?,
            role: row.get(5)?,
            password_hash: row.get(6)?,
            salt: row.get(7)?,
            token: row.get(8)?,
            last_login_at: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| parse_datetime(&s)),
            last_login_ip: row.get(10)?,
            created_at: parse_datetime(&row.get::<_, String>(11)?).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.get::<_, String>(12)?).unwrap_or_else(Utc::now),
        })
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl NewsStore for SqliteStore {
    fn upsert_batch(&self, records: &[NewsRecord]) -> StoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_NEWS)?;
            for r in records {
                stmt.execute(params![
                    r.uniquekey,
                    r.title,
                    r.date,
                    r.category,
                    r.author_name,
                    r.url,
                    r.thumbnail_pic_s,
                    r.thumbnail_pic_s02,
                    r.thumbnail_pic_s03,
                    r.is_content,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn find_by_category(
        &self,
        category: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<NewsRecord>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = match category {
            Some(cat) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {NEWS_COLUMNS} FROM news WHERE category = ?1
                     ORDER BY date DESC, uniquekey LIMIT ?2 OFFSET ?3"
                ))?;
                let rows = stmt
                    .query_map(params![cat, limit, offset], Self::news_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {NEWS_COLUMNS} FROM news
                     ORDER BY date DESC, uniquekey LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt
                    .query_map(params![limit, offset], Self::news_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    fn get_by_key(&self, uniquekey: &str) -> StoreResult<Option<NewsRecord>> {
        let conn = self.lock()?;
        let rec = conn
            .query_row(
                &format!("SELECT {NEWS_COLUMNS} FROM news WHERE uniquekey = ?1"),
                params![uniquekey],
                Self::news_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    fn count_news(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, user: &User) -> StoreResult<()> {
        let conn = self.lock()?;

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![user.email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::EmailTaken);
        }

        conn.execute(
            &format!(
                "INSERT INTO users ({USER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                user.uid,
                user.email,
                user.username,
                user.phone,
                user.avatar,
                user.role,
                user.password_hash,
                user.salt,
                user.token,
                user.last_login_at.map(|t| t.to_rfc3339()),
                user.last_login_ip,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn user_by_uid(&self, uid: &str) -> StoreResult<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?1"),
                params![uid],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn record_login(&self, uid: &str, update: &LoginUpdate) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET token = ?1, last_login_at = ?2, last_login_ip = ?3, updated_at = ?4
             WHERE uid = ?5",
            params![
                update.token,
                update.at.to_rfc3339(),
                update.ip,
                Utc::now().to_rfc3339(),
                uid
            ],
        )?;
        Ok(())
    }
}
