// src/users.rs
//! User accounts: registration, login and profile views.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::jwt::JwtService;
use crate::auth::password::{hash_password, random_salt, verify_password, SALT_LEN};
use crate::store::{LoginUpdate, StoreError, UserStore};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub password_hash: String,
    pub salt: String,
    pub token: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a client may see about a user. Never carries hash or salt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub last_login: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Profile {
    pub fn of(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            phone: user.phone.clone(),
            avatar: user.avatar.clone(),
            role: user.role.clone(),
            last_login: user.last_login_at.map(|t| t.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid email format")]
    InvalidEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} bytes long")]
    PasswordTooShort,
    #[error("email already registered")]
    EmailTaken,
    #[error("user does not exist")]
    NotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error(transparent)]
    Store(StoreError),
    #[error("issuing token failed: {0}")]
    Token(String),
}

impl From<StoreError> for UserError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmailTaken => UserError::EmailTaken,
            other => UserError::Store(other),
        }
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*$")
        .expect("email regex")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn validate_credentials(email: &str, password: &str) -> Result<(), UserError> {
    if !is_valid_email(email) {
        return Err(UserError::InvalidEmail);
    }
    // byte length, so two CJK characters (6 bytes) pass
    if password.len() < MIN_PASSWORD_LEN {
        return Err(UserError::PasswordTooShort);
    }
    Ok(())
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Create an account and issue its first session token.
pub fn register(
    store: &dyn UserStore,
    jwt: &JwtService,
    req: RegisterRequest,
    client_ip: &str,
) -> Result<(User, String), UserError> {
    let email = req.email.trim().to_string();
    validate_credentials(&email, &req.password)?;

    let uid = uuid::Uuid::new_v4().to_string();
    let token = jwt
        .create_token(&uid)
        .map_err(|e| UserError::Token(e.to_string()))?;
    let salt = random_salt(SALT_LEN);
    let now = Utc::now();

    let user = User {
        password_hash: hash_password(&req.password, &salt),
        uid,
        email,
        username: non_empty(req.username),
        phone: non_empty(req.phone),
        avatar: non_empty(req.avatar),
        role: DEFAULT_ROLE.to_string(),
        salt,
        token: Some(token.clone()),
        last_login_at: Some(now),
        last_login_ip: Some(client_ip.to_string()),
        created_at: now,
        updated_at: now,
    };

    store.create_user(&user)?;
    tracing::info!(uid = %user.uid, "user registered");
    Ok((user, token))
}

/// Check credentials, rotate the session token and record the login.
pub fn login(
    store: &dyn UserStore,
    jwt: &JwtService,
    req: LoginRequest,
    client_ip: &str,
) -> Result<(User, String), UserError> {
    let email = req.email.trim();
    validate_credentials(email, &req.password)?;

    let mut user = store.user_by_email(email)?.ok_or(UserError::NotFound)?;
    if !verify_password(&req.password, &user.salt, &user.password_hash) {
        return Err(UserError::WrongPassword);
    }

    let token = jwt
        .create_token(&user.uid)
        .map_err(|e| UserError::Token(e.to_string()))?;
    let update = LoginUpdate {
        token: token.clone(),
        at: Utc::now(),
        ip: client_ip.to_string(),
    };
    store.record_login(&user.uid, &update)?;

    user.token = Some(update.token);
    user.last_login_at = Some(update.at);
    user.last_login_ip = Some(update.ip);
    Ok((user, token))
}
