// src/api.rs
//! HTTP surface: users, news listing, health.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthUser, JwtService};
use crate::config::PageLimitsHandle;
use crate::news::listing::{list_news, ListRequest};
use crate::store::{NewsStore, UserStore};
use crate::users::{self, LoginRequest, Profile, RegisterRequest, UserError};

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<dyn NewsStore>,
    pub users: Arc<dyn UserStore>,
    pub jwt: JwtService,
    pub page_limits: PageLimitsHandle,
}

impl AppState {
    /// State over one store serving both news and users.
    pub fn new<S>(store: Arc<S>, jwt: JwtService, page_limits: PageLimitsHandle) -> Self
    where
        S: NewsStore + UserStore + 'static,
    {
        Self {
            news: store.clone(),
            users: store,
            jwt,
            page_limits,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/info", post(user_info))
        .route("/news/list", get(news_list_query).post(news_list_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Standard response body: `{ code, msg, data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub msg: String,
    pub data: Option<T>,
}

fn success<T: Serialize>(msg: &str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: StatusCode::OK.as_u16(),
        msg: msg.to_string(),
        data: Some(data),
    })
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    msg: String,
}

impl ApiError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
        }
    }

    fn bad_params() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid request parameters")
    }

    fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            code: self.status.as_u16(),
            msg: self.msg,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::InvalidEmail | UserError::PasswordTooShort => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            UserError::EmailTaken => ApiError::new(StatusCode::CONFLICT, e.to_string()),
            UserError::NotFound | UserError::WrongPassword => {
                ApiError::new(StatusCode::UNAUTHORIZED, e.to_string())
            }
            UserError::Store(_) | UserError::Token(_) => {
                tracing::error!(error = %e, "user operation failed");
                ApiError::internal("internal error")
            }
        }
    }
}

/// Run blocking store work off the async workers, like the aggregator's upserts.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "blocking store task failed");
        ApiError::internal("internal error")
    })?
}

/// Best-effort client address from proxy headers.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Envelope<Profile>>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::bad_params())?;
    let ip = client_ip(&headers);
    let (user, token) = blocking(move || {
        Ok(users::register(state.users.as_ref(), &state.jwt, req, &ip)?)
    })
    .await?;
    Ok(success("registered", Profile::of(&user).with_token(token)))
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Envelope<Profile>>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::bad_params())?;
    let ip = client_ip(&headers);
    let (user, token) = blocking(move || {
        Ok(users::login(state.users.as_ref(), &state.jwt, req, &ip)?)
    })
    .await?;
    Ok(success("logged in", Profile::of(&user).with_token(token)))
}

async fn user_info(AuthUser(user): AuthUser) -> Json<Envelope<Profile>> {
    success("ok", Profile::of(&user))
}

async fn news_list_query(
    State(state): State<AppState>,
    query: Result<Query<ListRequest>, QueryRejection>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let Query(req) = query.map_err(|_| ApiError::bad_params())?;
    news_list(&state, req).await
}

async fn news_list_body(
    State(state): State<AppState>,
    body: Result<Json<ListRequest>, JsonRejection>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::bad_params())?;
    news_list(&state, req).await
}

async fn news_list(
    state: &AppState,
    req: ListRequest,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let store = Arc::clone(&state.news);
    let limits = state.page_limits.get();
    let rows = blocking(move || {
        list_news(store.as_ref(), &req, limits).map_err(|e| {
            tracing::error!(error = %e, "news query failed");
            ApiError::internal("querying news failed")
        })
    })
    .await?;
    Ok(success("ok", json!({ "result": rows })))
}
