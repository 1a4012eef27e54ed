// src/auth/mod.rs
pub mod jwt;
pub mod password;

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::api::AppState;
use crate::users::User;

pub use jwt::{Claims, JwtService};

/// Authenticated caller. Extract this in handlers that require a session token.
///
/// The token travels in the `Authorization` header, either bare or as `Bearer <jwt>`.
/// Its subject must still name an existing user.
pub struct AuthUser(pub User);

pub struct AuthRejection(&'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.0 }))).into_response()
    }
}

pub(crate) fn bearer_token(header: &str) -> &str {
    let h = header.trim();
    h.strip_prefix("Bearer ")
        .or_else(|| h.strip_prefix("bearer "))
        .unwrap_or(h)
        .trim()
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let token = bearer_token(header);
        if token.is_empty() {
            return Err(AuthRejection("login required"));
        }

        let claims = state
            .jwt
            .verify_token(token)
            .map_err(|_| AuthRejection("invalid credentials"))?;

        let users = Arc::clone(&state.users);
        let lookup = tokio::task::spawn_blocking(move || users.user_by_uid(&claims.sub)).await;

        match lookup {
            Ok(Ok(Some(user))) => Ok(AuthUser(user)),
            Ok(Ok(None)) => Err(AuthRejection("user does not exist")),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "user lookup failed during auth");
                Err(AuthRejection("invalid credentials"))
            }
            Err(e) => {
                tracing::error!(error = %e, "user lookup task failed during auth");
                Err(AuthRejection("invalid credentials"))
            }
        }
    }
}
