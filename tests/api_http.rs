// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod helpers;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use helpers::records;
use std::time::{Duration, Instant};

use newsfeed_api::api::AppState;
use newsfeed_api::auth::JwtService;
use newsfeed_api::config::{AppConfig, PageLimitsHandle};
use newsfeed_api::news::listing::PageLimits;
use newsfeed_api::news::NewsRecord;
use newsfeed_api::store::{NewsStore, SqliteStore, StoreResult};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.jwt_secret = "api-test-secret".into();
    cfg
}

fn test_app() -> (Router, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().expect("in-memory store"));
    let app = newsfeed_api::app_with_store(&test_config(), store.clone()).expect("build app");
    (app.router, store)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn register_login_and_info_flow() {
    let (app, _) = test_app();

    let (status, v) = send(
        &app,
        post_json(
            "/users/register",
            json!({ "email": "reader@example.com", "password": "s3cret!", "username": "reader" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    assert_eq!(v["code"], 200);
    assert_eq!(v["data"]["email"], "reader@example.com");
    assert!(v["data"].get("password_hash").is_none());
    let uid = v["data"]["uid"].as_str().unwrap().to_string();

    let (status, v) = send(
        &app,
        post_json(
            "/users/login",
            json!({ "email": "reader@example.com", "password": "s3cret!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    let token = v["data"]["token"].as_str().unwrap().to_string();

    let req = Request::builder()
        .method("POST")
        .uri("/users/info")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, v) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{v}");
    assert_eq!(v["data"]["uid"], uid.as_str());
    assert_eq!(v["data"]["username"], "reader");
    assert!(v["data"]["lastLogin"].is_string());
}

#[tokio::test]
async fn info_requires_valid_token() {
    let (app, _) = test_app();

    let (status, v) = send(&app, post_json("/users/info", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(v["error"].is_string());

    let req = Request::builder()
        .method("POST")
        .uri("/users/info")
        .header("authorization", "not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_validation_errors() {
    let (app, _) = test_app();

    let (status, v) = send(
        &app,
        post_json("/users/register", json!({ "email": "nope", "password": "s3cret!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["code"], 400);

    let (status, _) = send(
        &app,
        post_json("/users/register", json!({ "email": "a@example.com", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_body = Request::builder()
        .method("POST")
        .uri("/users/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, v) = send(&app, bad_body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["msg"], "invalid request parameters");

    let payload = json!({ "email": "dup@example.com", "password": "s3cret!" });
    let (status, _) = send(&app, post_json("/users/register", payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, post_json("/users/register", payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let (app, _) = test_app();
    send(
        &app,
        post_json(
            "/users/register",
            json!({ "email": "x@example.com", "password": "s3cret!" }),
        ),
    )
    .await;

    let (status, v) = send(
        &app,
        post_json("/users/login", json!({ "email": "x@example.com", "password": "wrong!!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(v["data"].is_null());
}

#[tokio::test]
async fn news_list_via_post_and_get() {
    let (app, store) = test_app();
    store.upsert_batch(&records("sp", 12, "体育")).unwrap();
    store.upsert_batch(&records("hd", 3, "头条")).unwrap();

    let (status, v) = send(
        &app,
        post_json("/news/list", json!({ "type": "tiyu", "page": 2, "page_size": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    let rows = v["data"]["result"].as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r["category"] == "体育"));

    let (status, v) = send(
        &app,
        Request::get("/news/list?page=1&page_size=10")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    let rows = v["data"]["result"].as_array().unwrap();
    assert_eq!(rows.len(), 3, "empty type lists the headline feed");
}

#[tokio::test]
async fn huge_page_number_returns_empty_page() {
    let (app, store) = test_app();
    store.upsert_batch(&records("sp", 3, "体育")).unwrap();

    let (status, v) = send(
        &app,
        Request::get("/news/list?type=tiyu&page=9223372036854775807&page_size=10")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    assert!(v["data"]["result"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn listing_follows_page_limits_swapped_at_runtime() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.upsert_batch(&records("sp", 12, "体育")).unwrap();
    let app = newsfeed_api::app_with_store(&test_config(), store).unwrap();

    let list = || post_json("/news/list", json!({ "type": "tiyu", "page": 1, "page_size": 100 }));
    let (_, v) = send(&app.router, list()).await;
    assert_eq!(v["data"]["result"].as_array().unwrap().len(), 12);

    app.page_limits.set(PageLimits {
        min_page_size: 1,
        max_page_size: 4,
    });
    let (_, v) = send(&app.router, list()).await;
    assert_eq!(v["data"]["result"].as_array().unwrap().len(), 4);
}

/// News store whose reads hold the calling thread, like a lock held by a long batch write.
struct SlowNews(Duration);

impl NewsStore for SlowNews {
    fn upsert_batch(&self, records: &[NewsRecord]) -> StoreResult<usize> {
        Ok(records.len())
    }

    fn find_by_category(
        &self,
        _category: Option<&str>,
        _offset: usize,
        _limit: usize,
    ) -> StoreResult<Vec<NewsRecord>> {
        std::thread::sleep(self.0);
        Ok(Vec::new())
    }

    fn get_by_key(&self, _uniquekey: &str) -> StoreResult<Option<NewsRecord>> {
        Ok(None)
    }

    fn count_news(&self) -> StoreResult<usize> {
        Ok(0)
    }
}

// Single-threaded runtime: a store call made on the worker would stall /health too.
#[tokio::test(flavor = "current_thread")]
async fn slow_store_read_does_not_block_other_requests() {
    let state = AppState {
        news: Arc::new(SlowNews(Duration::from_millis(800))),
        users: Arc::new(SqliteStore::in_memory().unwrap()),
        jwt: JwtService::new("api-test-secret", "newsfeed-api", 24),
        page_limits: PageLimitsHandle::default(),
    };
    let app = newsfeed_api::router(state);

    let t0 = Instant::now();
    let slow = tokio::spawn(
        app.clone()
            .oneshot(Request::get("/news/list?type=tiyu").body(Body::empty()).unwrap()),
    );
    tokio::task::yield_now().await;

    let (status, _) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        t0.elapsed() < Duration::from_millis(400),
        "health waited {:?} behind the store read",
        t0.elapsed()
    );

    let resp = slow.await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
