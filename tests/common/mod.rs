#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use transit_survey::api::{build_router, AppState};
use transit_survey::{AppConfig, Store};

pub const ADMIN_EMAIL: &str = "admin@transit.test";
pub const ADMIN_PASSWORD: &str = "admin-pass";

pub struct TestContext {
    pub store: Store,
    pub app: axum::Router,
}

/// Fresh in-memory database, migrated, with a seeded admin.
pub async fn build_test_context() -> TestContext {
    let config = AppConfig::from_lookup(|name| match name {
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        "BCRYPT_COST" => Some("4".to_string()),
        "ADMIN_EMAIL" => Some(ADMIN_EMAIL.to_string()),
        "ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.to_string()),
        _ => None,
    })
    .expect("test config should parse");

    let store = Store::connect(&config.database_url)
        .await
        .expect("in-memory database should open");
    store.migrate().await.expect("migrations should apply");
    let seed = config.admin_seed.clone().expect("admin seed configured");
    store
        .ensure_admin(&seed, config.bcrypt_cost)
        .await
        .expect("admin should be seeded");

    let app = build_router(AppState::new(store.clone(), config));
    TestContext { store, app }
}

pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, String)],
    body: Option<Value>,
) -> RawResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("router should not fail");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable")
        .to_vec();

    RawResponse {
        status,
        headers,
        body,
    }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let headers: Vec<(&str, String)> = token
        .map(|t| vec![("Authorization", format!("Bearer {t}"))])
        .unwrap_or_default();
    let resp = send(app, method, uri, &headers, body).await;
    (resp.status, resp.json())
}

pub async fn login(app: &axum::Router, email: &str, password: &str) -> String {
    let (status, body) = request_json(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "senha": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"]
        .as_str()
        .expect("login returns a token")
        .to_string()
}

pub async fn admin_token(app: &axum::Router) -> String {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

pub fn survey(line: &str, punctuality: i64, comment: Option<&str>) -> Value {
    json!({
        "linha_numero": line,
        "linha_itinerario": "Centro - Terminal Norte",
        "pontualidade": punctuality,
        "frequencia": 5,
        "conforto": 5,
        "atendimento": 5,
        "infraestrutura": 5,
        "observacoes": comment,
    })
}

pub async fn submit(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    request_json(app, "POST", "/api/pesquisas", None, Some(body)).await
}
