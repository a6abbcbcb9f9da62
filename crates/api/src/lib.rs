//! Grocery list JSON API.
//!
//! Accounts with email verification and token login, per-account stores,
//! and grocery items whose completion rolls up into their store.
//!
//! The router is built by [`app`] so tests can drive it without a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::State,
    http::{Request, Response, StatusCode},
    routing::get,
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: std::time::Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::ApiConfig;
    use crate::db::create_in_memory_pool;
    use crate::services::{EmailService, Outbox};

    struct TestApp {
        router: Router,
        outbox: Outbox,
        state: AppState,
    }

    impl TestApp {
        async fn new() -> Self {
            let config = ApiConfig::in_memory(
                "http://testserver",
                SecretString::from("k7Qz!pR2@xW9#mN4$vB6^tY8&jH3*sL5"),
            );
            let outbox = Outbox::new();
            let email = EmailService::with_outbox(&config.email.from_address, outbox.clone());
            let pool = create_in_memory_pool().await.unwrap();
            let state = AppState::new(config, pool, email);

            Self {
                router: app(state.clone()),
                outbox,
                state,
            }
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        /// Register, verify and log in; returns the access token.
        async fn signed_in(&self, email: &str, username: &str) -> String {
            let registration = self
                .state
                .accounts()
                .register(email, username, "password123")
                .await
                .unwrap();
            self.state
                .accounts()
                .verify_email(&registration.verify_token)
                .await
                .unwrap();

            let (status, body) = self
                .send(
                    "POST",
                    "/login",
                    None,
                    Some(json!({"email": email, "password": "password123"})),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            body["tokens"]["access"].as_str().unwrap().to_owned()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }

    #[tokio::test]
    async fn test_readiness() {
        let app = TestApp::new().await;
        let (status, _) = app.send("GET", "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_then_verify_via_link() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(
                "POST",
                "/register",
                None,
                Some(json!({"email": "alice@example.com", "username": "alice", "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"email": "alice@example.com", "username": "alice"}));

        let mail = app.outbox.messages_to("alice@example.com");
        assert_eq!(mail.len(), 1);
        let link = mail[0]
            .body
            .split_whitespace()
            .find(|w| w.starts_with("http://testserver/verify-email?token="))
            .unwrap();
        let path = link.trim_start_matches("http://testserver");

        let (status, body) = app.send("GET", path, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"email": "Successfully activated"}));
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(
                "POST",
                "/register",
                None,
                Some(json!({"email": "", "username": "", "password": ""})),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["email"].is_array());
        assert!(body["errors"]["username"].is_array());
        assert!(body["errors"]["password"].is_array());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = TestApp::new().await;
        let request = Request::post("/login")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_path_id_is_json_bad_request() {
        let app = TestApp::new().await;
        let token = app.signed_in("alice@example.com", "alice").await;

        for uri in ["/stores/abc", "/grocery/abc"] {
            let (status, body) = app.send("GET", uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string(), "{uri} returned {body}");
        }
    }

    #[tokio::test]
    async fn test_stores_require_authentication() {
        let app = TestApp::new().await;

        let (status, body) = app.send("GET", "/stores", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication credentials were not provided.");

        let (status, body) = app.send("GET", "/stores", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Given token not valid for any token type");
    }

    #[tokio::test]
    async fn test_store_lifecycle_statuses() {
        let app = TestApp::new().await;
        let token = app.signed_in("alice@example.com", "alice").await;

        let (status, store) = app
            .send(
                "POST",
                "/stores",
                Some(&token),
                Some(json!({"name": "Target", "groceries": [{"name": "Onion"}]})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(store["is_completed"], false);
        let id = store["id"].as_i64().unwrap();
        let onion = store["groceries"][0]["id"].as_i64().unwrap();

        let (status, grocery) = app
            .send(
                "PATCH",
                &format!("/grocery/{onion}"),
                Some(&token),
                Some(json!({"is_completed": true})),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(grocery["is_completed"], true);
        assert_eq!(grocery["is_store_completed"], true);

        let (status, list) = app.send("GET", "/stores", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([{"id": id, "name": "Target", "is_completed": true}]));

        let (status, body) = app
            .send("DELETE", &format!("/stores/{id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": id}));

        let (status, _) = app
            .send("GET", &format!("/grocery/{onion}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_owner_store_is_not_found() {
        let app = TestApp::new().await;
        let alice = app.signed_in("alice@example.com", "alice").await;
        let bob = app.signed_in("bob@example.com", "bob").await;

        let (_, store) = app
            .send("POST", "/stores", Some(&alice), Some(json!({"name": "Target"})))
            .await;
        let id = store["id"].as_i64().unwrap();

        let (status, body) = app
            .send("GET", &format!("/stores/{id}"), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Store not found");

        let (status, _) = app
            .send(
                "POST",
                "/grocery",
                Some(&bob),
                Some(json!({"name": "Milk", "store_id": id})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_grocery_requires_store_id() {
        let app = TestApp::new().await;
        let token = app.signed_in("alice@example.com", "alice").await;

        let (status, body) = app
            .send("POST", "/grocery", Some(&token), Some(json!({"name": "Milk"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["store_id"][0], "This field is required.");
    }
}
