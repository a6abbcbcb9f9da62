//! End-to-end tests for the grocery list API.
//!
//! Each [`TestContext`] serves a fresh app over a real socket on an ephemeral
//! port, backed by its own in-memory database. Outgoing mail is captured in an
//! [`Outbox`] so tests can follow verification and reset links.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p grocery-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;

use grocery_api::config::ApiConfig;
use grocery_api::db::create_in_memory_pool;
use grocery_api::services::{EmailService, Outbox};
use grocery_api::state::AppState;
use reqwest::{Client, Method, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};

/// Password used by [`TestContext::signup`].
pub const PASSWORD: &str = "password123";

/// A running app plus the handles tests need to drive it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub outbox: Outbox,
}

impl TestContext {
    /// Start a fresh app on `127.0.0.1` with an empty database.
    pub async fn new() -> Self {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind test listener");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let config = ApiConfig::in_memory(
            base_url.clone(),
            SecretString::from("Qm8#vT2$kL9@pX4!nR7^wZ3&hJ6*bF5e"),
        );
        let outbox = Outbox::new();
        let email = EmailService::with_outbox(&config.email.from_address, outbox.clone());
        let pool = create_in_memory_pool()
            .await
            .expect("Failed to create test database");
        let app = grocery_api::app(AppState::new(config, pool, email));

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server error");
        });

        Self {
            client: Client::new(),
            base_url,
            outbox,
        }
    }

    /// Absolute URL for a path or for a link found in an email.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_owned()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    /// Send a request and decode the JSON body (`Null` when there is none).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.expect("Request failed");
        let status = response.status();
        let text = response.text().await.expect("Failed to read body");
        let value = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, token, None).await
    }

    /// Register an account through the API.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/register",
            None,
            json!({ "email": email, "username": username, "password": password }),
        )
        .await
    }

    /// Log in through the API.
    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post("/login", None, json!({ "email": email, "password": password }))
            .await
    }

    /// The first link in the latest email sent to `to` that contains `marker`.
    #[must_use]
    pub fn latest_link(&self, to: &str, marker: &str) -> String {
        let messages = self.outbox.messages_to(to);
        let message = messages.last().expect("No email was sent");
        message
            .body
            .split_whitespace()
            .find(|word| word.starts_with("http") && word.contains(marker))
            .expect("Email has no matching link")
            .to_owned()
    }

    /// Register, follow the verification link and log in; returns the access token.
    pub async fn signup(&self, email: &str, username: &str) -> String {
        let (status, _) = self.register(email, username, PASSWORD).await;
        assert_eq!(status, StatusCode::CREATED);

        let link = self.latest_link(email, "/verify-email");
        let (status, _) = self.get(&link, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body["tokens"]["access"]
            .as_str()
            .expect("Login returned no access token")
            .to_owned()
    }
}
