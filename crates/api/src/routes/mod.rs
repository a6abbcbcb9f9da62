//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database)
//!
//! # Accounts
//! POST /register                - Create an unverified account, email a link
//! GET  /verify-email?token=     - Confirm the email address
//! POST /login                   - Exchange credentials for access/refresh tokens
//! POST /token/refresh           - Exchange a refresh token for an access token
//! GET  /me                      - Current account (auth)
//! PUT  /me, PATCH /me           - Change username/password (auth)
//!
//! # Password reset
//! POST  /request-password-reset                     - Email a reset link
//! GET   /validate-password-reset/{uidb64}/{token}   - Check a reset link
//! PATCH /complete-password-reset                    - Set the new password
//!
//! # Profile (auth)
//! GET    /profile                    - Profile with friends
//! POST   /profile/friends            - Add a friend
//! DELETE /profile/friends/{user_id}  - Remove a friend
//!
//! # Stores (auth)
//! GET  /stores                  - List own stores
//! POST /stores                  - Create a store with optional groceries
//! GET  /stores/{id}             - Store with groceries
//! PUT  /stores/{id}, PATCH      - Rename, complete, append groceries (202)
//! DELETE /stores/{id}           - Delete store and its groceries
//!
//! # Groceries (auth)
//! POST /grocery                 - Add a grocery to an own store
//! GET  /grocery/{id}            - Grocery detail
//! PUT  /grocery/{id}, PATCH     - Rename or toggle, recomputes the store (202)
//! DELETE /grocery/{id}          - Delete, recomputes the store
//! ```

pub mod accounts;
pub mod groceries;
pub mod password_reset;
pub mod profile;
pub mod stores;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, patch, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections render as JSON 400 errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameter extractor; an unparseable segment such as `/stores/abc`
/// renders as a JSON 400 error.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(accounts::register))
        .route("/verify-email", get(accounts::verify_email))
        .route("/login", post(accounts::login))
        .route("/token/refresh", post(accounts::refresh))
        .route(
            "/me",
            get(accounts::me)
                .put(accounts::update_me)
                .patch(accounts::update_me),
        )
}

/// Create the password reset routes router.
pub fn password_reset_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/request-password-reset",
            post(password_reset::request_reset),
        )
        .route(
            "/validate-password-reset/{uidb64}/{token}",
            get(password_reset::validate_reset),
        )
        .route(
            "/complete-password-reset",
            patch(password_reset::complete_reset),
        )
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show))
        .route("/friends", post(profile::add_friend))
        .route("/friends/{user_id}", delete(profile::remove_friend))
}

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stores::index).post(stores::create))
        .route(
            "/{id}",
            get(stores::show)
                .put(stores::update)
                .patch(stores::update)
                .delete(stores::destroy),
        )
}

/// Create the grocery routes router.
pub fn grocery_routes() -> Router<AppState> {
    Router::new().route("/", post(groceries::create)).route(
        "/{id}",
        get(groceries::show)
            .put(groceries::update)
            .patch(groceries::update)
            .delete(groceries::destroy),
    )
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(account_routes())
        .merge(password_reset_routes())
        .nest("/profile", profile_routes())
        .nest("/stores", store_routes())
        .nest("/grocery", grocery_routes())
}
