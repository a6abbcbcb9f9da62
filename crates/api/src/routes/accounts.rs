//! Registration, verification, login and account route handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use grocery_core::UserId;

use super::ApiJson;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::tokens::TokenPair;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

/// Registration form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Public account fields returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub email: String,
    pub username: String,
}

/// Query string of the emailed verification link.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyEmailQuery {
    pub token: String,
}

/// Login form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub username: String,
    pub tokens: TokenPair,
}

/// Refresh token exchange.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Fresh access token.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Account fields the owner may change.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAccountRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The authenticated account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub is_verified: bool,
}

impl From<&User> for AccountResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.to_string(),
            username: user.username.to_string(),
            is_verified: user.is_verified,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new account and send the verification email.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>)> {
    let registration = state
        .accounts()
        .register(&req.email, &req.username, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            email: registration.user.email.into_inner(),
            username: registration.user.username.to_string(),
        }),
    ))
}

/// Confirm an email address from the emailed link.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<serde_json::Value>> {
    state.accounts().verify_email(&query.token).await?;
    Ok(Json(serde_json::json!({ "email": "Successfully activated" })))
}

/// Log in with email and password.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, tokens) = state.accounts().login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        email: user.email.into_inner(),
        username: user.username.to_string(),
        tokens,
    }))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let access = state.accounts().refresh(&req.refresh).await?;
    Ok(Json(RefreshResponse { access }))
}

/// Show the authenticated account.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<AccountResponse> {
    Json(AccountResponse::from(&user))
}

/// Change the authenticated account's username and/or password.
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>> {
    let updated = state
        .accounts()
        .update_account(&user, req.username.as_deref(), req.password.as_deref())
        .await?;

    Ok(Json(AccountResponse::from(&updated)))
}
