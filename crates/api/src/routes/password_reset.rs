//! Password reset route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiPath};
use crate::error::{Result, add_breadcrumb};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RequestResetResponse {
    pub success: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ValidateResetResponse {
    pub success: bool,
    pub message: &'static str,
    pub uidb64: String,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompleteResetRequest {
    pub password: String,
    pub token: String,
    pub uidb64: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteResetResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Email a password reset link to a registered address.
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RequestResetRequest>,
) -> Result<Json<RequestResetResponse>> {
    state.accounts().request_password_reset(&req.email).await?;

    Ok(Json(RequestResetResponse {
        success: "We have sent you a link to reset your password",
    }))
}

/// Check the link from a password reset email.
pub async fn validate_reset(
    State(state): State<AppState>,
    ApiPath((uidb64, token)): ApiPath<(String, String)>,
) -> Result<Json<ValidateResetResponse>> {
    state.accounts().validate_reset_token(&uidb64, &token).await?;

    Ok(Json(ValidateResetResponse {
        success: true,
        message: "Credentials Valid",
        uidb64,
        token,
    }))
}

/// Set a new password using a reset link.
pub async fn complete_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CompleteResetRequest>,
) -> Result<Json<CompleteResetResponse>> {
    state
        .accounts()
        .complete_password_reset(&req.uidb64, &req.token, &req.password)
        .await?;
    add_breadcrumb("auth", "Password reset completed", None);

    Ok(Json(CompleteResetResponse {
        success: true,
        message: "Password reset success",
    }))
}
