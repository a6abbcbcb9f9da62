//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body is JSON: `{"error": "..."}` for single-cause failures and
//! `{"errors": {"field": ["..."]}}` for field validation.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::lists::ListError;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Create an empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    /// Create errors holding a single message.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded against a field.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any message was recorded.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Store or grocery operation failed.
    #[error("List error: {0}")]
    Lists(#[from] ListError),

    /// Request fields failed validation.
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::Validation(_)
                | AuthError::ActivationExpired
                | AuthError::ActivationInvalid
                | AuthError::EmailNotRegistered
                | AuthError::CannotFriendSelf => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials
                | AuthError::AccountDisabled
                | AuthError::EmailNotVerified
                | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Delivery(_) => StatusCode::BAD_GATEWAY,
                AuthError::Token(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Lists(err) => match err {
                ListError::Validation(_) => StatusCode::BAD_REQUEST,
                ListError::StoreNotFound | ListError::GroceryNotFound => StatusCode::NOT_FOUND,
                ListError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Auth(
                    AuthError::Token(_)
                        | AuthError::Repository(_)
                        | AuthError::PasswordHash
                        | AuthError::Delivery(_)
                )
                | Self::Lists(ListError::Repository(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let body = match self {
            Self::Validation(errors)
            | Self::Auth(AuthError::Validation(errors))
            | Self::Lists(ListError::Validation(errors)) => json!({ "errors": errors }),
            Self::Database(_) | Self::Internal(_) => json!({ "error": "Internal server error" }),
            Self::Auth(err) => json!({ "error": auth_message(&err) }),
            Self::Lists(err) => json!({ "error": list_message(&err) }),
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::BadRequest(msg) => {
                json!({ "error": msg })
            }
        };

        (status, Json(body)).into_response()
    }
}

fn auth_message(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidCredentials => "Invalid credentials, try again",
        AuthError::AccountDisabled => "Account disabled, contact admin",
        AuthError::EmailNotVerified => "Email is not verified",
        AuthError::ActivationExpired => "Activation Expired",
        AuthError::ActivationInvalid => "Invalid Token",
        AuthError::InvalidToken => "Token is not valid, please request a new one",
        AuthError::EmailNotRegistered => "No account is registered with this email",
        AuthError::UserNotFound => "User not found",
        AuthError::CannotFriendSelf => "You cannot add yourself as a friend",
        AuthError::Delivery(_) => "Email could not be delivered, try again later",
        AuthError::Validation(_)
        | AuthError::Token(_)
        | AuthError::Repository(_)
        | AuthError::PasswordHash => "Internal server error",
    }
}

fn list_message(err: &ListError) -> &'static str {
    match err {
        ListError::StoreNotFound => "Store not found",
        ListError::GroceryNotFound => "Grocery not found",
        ListError::Validation(_) | ListError::Repository(_) => "Internal server error",
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("lists", "Store deleted", Some(&[("store_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::email::EmailError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("store 12".to_string());
        assert_eq!(err.to_string(), "Not found: store 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::ActivationExpired)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidToken)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Lists(ListError::GroceryNotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_errors_into_result() {
        assert_eq!(ValidationErrors::new().into_result(), Ok(()));

        let errors = ValidationErrors::single("name", "This field may not be blank.");
        let err = errors.clone().into_result().unwrap_err();
        assert_eq!(err, errors);
        assert_eq!(
            err.field("name"),
            Some(&["This field may not be blank.".to_owned()][..])
        );
    }

    #[test]
    fn test_delivery_failure_is_distinct_from_validation() {
        let delivery = AppError::Auth(AuthError::Delivery(EmailError::InvalidAddress(
            "x".to_string(),
        )));
        assert_eq!(delivery.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "Enter a valid email address.");
        errors.add("email", "user with this email already exists.");

        let response = AppError::Validation(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["errors"]["email"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_login_failure_messages() {
        let body = body_json(AppError::Auth(AuthError::EmailNotVerified).into_response()).await;
        assert_eq!(body["error"], "Email is not verified");

        let body = body_json(AppError::Database(RepositoryError::NotFound).into_response()).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
