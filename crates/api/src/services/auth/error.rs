//! Account error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::ValidationErrors;
use crate::services::email::EmailError;
use crate::services::tokens::TokenError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// One or more request fields are invalid or already taken.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account has been disabled by an administrator.
    #[error("account disabled")]
    AccountDisabled,

    /// Login attempted before the email address was verified.
    #[error("email not verified")]
    EmailNotVerified,

    /// Verification link is genuine but too old.
    #[error("activation link expired")]
    ActivationExpired,

    /// Verification link is malformed or forged.
    #[error("activation link invalid")]
    ActivationInvalid,

    /// Refresh or password reset token rejected.
    #[error("invalid token")]
    InvalidToken,

    /// Password reset requested for an unknown email.
    #[error("email not registered")]
    EmailNotRegistered,

    /// Referenced account does not exist.
    #[error("user not found")]
    UserNotFound,

    /// A user tried to befriend themselves.
    #[error("cannot befriend self")]
    CannotFriendSelf,

    /// Outgoing email could not be delivered.
    #[error("email delivery failed: {0}")]
    Delivery(#[from] EmailError),

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
