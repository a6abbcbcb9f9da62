//! Account provisioning commands.
//!
//! # Usage
//!
//! ```bash
//! GROCERY_SUPERUSER_PASSWORD=... grocery-cli user create-superuser -e admin@example.com -u admin
//! grocery-cli user disable -e someone@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `SQLite` connection string
//! - `GROCERY_SUPERUSER_PASSWORD` - Password, unless `--password` is given

use grocery_api::db::{NewUser, RepositoryError, UserRepository};
use grocery_api::services::auth::hash_password;
use grocery_core::{Email, UserId, Username, validate_password};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur while creating an account.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("User already exists with {0}")]
    UserExists(String),

    #[error("No user with email: {0}")]
    UserNotFound(String),

    #[error("Password hashing failed")]
    PasswordHash,

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create a verified staff superuser.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if any field is invalid, the email or username is taken,
/// or the database is unreachable.
pub async fn create_superuser(
    email: &str,
    username: &str,
    password: &str,
) -> Result<UserId, UserError> {
    let email = Email::parse(email).map_err(|e| UserError::InvalidEmail(e.to_string()))?;
    let username =
        Username::parse(username).map_err(|e| UserError::InvalidUsername(e.to_string()))?;
    validate_password(password).map_err(|e| UserError::InvalidPassword(e.to_string()))?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    tracing::info!("Creating superuser: {}", email);

    let password_hash = hash_password(password).map_err(|_| UserError::PasswordHash)?;
    let user = users
        .create(&NewUser {
            is_verified: true,
            is_staff: true,
            is_superuser: true,
            ..NewUser::regular(&email, &username, &password_hash)
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(field) => UserError::UserExists(field),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "Superuser created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id)
}

/// Enable or disable logins for the account registered with `email`.
///
/// # Errors
///
/// Returns an error if the email is malformed, no account uses it, or the
/// database is unreachable.
pub async fn set_active(email: &str, is_active: bool) -> Result<(), UserError> {
    let email = Email::parse(email).map_err(|e| UserError::InvalidEmail(e.to_string()))?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| UserError::UserNotFound(email.to_string()))?;
    users.set_active(user.id, is_active).await?;

    tracing::info!(
        "User {} ({}) is now {}",
        user.id,
        email,
        if is_active { "enabled" } else { "disabled" }
    );
    Ok(())
}
