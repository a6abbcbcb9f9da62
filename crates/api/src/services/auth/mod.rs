//! Account service.
//!
//! Registration, email verification, password login with access/refresh
//! tokens, password reset, account updates and the friend list.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::SqlitePool;

use grocery_core::{Email, EmailError, UserId, Username, UsernameError, validate_password};

use crate::db::users::{NewUser, UserRepository};
use crate::db::{ProfileRepository, RepositoryError};
use crate::error::ValidationErrors;
use crate::models::{Profile, User};
use crate::services::email::EmailService;
use crate::services::tokens::{self, TokenError, TokenKind, TokenPair, TokenService};

const BLANK: &str = "This field may not be blank.";
const INVALID_EMAIL: &str = "Enter a valid email address.";

/// Outcome of a successful registration.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    /// Token embedded in the verification link that was emailed.
    pub verify_token: String,
}

/// Account service.
///
/// Borrowed per request from the shared application state.
pub struct AccountService<'a> {
    pool: &'a SqlitePool,
    users: UserRepository<'a>,
    tokens: &'a TokenService,
    email: &'a EmailService,
    base_url: &'a str,
}

impl<'a> AccountService<'a> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(
        pool: &'a SqlitePool,
        tokens: &'a TokenService,
        email: &'a EmailService,
        base_url: &'a str,
    ) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            tokens,
            email,
            base_url,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new, unverified account and email it a verification link.
    ///
    /// The account is kept even if the email cannot be delivered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if a field is malformed or the email or
    /// username is already in use.
    /// Returns `AuthError::Delivery` if the verification email fails to send.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Registration, AuthError> {
        let mut errors = ValidationErrors::new();
        let email = parse_email(&mut errors, email);
        let username = parse_username(&mut errors, username);
        check_password(&mut errors, password);

        let (Some(email), Some(username)) = (email, username) else {
            return Err(errors.into());
        };
        errors.into_result()?;

        let mut errors = ValidationErrors::new();
        if self.users.email_exists(&email).await? {
            errors.add("email", "user with this email already exists.");
        }
        if self.users.username_exists(&username).await? {
            errors.add("username", "user with this username already exists.");
        }
        errors.into_result()?;

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create(&NewUser::regular(&email, &username, &password_hash))
            .await
            .map_err(conflict_to_validation)?;

        tracing::info!(user_id = %user.id, "Account registered");

        let verify_token = self.send_verification(&user).await?;
        Ok(Registration { user, verify_token })
    }

    /// Confirm an email address from a verification token. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ActivationExpired` for a genuine but stale token and
    /// `AuthError::ActivationInvalid` for anything else that fails to verify.
    pub async fn verify_email(&self, token: &str) -> Result<UserId, AuthError> {
        let claims = self
            .tokens
            .verify(token, TokenKind::VerifyEmail)
            .map_err(|e| match e {
                TokenError::Expired => AuthError::ActivationExpired,
                TokenError::Invalid | TokenError::Encoding(_) => AuthError::ActivationInvalid,
            })?;

        self.users
            .mark_verified(claims.sub)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::ActivationInvalid,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %claims.sub, "Email verified");
        Ok(claims.sub)
    }

    async fn send_verification(&self, user: &User) -> Result<String, AuthError> {
        let token = self.tokens.issue(user.id, TokenKind::VerifyEmail)?;
        let link = format!("{}/verify-email?token={token}", self.base());
        let hours = self.tokens.ttl().verify_ttl_secs / 3600;

        self.email
            .send_verification_email(user.email.as_str(), user.username.as_str(), &link, hours)
            .await?;
        Ok(token)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Log in with email and password.
    ///
    /// An unverified account is sent a fresh verification link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong,
    /// `AuthError::AccountDisabled` if the account is inactive, and
    /// `AuthError::EmailNotVerified` if the email is not yet confirmed.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if !user.is_verified {
            if let Err(e) = self.send_verification(&user).await {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to resend verification email");
            }
            return Err(AuthError::EmailNotVerified);
        }

        let pair = self.tokens.issue_pair(user.id)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, pair))
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is not a valid refresh
    /// token for an active account.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .users
            .get_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidToken)?;

        Ok(self.tokens.issue(user.id, TokenKind::Access)?)
    }

    /// Resolve a bearer access token to its active account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is not a valid access
    /// token for an existing, active account.
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self
            .tokens
            .verify(access_token, TokenKind::Access)
            .map_err(|_| AuthError::InvalidToken)?;

        self.users
            .get_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidToken)
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Email a password reset link to a registered address.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email,
    /// `AuthError::EmailNotRegistered` if no account uses it, and
    /// `AuthError::Delivery` if the email fails to send.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let mut errors = ValidationErrors::new();
        let Some(email) = parse_email(&mut errors, email) else {
            return Err(errors.into());
        };

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::EmailNotRegistered)?;

        let token = self.tokens.make_reset_token(&user)?;
        let link = format!(
            "{}/validate-password-reset/{}/{token}",
            self.base(),
            tokens::encode_uid(user.id)
        );

        self.email
            .send_password_reset_email(user.email.as_str(), &link)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    /// Check a password reset link without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the link does not match a user's
    /// current credentials.
    pub async fn validate_reset_token(&self, uidb64: &str, token: &str) -> Result<User, AuthError> {
        let id = tokens::decode_uid(uidb64).map_err(|_| AuthError::InvalidToken)?;
        let user = self
            .users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        self.tokens
            .check_reset_token(&user, token)
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(user)
    }

    /// Set a new password from a reset link. The link stops working afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the password breaks the length policy
    /// and `AuthError::InvalidToken` if the link is not valid.
    pub async fn complete_password_reset(
        &self,
        uidb64: &str,
        token: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, password);
        errors.into_result()?;

        let user = self.validate_reset_token(uidb64, token).await?;
        let password_hash = hash_password(password)?;
        self.users.set_password_hash(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    // =========================================================================
    // Account management
    // =========================================================================

    /// Change the username and/or password of an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if a field is malformed or the username
    /// is taken.
    pub async fn update_account(
        &self,
        user: &User,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AuthError> {
        let mut errors = ValidationErrors::new();
        let username = username.and_then(|u| parse_username(&mut errors, u));
        if let Some(password) = password {
            check_password(&mut errors, password);
        }
        errors.into_result()?;

        if let Some(username) = username.filter(|u| *u != user.username) {
            self.users
                .set_username(user.id, &username)
                .await
                .map_err(conflict_to_validation)?;
        }
        if let Some(password) = password {
            let password_hash = hash_password(password)?;
            self.users.set_password_hash(user.id, &password_hash).await?;
        }

        self.users
            .get_by_id(user.id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Get the user's profile, creating it on first access.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database fails.
    pub async fn profile(&self, user: &User) -> Result<Profile, AuthError> {
        Ok(ProfileRepository::new(self.pool).get_or_create(user.id).await?)
    }

    /// Add another account to the user's friends, and vice versa.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CannotFriendSelf` for the user's own ID and
    /// `AuthError::UserNotFound` for an unknown account.
    pub async fn add_friend(&self, user: &User, friend: UserId) -> Result<Profile, AuthError> {
        if friend == user.id {
            return Err(AuthError::CannotFriendSelf);
        }

        ProfileRepository::new(self.pool)
            .add_friend(user.id, friend)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// End a friendship in both directions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the accounts are not friends.
    pub async fn remove_friend(&self, user: &User, friend: UserId) -> Result<Profile, AuthError> {
        ProfileRepository::new(self.pool)
            .remove_friend(user.id, friend)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// =============================================================================
// Field validation
// =============================================================================

fn parse_email(errors: &mut ValidationErrors, raw: &str) -> Option<Email> {
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(EmailError::Empty) => {
            errors.add("email", BLANK);
            None
        }
        Err(_) => {
            errors.add("email", INVALID_EMAIL);
            None
        }
    }
}

fn parse_username(errors: &mut ValidationErrors, raw: &str) -> Option<Username> {
    match Username::parse(raw) {
        Ok(username) => Some(username),
        Err(UsernameError::Empty) => {
            errors.add("username", BLANK);
            None
        }
        Err(e) => {
            errors.add("username", e.to_string());
            None
        }
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", BLANK);
    } else if let Err(e) = validate_password(password) {
        errors.add("password", e.to_string());
    }
}

fn conflict_to_validation(err: RepositoryError) -> AuthError {
    match err {
        RepositoryError::Conflict(field) => {
            let message = format!("user with this {field} already exists.");
            AuthError::Validation(ValidationErrors::single(&field, message))
        }
        other => AuthError::Repository(other),
    }
}

// =============================================================================
// Password hashing
// =============================================================================

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::db::create_in_memory_pool;
    use crate::services::email::Outbox;
    use secrecy::SecretString;

    struct Fixture {
        pool: SqlitePool,
        tokens: TokenService,
        email: EmailService,
        outbox: Outbox,
    }

    impl Fixture {
        async fn new() -> Self {
            let outbox = Outbox::new();
            Self {
                pool: create_in_memory_pool().await.unwrap(),
                tokens: TokenService::new(
                    SecretString::from("k7Qz!pR2@xW9#mN4$vB6^tY8&jH3*sL5"),
                    TokenConfig::default(),
                ),
                email: EmailService::with_outbox("no-reply@example.com", outbox.clone()),
                outbox,
            }
        }

        fn service(&self) -> AccountService<'_> {
            AccountService::new(&self.pool, &self.tokens, &self.email, "http://testserver/")
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("secret-pass").unwrap();
        assert!(verify_password("secret-pass", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong-pass", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_sends_one_verification_email() {
        let fx = Fixture::new().await;
        let registration = fx
            .service()
            .register("alice@example.com", "alice", "password123")
            .await
            .unwrap();

        assert!(!registration.user.is_verified);
        let sent = fx.outbox.messages_to("alice@example.com");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("http://testserver/verify-email?token="));
        assert!(sent[0].body.contains(&registration.verify_token));
    }

    #[tokio::test]
    async fn test_register_reports_field_errors() {
        let fx = Fixture::new().await;
        let err = fx
            .service()
            .register("not-an-email", "bad name", "abc")
            .await
            .unwrap_err();

        let AuthError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.field("email").unwrap(), [INVALID_EMAIL]);
        assert_eq!(
            errors.field("username").unwrap(),
            ["The username should only contain alphanumeric characters"]
        );
        assert!(errors.field("password").is_some());
    }

    #[tokio::test]
    async fn test_register_duplicates_rejected() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        svc.register("alice@example.com", "alice", "password123")
            .await
            .unwrap();

        let err = svc
            .register("alice@example.com", "alice", "password123")
            .await
            .unwrap_err();
        let AuthError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.field("email").is_some());
        assert!(errors.field("username").is_some());
    }

    #[tokio::test]
    async fn test_login_flow() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let registration = svc
            .register("alice@example.com", "alice", "password123")
            .await
            .unwrap();

        let err = svc
            .login("alice@example.com", "password123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailNotVerified));
        assert_eq!(fx.outbox.messages_to("alice@example.com").len(), 2);

        svc.verify_email(&registration.verify_token).await.unwrap();
        // Verifying twice is harmless.
        svc.verify_email(&registration.verify_token).await.unwrap();

        let err = svc.login("alice@example.com", "nope-nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let (user, pair) = svc.login("alice@example.com", "password123").await.unwrap();
        assert_eq!(user.username.as_str(), "alice");

        let authed = svc.authenticate(&pair.access).await.unwrap();
        assert_eq!(authed.id, user.id);
        assert!(matches!(
            svc.authenticate(&pair.refresh).await,
            Err(AuthError::InvalidToken)
        ));

        let access = svc.refresh(&pair.refresh).await.unwrap();
        assert!(svc.authenticate(&access).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_account_cannot_login() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let registration = svc
            .register("bob@example.com", "bob", "password123")
            .await
            .unwrap();
        svc.verify_email(&registration.verify_token).await.unwrap();
        UserRepository::new(&fx.pool)
            .set_active(registration.user.id, false)
            .await
            .unwrap();

        let err = svc.login("bob@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));
    }

    #[tokio::test]
    async fn test_verify_email_rejects_garbage() {
        let fx = Fixture::new().await;
        let err = fx.service().verify_email("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::ActivationInvalid));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let registration = svc
            .register("carol@example.com", "carol", "password123")
            .await
            .unwrap();
        svc.verify_email(&registration.verify_token).await.unwrap();

        assert!(matches!(
            svc.request_password_reset("nobody@example.com").await,
            Err(AuthError::EmailNotRegistered)
        ));

        svc.request_password_reset("carol@example.com").await.unwrap();
        let user = UserRepository::new(&fx.pool)
            .get_by_id(registration.user.id)
            .await
            .unwrap()
            .unwrap();
        let token = fx.tokens.make_reset_token(&user).unwrap();
        let uidb64 = tokens::encode_uid(user.id);

        assert!(svc.validate_reset_token(&uidb64, &token).await.is_ok());
        assert!(matches!(
            svc.validate_reset_token(&uidb64, "BadToken").await,
            Err(AuthError::InvalidToken)
        ));

        let err = svc
            .complete_password_reset(&uidb64, &token, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        svc.complete_password_reset(&uidb64, &token, "newpassword")
            .await
            .unwrap();
        assert!(svc.login("carol@example.com", "newpassword").await.is_ok());

        // The link is bound to the old password.
        assert!(matches!(
            svc.complete_password_reset(&uidb64, &token, "another1").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_update_account() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let first = svc
            .register("dave@example.com", "dave", "password123")
            .await
            .unwrap()
            .user;
        svc.register("erin@example.com", "erin", "password123")
            .await
            .unwrap();

        let err = svc
            .update_account(&first, Some("erin"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let updated = svc
            .update_account(&first, Some("david"), Some("password456"))
            .await
            .unwrap();
        assert_eq!(updated.username.as_str(), "david");
        assert!(verify_password("password456", &updated.password_hash).is_ok());
    }

    #[tokio::test]
    async fn test_cannot_friend_self() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let user = svc
            .register("fay@example.com", "fay", "password123")
            .await
            .unwrap()
            .user;

        assert!(matches!(
            svc.add_friend(&user, user.id).await,
            Err(AuthError::CannotFriendSelf)
        ));
        assert!(matches!(
            svc.add_friend(&user, UserId::new(999)).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
