//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `SQLite` connection string (e.g. `sqlite://grocery.db?mode=rwc`)
//! - `API_BASE_URL` - Public URL used in verification and password reset links
//! - `API_SECRET_KEY` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 8000)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `ACCESS_TOKEN_TTL_SECS` - Access token lifetime (default: 300)
//! - `REFRESH_TOKEN_TTL_SECS` - Refresh token lifetime (default: 86400)
//! - `VERIFY_TOKEN_TTL_SECS` - Email verification token lifetime (default: 86400)
//! - `RESET_TOKEN_TTL_SECS` - Password reset token lifetime (default: 259200)
//! - `EMAIL_BACKEND` - `smtp` (default) or `memory`. The memory backend never
//!   delivers anything and is meant for local development only.
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD` - SMTP relay.
//!   `SMTP_HOST`, `SMTP_USERNAME` and `SMTP_PASSWORD` are required by the
//!   `smtp` backend.
//! - `EMAIL_FROM` - Sender address (default: `no-reply@localhost.localdomain`)
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `SQLite` database connection URL
    pub database_url: SecretString,
    /// Maximum number of pooled connections
    pub database_max_connections: u32,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build links sent by email
    pub base_url: String,
    /// HMAC key for access, refresh, verification and reset tokens
    pub secret_key: SecretString,
    /// Token lifetimes
    pub tokens: TokenConfig,
    /// Outgoing email configuration
    pub email: EmailConfig,
    /// Emit JSON log lines instead of text
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Token lifetimes in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenConfig {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub verify_ttl_secs: i64,
    pub reset_ttl_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: 5 * 60,
            refresh_ttl_secs: 24 * 60 * 60,
            verify_ttl_secs: 24 * 60 * 60,
            reset_ttl_secs: 3 * 24 * 60 * 60,
        }
    }
}

/// Outgoing email configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Sender address for all outgoing mail
    pub from_address: String,
    /// Where outgoing mail goes
    pub transport: EmailTransport,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: "no-reply@localhost.localdomain".to_owned(),
            transport: EmailTransport::Memory,
        }
    }
}

/// Delivery mechanism for outgoing mail.
#[derive(Debug, Clone)]
pub enum EmailTransport {
    /// Deliver through an SMTP relay.
    Smtp(SmtpConfig),
    /// Keep messages in a bounded in-memory outbox. Nothing is delivered.
    Memory,
}

/// Value of `EMAIL_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmailBackend {
    Smtp,
    Memory,
}

impl std::str::FromStr for EmailBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected `smtp` or `memory`, got `{other}`")),
        }
    }
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the secret key fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let database_max_connections = parse_env_or_default("DATABASE_MAX_CONNECTIONS", "5")?;
        let host = parse_env_or_default("API_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("API_PORT", "8000")?;
        let base_url = get_required_env("API_BASE_URL")?;
        let secret_key = get_validated_secret("API_SECRET_KEY")?;
        validate_secret_length(&secret_key, "API_SECRET_KEY")?;

        let defaults = TokenConfig::default();
        let tokens = TokenConfig {
            access_ttl_secs: parse_env_or_default(
                "ACCESS_TOKEN_TTL_SECS",
                &defaults.access_ttl_secs.to_string(),
            )?,
            refresh_ttl_secs: parse_env_or_default(
                "REFRESH_TOKEN_TTL_SECS",
                &defaults.refresh_ttl_secs.to_string(),
            )?,
            verify_ttl_secs: parse_env_or_default(
                "VERIFY_TOKEN_TTL_SECS",
                &defaults.verify_ttl_secs.to_string(),
            )?,
            reset_ttl_secs: parse_env_or_default(
                "RESET_TOKEN_TTL_SECS",
                &defaults.reset_ttl_secs.to_string(),
            )?,
        };

        let email = EmailConfig::from_env()?;
        let json_logs = get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            base_url,
            secret_key,
            tokens,
            email,
            json_logs,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Configuration for an in-memory database with mail kept in the outbox.
    ///
    /// Used by tests and local tooling that build an [`crate::state::AppState`]
    /// without touching the environment.
    #[must_use]
    pub fn in_memory(base_url: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            database_url: SecretString::from("sqlite::memory:"),
            database_max_connections: 1,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: base_url.into(),
            secret_key,
            tokens: TokenConfig::default(),
            email: EmailConfig::default(),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let from_address = get_optional_env("EMAIL_FROM")
            .unwrap_or_else(|| Self::default().from_address);

        let transport = match parse_env_or_default("EMAIL_BACKEND", "smtp")? {
            EmailBackend::Smtp => EmailTransport::Smtp(SmtpConfig {
                host: get_required_env("SMTP_HOST")?,
                port: parse_env_or_default("SMTP_PORT", "587")?,
                username: get_required_env("SMTP_USERNAME")?,
                password: get_required_secret("SMTP_PASSWORD")?,
            }),
            EmailBackend::Memory => EmailTransport::Memory,
        };

        Ok(Self {
            from_address,
            transport,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-signing-key-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "KEY").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "KEY").is_ok());
    }

    #[test]
    fn test_token_config_defaults() {
        let tokens = TokenConfig::default();
        assert_eq!(tokens.access_ttl_secs, 300);
        assert_eq!(tokens.refresh_ttl_secs, 86_400);
        assert_eq!(tokens.reset_ttl_secs, 259_200);
    }

    #[test]
    fn test_email_backend_parse() {
        assert_eq!("smtp".parse::<EmailBackend>(), Ok(EmailBackend::Smtp));
        assert_eq!("Memory".parse::<EmailBackend>(), Ok(EmailBackend::Memory));
        assert!("sendmail".parse::<EmailBackend>().is_err());
    }

    #[test]
    fn test_in_memory_config_opts_into_memory_mail() {
        let config = ApiConfig::in_memory(
            "http://localhost",
            SecretString::from("k7Qm2xVp9LrT4wZs8NbY3cHf6JdG1aEu"),
        );
        assert!(matches!(config.email.transport, EmailTransport::Memory));
    }

    #[test]
    fn test_smtp_config_debug_redacts_password() {
        let smtp = SmtpConfig {
            host: "smtp.mail.test".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: SecretString::from("hunter2-but-longer"),
        };

        let debug_output = format!("{smtp:?}");
        assert!(debug_output.contains("smtp.mail.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-but-longer"));
    }
}
