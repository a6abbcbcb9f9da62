//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::ApiConfig;
use crate::services::{AccountService, EmailService, ListService, TokenService};
use grocery_core::UserId;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: SqlitePool,
    tokens: TokenService,
    email: EmailService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `SQLite` connection pool
    /// * `email` - Outgoing mail service
    #[must_use]
    pub fn new(config: ApiConfig, pool: SqlitePool, email: EmailService) -> Self {
        let tokens = TokenService::new(config.secret_key.clone(), config.tokens);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                email,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the email service.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Account operations borrowing this state.
    #[must_use]
    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(
            self.pool(),
            self.tokens(),
            self.email(),
            &self.inner.config.base_url,
        )
    }

    /// Store and grocery operations scoped to `owner`.
    #[must_use]
    pub fn lists(&self, owner: UserId) -> ListService<'_> {
        ListService::new(self.pool(), owner)
    }
}
