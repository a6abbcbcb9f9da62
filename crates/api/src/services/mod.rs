//! Business logic services.
//!
//! Services borrow the pool and shared clients from [`crate::state::AppState`]
//! for the duration of a request.

pub mod auth;
pub mod email;
pub mod lists;
pub mod tokens;

pub use auth::{AccountService, AuthError};
pub use email::{EmailService, Outbox};
pub use lists::{ListError, ListService};
pub use tokens::{TokenKind, TokenService};
