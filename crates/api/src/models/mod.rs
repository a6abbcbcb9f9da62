//! Domain models for the grocery API.
//!
//! These are validated domain types, separate from the database row types in
//! [`crate::db`] and the JSON shapes in [`crate::routes`].

pub mod profile;
pub mod store;
pub mod user;

pub use profile::{Friend, Profile};
pub use store::{Grocery, Store, StoreDetail};
pub use user::User;
