//! Grocery Core - Shared types library.
//!
//! This crate provides the domain types used across the grocery list components:
//! - `api` - JSON HTTP API (accounts, stores, groceries)
//! - `cli` - Command-line tools for migrations and account provisioning
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, usernames and passwords
//! - [`completion`] - The store completion rule

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod completion;
pub mod types;

pub use completion::is_store_completed;
pub use types::*;
