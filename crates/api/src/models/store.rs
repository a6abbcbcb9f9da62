//! Store and grocery domain types.

use chrono::{DateTime, Utc};

use grocery_core::{GroceryId, StoreId, UserId};

/// A shopping list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    /// True iff the store has at least one grocery and all are completed.
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item on a shopping list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grocery {
    pub id: GroceryId,
    pub owner_id: UserId,
    pub store_id: StoreId,
    pub name: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A store together with its groceries, oldest first.
#[derive(Debug, Clone)]
pub struct StoreDetail {
    pub store: Store,
    pub groceries: Vec<Grocery>,
}
