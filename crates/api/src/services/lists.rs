//! Store and grocery service.
//!
//! Validates names and turns "missing or not yours" into a single not-found
//! error per resource, so callers never learn whether another account's store
//! or grocery exists.

use sqlx::SqlitePool;
use thiserror::Error;

use grocery_core::{GroceryId, StoreId, UserId};

use crate::db::stores::{GroceryChanges, StoreChanges};
use crate::db::{RepositoryError, StoreRepository};
use crate::error::ValidationErrors;
use crate::models::{Grocery, Store, StoreDetail};

/// Maximum length of a store or grocery name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Errors that can occur during store and grocery operations.
#[derive(Debug, Error)]
pub enum ListError {
    /// One or more request fields are invalid.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// No store with that ID belongs to the requester.
    #[error("store not found")]
    StoreNotFound,

    /// No grocery with that ID belongs to the requester.
    #[error("grocery not found")]
    GroceryNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ValidationErrors> for ListError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// A store update as received from a client.
#[derive(Debug, Clone, Default)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub is_completed: Option<bool>,
    pub groceries: Vec<String>,
}

/// A grocery update as received from a client.
#[derive(Debug, Clone, Default)]
pub struct GroceryUpdate {
    pub name: Option<String>,
    pub is_completed: Option<bool>,
}

/// Store and grocery operations for one requester.
pub struct ListService<'a> {
    stores: StoreRepository<'a>,
    owner: UserId,
}

impl<'a> ListService<'a> {
    /// Create a list service scoped to `owner`.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, owner: UserId) -> Self {
        Self {
            stores: StoreRepository::new(pool),
            owner,
        }
    }

    /// # Errors
    ///
    /// Returns `ListError::Repository` if the database fails.
    pub async fn list_stores(&self) -> Result<Vec<Store>, ListError> {
        Ok(self.stores.list(self.owner).await?)
    }

    /// # Errors
    ///
    /// Returns `ListError::StoreNotFound` if the requester has no such store.
    pub async fn get_store(&self, id: StoreId) -> Result<StoreDetail, ListError> {
        self.stores
            .get(self.owner, id)
            .await?
            .ok_or(ListError::StoreNotFound)
    }

    /// Create a store, optionally with initial groceries.
    ///
    /// # Errors
    ///
    /// Returns `ListError::Validation` if any name is blank or too long.
    pub async fn create_store(
        &self,
        name: &str,
        groceries: &[String],
    ) -> Result<StoreDetail, ListError> {
        let mut errors = ValidationErrors::new();
        let name = check_name(&mut errors, "name", name);
        let groceries = check_grocery_names(&mut errors, groceries);
        errors.into_result()?;

        let detail = self.stores.create(self.owner, &name, &groceries).await?;
        tracing::info!(
            user_id = %self.owner,
            store_id = %detail.store.id,
            groceries = detail.groceries.len(),
            "Store created"
        );
        Ok(detail)
    }

    /// Rename, complete and/or append groceries to a store.
    ///
    /// # Errors
    ///
    /// Returns `ListError::Validation` if any name is blank or too long and
    /// `ListError::StoreNotFound` if the requester has no such store.
    pub async fn update_store(
        &self,
        id: StoreId,
        update: &StoreUpdate,
    ) -> Result<StoreDetail, ListError> {
        let mut errors = ValidationErrors::new();
        let name = update
            .name
            .as_deref()
            .map(|n| check_name(&mut errors, "name", n));
        let new_groceries = check_grocery_names(&mut errors, &update.groceries);
        errors.into_result()?;

        let changes = StoreChanges {
            name,
            is_completed: update.is_completed,
            new_groceries,
        };

        let detail = self
            .stores
            .update(self.owner, id, &changes)
            .await?
            .ok_or(ListError::StoreNotFound)?;

        tracing::info!(
            user_id = %self.owner,
            store_id = %id,
            is_completed = detail.store.is_completed,
            "Store updated"
        );
        Ok(detail)
    }

    /// Delete a store and its groceries.
    ///
    /// # Errors
    ///
    /// Returns `ListError::StoreNotFound` if the requester has no such store.
    pub async fn delete_store(&self, id: StoreId) -> Result<(), ListError> {
        if !self.stores.delete(self.owner, id).await? {
            return Err(ListError::StoreNotFound);
        }
        tracing::info!(user_id = %self.owner, store_id = %id, "Store deleted");
        Ok(())
    }

    /// Add a grocery to one of the requester's stores.
    ///
    /// # Errors
    ///
    /// Returns `ListError::Validation` if the name is blank or too long and
    /// `ListError::StoreNotFound` if the requester has no such store.
    pub async fn create_grocery(&self, store_id: StoreId, name: &str) -> Result<Grocery, ListError> {
        let mut errors = ValidationErrors::new();
        let name = check_name(&mut errors, "name", name);
        errors.into_result()?;

        let grocery = self
            .stores
            .create_grocery(self.owner, store_id, &name)
            .await?
            .ok_or(ListError::StoreNotFound)?;

        tracing::info!(
            user_id = %self.owner,
            store_id = %store_id,
            grocery_id = %grocery.id,
            "Grocery created"
        );
        Ok(grocery)
    }

    /// # Errors
    ///
    /// Returns `ListError::GroceryNotFound` if the requester has no such grocery.
    pub async fn get_grocery(&self, id: GroceryId) -> Result<Grocery, ListError> {
        self.stores
            .get_grocery(self.owner, id)
            .await?
            .ok_or(ListError::GroceryNotFound)
    }

    /// Rename and/or toggle a grocery.
    ///
    /// Returns the grocery and whether its store is now completed.
    ///
    /// # Errors
    ///
    /// Returns `ListError::Validation` if the name is blank or too long and
    /// `ListError::GroceryNotFound` if the requester has no such grocery.
    pub async fn update_grocery(
        &self,
        id: GroceryId,
        update: &GroceryUpdate,
    ) -> Result<(Grocery, bool), ListError> {
        let mut errors = ValidationErrors::new();
        let name = update
            .name
            .as_deref()
            .map(|n| check_name(&mut errors, "name", n));
        errors.into_result()?;

        let changes = GroceryChanges {
            name,
            is_completed: update.is_completed,
        };

        let (grocery, store_completed) = self
            .stores
            .update_grocery(self.owner, id, &changes)
            .await?
            .ok_or(ListError::GroceryNotFound)?;

        tracing::info!(
            user_id = %self.owner,
            grocery_id = %id,
            store_completed,
            "Grocery updated"
        );
        Ok((grocery, store_completed))
    }

    /// Delete a grocery. Returns whether its store is now completed.
    ///
    /// # Errors
    ///
    /// Returns `ListError::GroceryNotFound` if the requester has no such grocery.
    pub async fn delete_grocery(&self, id: GroceryId) -> Result<bool, ListError> {
        let store_completed = self
            .stores
            .delete_grocery(self.owner, id)
            .await?
            .ok_or(ListError::GroceryNotFound)?;

        tracing::info!(user_id = %self.owner, grocery_id = %id, "Grocery deleted");
        Ok(store_completed)
    }
}

fn check_name(errors: &mut ValidationErrors, field: &str, raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        errors.add(field, "This field may not be blank.");
    } else if name.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_NAME_LENGTH} characters."),
        );
    }
    name.to_owned()
}

fn check_grocery_names(errors: &mut ValidationErrors, names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| check_name(errors, "groceries", n))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name_trims() {
        let mut errors = ValidationErrors::new();
        assert_eq!(check_name(&mut errors, "name", "  Target "), "Target");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_check_name_rejects_blank_and_long() {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "name", "   ");
        check_name(&mut errors, "name", &"x".repeat(MAX_NAME_LENGTH + 1));
        assert_eq!(errors.field("name").unwrap().len(), 2);
    }

    #[test]
    fn test_grocery_names_reported_under_groceries() {
        let mut errors = ValidationErrors::new();
        let names = check_grocery_names(&mut errors, &["Onion".to_owned(), String::new()]);
        assert_eq!(names.len(), 2);
        assert_eq!(errors.field("groceries").unwrap().len(), 1);
    }
}
