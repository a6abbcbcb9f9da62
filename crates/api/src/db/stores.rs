//! Store and grocery repository.
//!
//! Every lookup is filtered by `owner_id`, so a row owned by someone else is
//! indistinguishable from a missing one. Writes that touch both a grocery and
//! its store's completion flag run in a single transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use grocery_core::{GroceryId, StoreId, UserId, is_store_completed};

use super::{RepositoryError, begin_write};
use crate::models::{Grocery, Store, StoreDetail};

const STORE_COLUMNS: &str = "id, owner_id, name, is_completed, created_at, updated_at";
const GROCERY_COLUMNS: &str = "id, owner_id, store_id, name, is_completed, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    owner_id: UserId,
    name: String,
    is_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(r: StoreRow) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            is_completed: r.is_completed,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroceryRow {
    id: GroceryId,
    owner_id: UserId,
    store_id: StoreId,
    name: String,
    is_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroceryRow> for Grocery {
    fn from(r: GroceryRow) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            store_id: r.store_id,
            name: r.name,
            is_completed: r.is_completed,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Changes to apply to a store. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct StoreChanges {
    pub name: Option<String>,
    pub is_completed: Option<bool>,
    /// Names of new groceries to append.
    pub new_groceries: Vec<String>,
}

/// Changes to apply to a grocery. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct GroceryChanges {
    pub name: Option<String>,
    pub is_completed: Option<bool>,
}

/// Repository for store and grocery database operations.
pub struct StoreRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// List an owner's stores, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, owner: UserId) -> Result<Vec<Store>, RepositoryError> {
        let rows: Vec<StoreRow> = sqlx::query_as(&format!(
            "SELECT {STORE_COLUMNS} FROM store WHERE owner_id = ? ORDER BY id"
        ))
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Store::from).collect())
    }

    /// Get one of an owner's stores with its groceries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        owner: UserId,
        id: StoreId,
    ) -> Result<Option<StoreDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let Some(store) = fetch_store(&mut conn, owner, id).await? else {
            return Ok(None);
        };
        let groceries = fetch_groceries(&mut conn, id).await?;
        Ok(Some(StoreDetail { store, groceries }))
    }

    /// Create a store with its initial groceries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is written.
    pub async fn create(
        &self,
        owner: UserId,
        name: &str,
        grocery_names: &[String],
    ) -> Result<StoreDetail, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;
        let now = Utc::now();

        let row: StoreRow = sqlx::query_as(&format!(
            "INSERT INTO store (owner_id, name, is_completed, created_at, updated_at) \
             VALUES (?, ?, 0, ?, ?) RETURNING {STORE_COLUMNS}"
        ))
        .bind(owner)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let store = Store::from(row);

        for grocery_name in grocery_names {
            insert_grocery(&mut tx, owner, store.id, grocery_name).await?;
        }

        let groceries = fetch_groceries(&mut tx, store.id).await?;
        tx.commit().await?;

        Ok(StoreDetail { store, groceries })
    }

    /// Apply changes to one of an owner's stores.
    ///
    /// New groceries are appended first. Setting `is_completed = true` then
    /// forces every grocery in the store to completed; the stored flag ends up
    /// true only if the store is non-empty. Setting it to `false` clears the
    /// flag without touching the groceries. When the flag is not given but
    /// groceries were appended, the flag is recomputed.
    ///
    /// Returns `None` if the store doesn't exist or belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is written.
    pub async fn update(
        &self,
        owner: UserId,
        id: StoreId,
        changes: &StoreChanges,
    ) -> Result<Option<StoreDetail>, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let Some(mut store) = fetch_store(&mut tx, owner, id).await? else {
            return Ok(None);
        };
        let now = Utc::now();

        if let Some(name) = &changes.name {
            store.name.clone_from(name);
        }

        for grocery_name in &changes.new_groceries {
            insert_grocery(&mut tx, owner, id, grocery_name).await?;
        }

        match changes.is_completed {
            Some(true) => {
                sqlx::query(
                    "UPDATE grocery SET is_completed = 1, updated_at = ? \
                     WHERE store_id = ? AND is_completed = 0",
                )
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                let groceries = fetch_groceries(&mut tx, id).await?;
                store.is_completed = is_store_completed(groceries.iter().map(|g| g.is_completed));
            }
            Some(false) => store.is_completed = false,
            None if !changes.new_groceries.is_empty() => {
                let groceries = fetch_groceries(&mut tx, id).await?;
                store.is_completed = is_store_completed(groceries.iter().map(|g| g.is_completed));
            }
            None => {}
        }

        sqlx::query("UPDATE store SET name = ?, is_completed = ?, updated_at = ? WHERE id = ?")
            .bind(&store.name)
            .bind(store.is_completed)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        store.updated_at = now;

        let groceries = fetch_groceries(&mut tx, id).await?;
        tx.commit().await?;

        Ok(Some(StoreDetail { store, groceries }))
    }

    /// Delete one of an owner's stores and the owner's groceries in it.
    ///
    /// Returns `false` if the store doesn't exist or belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is deleted.
    pub async fn delete(&self, owner: UserId, id: StoreId) -> Result<bool, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        if fetch_store(&mut tx, owner, id).await?.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM grocery WHERE store_id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        // Any remaining rows go with the store through the foreign key cascade.
        sqlx::query("DELETE FROM store WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Groceries
    // =========================================================================

    /// Get one of an owner's groceries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_grocery(
        &self,
        owner: UserId,
        id: GroceryId,
    ) -> Result<Option<Grocery>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_grocery(&mut conn, owner, id).await
    }

    /// Add a grocery to one of an owner's stores and recompute the store flag.
    ///
    /// Returns `None` if the store doesn't exist or belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is written.
    pub async fn create_grocery(
        &self,
        owner: UserId,
        store_id: StoreId,
        name: &str,
    ) -> Result<Option<Grocery>, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let Some(store) = fetch_store(&mut tx, owner, store_id).await? else {
            return Ok(None);
        };

        let grocery = insert_grocery(&mut tx, owner, store_id, name).await?;
        recompute_store(&mut tx, &store).await?;
        tx.commit().await?;

        Ok(Some(grocery))
    }

    /// Apply changes to one of an owner's groceries and recompute its store.
    ///
    /// Returns the updated grocery and the store's recomputed completion flag,
    /// or `None` if the grocery doesn't exist or belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is written.
    pub async fn update_grocery(
        &self,
        owner: UserId,
        id: GroceryId,
        changes: &GroceryChanges,
    ) -> Result<Option<(Grocery, bool)>, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let Some(mut grocery) = fetch_grocery(&mut tx, owner, id).await? else {
            return Ok(None);
        };

        if let Some(name) = &changes.name {
            grocery.name.clone_from(name);
        }
        if let Some(is_completed) = changes.is_completed {
            grocery.is_completed = is_completed;
        }
        grocery.updated_at = Utc::now();

        sqlx::query("UPDATE grocery SET name = ?, is_completed = ?, updated_at = ? WHERE id = ?")
            .bind(&grocery.name)
            .bind(grocery.is_completed)
            .bind(grocery.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let store = fetch_store_by_id(&mut tx, grocery.store_id).await?;
        let is_completed = recompute_store(&mut tx, &store).await?;
        tx.commit().await?;

        Ok(Some((grocery, is_completed)))
    }

    /// Delete one of an owner's groceries and recompute its store.
    ///
    /// Returns the store's completion flag after the delete, or `None` if the
    /// grocery doesn't exist or belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is deleted.
    pub async fn delete_grocery(
        &self,
        owner: UserId,
        id: GroceryId,
    ) -> Result<Option<bool>, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let Some(grocery) = fetch_grocery(&mut tx, owner, id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM grocery WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let store = fetch_store_by_id(&mut tx, grocery.store_id).await?;
        let is_completed = recompute_store(&mut tx, &store).await?;
        tx.commit().await?;

        Ok(Some(is_completed))
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn fetch_store(
    conn: &mut SqliteConnection,
    owner: UserId,
    id: StoreId,
) -> Result<Option<Store>, RepositoryError> {
    let row: Option<StoreRow> = sqlx::query_as(&format!(
        "SELECT {STORE_COLUMNS} FROM store WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Store::from))
}

/// Load a store that must exist, e.g. the parent of a grocery just read.
async fn fetch_store_by_id(
    conn: &mut SqliteConnection,
    id: StoreId,
) -> Result<Store, RepositoryError> {
    let row: Option<StoreRow> =
        sqlx::query_as(&format!("SELECT {STORE_COLUMNS} FROM store WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(Store::from).ok_or_else(|| {
        RepositoryError::DataCorruption(format!("grocery references missing store {id}"))
    })
}

async fn fetch_grocery(
    conn: &mut SqliteConnection,
    owner: UserId,
    id: GroceryId,
) -> Result<Option<Grocery>, RepositoryError> {
    let row: Option<GroceryRow> = sqlx::query_as(&format!(
        "SELECT {GROCERY_COLUMNS} FROM grocery WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Grocery::from))
}

async fn fetch_groceries(
    conn: &mut SqliteConnection,
    store_id: StoreId,
) -> Result<Vec<Grocery>, RepositoryError> {
    let rows: Vec<GroceryRow> = sqlx::query_as(&format!(
        "SELECT {GROCERY_COLUMNS} FROM grocery WHERE store_id = ? ORDER BY id"
    ))
    .bind(store_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Grocery::from).collect())
}

async fn insert_grocery(
    conn: &mut SqliteConnection,
    owner: UserId,
    store_id: StoreId,
    name: &str,
) -> Result<Grocery, RepositoryError> {
    let now = Utc::now();
    let row: GroceryRow = sqlx::query_as(&format!(
        "INSERT INTO grocery (owner_id, store_id, name, is_completed, created_at, updated_at) \
         VALUES (?, ?, ?, 0, ?, ?) RETURNING {GROCERY_COLUMNS}"
    ))
    .bind(owner)
    .bind(store_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Grocery::from(row))
}

/// Recompute a store's completion flag from its groceries.
///
/// Writes the flag only when it changed. Returns the current value.
async fn recompute_store(
    conn: &mut SqliteConnection,
    store: &Store,
) -> Result<bool, RepositoryError> {
    let flags: Vec<bool> = sqlx::query_scalar("SELECT is_completed FROM grocery WHERE store_id = ?")
        .bind(store.id)
        .fetch_all(&mut *conn)
        .await?;

    let is_completed = is_store_completed(flags);
    if is_completed != store.is_completed {
        sqlx::query("UPDATE store SET is_completed = ?, updated_at = ? WHERE id = ?")
            .bind(is_completed)
            .bind(Utc::now())
            .bind(store.id)
            .execute(&mut *conn)
            .await?;
        tracing::debug!(store_id = %store.id, is_completed, "Store completion changed");
    }

    Ok(is_completed)
}
