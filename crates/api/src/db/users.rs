//! User repository for database operations.
//!
//! Queries are checked at runtime against the embedded migrations; rows are
//! decoded into `UserRow` and validated into [`User`] on the way out.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use grocery_core::{Email, UserId, Username};

use super::{RepositoryError, begin_write};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, username, password_hash, is_active, is_staff, \
                            is_superuser, is_verified, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    password_hash: String,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let username = Username::parse(&r.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(r.id),
            email,
            username,
            password_hash: r.password_hash,
            is_active: r.is_active,
            is_staff: r.is_staff,
            is_superuser: r.is_superuser,
            is_verified: r.is_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a Email,
    pub username: &'a Username,
    pub password_hash: &'a str,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl<'a> NewUser<'a> {
    /// A regular, unverified account as created by self-registration.
    #[must_use]
    pub const fn regular(email: &'a Email, username: &'a Username, password_hash: &'a str) -> Self {
        Self {
            email,
            username,
            password_hash,
            is_verified: false,
            is_staff: false,
            is_superuser: false,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?"))
                .bind(email.as_str())
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Whether an account already uses this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user WHERE email = ?)")
            .bind(email.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Whether an account already uses this username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn username_exists(&self, username: &Username) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user WHERE username = ?)")
                .bind(username.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming the column (`email` or
    /// `username`) if either is already taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO user (email, username, password_hash, is_active, is_staff, \
                               is_superuser, is_verified, created_at, updated_at) \
             VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new.email.as_str())
        .bind(new.username.as_str())
        .bind(new.password_hash)
        .bind(new.is_staff)
        .bind(new.is_superuser)
        .bind(new.is_verified)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_unique)?;

        User::try_from(row)
    }

    /// Mark an account's email as verified. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn mark_verified(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE user SET is_verified = 1, \
                 updated_at = CASE WHEN is_verified THEN updated_at ELSE ? END \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Replace an account's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let result = sqlx::query("UPDATE user SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Change an account's username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_username(
        &self,
        id: UserId,
        username: &Username,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE user SET username = ?, updated_at = ? WHERE id = ?")
            .bind(username.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_unique)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Enable or disable an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_active(&self, id: UserId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE user SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::create_in_memory_pool;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn username(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let pool = create_in_memory_pool().await.unwrap();
        let users = UserRepository::new(&pool);

        let e = email("alice@example.com");
        let u = username("alice");
        let created = users.create(&NewUser::regular(&e, &u, "hash")).await.unwrap();

        assert!(created.is_active);
        assert!(!created.is_verified);

        let by_email = users.get_by_email(&e).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_id = users.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, u);
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_conflict() {
        let pool = create_in_memory_pool().await.unwrap();
        let users = UserRepository::new(&pool);

        let e = email("alice@example.com");
        let u = username("alice");
        users.create(&NewUser::regular(&e, &u, "hash")).await.unwrap();

        let other_u = username("alice2");
        let err = users
            .create(&NewUser::regular(&e, &other_u, "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref c) if c == "email"));

        let other_e = email("alice2@example.com");
        let err = users
            .create(&NewUser::regular(&other_e, &u, "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref c) if c == "username"));

        assert!(users.email_exists(&e).await.unwrap());
        assert!(!users.username_exists(&other_u).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_verified_is_idempotent() {
        let pool = create_in_memory_pool().await.unwrap();
        let users = UserRepository::new(&pool);

        let e = email("bob@example.com");
        let u = username("bob");
        let created = users.create(&NewUser::regular(&e, &u, "hash")).await.unwrap();

        users.mark_verified(created.id).await.unwrap();
        users.mark_verified(created.id).await.unwrap();

        let fetched = users.get_by_id(created.id).await.unwrap().unwrap();
        assert!(fetched.is_verified);

        let err = users.mark_verified(UserId::new(9999)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_set_password_hash() {
        let pool = create_in_memory_pool().await.unwrap();
        let users = UserRepository::new(&pool);

        let e = email("carol@example.com");
        let u = username("carol");
        let created = users.create(&NewUser::regular(&e, &u, "old")).await.unwrap();

        users.set_password_hash(created.id, "new").await.unwrap();
        let fetched = users.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.password_hash, "new");
    }
}
