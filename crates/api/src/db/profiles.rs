//! Profile repository.
//!
//! Friendship is symmetric and stored as two rows, one per direction, so
//! both sides see each other without a union query.

use sqlx::{SqliteConnection, SqlitePool};

use grocery_core::{Email, ProfileId, UserId, Username};

use super::{RepositoryError, begin_write};
use crate::models::{Friend, Profile};

#[derive(sqlx::FromRow)]
struct FriendRow {
    id: i64,
    username: String,
    email: String,
}

impl TryFrom<FriendRow> for Friend {
    type Error = RepositoryError;

    fn try_from(r: FriendRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(r.id),
            username: Username::parse(&r.username).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
            })?,
            email: Email::parse(&r.email).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?,
        })
    }
}

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user's profile, creating an empty one on first access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(&self, owner: UserId) -> Result<Profile, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;
        let id = ensure_profile(&mut tx, owner).await?;
        let friends = fetch_friends(&mut tx, id).await?;
        tx.commit().await?;

        Ok(Profile {
            id,
            owner_id: owner,
            friends,
        })
    }

    /// Make two users friends. Adding an existing friend is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `friend` is not an account.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add_friend(
        &self,
        owner: UserId,
        friend: UserId,
    ) -> Result<Profile, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user WHERE id = ?)")
            .bind(friend)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let own_profile = ensure_profile(&mut tx, owner).await?;
        let their_profile = ensure_profile(&mut tx, friend).await?;

        for (profile_id, friend_id) in [(own_profile, friend), (their_profile, owner)] {
            sqlx::query("INSERT OR IGNORE INTO profile_friend (profile_id, friend_id) VALUES (?, ?)")
                .bind(profile_id)
                .bind(friend_id)
                .execute(&mut *tx)
                .await?;
        }

        let friends = fetch_friends(&mut tx, own_profile).await?;
        tx.commit().await?;

        Ok(Profile {
            id: own_profile,
            owner_id: owner,
            friends,
        })
    }

    /// End a friendship in both directions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the users are not friends.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn remove_friend(
        &self,
        owner: UserId,
        friend: UserId,
    ) -> Result<Profile, RepositoryError> {
        let mut tx = begin_write(self.pool).await?;

        let own_profile = ensure_profile(&mut tx, owner).await?;
        let removed = sqlx::query("DELETE FROM profile_friend WHERE profile_id = ? AND friend_id = ?")
            .bind(own_profile)
            .bind(friend)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            "DELETE FROM profile_friend \
             WHERE profile_id = (SELECT id FROM profile WHERE owner_id = ?) AND friend_id = ?",
        )
        .bind(friend)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        let friends = fetch_friends(&mut tx, own_profile).await?;
        tx.commit().await?;

        Ok(Profile {
            id: own_profile,
            owner_id: owner,
            friends,
        })
    }
}

async fn ensure_profile(
    conn: &mut SqliteConnection,
    owner: UserId,
) -> Result<ProfileId, RepositoryError> {
    sqlx::query("INSERT OR IGNORE INTO profile (owner_id) VALUES (?)")
        .bind(owner)
        .execute(&mut *conn)
        .await?;

    let id: ProfileId = sqlx::query_scalar("SELECT id FROM profile WHERE owner_id = ?")
        .bind(owner)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

async fn fetch_friends(
    conn: &mut SqliteConnection,
    profile: ProfileId,
) -> Result<Vec<Friend>, RepositoryError> {
    let rows: Vec<FriendRow> = sqlx::query_as(
        "SELECT u.id, u.username, u.email \
         FROM profile_friend pf \
         JOIN user u ON u.id = pf.friend_id \
         WHERE pf.profile_id = ? \
         ORDER BY u.id",
    )
    .bind(profile)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Friend::try_from).collect()
}
