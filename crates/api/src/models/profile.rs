//! Profile domain types.

use grocery_core::{Email, ProfileId, UserId, Username};

/// A user's profile and friend set.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: ProfileId,
    pub owner_id: UserId,
    pub friends: Vec<Friend>,
}

/// Public view of an account in someone's friend set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
}
