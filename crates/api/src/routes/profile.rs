//! Profile and friend list route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use grocery_core::{ProfileId, UserId};

use super::{ApiJson, ApiPath};
use crate::error::{AppError, Result, ValidationErrors};
use crate::middleware::RequireAuth;
use crate::models::{Friend, Profile};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddFriendRequest {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Serialize)]
pub struct FriendResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<Friend> for FriendResponse {
    fn from(friend: Friend) -> Self {
        Self {
            id: friend.id,
            username: friend.username.to_string(),
            email: friend.email.into_inner(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: ProfileId,
    pub friends: Vec<FriendResponse>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            friends: profile.friends.into_iter().map(FriendResponse::from).collect(),
        }
    }
}

/// Show the authenticated user's profile.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ProfileResponse>> {
    let profile = state.accounts().profile(&user).await?;
    Ok(Json(profile.into()))
}

/// Add a friend.
pub async fn add_friend(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<AddFriendRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>)> {
    let friend = req.user_id.ok_or_else(|| {
        AppError::Validation(ValidationErrors::single("user_id", "This field is required."))
    })?;

    let profile = state.accounts().add_friend(&user, friend).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// Remove a friend.
pub async fn remove_friend(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(friend): ApiPath<UserId>,
) -> Result<Json<ProfileResponse>> {
    let profile = state.accounts().remove_friend(&user, friend).await?;
    Ok(Json(profile.into()))
}
