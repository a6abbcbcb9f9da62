//! Grocery route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use grocery_core::{GroceryId, StoreId};

use super::{ApiJson, ApiPath};
use crate::error::{AppError, Result, ValidationErrors};
use crate::middleware::RequireAuth;
use crate::models::Grocery;
use crate::services::lists::GroceryUpdate;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateGroceryRequest {
    pub name: String,
    pub store_id: Option<StoreId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateGroceryRequest {
    pub name: Option<String>,
    pub is_completed: Option<bool>,
}

/// A grocery as returned by the API.
#[derive(Debug, Serialize)]
pub struct GroceryResponse {
    pub id: GroceryId,
    pub name: String,
    pub is_completed: bool,
    pub store_id: StoreId,
}

impl From<Grocery> for GroceryResponse {
    fn from(grocery: Grocery) -> Self {
        Self {
            id: grocery.id,
            name: grocery.name,
            is_completed: grocery.is_completed,
            store_id: grocery.store_id,
        }
    }
}

/// A grocery plus whether its store is now completed.
#[derive(Debug, Serialize)]
pub struct GroceryChangeResponse {
    #[serde(flatten)]
    pub grocery: GroceryResponse,
    pub is_store_completed: bool,
}

/// Body of a successful grocery delete.
#[derive(Debug, Serialize)]
pub struct DeletedGrocery {
    pub id: GroceryId,
    pub is_store_completed: bool,
}

/// Add a grocery to one of the owner's stores.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<CreateGroceryRequest>,
) -> Result<(StatusCode, Json<GroceryResponse>)> {
    let store_id = req.store_id.ok_or_else(|| {
        AppError::Validation(ValidationErrors::single("store_id", "This field is required."))
    })?;

    let grocery = state
        .lists(user.id)
        .create_grocery(store_id, &req.name)
        .await?;

    Ok((StatusCode::CREATED, Json(grocery.into())))
}

/// Show a grocery.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<GroceryId>,
) -> Result<Json<GroceryResponse>> {
    let grocery = state.lists(user.id).get_grocery(id).await?;
    Ok(Json(grocery.into()))
}

/// Rename or toggle a grocery. Answers 202 with the recomputed store flag.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<GroceryId>,
    ApiJson(req): ApiJson<UpdateGroceryRequest>,
) -> Result<(StatusCode, Json<GroceryChangeResponse>)> {
    let update = GroceryUpdate {
        name: req.name,
        is_completed: req.is_completed,
    };
    let (grocery, is_store_completed) = state.lists(user.id).update_grocery(id, &update).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GroceryChangeResponse {
            grocery: grocery.into(),
            is_store_completed,
        }),
    ))
}

/// Delete a grocery.
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<GroceryId>,
) -> Result<Json<DeletedGrocery>> {
    let is_store_completed = state.lists(user.id).delete_grocery(id).await?;
    Ok(Json(DeletedGrocery {
        id,
        is_store_completed,
    }))
}
