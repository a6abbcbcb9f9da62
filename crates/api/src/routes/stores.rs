//! Store route handlers.
//!
//! Every handler is scoped to the authenticated owner; another account's store
//! answers 404 exactly like a missing one.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use grocery_core::StoreId;

use super::{ApiJson, ApiPath};
use super::groceries::GroceryResponse;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Store, StoreDetail};
use crate::services::lists::StoreUpdate;
use crate::state::AppState;

/// A grocery given inline when creating or updating a store.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewGroceryRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateStoreRequest {
    pub name: String,
    pub groceries: Vec<NewGroceryRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateStoreRequest {
    pub name: Option<String>,
    pub is_completed: Option<bool>,
    pub groceries: Vec<NewGroceryRequest>,
}

/// Store as shown in the list view.
#[derive(Debug, Serialize)]
pub struct StoreSummary {
    pub id: StoreId,
    pub name: String,
    pub is_completed: bool,
}

impl From<Store> for StoreSummary {
    fn from(store: Store) -> Self {
        Self {
            id: store.id,
            name: store.name,
            is_completed: store.is_completed,
        }
    }
}

/// Store with its groceries.
#[derive(Debug, Serialize)]
pub struct StoreDetailResponse {
    pub id: StoreId,
    pub name: String,
    pub is_completed: bool,
    pub groceries: Vec<GroceryResponse>,
}

impl From<StoreDetail> for StoreDetailResponse {
    fn from(detail: StoreDetail) -> Self {
        Self {
            id: detail.store.id,
            name: detail.store.name,
            is_completed: detail.store.is_completed,
            groceries: detail
                .groceries
                .into_iter()
                .map(GroceryResponse::from)
                .collect(),
        }
    }
}

/// Body of a successful store delete.
#[derive(Debug, Serialize)]
pub struct DeletedStore {
    pub id: StoreId,
}

fn names(groceries: Vec<NewGroceryRequest>) -> Vec<String> {
    groceries.into_iter().map(|g| g.name).collect()
}

/// List the owner's stores.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<StoreSummary>>> {
    let stores = state.lists(user.id).list_stores().await?;
    Ok(Json(stores.into_iter().map(StoreSummary::from).collect()))
}

/// Create a store, optionally with groceries.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<CreateStoreRequest>,
) -> Result<(StatusCode, Json<StoreDetailResponse>)> {
    let detail = state
        .lists(user.id)
        .create_store(&req.name, &names(req.groceries))
        .await?;

    Ok((StatusCode::CREATED, Json(detail.into())))
}

/// Show a store with its groceries.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
) -> Result<Json<StoreDetailResponse>> {
    let detail = state.lists(user.id).get_store(id).await?;
    Ok(Json(detail.into()))
}

/// Rename, complete and/or append groceries. Answers 202.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
    ApiJson(req): ApiJson<UpdateStoreRequest>,
) -> Result<(StatusCode, Json<StoreDetailResponse>)> {
    let update = StoreUpdate {
        name: req.name,
        is_completed: req.is_completed,
        groceries: names(req.groceries),
    };
    let detail = state.lists(user.id).update_store(id, &update).await?;

    Ok((StatusCode::ACCEPTED, Json(detail.into())))
}

/// Delete a store and its groceries, echoing the deleted ID.
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
) -> Result<Json<DeletedStore>> {
    state.lists(user.id).delete_store(id).await?;
    let store_id = id.to_string();
    add_breadcrumb("lists", "Store deleted", Some(&[("store_id", store_id.as_str())]));
    Ok(Json(DeletedStore { id }))
}
