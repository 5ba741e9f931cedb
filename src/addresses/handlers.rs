use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app::SERVER_ERROR,
    auth::{repo_types::User, services::AuthUser},
    meals::search::{PageRequest, Paginated},
    state::AppState,
};

use super::dto::{AddressDetails, AddressInput, CreateAddressRequest, MessageResponse};
use super::repo;

pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/:id",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route("/addresses/:id/active", patch(set_active_address))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "address operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.into())
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Address not found".into())
}

/// Stores a new address. The user's first live address becomes active, as
/// does any address created with `setAsActive`.
#[instrument(skip(state, payload))]
pub async fn create_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<AddressDetails>), (StatusCode, String)> {
    let new = payload.address.validate().map_err(|msg| {
        warn!(%msg, "invalid address");
        (StatusCode::BAD_REQUEST, msg)
    })?;

    let mut tx = state.db.begin().await.map_err(internal)?;
    let address = repo::insert(&mut *tx, user_id, &new).await.map_err(internal)?;
    let live = repo::count_live(&mut *tx, user_id).await.map_err(internal)?;
    if live == 1 || payload.set_as_active {
        User::set_active_address(&mut *tx, user_id, Some(address.id))
            .await
            .map_err(internal)?;
    }
    tx.commit().await.map_err(internal)?;

    info!(address_id = %address.id, user_id = %user_id, "address created");
    Ok((StatusCode::CREATED, Json(address.into())))
}

#[instrument(skip(state))]
pub async fn list_addresses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paginated<AddressDetails>>, (StatusCode, String)> {
    let page = PageRequest::parse(
        q.page.as_deref(),
        q.limit.as_deref(),
        state.config.search.max_page_size,
    );
    let (rows, total) = repo::list_live(&state.db, user_id, i64::from(page.limit), page.offset())
        .await
        .map_err(internal)?;
    let data = rows.into_iter().map(AddressDetails::from).collect();
    Ok(Json(Paginated::new(data, total, page)))
}

#[instrument(skip(state))]
pub async fn get_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AddressDetails>, (StatusCode, String)> {
    match repo::find_live_owned(&state.db, id, user_id).await.map_err(internal)? {
        Some(a) => Ok(Json(a.into())),
        None => Err(not_found()),
    }
}

/// Replaces the fields of one of the caller's live addresses. Which address
/// is active does not change.
#[instrument(skip(state, payload))]
pub async fn update_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddressInput>,
) -> Result<Json<AddressDetails>, (StatusCode, String)> {
    let changes = payload.validate().map_err(|msg| {
        warn!(%msg, "invalid address");
        (StatusCode::BAD_REQUEST, msg)
    })?;

    let address = repo::update_owned(&state.db, id, user_id, &changes)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;

    info!(address_id = %id, user_id = %user_id, "address updated");
    Ok(Json(address.into()))
}

#[instrument(skip(state))]
pub async fn set_active_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AddressDetails>, (StatusCode, String)> {
    let mut tx = state.db.begin().await.map_err(internal)?;
    let address = repo::find_live_owned(&mut *tx, id, user_id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    User::set_active_address(&mut *tx, user_id, Some(address.id))
        .await
        .map_err(internal)?;
    tx.commit().await.map_err(internal)?;

    info!(address_id = %id, user_id = %user_id, "active address changed");
    Ok(Json(address.into()))
}

/// Soft-deletes the address. When it was the active one, the newest remaining
/// live address takes its place, or the active address is cleared.
#[instrument(skip(state))]
pub async fn delete_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let mut tx = state.db.begin().await.map_err(internal)?;

    let user = User::lock_by_id(&mut *tx, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    if !repo::soft_delete_owned(&mut *tx, id, user_id).await.map_err(internal)? {
        return Err(not_found());
    }

    if user.active_address_id == Some(id) {
        let next = repo::latest_live(&mut *tx, user_id).await.map_err(internal)?;
        User::set_active_address(&mut *tx, user_id, next)
            .await
            .map_err(internal)?;
        info!(user_id = %user_id, next = ?next, "active address reassigned");
    }
    tx.commit().await.map_err(internal)?;

    info!(address_id = %id, user_id = %user_id, "address deleted");
    Ok(Json(MessageResponse {
        success: true,
        msg: "Address deleted",
    }))
}
