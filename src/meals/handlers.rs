use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{auth::services::AuthUser, images::services::UploadItem, state::AppState};

use super::dto::{CreateMealRequest, DeletedResponse, MealImagesResponse, MealSummary};
use super::error::MealError;
use super::search::{search_meals, Paginated, QueryParams};
use super::services;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/:id", get(get_meal))
        .route("/meals/:id/photo", get(get_photo)) // 302 to the first image
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", axum::routing::post(create_meal))
        .route("/meals/:id", axum::routing::delete(delete_meal))
        .route(
            "/meals/:id/images",
            axum::routing::post(upload_images).layer(DefaultBodyLimit::max(20 * 1024 * 1024)), // 20MB
        )
}

/// `GET /meals`: filtered, paginated listing.
#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Paginated<MealSummary>>, MealError> {
    let params = QueryParams::from_pairs(pairs);
    let page = search_meals(state.search.as_ref(), &params, state.config.search.max_page_size).await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealSummary>, MealError> {
    Ok(Json(services::get_meal(&state, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateMealRequest>,
) -> Result<impl IntoResponse, MealError> {
    let meal = services::create_meal(&state, user_id, &body).await.map_err(|e| {
        if !e.status().is_server_error() {
            warn!(error = %e, user_id = %user_id, "meal rejected");
        }
        e
    })?;
    let location = format!("/api/v1/meals/{}", meal.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(meal)))
}

/// `POST /meals/:id/images`, multipart field `images` (or `images[]`).
#[instrument(skip(state, mp))]
pub async fn upload_images(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<MealImagesResponse>), MealError> {
    let mut files = Vec::new();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| MealError::Invalid(e.to_string()))?
    {
        if !matches!(field.name(), Some("images") | Some("images[]")) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| MealError::Invalid(e.to_string()))?;
        files.push(UploadItem { body, content_type });
    }

    let stored = services::add_images(&state, user_id, id, files).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(skip(state))]
pub async fn get_photo(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MealError> {
    let url = services::first_photo_url(&state, id).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, MealError> {
    services::delete_meal(&state, user_id, id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        msg: "Meal deleted",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::search::memory::{address, creator, meal, MemorySearchStore};
    use crate::meals::search::GeoPoint;
    use std::sync::Arc;

    fn query(pairs: &[(&str, &str)]) -> Query<Vec<(String, String)>> {
        Query(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[tokio::test]
    async fn list_meals_runs_the_search_engine() {
        let chef = creator("Aiko Tanaka");
        let home = address(chef.id, "Tokyo", GeoPoint::new(35.6762, 139.6503));
        let mut store = MemorySearchStore::default();
        let mut ramen = meal("Shoyu ramen", "Japanese", &chef, &home);
        ramen.tags = vec!["noodles".into(), "soup".into()];
        store.add_meal(ramen);
        store.add_meal(meal("Gyoza", "Japanese", &chef, &home));
        let state = AppState::fake_with_search(Arc::new(store));

        let Json(page) = list_meals(
            State(state),
            AuthUser(Uuid::new_v4()),
            query(&[("tags[]", "soup"), ("tags[]", "noodles"), ("limit", "500")]),
        )
        .await
        .unwrap();

        assert!(page.success);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].name, "Shoyu ramen");
        assert_eq!(page.pagination.limit, 100);

        let body = serde_json::to_value(&page).unwrap();
        assert_eq!(body["pagination"]["totalPages"], 1);
        assert_eq!(body["data"][0]["createdBy"]["fullName"], "Aiko Tanaka");
        assert!(body["data"][0]["createdBy"].get("password").is_none());
    }

    #[tokio::test]
    async fn list_meals_maps_store_failure_to_500() {
        let state = AppState::fake_with_search(Arc::new(MemorySearchStore::failing()));
        let err = list_meals(State(state), AuthUser(Uuid::new_v4()), query(&[]))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
