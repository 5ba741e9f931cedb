use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::{
    addresses,
    app::SERVER_ERROR,
    auth::{dto::PublicUser, repo_types::User, services::AuthUser},
    state::AppState,
};

use super::repo;
use super::repo_types::Chef;

pub fn chef_routes() -> Router<AppState> {
    Router::new().route("/chefs/become", post(become_chef))
}

#[derive(Debug, Deserialize)]
pub struct BecomeChefRequest {
    pub specialty: String,
}

#[derive(Debug, Serialize)]
pub struct BecomeChefResponse {
    pub user: PublicUser,
    pub chef: Chef,
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "become chef failed");
    (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.into())
}

/// Turns the caller into a chef. The user flag and the chef profile are
/// written in one transaction.
#[instrument(skip(state, payload))]
pub async fn become_chef(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<BecomeChefRequest>,
) -> Result<(StatusCode, Json<BecomeChefResponse>), (StatusCode, String)> {
    let specialty = payload.specialty.trim();
    if specialty.chars().count() < 3 {
        warn!("specialty missing or too short");
        return Err((
            StatusCode::BAD_REQUEST,
            "Specialty must be at least 3 characters long".into(),
        ));
    }

    let mut tx = state.db.begin().await.map_err(internal)?;

    let mut user = match User::lock_by_id(&mut *tx, user_id).await.map_err(internal)? {
        Some(u) => u,
        None => return Err((StatusCode::NOT_FOUND, "User not found".into())),
    };
    if user.is_chef {
        warn!(user_id = %user_id, "already a chef");
        return Err((StatusCode::BAD_REQUEST, "User is already a chef".into()));
    }

    let active_postal = match user.active_address_id {
        Some(address_id) => addresses::repo::find_live_owned(&mut *tx, address_id, user_id)
            .await
            .map_err(internal)?
            .and_then(|a| a.postal_code),
        None => None,
    };
    let postal_code = active_postal.or_else(|| user.postal_code.clone());

    let chef = repo::insert(&mut *tx, user_id, specialty, postal_code.as_deref())
        .await
        .map_err(internal)?;
    User::mark_chef(&mut *tx, user_id).await.map_err(internal)?;
    tx.commit().await.map_err(internal)?;

    user.is_chef = true;
    info!(user_id = %user_id, chef_id = %chef.id, "user became chef");
    Ok((
        StatusCode::CREATED,
        Json(BecomeChefResponse {
            user: PublicUser::from(&user),
            chef,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn chef_serializes_with_user_reference() {
        let user_id = Uuid::new_v4();
        let chef = Chef {
            id: Uuid::new_v4(),
            user_id,
            specialty: "Ramen".into(),
            postal_code: Some("150-0001".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&chef).unwrap();
        assert_eq!(json["user"], serde_json::json!(user_id));
        assert_eq!(json["postalCode"], "150-0001");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
    }
}
