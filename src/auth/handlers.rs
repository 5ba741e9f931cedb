use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    addresses::dto::MessageResponse,
    app::SERVER_ERROR,
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            UpdateProfileRequest,
        },
        repo_types::{NewUser, User},
        services::{
            hash_password, is_valid_email, validate_password_change, validate_profile_update,
            validate_registration, verify_password, AuthUser, JwtKeys,
        },
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/me/password", put(change_password))
}

/// Callers log the cause before mapping it.
fn internal<E>(_: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.into())
}

fn issue_tokens(keys: &JwtKeys, user: &User) -> Result<AuthResponse, (StatusCode, String)> {
    let access_token = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let registration = validate_registration(&payload).map_err(|msg| {
        warn!(%msg, "invalid registration");
        (StatusCode::BAD_REQUEST, msg)
    })?;

    match User::identity_taken(
        &state.db,
        Some(&registration.email),
        Some(&registration.username),
        None,
    )
    .await
    {
        Ok(false) => {}
        Ok(true) => {
            warn!(email = %registration.email, username = %registration.username, "user already exists");
            return Err((StatusCode::CONFLICT, "Email or username already exists".into()));
        }
        Err(e) => {
            error!(error = %e, "identity lookup failed");
            return Err(internal(e));
        }
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        internal(e)
    })?;

    let new_user = NewUser {
        registration: &registration,
        password_hash: &hash,
    };
    let user = User::create(&state.db, &new_user).await.map_err(|e| {
        error!(error = %e, "create user failed");
        internal(e)
    })?;

    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(internal(e));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        internal(e)
    })?;

    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        (StatusCode::UNAUTHORIZED, e.to_string())
    })?;

    let user = match User::find_by_id(&state.db, claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => {
            error!(error = %e, user_id = %claims.sub, "load user failed");
            return Err(internal(e));
        }
    };

    Ok(Json(issue_tokens(&keys, &user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match User::find_by_id(&state.db, user_id).await {
        Ok(Some(user)) => Ok(Json(PublicUser::from(&user))),
        Ok(None) => {
            warn!(user_id = %user_id, "token for unknown user");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
        Err(e) => {
            error!(error = %e, user_id = %user_id, "load user failed");
            Err(internal(e))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let changes = validate_profile_update(&payload).map_err(|msg| {
        warn!(%msg, user_id = %user_id, "invalid profile update");
        (StatusCode::BAD_REQUEST, msg)
    })?;

    if changes.email.is_some() || changes.username.is_some() {
        let taken = User::identity_taken(
            &state.db,
            changes.email.as_deref(),
            changes.username.as_deref(),
            Some(user_id),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "identity lookup failed");
            internal(e)
        })?;
        if taken {
            warn!(user_id = %user_id, "profile update collides with another account");
            return Err((StatusCode::CONFLICT, "Email or username already exists".into()));
        }
    }

    match User::update_profile(&state.db, user_id, &changes).await {
        Ok(Some(user)) => {
            info!(user_id = %user_id, "profile updated");
            Ok(Json(PublicUser::from(&user)))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "update profile failed");
            Err(internal(e))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let (current, new) = validate_password_change(&payload).map_err(|msg| {
        warn!(%msg, user_id = %user_id, "invalid password change");
        (StatusCode::BAD_REQUEST, msg)
    })?;

    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "load user failed");
            return Err(internal(e));
        }
    };

    let ok = verify_password(current, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        internal(e)
    })?;
    if !ok {
        warn!(user_id = %user_id, "password change with wrong current password");
        return Err((StatusCode::BAD_REQUEST, "Current password is incorrect".into()));
    }

    let hash = hash_password(new).map_err(|e| {
        error!(error = %e, "hash_password failed");
        internal(e)
    })?;
    match User::set_password_hash(&state.db, user_id, &hash).await {
        Ok(true) => {}
        Ok(false) => return Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "update password failed");
            return Err(internal(e));
        }
    }

    info!(user_id = %user_id, "password changed");
    Ok(Json(MessageResponse {
        success: true,
        msg: "Password updated",
    }))
}

#[cfg(test)]
mod me_tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Aiko Tanaka".into(),
            username: "aiko".into(),
            email: "aiko@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            phone_number: None,
            postal_code: Some("150-0001".into()),
            profile_picture: None,
            is_chef: true,
            active_address_id: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn public_user_never_leaks_hash() {
        let json = serde_json::to_value(PublicUser::from(&user())).unwrap();
        assert_eq!(json["email"], "aiko@example.com");
        assert_eq!(json["fullName"], "Aiko Tanaka");
        assert_eq!(json["isChef"], true);
        assert!(json["activeAddress"].is_null());
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[tokio::test]
    async fn issued_tokens_belong_to_user() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let u = user();
        let body = issue_tokens(&keys, &u).unwrap();
        assert_eq!(keys.verify(&body.access_token).unwrap().sub, u.id);
        assert_eq!(keys.verify_refresh(&body.refresh_token).unwrap().sub, u.id);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("accessToken").is_some());
        assert_eq!(json["user"]["_id"], serde_json::json!(u.id));
    }

    #[tokio::test]
    async fn change_password_rejects_missing_or_short_passwords_with_400() {
        let body: ChangePasswordRequest =
            serde_json::from_str(r#"{"currentPassword":"old-password"}"#).unwrap();
        let err = change_password(State(AppState::fake()), AuthUser(Uuid::new_v4()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let body: ChangePasswordRequest =
            serde_json::from_str(r#"{"currentPassword":"old-password","newPassword":"tiny"}"#).unwrap();
        let err = change_password(State(AppState::fake()), AuthUser(Uuid::new_v4()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err, (StatusCode::BAD_REQUEST, "Password too short".to_string()));
    }

    #[test]
    fn refresh_request_accepts_both_spellings() {
        let a: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"t"}"#).unwrap();
        let b: RefreshRequest = serde_json::from_str(r#"{"refresh_token":"t"}"#).unwrap();
        assert_eq!(a.refresh_token, b.refresh_token);
    }
}
