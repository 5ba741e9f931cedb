use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub phone_number: Option<String>,
    pub postal_code: Option<String>,
    pub profile_picture: Option<String>,
    pub is_chef: bool,
    pub active_address_id: Option<Uuid>, // default address for new listings
    pub created_at: OffsetDateTime,
}

/// Fields needed to create a user; the password is already hashed.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub registration: &'a crate::auth::services::Registration,
    pub password_hash: &'a str,
}
