use sqlx::FromRow;
use uuid::Uuid;

/// Live address record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub formatted_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

pub const ADDRESS_COLUMNS: &str =
    "id, user_id, street, city, state, postal_code, country, formatted_address, latitude, longitude";
