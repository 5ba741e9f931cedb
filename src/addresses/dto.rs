use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::addresses::repo_types::Address;
use crate::meals::search::GeoPoint;

/// Address as returned to clients, standalone or expanded on a meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub formatted_address: Option<String>,
    pub location: GeoPoint,
}

impl From<Address> for AddressDetails {
    fn from(a: Address) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            street: a.street,
            city: a.city,
            state: a.state,
            postal_code: a.postal_code,
            country: a.country,
            formatted_address: a.formatted_address,
            location: GeoPoint::new(a.latitude, a.longitude),
        }
    }
}

/// Address fields as sent by clients; the body of `PUT /addresses/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub formatted_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Request body for `POST /addresses`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressRequest {
    #[serde(flatten)]
    pub address: AddressInput,
    #[serde(default)]
    pub set_as_active: bool,
}

/// Validated, trimmed address fields ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub formatted_address: Option<String>,
    pub location: GeoPoint,
}

fn required(name: &str, value: &str, max: usize) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{name} is required"));
    }
    if value.chars().count() > max {
        return Err(format!("{name} must be at most {max} characters"));
    }
    Ok(value.to_string())
}

fn optional(name: &str, value: Option<&str>, max: usize) -> Result<Option<String>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.chars().count() > max => Err(format!("{name} must be at most {max} characters")),
        Some(v) => Ok(Some(v.to_string())),
    }
}

impl AddressInput {
    pub fn validate(&self) -> Result<NewAddress, String> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err("latitude must be between -90 and 90".into());
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err("longitude must be between -180 and 180".into());
        }
        Ok(NewAddress {
            street: required("street", &self.street, 255)?,
            city: required("city", &self.city, 100)?,
            state: optional("state", self.state.as_deref(), 100)?,
            postal_code: optional("postalCode", self.postal_code.as_deref(), 20)?,
            country: required("country", &self.country, 100)?,
            formatted_address: optional("formattedAddress", self.formatted_address.as_deref(), 500)?,
            location: GeoPoint::new(self.latitude, self.longitude),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub msg: &'static str,
}
