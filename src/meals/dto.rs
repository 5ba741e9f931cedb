use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::addresses::dto::AddressDetails;
use crate::meals::search::ParamValue;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionalInfo {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub vitamins: Vec<String>,
}

/// Creator as shown on a listing: never more than id, name and email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

/// A meal as returned by listings and lookups, enriched with its creator and
/// address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub ingredients: Vec<String>,
    pub category: String,
    pub cuisine: String,
    pub portion_size: String,
    pub nutritional_info: Option<NutritionalInfo>,
    pub dietary_restrictions: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expiration_date: OffsetDateTime,
    pub pickup_delivery_options: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub preparation_date: OffsetDateTime,
    pub payment_options: Vec<String>,
    pub tags: Vec<String>,
    pub discounts_promotions: Vec<String>,
    pub seller_rating: i16,
    pub quantity_available: i32,
    pub images: Vec<String>,
    pub created_by: CreatorSummary,
    pub address: AddressDetails,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct NutritionalInfoInput {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub vitamins: Option<ParamValue>,
}

/// Body of `POST /meals`. List fields take a comma-separated string or an array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub ingredients: Option<ParamValue>,
    pub category: String,
    pub cuisine: String,
    pub portion_size: String,
    pub nutritional_info: Option<NutritionalInfoInput>,
    pub dietary_restrictions: Option<ParamValue>,
    #[serde(with = "time::serde::rfc3339")]
    pub expiration_date: OffsetDateTime,
    pub pickup_delivery_options: Option<ParamValue>,
    #[serde(with = "time::serde::rfc3339")]
    pub preparation_date: OffsetDateTime,
    pub payment_options: Option<ParamValue>,
    pub tags: Option<ParamValue>,
    pub discounts_promotions: Option<ParamValue>,
    pub seller_rating: Option<i16>,
    pub quantity_available: i32,
    pub address_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MealImagesResponse {
    /// Stored object keys, in upload order.
    pub images: Vec<String>,
    /// Short-lived download URLs, one per key.
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub msg: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_accepts_mixed_list_shapes() {
        let body = serde_json::json!({
            "name": "Pad Thai",
            "description": "Rice noodles",
            "price": 12.5,
            "ingredients": "noodles, tofu, peanuts",
            "category": "Dinner",
            "cuisine": "Thai",
            "portionSize": "1 plate",
            "dietaryRestrictions": ["Vegan"],
            "expirationDate": "2030-01-02T18:00:00Z",
            "pickupDeliveryOptions": "Pickup",
            "preparationDate": "2030-01-01T18:00:00Z",
            "paymentOptions": ["Cash", "Card"],
            "tags": "noodles",
            "quantityAvailable": 3
        });
        let req: CreateMealRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.portion_size, "1 plate");
        assert_eq!(req.ingredients, Some(ParamValue::One("noodles, tofu, peanuts".into())));
        assert_eq!(req.payment_options, Some(ParamValue::Many(vec!["Cash".into(), "Card".into()])));
        assert!(req.address_id.is_none());
        assert!(req.seller_rating.is_none());
    }

    #[test]
    fn nutritional_info_defaults_missing_numbers() {
        let info: NutritionalInfo = serde_json::from_str(r#"{"calories": 420}"#).unwrap();
        assert_eq!(info.calories, 420.0);
        assert_eq!(info.protein, 0.0);
        assert!(info.vitamins.is_empty());
    }
}
