use tracing::info;
use uuid::Uuid;

use crate::{
    addresses,
    auth::repo_types::User,
    images::services::{
        ext_from_mime, presign_key, presign_many, remove_objects, upload_meal_images, UploadItem,
        PRESIGN_TTL_SECS,
    },
    state::AppState,
};

use super::dto::{CreateMealRequest, MealImagesResponse, MealSummary, NutritionalInfo, NutritionalInfoInput};
use super::error::MealError;
use super::repo::{self, NewMeal};
use super::search::normalize_list;

/// Most images a single upload request may carry.
pub const MAX_IMAGES_PER_UPLOAD: usize = 5;

fn text(name: &str, value: &str, max: Option<usize>) -> Result<String, MealError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MealError::Invalid(format!("{name} is required")));
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(MealError::Invalid(format!("{name} must be at most {max} characters")));
        }
    }
    Ok(value.to_string())
}

fn non_empty(name: &str, values: Vec<String>) -> Result<Vec<String>, MealError> {
    if values.is_empty() {
        return Err(MealError::Invalid(format!("{name} must not be empty")));
    }
    Ok(values)
}

fn non_negative(name: &str, value: Option<f64>) -> Result<f64, MealError> {
    match value {
        None => Ok(0.0),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(_) => Err(MealError::Invalid(format!("{name} must be a non-negative number"))),
    }
}

fn nutrition(input: &NutritionalInfoInput) -> Result<NutritionalInfo, MealError> {
    Ok(NutritionalInfo {
        calories: non_negative("calories", input.calories)?,
        protein: non_negative("protein", input.protein)?,
        fat: non_negative("fat", input.fat)?,
        carbs: non_negative("carbs", input.carbs)?,
        vitamins: normalize_list(input.vitamins.as_ref()),
    })
}

impl CreateMealRequest {
    /// Trims and normalises the body; list fields keep their given order.
    pub fn validate(&self) -> Result<NewMeal, MealError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(MealError::Invalid("price must be a non-negative number".into()));
        }
        if self.quantity_available < 1 {
            return Err(MealError::Invalid("quantityAvailable must be at least 1".into()));
        }
        let seller_rating = self.seller_rating.unwrap_or(1);
        if !(1..=5).contains(&seller_rating) {
            return Err(MealError::Invalid("sellerRating must be between 1 and 5".into()));
        }
        Ok(NewMeal {
            name: text("name", &self.name, Some(255))?,
            description: text("description", &self.description, None)?,
            price: self.price,
            ingredients: non_empty("ingredients", normalize_list(self.ingredients.as_ref()))?,
            category: text("category", &self.category, Some(100))?,
            cuisine: text("cuisine", &self.cuisine, Some(100))?,
            portion_size: text("portionSize", &self.portion_size, Some(100))?,
            nutritional_info: self.nutritional_info.as_ref().map(nutrition).transpose()?,
            dietary_restrictions: normalize_list(self.dietary_restrictions.as_ref()),
            expiration_date: self.expiration_date,
            pickup_delivery_options: non_empty(
                "pickupDeliveryOptions",
                normalize_list(self.pickup_delivery_options.as_ref()),
            )?,
            preparation_date: self.preparation_date,
            payment_options: non_empty("paymentOptions", normalize_list(self.payment_options.as_ref()))?,
            tags: non_empty("tags", normalize_list(self.tags.as_ref()))?,
            discounts_promotions: normalize_list(self.discounts_promotions.as_ref()),
            seller_rating,
            quantity_available: self.quantity_available,
        })
    }
}

/// An explicit address must be the user's live address; otherwise the user's
/// active address is used.
pub async fn resolve_address(
    st: &AppState,
    user: &User,
    requested: Option<Uuid>,
) -> Result<Uuid, MealError> {
    let address_id = match requested.or(user.active_address_id) {
        Some(id) => id,
        None => return Err(MealError::NoActiveAddress),
    };
    match addresses::repo::find_live_owned(&st.db, address_id, user.id).await? {
        Some(a) => Ok(a.id),
        None if requested.is_some() => Err(MealError::AddressNotFound),
        // a stale active pointer behaves as if none were set
        None => Err(MealError::NoActiveAddress),
    }
}

pub async fn create_meal(
    st: &AppState,
    user_id: Uuid,
    req: &CreateMealRequest,
) -> Result<MealSummary, MealError> {
    let user = User::find_by_id(&st.db, user_id)
        .await?
        .ok_or(MealError::NotChef)?;
    if !user.is_chef {
        return Err(MealError::NotChef);
    }
    let new = req.validate()?;
    let address_id = resolve_address(st, &user, req.address_id).await?;

    let id = repo::insert(&st.db, user_id, address_id, &new).await?;
    info!(meal_id = %id, user_id = %user_id, address_id = %address_id, "meal created");
    repo::find_summary(&st.db, id).await?.ok_or(MealError::NotFound)
}

pub async fn get_meal(st: &AppState, id: Uuid) -> Result<MealSummary, MealError> {
    repo::find_summary(&st.db, id).await?.ok_or(MealError::NotFound)
}

async fn owned_images(st: &AppState, user_id: Uuid, meal_id: Uuid) -> Result<Vec<String>, MealError> {
    match repo::owner_and_images(&st.db, meal_id).await? {
        Some((owner, images)) if owner == user_id => Ok(images),
        // other users' meals are indistinguishable from missing ones
        _ => Err(MealError::NotFound),
    }
}

pub async fn add_images(
    st: &AppState,
    user_id: Uuid,
    meal_id: Uuid,
    files: Vec<UploadItem>,
) -> Result<MealImagesResponse, MealError> {
    if files.is_empty() {
        return Err(MealError::Invalid("images is required".into()));
    }
    if files.len() > MAX_IMAGES_PER_UPLOAD {
        return Err(MealError::Invalid(format!(
            "at most {MAX_IMAGES_PER_UPLOAD} images per upload"
        )));
    }
    if let Some(bad) = files.iter().find(|f| ext_from_mime(&f.content_type).is_none()) {
        return Err(MealError::Invalid(format!("unsupported image type {}", bad.content_type)));
    }
    owned_images(st, user_id, meal_id).await?;

    let keys = upload_meal_images(st, user_id, meal_id, files).await?;
    let images = match repo::append_images(&st.db, meal_id, &keys).await {
        Ok(images) => images,
        Err(e) => {
            remove_objects(st, &keys).await;
            return Err(e.into());
        }
    };
    let urls = presign_many(st, images.clone(), PRESIGN_TTL_SECS).await?;
    info!(meal_id = %meal_id, added = keys.len(), "meal images stored");
    Ok(MealImagesResponse { images, urls })
}

/// Presigned URL of the meal's first image.
pub async fn first_photo_url(st: &AppState, meal_id: Uuid) -> Result<String, MealError> {
    let (_, images) = repo::owner_and_images(&st.db, meal_id)
        .await?
        .ok_or(MealError::NotFound)?;
    let first = images.first().ok_or(MealError::NoPhoto)?;
    Ok(presign_key(st, first).await?)
}

/// Deletes the row, then the stored images; failing removals are only logged.
pub async fn delete_meal(st: &AppState, user_id: Uuid, meal_id: Uuid) -> Result<(), MealError> {
    let images = repo::delete_owned(&st.db, meal_id, user_id)
        .await?
        .ok_or(MealError::NotFound)?;
    remove_objects(st, &images).await;
    info!(meal_id = %meal_id, user_id = %user_id, "meal deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::search::ParamValue;

    fn request() -> CreateMealRequest {
        serde_json::from_value(serde_json::json!({
            "name": "  Pad Thai ",
            "description": "Rice noodles",
            "price": 12.5,
            "ingredients": "noodles, tofu, , peanuts",
            "category": "Dinner",
            "cuisine": "Thai",
            "portionSize": "1 plate",
            "nutritionalInfo": { "calories": 640, "vitamins": "B6, C" },
            "expirationDate": "2030-01-02T18:00:00Z",
            "pickupDeliveryOptions": ["Pickup", "Delivery"],
            "preparationDate": "2030-01-01T18:00:00Z",
            "paymentOptions": "Cash",
            "tags": ["noodles"],
            "quantityAvailable": 3
        }))
        .unwrap()
    }

    #[test]
    fn validation_normalises_lists_and_defaults_rating() {
        let meal = request().validate().unwrap();
        assert_eq!(meal.name, "Pad Thai");
        assert_eq!(meal.ingredients, vec!["noodles", "tofu", "peanuts"]);
        assert_eq!(meal.pickup_delivery_options, vec!["Pickup", "Delivery"]);
        assert!(meal.dietary_restrictions.is_empty());
        assert_eq!(meal.seller_rating, 1);
        let info = meal.nutritional_info.unwrap();
        assert_eq!(info.calories, 640.0);
        assert_eq!(info.vitamins, vec!["B6", "C"]);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut r = request();
        r.price = -1.0;
        assert!(matches!(r.validate(), Err(MealError::Invalid(m)) if m.contains("price")));

        let mut r = request();
        r.quantity_available = 0;
        assert!(matches!(r.validate(), Err(MealError::Invalid(m)) if m.contains("quantityAvailable")));

        let mut r = request();
        r.seller_rating = Some(6);
        assert!(matches!(r.validate(), Err(MealError::Invalid(m)) if m.contains("sellerRating")));

        let mut r = request();
        r.tags = Some(ParamValue::One(" , ".into()));
        assert!(matches!(r.validate(), Err(MealError::Invalid(m)) if m.contains("tags")));

        let mut r = request();
        r.name = "x".repeat(256);
        assert!(matches!(r.validate(), Err(MealError::Invalid(m)) if m.contains("name")));
    }

    #[tokio::test]
    async fn image_upload_limits_are_checked_before_any_lookup() {
        let state = AppState::fake();
        let file = || UploadItem {
            body: bytes::Bytes::from_static(b"x"),
            content_type: "image/png".into(),
        };

        let err = add_images(&state, Uuid::new_v4(), Uuid::new_v4(), vec![]).await.unwrap_err();
        assert!(matches!(err, MealError::Invalid(_)));

        let six = (0..6).map(|_| file()).collect();
        let err = add_images(&state, Uuid::new_v4(), Uuid::new_v4(), six).await.unwrap_err();
        assert!(err.to_string().contains("at most 5"));

        let gif = vec![UploadItem {
            body: bytes::Bytes::from_static(b"x"),
            content_type: "image/gif".into(),
        }];
        let err = add_images(&state, Uuid::new_v4(), Uuid::new_v4(), gif).await.unwrap_err();
        assert!(err.to_string().contains("image/gif"));
    }
}
