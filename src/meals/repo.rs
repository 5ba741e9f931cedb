use anyhow::Context;
use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use super::dto::{MealSummary, NutritionalInfo};
use super::search::{MEAL_JOINS, MEAL_SUMMARY_JSON};

/// Validated meal fields ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub ingredients: Vec<String>,
    pub category: String,
    pub cuisine: String,
    pub portion_size: String,
    pub nutritional_info: Option<NutritionalInfo>,
    pub dietary_restrictions: Vec<String>,
    pub expiration_date: time::OffsetDateTime,
    pub pickup_delivery_options: Vec<String>,
    pub preparation_date: time::OffsetDateTime,
    pub payment_options: Vec<String>,
    pub tags: Vec<String>,
    pub discounts_promotions: Vec<String>,
    pub seller_rating: i16,
    pub quantity_available: i32,
}

pub async fn insert(
    db: &PgPool,
    created_by: Uuid,
    address_id: Uuid,
    m: &NewMeal,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO meals (
            name, description, price, ingredients, category, cuisine, portion_size,
            nutritional_info, dietary_restrictions, expiration_date, pickup_delivery_options,
            preparation_date, payment_options, tags, discounts_promotions, seller_rating,
            quantity_available, created_by, address_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        RETURNING id
        "#,
    )
    .bind(&m.name)
    .bind(&m.description)
    .bind(m.price)
    .bind(&m.ingredients)
    .bind(&m.category)
    .bind(&m.cuisine)
    .bind(&m.portion_size)
    .bind(m.nutritional_info.as_ref().map(Json))
    .bind(&m.dietary_restrictions)
    .bind(m.expiration_date)
    .bind(&m.pickup_delivery_options)
    .bind(m.preparation_date)
    .bind(&m.payment_options)
    .bind(&m.tags)
    .bind(&m.discounts_promotions)
    .bind(m.seller_rating)
    .bind(m.quantity_available)
    .bind(created_by)
    .bind(address_id)
    .fetch_one(db)
    .await
    .context("insert meal")?;
    Ok(id)
}

/// One meal in the same enriched shape the search returns.
pub async fn find_summary(db: &PgPool, id: Uuid) -> anyhow::Result<Option<MealSummary>> {
    let sql = format!("SELECT {MEAL_SUMMARY_JSON} FROM meals m{MEAL_JOINS} WHERE m.id = $1");
    let row = sqlx::query_scalar::<_, Json<MealSummary>>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find meal")?;
    Ok(row.map(|Json(m)| m))
}

/// Owner and stored image keys of a meal.
pub async fn owner_and_images<'e, E>(ex: E, id: Uuid) -> anyhow::Result<Option<(Uuid, Vec<String>)>>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, (Uuid, Vec<String>)>(
        "SELECT created_by, images FROM meals WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await
    .context("load meal owner")?;
    Ok(row)
}

pub async fn append_images(db: &PgPool, id: Uuid, keys: &[String]) -> anyhow::Result<Vec<String>> {
    let images = sqlx::query_scalar::<_, Vec<String>>(
        r#"
        UPDATE meals
           SET images = images || $2::text[], updated_at = now()
         WHERE id = $1
        RETURNING images
        "#,
    )
    .bind(id)
    .bind(keys)
    .fetch_one(db)
    .await
    .context("append meal images")?;
    Ok(images)
}

/// Deletes the meal if `user_id` created it, returning its image keys.
pub async fn delete_owned(db: &PgPool, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Vec<String>>> {
    let images = sqlx::query_scalar::<_, Vec<String>>(
        "DELETE FROM meals WHERE id = $1 AND created_by = $2 RETURNING images",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("delete meal")?;
    Ok(images)
}
