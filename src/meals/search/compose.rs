//! Query Composer: folds a normalised [`SearchQuery`] and the resolved id
//! constraints into one [`MealPredicate`], and renders it as SQL.

use std::collections::BTreeSet;

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::filters::{EqualityField, SearchQuery};

/// Array columns filtered with contains-all semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayField {
    Ingredients,
    Tags,
    DietaryRestrictions,
    PickupDeliveryOptions,
    PaymentOptions,
    DiscountsPromotions,
}

impl ArrayField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Ingredients => "ingredients",
            Self::Tags => "tags",
            Self::DietaryRestrictions => "dietary_restrictions",
            Self::PickupDeliveryOptions => "pickup_delivery_options",
            Self::PaymentOptions => "payment_options",
            Self::DiscountsPromotions => "discounts_promotions",
        }
    }
}

/// Conjunction of every active meal filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MealPredicate {
    /// Substring of name or description, case-insensitive.
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub contains_all: Vec<(ArrayField, Vec<String>)>,
    pub equals: Vec<(EqualityField, String)>,
    pub creator_ids: Option<Vec<Uuid>>,
    pub address_ids: Option<Vec<Uuid>>,
}

impl MealPredicate {
    pub fn compose(
        query: &SearchQuery,
        creator_ids: Option<Vec<Uuid>>,
        address_ids: Option<Vec<Uuid>>,
    ) -> Self {
        let sets: [(ArrayField, &BTreeSet<String>); 6] = [
            (ArrayField::Ingredients, &query.ingredients),
            (ArrayField::Tags, &query.tags),
            (ArrayField::DietaryRestrictions, &query.dietary_restrictions),
            (ArrayField::PickupDeliveryOptions, &query.pickup_delivery_options),
            (ArrayField::PaymentOptions, &query.payment_options),
            (ArrayField::DiscountsPromotions, &query.discounts_promotions),
        ];
        let contains_all = sets
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| (field, values.iter().cloned().collect()))
            .collect();

        Self {
            search: query.search.clone(),
            cuisine: query.cuisine.clone(),
            contains_all,
            equals: query.equals.clone(),
            creator_ids,
            address_ids,
        }
    }

    /// True when an id constraint resolved to nothing, so no meal can match.
    pub fn is_unsatisfiable(&self) -> bool {
        let empty = |ids: &Option<Vec<Uuid>>| ids.as_ref().is_some_and(|v| v.is_empty());
        empty(&self.creator_ids) || empty(&self.address_ids)
    }

    /// Appends ` WHERE ...` over the `meals` table aliased as `m`.
    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(search) = &self.search {
            let pattern = like_pattern(search);
            qb.push(" AND (m.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR m.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(cuisine) = &self.cuisine {
            qb.push(" AND m.cuisine = ").push_bind(cuisine.clone());
        }
        for (field, values) in &self.contains_all {
            qb.push(format_args!(" AND m.{} @> ", field.column()))
                .push_bind(values.clone())
                .push("::text[]");
        }
        for (field, value) in &self.equals {
            qb.push(format_args!(" AND m.{} = ", field.column()))
                .push_bind(value.clone());
        }
        if let Some(ids) = &self.creator_ids {
            qb.push(" AND m.created_by = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(ids) = &self.address_ids {
            qb.push(" AND m.address_id = ANY(").push_bind(ids.clone()).push(")");
        }
    }
}

/// `%fragment%` for ILIKE with the pattern metacharacters escaped.
pub fn like_pattern(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + 2);
    out.push('%');
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Client-facing projection of one meal row joined with its creator (`u`)
/// and address (`a`). Keys match the serde names of `MealSummary`; internal
/// columns such as `updated_at` or the creator's password hash never appear.
pub const MEAL_SUMMARY_JSON: &str = r#"json_build_object(
    '_id', m.id,
    'name', m.name,
    'description', m.description,
    'price', m.price,
    'ingredients', m.ingredients,
    'category', m.category,
    'cuisine', m.cuisine,
    'portionSize', m.portion_size,
    'nutritionalInfo', m.nutritional_info,
    'dietaryRestrictions', m.dietary_restrictions,
    'expirationDate', m.expiration_date,
    'pickupDeliveryOptions', m.pickup_delivery_options,
    'preparationDate', m.preparation_date,
    'paymentOptions', m.payment_options,
    'tags', m.tags,
    'discountsPromotions', m.discounts_promotions,
    'sellerRating', m.seller_rating,
    'quantityAvailable', m.quantity_available,
    'images', m.images,
    'createdBy', json_build_object('_id', u.id, 'fullName', u.full_name, 'email', u.email),
    'address', json_build_object(
        '_id', a.id,
        'userId', a.user_id,
        'street', a.street,
        'city', a.city,
        'state', a.state,
        'postalCode', a.postal_code,
        'country', a.country,
        'formattedAddress', a.formatted_address,
        'location', json_build_object('latitude', a.latitude, 'longitude', a.longitude)
    ),
    'createdAt', m.created_at
)"#;

/// Enrichment joins for [`MEAL_SUMMARY_JSON`].
pub const MEAL_JOINS: &str =
    " JOIN users u ON u.id = m.created_by JOIN addresses a ON a.id = m.address_id";
