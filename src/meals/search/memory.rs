//! In-memory [`SearchStore`] for exercising the engine without Postgres.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::compose::{ArrayField, MealPredicate};
use super::error::SearchError;
use super::filters::EqualityField;
use super::geo::{within_radius, GeoPoint, TextLocation};
use super::paginate::PageRequest;
use super::store::SearchStore;
use crate::addresses::dto::AddressDetails;
use crate::meals::dto::{CreatorSummary, MealSummary};

#[derive(Default)]
pub struct MemorySearchStore {
    addresses: Vec<(AddressDetails, bool)>,
    chefs: Vec<CreatorSummary>,
    meals: Vec<MealSummary>,
    fail: bool,
    fetches: AtomicUsize,
}

impl MemorySearchStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Registers the meal together with its creator and address. Each added
    /// meal is one second newer than the previous one.
    pub fn add_meal(&mut self, mut meal: MealSummary) {
        meal.created_at = base_time() + Duration::seconds(self.meals.len() as i64);
        if !self.chefs.iter().any(|c| c.id == meal.created_by.id) {
            self.chefs.push(meal.created_by.clone());
        }
        if !self.addresses.iter().any(|(a, _)| a.id == meal.address.id) {
            self.addresses.push((meal.address.clone(), false));
        }
        self.meals.push(meal);
    }

    pub fn mark_address_deleted(&mut self, id: Uuid) {
        for (address, deleted) in &mut self.addresses {
            if address.id == id {
                *deleted = true;
            }
        }
    }

    pub fn page_fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SearchError> {
        if self.fail {
            return Err(SearchError::Store(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn live_addresses(&self) -> impl Iterator<Item = &AddressDetails> {
        self.addresses.iter().filter(|(_, deleted)| !deleted).map(|(a, _)| a)
    }
}

fn base_time() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn field_matches(value: Option<&str>, wanted: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => value.is_some_and(|v| contains_ci(v, w)),
    }
}

fn array(meal: &MealSummary, field: ArrayField) -> &[String] {
    match field {
        ArrayField::Ingredients => &meal.ingredients,
        ArrayField::Tags => &meal.tags,
        ArrayField::DietaryRestrictions => &meal.dietary_restrictions,
        ArrayField::PickupDeliveryOptions => &meal.pickup_delivery_options,
        ArrayField::PaymentOptions => &meal.payment_options,
        ArrayField::DiscountsPromotions => &meal.discounts_promotions,
    }
}

fn admits(p: &MealPredicate, meal: &MealSummary) -> bool {
    if let Some(s) = &p.search {
        if !(contains_ci(&meal.name, s) || contains_ci(&meal.description, s)) {
            return false;
        }
    }
    if p.cuisine.as_ref().is_some_and(|c| *c != meal.cuisine) {
        return false;
    }
    for (field, values) in &p.contains_all {
        let have = array(meal, *field);
        if !values.iter().all(|v| have.contains(v)) {
            return false;
        }
    }
    for (field, value) in &p.equals {
        let have = match field {
            EqualityField::Category => &meal.category,
            EqualityField::PortionSize => &meal.portion_size,
        };
        if have != value {
            return false;
        }
    }
    if p.creator_ids.as_ref().is_some_and(|ids| !ids.contains(&meal.created_by.id)) {
        return false;
    }
    if p.address_ids.as_ref().is_some_and(|ids| !ids.contains(&meal.address.id)) {
        return false;
    }
    true
}

#[async_trait]
impl SearchStore for MemorySearchStore {
    async fn address_ids_within(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<Uuid>, SearchError> {
        self.check()?;
        Ok(self
            .live_addresses()
            .filter(|a| within_radius(&center, radius_m, &a.location))
            .map(|a| a.id)
            .collect())
    }

    async fn address_ids_matching(&self, location: &TextLocation) -> Result<Vec<Uuid>, SearchError> {
        self.check()?;
        Ok(self
            .live_addresses()
            .filter(|a| {
                field_matches(Some(&a.city), &location.city)
                    && field_matches(a.state.as_deref(), &location.state)
                    && field_matches(a.postal_code.as_deref(), &location.postal_code)
            })
            .map(|a| a.id)
            .collect())
    }

    async fn user_ids_by_name(&self, fragment: &str) -> Result<Vec<Uuid>, SearchError> {
        self.check()?;
        Ok(self
            .chefs
            .iter()
            .filter(|c| contains_ci(&c.full_name, fragment))
            .map(|c| c.id)
            .collect())
    }

    async fn fetch_page(
        &self,
        predicate: &MealPredicate,
        page: PageRequest,
    ) -> Result<(Vec<MealSummary>, i64), SearchError> {
        self.check()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut matched: Vec<&MealSummary> = self.meals.iter().filter(|m| admits(predicate, m)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = matched.len() as i64;
        let data = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((data, total))
    }
}

pub fn creator(full_name: &str) -> CreatorSummary {
    let handle = full_name.to_lowercase().replace(' ', ".");
    CreatorSummary {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        email: format!("{handle}@example.com"),
    }
}

pub fn address(user_id: Uuid, city: &str, location: GeoPoint) -> AddressDetails {
    AddressDetails {
        id: Uuid::new_v4(),
        user_id,
        street: "1 Main St".into(),
        city: city.to_string(),
        state: None,
        postal_code: None,
        country: "Somewhere".into(),
        formatted_address: None,
        location,
    }
}

pub fn meal(name: &str, cuisine: &str, chef: &CreatorSummary, at: &AddressDetails) -> MealSummary {
    MealSummary {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("Home-cooked {name}"),
        price: 10.0,
        ingredients: vec![],
        category: "Dinner".into(),
        cuisine: cuisine.to_string(),
        portion_size: "1 plate".into(),
        nutritional_info: None,
        dietary_restrictions: vec![],
        expiration_date: base_time() + Duration::days(2),
        pickup_delivery_options: vec!["Pickup".into()],
        preparation_date: base_time(),
        payment_options: vec!["Cash".into()],
        tags: vec![],
        discounts_promotions: vec![],
        seller_rating: 1,
        quantity_available: 1,
        images: vec![],
        created_by: chef.clone(),
        address: at.clone(),
        created_at: base_time(),
    }
}
