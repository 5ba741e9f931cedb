//! Meal Query Engine.
//!
//! Raw query parameters are normalised ([`filters`]), the location part is
//! resolved to address ids ([`geo`]), everything is folded into one predicate
//! ([`compose`]) and executed as a single count + page statement
//! ([`paginate`]). The engine only reads; every call re-resolves its inputs
//! from the store.

mod compose;
mod error;
mod filters;
mod geo;
#[cfg(test)]
pub(crate) mod memory;
mod paginate;
mod store;

use tracing::debug;

pub use compose::{MealPredicate, MEAL_JOINS, MEAL_SUMMARY_JSON};
pub use error::SearchError;
pub use filters::{normalize_list, ParamValue, QueryParams};
pub use geo::GeoPoint;
pub use paginate::{PageRequest, Paginated, DEFAULT_MAX_LIMIT};
pub use store::{PgSearchStore, SearchStore};

use crate::meals::dto::MealSummary;
use filters::SearchQuery;
use geo::GeoFilter;

pub async fn search_meals(
    store: &dyn SearchStore,
    params: &QueryParams,
    max_limit: u32,
) -> Result<Paginated<MealSummary>, SearchError> {
    let query = SearchQuery::from_params(params, max_limit);
    let page = query.page;

    let geo = GeoFilter::from_location(&query.location);
    let address_ids = geo.resolve(store).await?;
    if address_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
        debug!(?geo, "no address matches the location filter");
        return Ok(Paginated::empty(page));
    }

    let creator_ids = match &query.prepared_by {
        Some(name) => {
            let ids = store.user_ids_by_name(name).await?;
            debug!(prepared_by = %name, matched = ids.len(), "creator lookup");
            Some(ids)
        }
        None => None,
    };

    let predicate = MealPredicate::compose(&query, creator_ids, address_ids);
    if predicate.is_unsatisfiable() {
        debug!("meal predicate cannot match; skipping fetch");
        return Ok(Paginated::empty(page));
    }

    let (data, total) = store.fetch_page(&predicate, page).await?;
    debug!(total, returned = data.len(), page = page.page, limit = page.limit, "meal search");
    Ok(Paginated::new(data, total, page))
}
