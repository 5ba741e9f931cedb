use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::compose::{like_pattern, MealPredicate};
use super::error::SearchError;
use super::geo::{within_radius, BoundingBox, GeoPoint, TextLocation};
use super::paginate::{build_page_query, PageRequest};
use crate::meals::dto::MealSummary;

/// Read-only collaborators of the search engine.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Live addresses whose great-circle distance to `center` is at most `radius_m`.
    async fn address_ids_within(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<Uuid>, SearchError>;

    /// Live addresses matching every supplied component of `location`.
    async fn address_ids_matching(&self, location: &TextLocation) -> Result<Vec<Uuid>, SearchError>;

    /// Chefs whose full name contains `fragment`, case-insensitive.
    async fn user_ids_by_name(&self, fragment: &str) -> Result<Vec<Uuid>, SearchError>;

    /// One page of enriched meals plus the total number of matches.
    async fn fetch_page(
        &self,
        predicate: &MealPredicate,
        page: PageRequest,
    ) -> Result<(Vec<MealSummary>, i64), SearchError>;
}

/// Live addresses inside `bbox`. The exact radius test runs on the rows.
fn build_radius_prefilter_query<'a>(bbox: BoundingBox) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT id, latitude, longitude FROM addresses WHERE NOT is_deleted AND latitude BETWEEN ",
    );
    qb.push_bind(bbox.min_lat).push(" AND ").push_bind(bbox.max_lat);
    if let Some((min_lng, max_lng)) = bbox.longitude {
        qb.push(" AND longitude BETWEEN ")
            .push_bind(min_lng)
            .push(" AND ")
            .push_bind(max_lng);
    }
    qb
}

fn build_text_location_query<'a>(location: &TextLocation) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("SELECT id FROM addresses WHERE NOT is_deleted");
    let parts = [
        ("city", &location.city),
        ("state", &location.state),
        ("postal_code", &location.postal_code),
    ];
    for (column, value) in parts {
        if let Some(value) = value {
            qb.push(format_args!(" AND {column} ILIKE "))
                .push_bind(like_pattern(value));
        }
    }
    qb
}

#[derive(Clone)]
pub struct PgSearchStore {
    db: PgPool,
}

impl PgSearchStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SearchStore for PgSearchStore {
    async fn address_ids_within(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<Uuid>, SearchError> {
        let mut qb = build_radius_prefilter_query(BoundingBox::around(center, radius_m));
        let candidates: Vec<(Uuid, f64, f64)> = qb.build_query_as().fetch_all(&self.db).await?;
        let total = candidates.len();
        let ids: Vec<Uuid> = candidates
            .into_iter()
            .filter(|(_, lat, lng)| within_radius(&center, radius_m, &GeoPoint::new(*lat, *lng)))
            .map(|(id, _, _)| id)
            .collect();
        debug!(candidates = total, kept = ids.len(), "radius prefilter");
        Ok(ids)
    }

    async fn address_ids_matching(&self, location: &TextLocation) -> Result<Vec<Uuid>, SearchError> {
        let mut qb = build_text_location_query(location);
        let rows: Vec<(Uuid,)> = qb.build_query_as().fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn user_ids_by_name(&self, fragment: &str) -> Result<Vec<Uuid>, SearchError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
              FROM users
             WHERE is_chef AND full_name ILIKE $1
            "#,
        )
        .bind(like_pattern(fragment))
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    async fn fetch_page(
        &self,
        predicate: &MealPredicate,
        page: PageRequest,
    ) -> Result<(Vec<MealSummary>, i64), SearchError> {
        let mut qb = build_page_query(predicate, page);
        let (total, Json(data)): (i64, Json<Vec<MealSummary>>) =
            qb.build_query_as().fetch_one(&self.db).await?;
        Ok((data, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_prefilter_bounds_latitude_then_longitude() {
        let bbox = BoundingBox::around(GeoPoint::new(35.6762, 139.6503), 10_000.0);
        assert!(bbox.longitude.is_some());
        let qb = build_radius_prefilter_query(bbox);
        assert_eq!(
            qb.sql(),
            "SELECT id, latitude, longitude FROM addresses WHERE NOT is_deleted \
             AND latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4"
        );
    }

    #[test]
    fn radius_prefilter_drops_longitude_window_near_the_pole() {
        let bbox = BoundingBox::around(GeoPoint::new(89.99, 0.0), 50_000.0);
        assert!(bbox.longitude.is_none());
        let qb = build_radius_prefilter_query(bbox);
        assert_eq!(
            qb.sql(),
            "SELECT id, latitude, longitude FROM addresses WHERE NOT is_deleted \
             AND latitude BETWEEN $1 AND $2"
        );
    }

    #[test]
    fn text_location_binds_only_supplied_components() {
        let location = TextLocation {
            city: Some("Lyon".into()),
            postal_code: Some("69".into()),
            ..Default::default()
        };
        let qb = build_text_location_query(&location);
        assert_eq!(
            qb.sql(),
            "SELECT id FROM addresses WHERE NOT is_deleted AND city ILIKE $1 AND postal_code ILIKE $2"
        );

        let qb = build_text_location_query(&TextLocation::default());
        assert_eq!(qb.sql(), "SELECT id FROM addresses WHERE NOT is_deleted");
    }
}
