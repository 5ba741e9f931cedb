//! Pagination Executor: page arithmetic, the response envelope, and the
//! single-statement count + page query.

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

use super::compose::{MealPredicate, MEAL_JOINS, MEAL_SUMMARY_JSON};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_MAX_LIMIT: u32 = 100;

/// 1-based page request with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Invalid or non-positive values fall back to the defaults; `limit` is
    /// capped at `max_limit`.
    pub fn parse(page: Option<&str>, limit: Option<&str>, max_limit: u32) -> Self {
        let positive = |raw: Option<&str>| {
            raw.and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v >= 1)
        };
        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit)
                .unwrap_or(DEFAULT_LIMIT)
                .min(max_limit.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, req: PageRequest) -> Self {
        let limit = i64::from(req.limit.max(1));
        Self {
            total,
            page: req.page,
            limit: req.limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// `{ success, data, pagination }` envelope shared by paginated listings.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, req: PageRequest) -> Self {
        Self {
            success: true,
            data,
            pagination: PaginationMeta::new(total, req),
        }
    }

    pub fn empty(req: PageRequest) -> Self {
        Self::new(Vec::new(), 0, req)
    }
}

/// Count and page in one statement, so both read the same snapshot.
///
/// Yields a single row `(total BIGINT, data JSON)` where `data` is the page
/// as an array of [`MEAL_SUMMARY_JSON`] documents, newest first.
pub fn build_page_query<'a>(predicate: &MealPredicate, req: PageRequest) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("WITH filtered AS (SELECT m.id, m.created_at FROM meals m");
    predicate.push_conditions(&mut qb);
    qb.push("), page AS (SELECT ");
    qb.push(MEAL_SUMMARY_JSON);
    qb.push(" AS doc, f.created_at, f.id FROM filtered f JOIN meals m ON m.id = f.id");
    qb.push(MEAL_JOINS);
    qb.push(" ORDER BY f.created_at DESC, f.id LIMIT ")
        .push_bind(i64::from(req.limit))
        .push(" OFFSET ")
        .push_bind(req.offset());
    qb.push(
        ") SELECT (SELECT COUNT(*) FROM filtered) AS total, \
         COALESCE((SELECT json_agg(p.doc ORDER BY p.created_at DESC, p.id) FROM page p), '[]'::json) AS data",
    );
    qb
}
