use serde::Deserialize;

use crate::meals::search::DEFAULT_MAX_LIMIT;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible object storage (MinIO in development) holding meal images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Upper bound for the `limit` query parameter of paginated listings.
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "neighbor-meals".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "neighbor-meals-users".into()),
            ttl_minutes: env_number("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_number("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "meal-images".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let search = SearchConfig {
            max_page_size: env_number("SEARCH_MAX_PAGE_SIZE", DEFAULT_MAX_LIMIT).max(1),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            search,
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_number_falls_back_on_garbage() {
        std::env::set_var("NEIGHBOR_MEALS_TEST_NUMBER", "not-a-number");
        assert_eq!(env_number("NEIGHBOR_MEALS_TEST_NUMBER", 42u32), 42);
        std::env::set_var("NEIGHBOR_MEALS_TEST_NUMBER", " 7 ");
        assert_eq!(env_number("NEIGHBOR_MEALS_TEST_NUMBER", 42u32), 7);
        std::env::remove_var("NEIGHBOR_MEALS_TEST_NUMBER");
        assert_eq!(env_number("NEIGHBOR_MEALS_TEST_NUMBER", 42u32), 42);
    }
}
