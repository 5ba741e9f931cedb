use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::app::SERVER_ERROR;
use crate::meals::search::SearchError;

#[derive(Error, Debug)]
pub enum MealError {
    #[error("Only chefs can create meals")]
    NotChef,

    #[error("Address not found")]
    AddressNotFound,

    #[error("No address given and no active address set")]
    NoActiveAddress,

    #[error("Meal not found")]
    NotFound,

    #[error("Photo not found")]
    NoPhoto,

    #[error("{0}")]
    Invalid(String),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MealError {
    pub fn status(&self) -> StatusCode {
        match self {
            MealError::NotChef => StatusCode::FORBIDDEN,
            MealError::AddressNotFound | MealError::NotFound | MealError::NoPhoto => {
                StatusCode::NOT_FOUND
            }
            MealError::NoActiveAddress | MealError::Invalid(_) => StatusCode::BAD_REQUEST,
            MealError::Search(_) | MealError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MealError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "meal request failed");
            return (status, SERVER_ERROR).into_response();
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(MealError::NotChef.status(), StatusCode::FORBIDDEN);
        assert_eq!(MealError::AddressNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(MealError::NoActiveAddress.status(), StatusCode::BAD_REQUEST);
        assert_eq!(MealError::Invalid("price".into()).status(), StatusCode::BAD_REQUEST);
        let search = MealError::from(SearchError::Store(sqlx::Error::PoolTimedOut));
        assert_eq!(search.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let other = MealError::from(anyhow::anyhow!("boom"));
        assert_eq!(other.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn server_errors_hide_store_details() {
        let err = MealError::from(SearchError::Store(sqlx::Error::PoolTimedOut));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Server error");

        let res = MealError::Invalid("price must be >= 0".into()).into_response();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"price must be >= 0");
    }
}
