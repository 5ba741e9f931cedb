use thiserror::Error;

/// Failures of the meal search engine. All of them are fatal to the request
/// and surface as a server error; nothing is retried.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search store error: {0}")]
    Store(#[from] sqlx::Error),
}
