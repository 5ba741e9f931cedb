pub(crate) mod dto;
mod error;
pub mod handlers;
mod repo;
pub mod search;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
