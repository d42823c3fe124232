use axum::Router;
use tower_http::services::ServeDir;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(state.assets.root());

    Router::new()
        .merge(routes::health())
        .merge(routes::videos(state.upload_max_bytes))
        .nest_service("/assets", assets)
        .with_state(state)
}
