use axum::extract::DefaultBodyLimit;
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
    let files = ServeDir::new(state.media.root());
    let api = Router::new()
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::posts())
        .merge(routes::comments())
        .merge(routes::media().layer(DefaultBodyLimit::max(state.upload_max_bytes)));

    Router::new()
        .merge(routes::health())
        .nest("/v1", api)
        .nest_service("/files", files)
        .with_state(state)
}
