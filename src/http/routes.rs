use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/account", patch(handlers::update_settings))
        .route("/account", delete(handlers::delete_account))
        .route("/account/password", post(handlers::change_password))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts", get(handlers::list_posts))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", patch(handlers::update_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::like_post))
        .route("/posts/:id/comments", post(handlers::create_comment))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route("/comments/:id", get(handlers::get_comment))
        .route("/comments/:id", patch(handlers::update_comment))
        .route("/comments/:id", delete(handlers::delete_comment))
        .route("/comments/:id/like", post(handlers::like_comment))
}

pub fn media() -> Router<AppState> {
    Router::new().route("/media", post(handlers::upload_media))
}
