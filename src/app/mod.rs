pub mod auth;
pub mod comments;
pub mod engagement;
pub mod posts;
pub mod users;
