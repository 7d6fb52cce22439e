use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Media reference for the profile picture, resolvable under /files.
    pub avatar: Option<String>,
    /// ISO `YYYY-MM-DD`; age-gated at registration and settings updates.
    pub date_of_birth: String,
    pub gender: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
