use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A post document. `like_count` is denormalized and must equal
/// `likes.len()` after every committed mutation; `version` is the
/// optimistic-concurrency token bumped by every like toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub picture: Option<String>,
    pub likes: Vec<Uuid>,
    pub like_count: i64,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
