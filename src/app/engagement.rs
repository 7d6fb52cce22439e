use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::infra::db::Db;

/// A loaded likes set plus the version token it was read at. Commits are
/// conditional on that version, so a snapshot can only be applied once.
#[derive(Debug, Clone)]
pub struct LikeSnapshot {
    pub id: Uuid,
    pub likes: Vec<Uuid>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied { liked: bool, like_count: i64 },
    /// The row was updated by another writer between load and commit.
    /// The caller retries or surfaces the conflict; nothing was written.
    Conflict,
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn toggle_post_like(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ToggleOutcome>> {
        let snapshot = match self.post_snapshot(post_id).await? {
            Some(snapshot) => snapshot,
            None => return Ok(None),
        };
        let outcome = self.commit_post_toggle(&snapshot, user_id).await?;
        Ok(Some(outcome))
    }

    pub async fn post_snapshot(&self, post_id: Uuid) -> Result<Option<LikeSnapshot>> {
        let row = sqlx::query("SELECT id, likes, version FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => {
                let likes: String = row.get("likes");
                Ok(Some(LikeSnapshot {
                    id: row.get("id"),
                    likes: decode_likes(&likes)?,
                    version: row.get("version"),
                }))
            }
            None => Ok(None),
        }
    }

    /// Flip the user's membership in the snapshot's likes set and write it
    /// back keyed on id *and* version. Zero rows affected means another
    /// writer got there first; the caller sees Conflict, never a lost update.
    pub async fn commit_post_toggle(
        &self,
        snapshot: &LikeSnapshot,
        user_id: Uuid,
    ) -> Result<ToggleOutcome> {
        let mut likes = snapshot.likes.clone();
        let liked = flip(&mut likes, user_id);
        let like_count = likes.len() as i64;

        let result = sqlx::query(
            "UPDATE posts SET likes = ?, like_count = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(encode_likes(&likes)?)
        .bind(like_count)
        .bind(snapshot.id)
        .bind(snapshot.version)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(ToggleOutcome::Conflict);
        }
        Ok(ToggleOutcome::Applied { liked, like_count })
    }

    pub async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ToggleOutcome>> {
        let snapshot = match self.comment_snapshot(comment_id).await? {
            Some(snapshot) => snapshot,
            None => return Ok(None),
        };
        let outcome = self.commit_comment_toggle(&snapshot, user_id).await?;
        Ok(Some(outcome))
    }

    pub async fn comment_snapshot(&self, comment_id: Uuid) -> Result<Option<LikeSnapshot>> {
        let row = sqlx::query("SELECT id, likes, version FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => {
                let likes: String = row.get("likes");
                Ok(Some(LikeSnapshot {
                    id: row.get("id"),
                    likes: decode_likes(&likes)?,
                    version: row.get("version"),
                }))
            }
            None => Ok(None),
        }
    }

    // Comments carry no denormalized counter, but get the same
    // compare-and-swap discipline as posts.
    pub async fn commit_comment_toggle(
        &self,
        snapshot: &LikeSnapshot,
        user_id: Uuid,
    ) -> Result<ToggleOutcome> {
        let mut likes = snapshot.likes.clone();
        let liked = flip(&mut likes, user_id);
        let like_count = likes.len() as i64;

        let result = sqlx::query(
            "UPDATE comments SET likes = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(encode_likes(&likes)?)
        .bind(snapshot.id)
        .bind(snapshot.version)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(ToggleOutcome::Conflict);
        }
        Ok(ToggleOutcome::Applied { liked, like_count })
    }
}

fn flip(likes: &mut Vec<Uuid>, user_id: Uuid) -> bool {
    match likes.iter().position(|liker| *liker == user_id) {
        Some(index) => {
            likes.remove(index);
            false
        }
        None => {
            likes.push(user_id);
            true
        }
    }
}

pub(crate) fn decode_likes(raw: &str) -> Result<Vec<Uuid>> {
    serde_json::from_str(raw).map_err(|err| anyhow!("corrupt likes set: {}", err))
}

pub(crate) fn encode_likes(likes: &[Uuid]) -> Result<String> {
    serde_json::to_string(likes).map_err(|err| anyhow!("failed to encode likes set: {}", err))
}
