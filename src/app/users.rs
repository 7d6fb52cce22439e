use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::engagement::{decode_likes, encode_likes};
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, avatar, date_of_birth, gender, created_at \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            avatar: row.get("avatar"),
            date_of_birth: row.get("date_of_birth"),
            gender: row.get("gender"),
            created_at: row.get("created_at"),
        });

        Ok(user)
    }

    /// Settings updates are an explicit field set, not an arbitrary merge:
    /// only these five fields can change and only for the acting account.
    pub async fn update_settings(
        &self,
        user_id: Uuid,
        username: Option<String>,
        email: Option<String>,
        date_of_birth: Option<String>,
        gender: Option<String>,
        avatar: Option<String>,
    ) -> Result<Option<User>> {
        let result = sqlx::query(
            "UPDATE users \
             SET username = COALESCE(?, username), \
                 email = COALESCE(?, email), \
                 date_of_birth = COALESCE(?, date_of_birth), \
                 gender = COALESCE(?, gender), \
                 avatar = COALESCE(?, avatar) \
             WHERE id = ?",
        )
        .bind(username)
        .bind(email)
        .bind(date_of_birth)
        .bind(gender)
        .bind(avatar)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(user_id).await
    }

    /// Delete the account and everything that references it. The store is
    /// not transactional across documents, so cleanup runs before the user
    /// row goes away and every step converges on rerun: an interrupted
    /// cascade is repaired by retrying the whole call.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        self.scrub_post_likes(user_id).await?;
        self.scrub_comment_likes(user_id).await?;

        // Comments left by others on the user's posts would be orphaned by
        // the post deletion below, so they go first.
        sqlx::query(
            "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE user_id = ?)",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        sqlx::query("DELETE FROM posts WHERE user_id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        sqlx::query("DELETE FROM comments WHERE user_id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(true)
    }

    /// Remove the user's like from every other user's posts. The counter is
    /// recomputed from the set, so only posts that actually carried the like
    /// are touched and reruns are no-ops.
    async fn scrub_post_likes(&self, user_id: Uuid) -> Result<()> {
        let post_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE user_id != ?")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        for post_id in post_ids {
            // Like toggles race with the scrub; re-read and retry until the
            // conditional write lands on the version it read.
            loop {
                let row = sqlx::query("SELECT likes, version FROM posts WHERE id = ?")
                    .bind(post_id)
                    .fetch_optional(self.db.pool())
                    .await?;
                let row = match row {
                    Some(row) => row,
                    None => break,
                };
                let raw: String = row.get("likes");
                let version: i64 = row.get("version");
                let mut likes = decode_likes(&raw)?;
                let before = likes.len();
                likes.retain(|liker| *liker != user_id);
                if likes.len() == before {
                    break;
                }
                if self.commit_post_scrub(post_id, &likes, version).await? {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn commit_post_scrub(
        &self,
        post_id: Uuid,
        likes: &[Uuid],
        version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE posts SET likes = ?, like_count = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(encode_likes(likes)?)
        .bind(likes.len() as i64)
        .bind(post_id)
        .bind(version)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scrub_comment_likes(&self, user_id: Uuid) -> Result<()> {
        let comment_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM comments WHERE user_id != ?")
                .bind(user_id)
                .fetch_all(self.db.pool())
                .await?;

        for comment_id in comment_ids {
            loop {
                let row = sqlx::query("SELECT likes, version FROM comments WHERE id = ?")
                    .bind(comment_id)
                    .fetch_optional(self.db.pool())
                    .await?;
                let row = match row {
                    Some(row) => row,
                    None => break,
                };
                let raw: String = row.get("likes");
                let version: i64 = row.get("version");
                let mut likes = decode_likes(&raw)?;
                let before = likes.len();
                likes.retain(|liker| *liker != user_id);
                if likes.len() == before {
                    break;
                }
                if self.commit_comment_scrub(comment_id, &likes, version).await? {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn commit_comment_scrub(
        &self,
        comment_id: Uuid,
        likes: &[Uuid],
        version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE comments SET likes = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(encode_likes(likes)?)
        .bind(comment_id)
        .bind(version)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
