use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::engagement::decode_likes;
use crate::domain::comment::Comment;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Comments may only attach to a live post; the store has no foreign
    /// keys, so the existence check happens here. Returns None when the
    /// parent post is gone.
    pub async fn create_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>> {
        let post_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;
        if post_exists.is_none() {
            return Ok(None);
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            content,
            likes: Vec::new(),
            version: 0,
            created_at: OffsetDateTime::now_utc(),
        };

        sqlx::query(
            "INSERT INTO comments (id, user_id, post_id, content, likes, version, created_at) \
             VALUES (?, ?, ?, ?, '[]', 0, ?)",
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.post_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(Some(comment))
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, user_id, post_id, content, likes, version, created_at \
             FROM comments WHERE id = ?",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| map_comment(&row)).transpose()
    }

    pub async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, user_id, post_id, content, likes, version, created_at \
             FROM comments \
             WHERE post_id = ? \
             ORDER BY created_at ASC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(map_comment).collect()
    }

    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>> {
        let result = sqlx::query(
            "UPDATE comments SET content = ? WHERE id = ? AND user_id = ?",
        )
        .bind(content)
        .bind(comment_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_comment(comment_id).await
    }

    pub async fn delete_comment(&self, comment_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn map_comment(row: &SqliteRow) -> Result<Comment> {
    let likes: String = row.get("likes");
    Ok(Comment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        post_id: row.get("post_id"),
        content: row.get("content"),
        likes: decode_likes(&likes)?,
        version: row.get("version"),
        created_at: row.get("created_at"),
    })
}
