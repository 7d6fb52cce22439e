use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::engagement::decode_likes;
use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    Newest,
    MostLiked,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        user_id: Uuid,
        content: String,
        picture: Option<String>,
    ) -> Result<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            content,
            picture,
            likes: Vec::new(),
            like_count: 0,
            version: 0,
            created_at: OffsetDateTime::now_utc(),
        };

        sqlx::query(
            "INSERT INTO posts (id, user_id, content, picture, likes, like_count, version, created_at) \
             VALUES (?, ?, ?, ?, '[]', 0, 0, ?)",
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.content)
        .bind(&post.picture)
        .bind(post.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(post)
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, user_id, content, picture, likes, like_count, version, created_at \
             FROM posts WHERE id = ?",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| map_post(&row)).transpose()
    }

    pub async fn list_posts(&self, page: i64, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, user_id, content, picture, likes, like_count, version, created_at \
             FROM posts \
             ORDER BY created_at DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind((page - 1).saturating_mul(limit))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(map_post).collect()
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
        sort: PostSort,
    ) -> Result<Vec<Post>> {
        let query = match sort {
            PostSort::Newest => {
                "SELECT id, user_id, content, picture, likes, like_count, version, created_at \
                 FROM posts \
                 WHERE user_id = ? \
                 ORDER BY created_at DESC \
                 LIMIT ? OFFSET ?"
            }
            PostSort::MostLiked => {
                "SELECT id, user_id, content, picture, likes, like_count, version, created_at \
                 FROM posts \
                 WHERE user_id = ? \
                 ORDER BY like_count DESC, created_at DESC \
                 LIMIT ? OFFSET ?"
            }
        };

        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(limit)
            .bind((page - 1).saturating_mul(limit))
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(map_post).collect()
    }

    /// Ownership lives in the predicate: a non-owner update matches zero
    /// rows and is indistinguishable from a missing post.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
        picture: Option<String>,
    ) -> Result<Option<Post>> {
        let result = sqlx::query(
            "UPDATE posts SET content = ?, picture = COALESCE(?, picture) \
             WHERE id = ? AND user_id = ?",
        )
        .bind(content)
        .bind(picture)
        .bind(post_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(post_id).await
    }

    /// Owner-only delete; on success every comment of the post goes with it
    /// so no orphaned comments remain.
    pub async fn delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(true)
    }
}

fn map_post(row: &SqliteRow) -> Result<Post> {
    let likes: String = row.get("likes");
    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        picture: row.get("picture"),
        likes: decode_likes(&likes)?,
        like_count: row.get("like_count"),
        version: row.get("version"),
        created_at: row.get("created_at"),
    })
}
