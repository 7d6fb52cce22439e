use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;

// The three collections carry no foreign-key constraints on purpose:
// referential integrity (and the delete cascades) is enforced by the
// services, and the `likes` sets live as JSON arrays on the row itself.
const SCHEMA: &str = "\
    CREATE TABLE IF NOT EXISTS users ( \
        id BLOB PRIMARY KEY, \
        username TEXT NOT NULL UNIQUE, \
        email TEXT NOT NULL UNIQUE, \
        password_hash TEXT NOT NULL, \
        avatar TEXT, \
        date_of_birth TEXT NOT NULL, \
        gender TEXT NOT NULL, \
        created_at TEXT NOT NULL \
    ); \
    CREATE TABLE IF NOT EXISTS posts ( \
        id BLOB PRIMARY KEY, \
        user_id BLOB NOT NULL, \
        content TEXT NOT NULL, \
        picture TEXT, \
        likes TEXT NOT NULL DEFAULT '[]', \
        like_count INTEGER NOT NULL DEFAULT 0, \
        version INTEGER NOT NULL DEFAULT 0, \
        created_at TEXT NOT NULL \
    ); \
    CREATE TABLE IF NOT EXISTS comments ( \
        id BLOB PRIMARY KEY, \
        user_id BLOB NOT NULL, \
        post_id BLOB NOT NULL, \
        content TEXT NOT NULL, \
        likes TEXT NOT NULL DEFAULT '[]', \
        version INTEGER NOT NULL DEFAULT 0, \
        created_at TEXT NOT NULL \
    ); \
    CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id, created_at); \
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at); \
    CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);";

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
