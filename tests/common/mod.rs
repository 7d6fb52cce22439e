#![allow(dead_code)]

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use ripple::app::auth::AuthService;
use ripple::config::AppConfig;
use ripple::infra::{db::Db, storage::MediaStore};
use ripple::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// 32 bytes base64-encoded (test-only key)
// "0123456789abcdef0123456789abcdef"
const TEST_TOKEN_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
pub const DEFAULT_PASSWORD: &str = "Testpass1!";

// ---------------------------------------------------------------------------
// TestApp — shared, lazily initialized once per test binary
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}

static TEST_APP: OnceCell<TestApp> = OnceCell::const_new();

/// Get (or lazily create) the shared TestApp instance.
pub async fn app() -> &'static TestApp {
    TEST_APP
        .get_or_init(|| async { TestApp::setup().await })
        .await
}

impl TestApp {
    // ------------------------------------------------------------------
    // Setup — runs once per test binary
    // ------------------------------------------------------------------
    async fn setup() -> Self {
        // Fresh on-disk database and media dir per test binary, no
        // external services required.
        let run_id = Uuid::new_v4();
        let db_path = std::env::temp_dir().join(format!("ripple-test-{}.db", run_id));
        let media_dir = std::env::temp_dir().join(format!("ripple-test-media-{}", run_id));

        std::env::set_var("DATABASE_URL", format!("sqlite://{}", db_path.display()));
        std::env::set_var("MEDIA_DIR", media_dir.display().to_string());
        std::env::set_var("TOKEN_KEY", TEST_TOKEN_KEY);
        std::env::set_var("DB_MAX_CONNECTIONS", "5");
        std::env::set_var("DB_CONNECT_TIMEOUT_SECONDS", "30");

        let config = AppConfig::from_env().expect("failed to build AppConfig");

        let db = Db::connect(&config).await.expect("Db::connect failed");
        db.migrate().await.expect("migrate failed");
        let media = MediaStore::new(&config.media_dir)
            .await
            .expect("MediaStore::new failed");

        let state = AppState {
            db,
            media,
            token_key: config.token_key,
            token_ttl_hours: config.token_ttl_hours,
            upload_max_bytes: config.upload_max_bytes,
        };

        let router = ripple::http::router(state.clone());

        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helpers
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        self.send(request).await
    }

    /// Raw-body request (used for multipart uploads).
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost")
            .header("content-type", content_type);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {}", t));
        }
        let request = builder.body(Body::from(body)).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Create a user directly in the DB and issue a token via AuthService.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let username = format!("testuser_{}", suffix);
        let email = format!("test_{}@example.com", suffix);

        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = Argon2::default()
            .hash_password(DEFAULT_PASSWORD.as_bytes(), &salt)
            .expect("password hash failed")
            .to_string();

        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, avatar, date_of_birth, gender, created_at) \
             VALUES (?, ?, ?, ?, NULL, '1990-01-01', 'other', ?)",
        )
        .bind(user_id)
        .bind(&username)
        .bind(&email)
        .bind(&hash)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .expect("insert test user failed");

        let auth_service = AuthService::new(
            self.state.db.clone(),
            self.state.token_key,
            self.state.token_ttl_hours,
        );
        let token = auth_service
            .issue_token(user_id)
            .expect("issue_token failed");

        TestUser {
            id: user_id,
            username,
            email,
            token: token.token,
        }
    }

    /// Insert a post directly in DB. Returns the post id.
    pub async fn create_post_for_user(&self, user_id: Uuid) -> Uuid {
        let post_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO posts (id, user_id, content, picture, likes, like_count, version, created_at) \
             VALUES (?, ?, 'test post content', NULL, '[]', 0, 0, ?)",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .expect("insert test post failed");
        post_id
    }

    /// Insert a comment directly in DB. Returns the comment id.
    pub async fn create_comment_for_user(&self, user_id: Uuid, post_id: Uuid) -> Uuid {
        let comment_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO comments (id, user_id, post_id, content, likes, version, created_at) \
             VALUES (?, ?, ?, 'test comment content', '[]', 0, ?)",
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(post_id)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .expect("insert test comment failed");
        comment_id
    }

    /// Return the pool for direct DB assertions.
    pub fn pool(&self) -> &SqlitePool {
        self.state.db.pool()
    }
}
