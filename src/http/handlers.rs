use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::engagement::{EngagementService, ToggleOutcome};
use crate::app::posts::{PostService, PostSort};
use crate::app::users::UserService;
use crate::http::{AppError, AuthUser};
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MAX_POST_LEN: usize = 2200;
const MAX_COMMENT_LEN: usize = 1000;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

fn parse_page(query: &PageQuery) -> Result<(i64, i64), AppError> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    let limit = query.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    // The offset is (page - 1) * limit; reject pages it cannot represent.
    if (page - 1).checked_mul(limit).is_none() {
        return Err(AppError::bad_request("page is out of range"));
    }
    Ok((page, limit))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.trim().chars().count() < 3 {
        return Err(AppError::bad_request(
            "username must be at least 3 characters",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(AppError::bad_request("email must be a valid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }
    let long_enough = password.chars().count() >= 7;
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());
    if !(long_enough && has_lower && has_upper && has_digit && has_special) {
        return Err(AppError::bad_request(
            "password must be at least 7 characters and contain an uppercase letter, \
             a lowercase letter, a digit and a special character",
        ));
    }
    Ok(())
}

fn validate_birth_date(date_of_birth: &str) -> Result<(), AppError> {
    let format = format_description!("[year]-[month]-[day]");
    let dob = Date::parse(date_of_birth, &format)
        .map_err(|_| AppError::bad_request("date_of_birth must be YYYY-MM-DD"))?;

    let today = OffsetDateTime::now_utc().date();
    let mut age = today.year() - dob.year();
    if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
        age -= 1;
    }
    if age < 13 {
        return Err(AppError::bad_request(
            "you must be at least 13 years old to register",
        ));
    }
    Ok(())
}

fn validate_content(content: &str, max_len: usize) -> Result<(), AppError> {
    if content.trim().chars().count() < 3 {
        return Err(AppError::bad_request(
            "content must have at least 3 characters",
        ));
    }
    if content.chars().count() > max_len {
        return Err(AppError::bad_request(format!(
            "content must be at most {} characters",
            max_len
        )));
    }
    Ok(())
}

fn map_user_conflict(err: anyhow::Error, context: &'static str) -> AppError {
    if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
        if let Some(db_err) = sqlx_err.as_database_error() {
            if db_err.is_unique_violation() {
                let message = db_err.message();
                if message.contains("users.username") {
                    return AppError::conflict("username already taken");
                }
                if message.contains("users.email") {
                    return AppError::conflict("email already taken");
                }
            }
        }
    }
    tracing::error!(error = ?err, "{}", context);
    AppError::internal(context)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
    pub gender: String,
    pub avatar: Option<String>,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    validate_username(&payload.username)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;
    validate_birth_date(&payload.date_of_birth)?;
    if payload.gender.trim().is_empty() {
        return Err(AppError::bad_request("gender cannot be empty"));
    }

    let service = AuthService::new(state.db.clone(), state.token_key, state.token_ttl_hours);
    let (user, token) = service
        .register(
            payload.username,
            payload.email,
            payload.password,
            payload.date_of_birth,
            payload.gender,
            payload.avatar,
        )
        .await
        .map_err(|err| map_user_conflict(err, "failed to register user"))?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(AuthTokenResponse {
        token: token.token,
        expires_at: token.expires_at,
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = AuthService::new(state.db.clone(), state.token_key, state.token_ttl_hours);
    let token = service
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match token {
        Some(token) => Ok(Json(AuthTokenResponse {
            token: token.token,
            expires_at: token.expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    let service = AuthService::new(state.db.clone(), state.token_key, state.token_ttl_hours);
    let user = service.current_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Users & account
// ---------------------------------------------------------------------------

pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub avatar: Option<String>,
}

pub async fn update_settings(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    if let Some(username) = &payload.username {
        validate_username(username)?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }
    if let Some(date_of_birth) = &payload.date_of_birth {
        validate_birth_date(date_of_birth)?;
    }
    if let Some(gender) = &payload.gender {
        if gender.trim().is_empty() {
            return Err(AppError::bad_request("gender cannot be empty"));
        }
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .update_settings(
            auth.user_id,
            payload.username,
            payload.email,
            payload.date_of_birth,
            payload.gender,
            payload.avatar,
        )
        .await
        .map_err(|err| map_user_conflict(err, "failed to update settings"))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&payload.new_password)?;

    let service = AuthService::new(state.db.clone(), state.token_key, state.token_ttl_hours);
    let updated = service
        .change_password(auth.user_id, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change password");
            AppError::internal("failed to change password")
        })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found"))
    }
}

pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.db.clone());
    let deleted = service.delete_account(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to delete account");
        AppError::internal("failed to delete account")
    })?;

    if deleted {
        tracing::info!(user_id = %auth.user_id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found"))
    }
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<crate::domain::post::Post>>, AppError> {
    let (page, limit) = parse_page(&query)?;
    let sort = match query.sort.as_deref() {
        Some("like_count") => PostSort::MostLiked,
        Some(other) => {
            return Err(AppError::bad_request(format!("unknown sort: {}", other)));
        }
        None => PostSort::Newest,
    };

    let service = PostService::new(state.db.clone());
    let posts = service
        .list_by_user(id, page, limit, sort)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list user posts");
            AppError::internal("failed to list user posts")
        })?;

    Ok(Json(ListResponse { items: posts }))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub picture: Option<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<crate::domain::post::Post>, AppError> {
    validate_content(&payload.content, MAX_POST_LEN)?;

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(auth.user_id, payload.content, payload.picture)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok(Json(post))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<crate::domain::post::Post>>, AppError> {
    let (page, limit) = parse_page(&query)?;

    let service = PostService::new(state.db.clone());
    let posts = service.list_posts(page, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to list posts")
    })?;

    Ok(Json(ListResponse { items: posts }))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::post::Post>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get_post(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub content: String,
    pub picture: Option<String>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<crate::domain::post::Post>, AppError> {
    validate_content(&payload.content, MAX_POST_LEN)?;

    let service = PostService::new(state.db.clone());
    let post = service
        .update_post(id, auth.user_id, payload.content, payload.picture)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match post {
        Some(post) => Ok(Json(post)),
        // Missing and not-owned are deliberately the same answer.
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let deleted = service.delete_post(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("post not found"))
    }
}

// ---------------------------------------------------------------------------
// Likes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PostLikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Serialize)]
pub struct CommentLikeResponse {
    pub liked: bool,
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostLikeResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let outcome = service
        .toggle_post_like(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to toggle post like");
            AppError::internal("failed to toggle post like")
        })?;

    match outcome {
        None => Err(AppError::not_found("post not found")),
        Some(ToggleOutcome::Conflict) => Err(AppError::conflict(
            "post was modified concurrently, retry the toggle",
        )),
        Some(ToggleOutcome::Applied { liked, like_count }) => {
            Ok(Json(PostLikeResponse { liked, like_count }))
        }
    }
}

pub async fn like_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<CommentLikeResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let outcome = service
        .toggle_comment_like(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, comment_id = %id, "failed to toggle comment like");
            AppError::internal("failed to toggle comment like")
        })?;

    match outcome {
        None => Err(AppError::not_found("comment not found")),
        Some(ToggleOutcome::Conflict) => Err(AppError::conflict(
            "comment was modified concurrently, retry the toggle",
        )),
        Some(ToggleOutcome::Applied { liked, .. }) => Ok(Json(CommentLikeResponse { liked })),
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub async fn create_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<crate::domain::comment::Comment>, AppError> {
    validate_content(&payload.content, MAX_COMMENT_LEN)?;

    let service = CommentService::new(state.db.clone());
    let comment = service
        .create_comment(auth.user_id, id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to comment");
            AppError::internal("failed to comment")
        })?;

    match comment {
        Some(comment) => Ok(Json(comment)),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<crate::domain::comment::Comment>>, AppError> {
    let service = CommentService::new(state.db.clone());
    let comments = service.list_by_post(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to list comments");
        AppError::internal("failed to list comments")
    })?;

    Ok(Json(ListResponse { items: comments }))
}

pub async fn get_comment(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::comment::Comment>, AppError> {
    let service = CommentService::new(state.db.clone());
    let comment = service.get_comment(id).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %id, "failed to fetch comment");
        AppError::internal("failed to fetch comment")
    })?;

    match comment {
        Some(comment) => Ok(Json(comment)),
        None => Err(AppError::not_found("comment not found")),
    }
}

pub async fn update_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<crate::domain::comment::Comment>, AppError> {
    validate_content(&payload.content, MAX_COMMENT_LEN)?;

    let service = CommentService::new(state.db.clone());
    let comment = service
        .update_comment(id, auth.user_id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?;

    match comment {
        Some(comment) => Ok(Json(comment)),
        None => Err(AppError::not_found("comment not found")),
    }
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = CommentService::new(state.db.clone());
    let deleted = service
        .delete_comment(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("comment not found"))
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct UploadResponse {
    pub file: String,
}

pub async fn upload_media(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("malformed multipart body"))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("failed to read upload"))?;
        if data.is_empty() {
            return Err(AppError::bad_request("uploaded file is empty"));
        }
        if data.len() > state.upload_max_bytes {
            return Err(AppError::bad_request("uploaded file is too large"));
        }

        let file = state.media.save(&data).await.map_err(|err| {
            tracing::warn!(error = ?err, user_id = %auth.user_id, "rejected upload");
            AppError::bad_request("only jpg, png and gif images are accepted")
        })?;

        return Ok(Json(UploadResponse { file }));
    }

    Err(AppError::bad_request("missing file field"))
}
