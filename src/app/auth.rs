use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    key: [u8; 32],
    ttl_hours: u64,
}

impl AuthService {
    pub fn new(db: Db, key: [u8; 32], ttl_hours: u64) -> Self {
        Self { db, key, ttl_hours }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
        date_of_birth: String,
        gender: String,
        avatar: Option<String>,
    ) -> Result<(User, IssuedToken)> {
        let password_hash = hash_password(&password)?;
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            avatar,
            date_of_birth,
            gender,
            created_at: OffsetDateTime::now_utc(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, avatar, date_of_birth, gender, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(password_hash)
        .bind(&user.avatar)
        .bind(&user.date_of_birth)
        .bind(&user.gender)
        .bind(user.created_at)
        .execute(self.db.pool())
        .await?;

        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<IssuedToken>> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        Ok(Some(self.issue_token(user_id)?))
    }

    pub async fn change_password(&self, user_id: Uuid, new_password: &str) -> Result<bool> {
        let password_hash = hash_password(new_password)?;
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<IssuedToken> {
        let duration = std::time::Duration::from_secs(self.ttl_hours * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("ripple")?;
        claims.audience("ripple")?;
        claims.subject(&user_id.to_string())?;

        let key = SymmetricKey::<V4>::from(&self.key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at = OffsetDateTime::now_utc() + time::Duration::hours(self.ttl_hours as i64);

        Ok(IssuedToken { token, expires_at })
    }

    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let key = SymmetricKey::<V4>::from(&self.key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with("ripple");
        rules.validate_audience_with("ripple");

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let claims = match trusted.payload_claims() {
            Some(claims) => claims,
            None => return Ok(None),
        };

        let user_id = claim_uuid(claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<Option<User>> {
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
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}
