use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use chronify_db::{UniqueViolation, unique_violation};
use chronify_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest};
use chronify_types::models::User;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::extract::payload;
use crate::validation::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN, is_valid_email};
use crate::{AppState, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = payload(body)?;
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    // Validate input
    if email.is_empty() || username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email, username and password are required".into()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".into()));
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user_id = Uuid::new_v4();
    let password = req.password;

    run_blocking(&state, move |db| {
        // hashing is CPU-bound, so it runs here with the insert
        let password_hash = hash_password(&password)
            .map_err(|e| ApiError::internal("Failed to create user", e))?;

        db.create_user(&user_id.to_string(), &username, &email, &password_hash)
            .map_err(|e| match unique_violation(&e) {
                Some(UniqueViolation::UserEmail) => ApiError::Conflict("Email already exists"),
                Some(UniqueViolation::UserUsername) => ApiError::Conflict("Username already exists"),
                _ => ApiError::internal("Failed to create user", e),
            })?;

        info!("Registered user {} ({})", username, user_id);
        Ok(())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully" })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = payload(body)?;
    let email = req.email.trim().to_string();

    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".into()));
    }

    let password = req.password;
    let user = run_blocking(&state, move |db| {
        let user = db
            .get_user_by_email(&email)
            .map_err(|e| ApiError::internal("Failed to log in", e))?;

        let Some(user) = user else {
            warn!("Login attempt for unknown email {}", email);
            return Err(ApiError::Unauthorized("Invalid credentials"));
        };

        if !verify_password(&password, &user.password_hash)
            .map_err(|e| ApiError::internal("Failed to log in", e))?
        {
            warn!("Wrong password for user {}", user.id);
            return Err(ApiError::Unauthorized("Invalid credentials"));
        }
        Ok(user)
    })
    .await?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::internal("Failed to log in", anyhow::anyhow!("corrupt user id: {}", e)))?;

    let token = create_token(&state.auth, user_id, &user.username)
        .map_err(|e| ApiError::internal("Failed to log in", e))?;

    Ok(Json(LoginResponse {
        token,
        user: User {
            id: user_id,
            username: user.username,
            email: user.email,
        },
    }))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(auth: &AuthConfig, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let expires_at = chrono::Utc::now()
        .checked_add_signed(auth.token_ttl)
        .ok_or_else(|| anyhow::anyhow!("token lifetime overflows the clock"))?;
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(auth: &AuthConfig, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            token_ttl: chrono::Duration::hours(1),
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn token_carries_user_identity() {
        let id = Uuid::new_v4();
        let token = create_token(&auth("s1"), id, "ada").unwrap();
        let claims = verify_token(&auth("s1"), &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "ada");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = create_token(&auth("s1"), Uuid::new_v4(), "ada").unwrap();
        assert!(verify_token(&auth("s2"), &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = AuthConfig {
            jwt_secret: "s1".into(),
            token_ttl: chrono::Duration::hours(-2),
        };
        let token = create_token(&expired, Uuid::new_v4(), "ada").unwrap();
        assert!(verify_token(&expired, &token).is_err());
    }
}
