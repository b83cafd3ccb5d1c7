//! services/api/src/web/auth.rs
//!
//! Registration and login endpoints, plus the bearer-token helpers used by
//! the auth middleware.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;
use datagen_core::domain::Account;
use datagen_core::ports::PortError;

//=========================================================================================
// Bearer Tokens
//=========================================================================================

const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
}

/// Signs a token carrying the account id.
pub fn issue_token(account_id: Uuid, secret: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: account_id,
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verifies a token and returns the account id it carries. Any failure
/// (malformed, bad signature, expired) reads as `Unauthorized`.
pub fn verify_token(token: &str, secret: &str) -> Result<Uuid, ApiError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    Ok(data.claims.sub)
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The account fields safe to show the owner; the password hash never
/// appears here.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub name: String,
    pub email: String,
    pub credits: i64,
    pub api_key: String,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            name: account.name,
            email: account.email,
            credits: account.credits,
            api_key: account.api_key,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub user: AccountSummary,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Create a new account. Starts with the full credit allowance.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 400, description = "Missing field or duplicate email")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty()
        || req.phone.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.is_empty()
    {
        return Err(ApiError::Validation("All fields required".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    let account = state
        .store
        .create_account(req.name.trim(), req.phone.trim(), req.email.trim(), &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => ApiError::Validation("User already exists".to_string()),
            other => other.into(),
        })?;

    let token = issue_token(account.id, &state.config.jwt_secret)?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            token,
            user: account.into(),
        }),
    ))
}

/// Login with an existing account.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Missing fields".to_string()));
    }

    // Unknown email and wrong password read identically to the caller.
    let creds = state
        .store
        .get_credentials_by_email(req.email.trim())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::Validation("Invalid credentials".to_string()),
            other => other.into(),
        })?;

    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::Validation("Invalid credentials".to_string()));
    }

    let account = state.store.get_account(creds.id).await?;
    let token = issue_token(account.id, &state.config.jwt_secret)?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            token,
            user: account.into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let account_id = Uuid::new_v4();
        let token = issue_token(account_id, "secret").unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap(), account_id);
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = issue_token(Uuid::new_v4(), "secret").unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn token_rejects_garbage() {
        assert!(matches!(
            verify_token("not-a-token", "secret"),
            Err(ApiError::Unauthorized)
        ));
    }
}
