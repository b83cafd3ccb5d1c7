//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::web::auth::verify_token;
use crate::web::state::AppState;

/// Middleware that validates the bearer token and extracts the account id.
///
/// If valid, inserts the account id into request extensions for handlers to
/// use. If missing or invalid, responds 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let account_id = verify_token(token, &state.config.jwt_secret)?;

    req.extensions_mut().insert(account_id);

    Ok(next.run(req).await)
}
