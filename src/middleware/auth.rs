use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Accepts requests carrying `Authorization: Secret {adapter_secret_key}`.
pub async fn adapter_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Secret "))
        .is_some_and(|secret| !secret.is_empty() && secret == state.adapter_secret_key.as_str());

    if !authorized {
        tracing::warn!(path = %req.uri().path(), "Rejected request with missing or invalid secret");
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    Ok(next.run(req).await)
}
