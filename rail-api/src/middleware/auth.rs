use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use rail_core::AuthError;

use crate::{error::AppError, state::AppState};

/// Resolves the bearer token to an `Identity` and stores it in the request extensions.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?.to_owned();

    let identity = state.gate.authenticate(&token).await?;
    tracing::debug!(user = %identity.username, "Authenticated request");

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("expected a Bearer token".to_string()))
}
