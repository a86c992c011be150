use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

pub use notes_types::api::Claims;

/// Extract and validate the session token from the Authorization header.
/// On success the decoded `Claims` are available to handlers as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".into()))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::Unauthorized("Not authorized, token failed".into())
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
