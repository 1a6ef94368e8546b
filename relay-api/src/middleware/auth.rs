use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use relay_shared::{Principal, Role};

use crate::error::AppError;
use crate::state::AppState;

/// Bearer token claims. Tokens are issued elsewhere; this service only
/// verifies them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    fn principal(&self) -> Option<Principal> {
        let id = Uuid::parse_str(&self.sub).ok()?;
        let role = self.role.parse::<Role>().ok()?;
        Some(Principal::new(id, role))
    }
}

/// Decodes the HS256 bearer token and injects the caller's `Principal`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".into()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::AuthenticationError("invalid token".into())
    })?;

    let principal = token_data
        .claims
        .principal()
        .ok_or_else(|| AppError::AuthenticationError("invalid token subject".into()))?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
