use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use cardsurvey_types::api::Claims;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// Decode a token and confirm its session has not been logged out.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized
    })?;
    let claims = token_data.claims;

    let (sid, sub) = (claims.sid.to_string(), claims.sub.to_string());
    let active = blocking(state, move |s| s.db.is_session_active(&sid, &sub)).await?;
    if !active {
        return Err(ApiError::Unauthorized);
    }

    Ok(claims)
}

/// Extract and validate the bearer token, then expose its `Claims` to handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| ApiError::Unauthorized)?;

    let claims = authenticate(&state, bearer.token()).await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
