//! Middleware for access token validation

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use common::jwt::{Claims, TokenType};
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::AuthError};

/// Caller identity placed in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub claims: Claims,
}

/// Pull the token out of an `Authorization: Bearer ...` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extract and validate the access token, rejecting revoked ones
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::Unauthorized)?;

    let claims = state
        .jwt_service
        .validate_token(token, TokenType::Access)
        .map_err(|e| {
            warn!("Rejected access token: {}", e);
            AuthError::Unauthorized
        })?;

    if state
        .jwt_service
        .is_blacklisted(&state.redis_pool, &claims)
        .await?
    {
        return Err(AuthError::Unauthorized);
    }

    req.extensions_mut().insert(AuthenticatedUser {
        id: claims.sub,
        claims,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
