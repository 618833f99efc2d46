//! Authentication middleware for access token validation

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use common::jwt::TokenType;
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Authenticated user information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
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

/// Validate an access token and make sure it has not been revoked
pub async fn authenticate(state: &AppState, token: &str) -> ApiResult<AuthUser> {
    let claims = state
        .jwt_service
        .validate_token(token, TokenType::Access)
        .map_err(|e| {
            warn!("Rejected access token: {}", e);
            ApiError::Unauthorized
        })?;

    if state
        .jwt_service
        .is_blacklisted(&state.redis_pool, &claims)
        .await?
    {
        return Err(ApiError::Unauthorized);
    }

    Ok(AuthUser { id: claims.sub })
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let user = authenticate(&state, token).await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  abc.def "));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let state = test_state();
        let err = authenticate(&state, "not-a-jwt").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let state = test_state();
        let refresh = state
            .jwt_service
            .generate_refresh_token(Uuid::new_v4())
            .unwrap();

        let err = authenticate(&state, &refresh.token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
