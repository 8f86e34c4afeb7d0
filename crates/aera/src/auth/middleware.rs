//! Authentication middleware.

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, warn};
use std::sync::Arc;

use super::{AuthConfig, AuthError, Claims, ConfigValidationError};

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthState {
    /// Create auth state from config, resolving `env:VAR_NAME` secrets.
    pub fn new(config: AuthConfig) -> Result<Self, ConfigValidationError> {
        config.validate()?;

        let secret = match config.resolve_jwt_secret()? {
            Some(secret) => secret,
            None => {
                warn!("No jwt_secret configured, using an ephemeral secret; tokens will not survive a restart");
                AuthConfig::generate_jwt_secret()
            }
        };

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            config: Arc::new(config),
        })
    }

    /// Get allowed CORS origins from config.
    pub fn allowed_origins(&self) -> &[String] {
        &self.config.allowed_origins
    }

    /// Validate a JWT token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            warn!("JWT validation failed: {:?}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Resolve an `Authorization` header value to token claims.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or(AuthError::MissingAuthHeader)?;
        let token = bearer_token_from_header(header)?;
        self.validate_token(token)
    }

    /// Issue a token for a user.
    pub fn generate_token(&self, user_id: &str, email: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.config.token_ttl_hours * 3600,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    /// Get the user ID.
    pub fn id(&self) -> &str {
        &self.claims.sub
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication middleware.
///
/// Validates the `Authorization: Bearer <token>` header and injects
/// `CurrentUser` into request extensions.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let header = match req.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?),
        None => None,
    };

    let claims = auth.authenticate(header)?;
    debug!("Authenticated user {}", claims.sub);

    req.extensions_mut().insert(CurrentUser { claims });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AuthState {
        AuthState::new(AuthConfig {
            jwt_secret: Some("test-secret-for-unit-tests-minimum-32-chars-long".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_bearer_token_from_header_valid() {
        assert_eq!(
            bearer_token_from_header("Bearer abc.def.ghi").unwrap(),
            "abc.def.ghi"
        );
        assert_eq!(
            bearer_token_from_header("bearer   token123").unwrap(),
            "token123"
        );
    }

    #[test]
    fn test_bearer_token_from_header_invalid() {
        let cases = ["", "Bearer", "Bearer ", "Token something", "Bearer token extra"];

        for case in cases {
            assert!(
                bearer_token_from_header(case).is_err(),
                "{case} should fail"
            );
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let state = test_state();
        let token = state.generate_token("user-1", "a@b.com").unwrap();

        let claims = state.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.exp - claims.iat, 12 * 3600);
    }

    #[test]
    fn test_authenticate_distinguishes_missing_from_invalid() {
        let state = test_state();

        assert!(matches!(
            state.authenticate(None),
            Err(AuthError::MissingAuthHeader)
        ));
        assert!(matches!(
            state.authenticate(Some("Bearer not-a-jwt")),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            state.authenticate(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let state = test_state();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "user-1".to_string(),
            email: "a@b.com".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(&Header::default(), &claims, &state.encoding_key).unwrap();

        assert!(matches!(
            state.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = AuthState::new(AuthConfig::default()).unwrap();
        let token = other.generate_token("user-1", "a@b.com").unwrap();

        assert!(matches!(
            test_state().validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
