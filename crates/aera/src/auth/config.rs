//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Shortest signing secret accepted from configuration.
const MIN_SECRET_LENGTH: usize = 32;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Supports `env:VAR_NAME`.
    ///
    /// When unset, a random secret is generated at startup and tokens do not
    /// survive a restart.
    pub jwt_secret: Option<String>,
    /// Token lifetime in hours.
    pub token_ttl_hours: i64,
    /// Allowed CORS origins. Empty allows any origin without credentials.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 12,
            allowed_origins: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved secret or None if not configured.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        self.jwt_secret
            .as_deref()
            .map(resolve_env_reference)
            .transpose()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(secret) = self.resolve_jwt_secret()?
            && secret.len() < MIN_SECRET_LENGTH
        {
            return Err(ConfigValidationError::JwtSecretTooShort(secret.len()));
        }

        if self.token_ttl_hours <= 0 {
            return Err(ConfigValidationError::InvalidTokenTtl(self.token_ttl_hours));
        }

        Ok(())
    }

    /// Generate a random signing secret.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

/// Expand a config value of the form `env:VAR_NAME`; other values pass through.
pub(crate) fn resolve_env_reference(value: &str) -> Result<String, ConfigValidationError> {
    match value.strip_prefix("env:") {
        Some(var_name) => match std::env::var(var_name) {
            Ok(resolved) if !resolved.is_empty() => Ok(resolved),
            Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
            Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
        },
        None => Ok(value.to_string()),
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Configured secret is shorter than the minimum.
    JwtSecretTooShort(usize),
    /// Token lifetime must be positive.
    InvalidTokenTtl(i64),
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JwtSecretTooShort(len) => write!(
                f,
                "JWT secret must be at least {} characters (got {}).",
                MIN_SECRET_LENGTH, len
            ),
            Self::InvalidTokenTtl(hours) => {
                write!(f, "token_ttl_hours must be positive (got {}).", hours)
            }
            Self::EnvVarNotFound(var) => write!(
                f,
                "Environment variable '{}' not found (referenced via env:{} in config).",
                var, var
            ),
            Self::EnvVarEmpty(var) => write!(
                f,
                "Environment variable '{}' is empty (referenced via env:{} in config).",
                var, var
            ),
        }
    }
}

impl std::error::Error for ConfigValidationError {}
