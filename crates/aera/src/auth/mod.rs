//! Authentication module.
//!
//! Issues and validates HS256 bearer tokens. Protected routes run behind
//! [`auth_middleware`], which resolves the token to a [`CurrentUser`] before
//! any handler touches the store.

mod claims;
mod config;
mod error;
mod middleware;

pub use claims::Claims;
pub use config::{AuthConfig, ConfigValidationError};
pub(crate) use config::resolve_env_reference;
pub use error::AuthError;
pub use middleware::{AuthState, CurrentUser, auth_middleware};
