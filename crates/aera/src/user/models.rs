//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User entity from database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Absent for accounts created through Google sign-in.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    /// Per-user text folded into the assistant's system instructions.
    pub pre_prompt: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Public user info (safe to return to clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "prePrompt")]
    pub pre_prompt: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            pre_prompt: user.pre_prompt,
        }
    }
}

/// Request to create a new user.
#[derive(Debug, Clone, Default)]
pub struct CreateUserRequest {
    pub email: String,
    /// bcrypt hash; `None` for accounts that sign in with Google.
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Profile fields a user may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    #[serde(rename = "prePrompt")]
    pub pre_prompt: Option<String>,
}
