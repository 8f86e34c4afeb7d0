//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::models::{CreateUserRequest, UpdateUserRequest, User};
use crate::db::timestamp_now;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user.
    ///
    /// A taken email fails with an "already registered" error, even when the
    /// caller checked availability first and lost a race.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = timestamp_now();
        let name = request
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name_for(&request.email));

        debug!("Creating user: {} ({})", request.email, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, pre_prompt, created_at, updated_at)
            VALUES (?, ?, ?, ?, '', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.email)
        .bind(&request.password)
        .bind(&name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                anyhow::anyhow!("Email '{}' is already registered.", request.email)
            }
            other => anyhow::Error::new(other).context("Failed to insert user"),
        })?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, pre_prompt, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")
    }

    /// Get a user by (normalized) email.
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, pre_prompt, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")
    }

    /// Check whether an email is free.
    pub async fn is_email_available(&self, email: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check email availability")?;

        Ok(count == 0)
    }

    /// Apply the supplied profile fields.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<User> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))?;

        let mut updates = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(name) = &request.name {
            updates.push("name = ?");
            values.push(name.clone());
        }

        if let Some(pre_prompt) = &request.pre_prompt {
            updates.push("pre_prompt = ?");
            values.push(pre_prompt.clone());
        }

        if updates.is_empty() {
            return Ok(existing);
        }

        updates.push("updated_at = ?");
        values.push(timestamp_now());

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = query.bind(value);
        }
        query
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user")?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }
}

/// Display name used when none is given: the local part of the email.
fn default_name_for(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or("User")
        .to_string()
}
