//! User service for business logic.

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use super::models::{CreateUserRequest, UpdateUserRequest, User};
use super::repository::UserRepository;

/// Service for user management operations.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    /// Register a password account.
    #[instrument(skip(self, password, name))]
    pub async fn register(&self, email: &str, password: &str, name: Option<String>) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            bail!("Email and password are required.");
        }

        if !is_valid_email(&email) {
            bail!("Invalid email format.");
        }

        if !self.repo.is_email_available(&email).await? {
            bail!("Email '{}' is already registered.", email);
        }

        let user = self
            .repo
            .create(CreateUserRequest {
                email,
                password: Some(hash_password(password)?),
                name: name.map(|n| n.trim().to_string()),
            })
            .await?;

        info!(user_id = %user.id, "Registered new user");
        Ok(user)
    }

    /// Check an email/password pair.
    ///
    /// Unknown emails, wrong passwords and Google-only accounts all yield
    /// `None`, so callers cannot tell which one failed.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let Some(user) = self.repo.get_by_email(&email).await? else {
            return Ok(None);
        };

        match &user.password_hash {
            Some(hash) if verify_password(password, hash)? => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    /// Find or create the account for a Google sign-in.
    #[instrument(skip(self, name))]
    pub async fn sign_in_with_google(&self, email: &str, name: Option<String>) -> Result<User> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            bail!("Invalid email format.");
        }

        if let Some(user) = self.repo.get_by_email(&email).await? {
            return Ok(user);
        }

        let created = self
            .repo
            .create(CreateUserRequest {
                email: email.clone(),
                password: None,
                name: name.map(|n| n.trim().to_string()),
            })
            .await;

        match created {
            Ok(user) => {
                info!(user_id = %user.id, "Created user from Google sign-in");
                Ok(user)
            }
            // A concurrent sign-in may have created the account meanwhile.
            Err(e) => self.repo.get_by_email(&email).await?.ok_or(e),
        }
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.repo.get(id).await
    }

    /// Update name and/or pre-prompt.
    #[instrument(skip(self, request))]
    pub async fn update_profile(&self, id: &str, mut request: UpdateUserRequest) -> Result<User> {
        if let Some(name) = request.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                bail!("Name must not be empty.");
            }
        }

        self.repo.update(id, request).await
    }
}

/// Trim and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    !parts[0].is_empty() && parts[1].contains('.') && !parts[1].starts_with('.')
}

/// Hash a password using bcrypt.
fn hash_password(password: &str) -> Result<String> {
    // Use a lower cost factor for development speed
    let cost = if cfg!(debug_assertions) { 4 } else { 10 };
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// Verify a password against a bcrypt hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}
