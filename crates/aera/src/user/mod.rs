//! User accounts.

mod models;
mod repository;
mod service;

pub use models::{CreateUserRequest, UpdateUserRequest, User, UserInfo};
pub use repository::UserRepository;
pub use service::{UserService, normalize_email};
