//! HTTP API.

mod error;
mod extract;
pub mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::ApiJson;
pub use routes::create_router;
pub use state::AppState;
