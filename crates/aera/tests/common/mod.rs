//! Test utilities and common setup.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use aera::ai::{AiError, AiResult, FragmentStream, GenerationRequest, TextGenerator};
use aera::api;
use aera::auth::{AuthConfig, AuthState};
use aera::db::Database;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Create a test AuthConfig with a JWT secret for testing.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Some("test-secret-for-integration-tests-minimum-32-chars".to_string()),
        ..AuthConfig::default()
    }
}

/// Text generator that replays a fixed script.
#[derive(Default)]
pub struct ScriptedBackend {
    fragments: Vec<String>,
    trailing_error: Option<AiError>,
    initial_error: Option<AiError>,
    stall: bool,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedBackend {
    /// Yield `fragments` and finish normally.
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Yield `fragments`, then fail with `error`.
    pub fn failing_after(fragments: &[&str], error: AiError) -> Self {
        Self {
            trailing_error: Some(error),
            ..Self::replying(fragments)
        }
    }

    /// Yield `fragments`, then go silent without ever finishing.
    pub fn stalling_after(fragments: &[&str]) -> Self {
        Self {
            stall: true,
            ..Self::replying(fragments)
        }
    }

    /// Fail before producing anything.
    pub fn unavailable(error: AiError) -> Self {
        Self {
            initial_error: Some(error),
            ..Self::default()
        }
    }

    /// The most recent request the backend was asked to answer.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> AiResult<FragmentStream> {
        *self.last_request.lock().unwrap() = Some(request.clone());

        if let Some(error) = &self.initial_error {
            return Err(error.clone());
        }

        let mut items: Vec<AiResult<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(error) = &self.trailing_error {
            items.push(Err(error.clone()));
        }
        if self.stall {
            return Ok(Box::pin(stream::iter(items).chain(stream::pending())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Create a test application backed by an in-memory database.
pub async fn test_app() -> Router {
    test_app_with(Arc::new(ScriptedBackend::replying(&["Hello", " there!"]))).await
}

/// Create a test application that answers with `backend`.
pub async fn test_app_with(backend: Arc<dyn TextGenerator>) -> Router {
    let db = Database::in_memory().await.unwrap();
    let auth_state = AuthState::new(test_auth_config()).unwrap();
    let state = api::AppState::new(&db, auth_state, backend);
    api::create_router(state)
}

/// Build a JSON request, optionally authenticated.
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

/// Build a bodiless request, optionally authenticated.
pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Register an account and return its token.
pub async fn signup(app: &Router, email: &str, password: &str) -> String {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/signup",
            None,
            json!({"email": email, "password": password}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    json["token"].as_str().unwrap().to_string()
}

/// Create an empty session and return its id.
pub async fn new_session(app: &Router, token: &str) -> String {
    let response = send(app, empty_request(Method::POST, "/chat/session/new", Some(token))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    json["sessionId"].as_str().unwrap().to_string()
}
