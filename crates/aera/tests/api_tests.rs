//! API integration tests.

use std::sync::Arc;
use std::time::Duration;

use aera::ai::AiError;
use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{
    ScriptedBackend, body_json, empty_request, json_request, new_session, send, signup, test_app,
    test_app_with,
};

/// Test that health endpoint works without authentication.
#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;

    let response = send(&app, empty_request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_signup_then_login() {
    let app = test_app().await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/signup",
            None,
            json!({"email": "  Ada@Example.com ", "password": "pw1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert!(json["token"].is_string());
    assert_eq!(json["user"]["email"], "ada@example.com");
    assert_eq!(json["user"]["name"], "ada");
    assert_eq!(json["user"]["prePrompt"], "");
    assert!(json["user"].get("password_hash").is_none());

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/login",
            None,
            json!({"email": "ada@example.com", "password": "pw1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let token = json["token"].as_str().unwrap().to_string();

    let response = send(&app, empty_request(Method::GET, "/user/info", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let app = test_app().await;
    signup(&app, "ada@example.com", "pw1").await;

    for body in [
        json!({"email": "ada@example.com", "password": "wrong"}),
        json!({"email": "nobody@example.com", "password": "pw1"}),
    ] {
        let response = send(&app, json_request(Method::POST, "/login", None, body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unauthorized: Invalid credentials");
    }
}

#[tokio::test]
async fn test_signup_rejects_bad_input() {
    let app = test_app().await;
    signup(&app, "ada@example.com", "pw1").await;

    let cases = [
        (json!({"email": "ada@example.com", "password": "pw2"}), StatusCode::CONFLICT),
        (json!({"email": "ADA@example.com", "password": "pw2"}), StatusCode::CONFLICT),
        (json!({"email": "", "password": "pw"}), StatusCode::BAD_REQUEST),
        (json!({"email": "not-an-email", "password": "pw"}), StatusCode::BAD_REQUEST),
    ];

    for (body, expected) in cases {
        let response = send(&app, json_request(Method::POST, "/signup", None, body)).await;
        assert_eq!(response.status(), expected);
        assert_eq!(body_json(response).await["success"], false);
    }
}

#[tokio::test]
async fn test_simultaneous_signups_yield_one_conflict() {
    let app = test_app().await;
    let body = json!({"email": "ada@example.com", "password": "pw1"});

    let (first, second) = tokio::join!(
        send(&app, json_request(Method::POST, "/signup", None, body.clone())),
        send(&app, json_request(Method::POST, "/signup", None, body)),
    );

    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn test_google_login_creates_then_reuses_account() {
    let app = test_app().await;

    let first = send(
        &app,
        json_request(
            Method::POST,
            "/google-login",
            None,
            json!({"email": "grace@example.com", "name": "Grace Hopper"}),
        ),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;
    assert_eq!(first["user"]["name"], "Grace Hopper");

    let second = send(
        &app,
        json_request(
            Method::POST,
            "/google-login",
            None,
            json!({"email": "Grace@example.com"}),
        ),
    )
    .await;
    let second = body_json(second).await;
    assert_eq!(second["user"]["id"], first["user"]["id"]);

    // No password was ever set on this account.
    let response = send(
        &app,
        json_request(
            Method::POST,
            "/login",
            None,
            json!({"email": "grace@example.com", "password": "anything"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_token_is_401_and_bad_token_is_403() {
    let app = test_app().await;

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["success"], false);

    let response = send(
        &app,
        empty_request(Method::GET, "/chat/sessions", Some("not.a.jwt")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_session_crud() {
    let app = test_app().await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let session_id = new_session(&app, &token).await;

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await;
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["sessions"][0]["id"], session_id.as_str());
    assert_eq!(json["sessions"][0]["title"], "New Chat");

    let response = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/chat/session/{session_id}/title"),
            Some(&token),
            json!({"title": "  Trip planning  "}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await;
    assert_eq!(body_json(response).await["sessions"][0]["title"], "Trip planning");

    for title in [json!(""), json!("   "), json!("x".repeat(201))] {
        let response = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/chat/session/{session_id}/title"),
                Some(&token),
                json!({ "title": title }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = send(
        &app,
        empty_request(
            Method::DELETE,
            &format!("/chat/session/{session_id}"),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    let response = send(
        &app,
        empty_request(
            Method::GET,
            &format!("/chat/messages/{session_id}"),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        empty_request(
            Method::DELETE,
            &format!("/chat/session/{session_id}"),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_new_session_accepts_title() {
    let app = test_app().await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/chat/session/new",
            Some(&token),
            json!({"title": "Recipes"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await;
    assert_eq!(body_json(response).await["sessions"][0]["title"], "Recipes");
}

#[tokio::test]
async fn test_other_users_conversations_are_not_found() {
    let app = test_app().await;
    let owner = signup(&app, "ada@example.com", "pw1").await;
    let intruder = signup(&app, "eve@example.com", "pw2").await;

    let session_id = new_session(&app, &owner).await;

    let requests = [
        empty_request(
            Method::GET,
            &format!("/chat/messages/{session_id}"),
            Some(&intruder),
        ),
        json_request(
            Method::PUT,
            &format!("/chat/session/{session_id}/title"),
            Some(&intruder),
            json!({"title": "mine now"}),
        ),
        empty_request(
            Method::DELETE,
            &format!("/chat/session/{session_id}"),
            Some(&intruder),
        ),
        json_request(
            Method::POST,
            "/chat/message",
            Some(&intruder),
            json!({"sessionId": session_id, "messageType": "user", "content": "hi"}),
        ),
        empty_request(
            Method::GET,
            &format!("/conversations/{session_id}/messages"),
            Some(&intruder),
        ),
    ];

    for request in requests {
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&intruder))).await;
    assert_eq!(body_json(response).await["sessions"], json!([]));

    // Still intact for the owner.
    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&owner))).await;
    let json = body_json(response).await;
    assert_eq!(json["sessions"][0]["title"], "New Chat");
}

#[tokio::test]
async fn test_malformed_conversation_id_is_bad_request() {
    let app = test_app().await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let response = send(
        &app,
        empty_request(Method::GET, "/chat/messages/not-a-uuid", Some(&token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_list_is_ordered_by_recent_activity() {
    let app = test_app().await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let first = new_session(&app, &token).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = new_session(&app, &token).await;

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await;
    let json = body_json(response).await;
    assert_eq!(json["sessions"][0]["id"], second.as_str());
    assert_eq!(json["sessions"][1]["id"], first.as_str());

    tokio::time::sleep(Duration::from_millis(5)).await;
    let response = send(
        &app,
        json_request(
            Method::POST,
            "/chat/message",
            Some(&token),
            json!({"sessionId": first, "messageType": "user", "content": "bump"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let before = body_json(
        send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await,
    )
    .await;
    assert_eq!(before["sessions"][0]["id"], first.as_str());

    // Listing does not change anything.
    let after = body_json(
        send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await,
    )
    .await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_save_message_accepts_legacy_ai_label() {
    let app = test_app().await;
    let token = signup(&app, "ada@example.com", "pw1").await;
    let session_id = new_session(&app, &token).await;

    for (message_type, content) in [("user", "What is Rust?"), ("ai", "A language.")] {
        let response = send(
            &app,
            json_request(
                Method::POST,
                "/chat/message",
                Some(&token),
                json!({"sessionId": session_id, "messageType": message_type, "content": content}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(
        &app,
        empty_request(
            Method::GET,
            &format!("/chat/messages/{session_id}"),
            Some(&token),
        ),
    )
    .await;
    let json = body_json(response).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "A language.");

    for body in [
        json!({"sessionId": session_id, "messageType": "tool", "content": "x"}),
        json!({"sessionId": session_id, "messageType": "user", "content": "  "}),
        json!({"sessionId": session_id, "messageType": "user", "content": "x".repeat(10_001)}),
    ] {
        let response = send(
            &app,
            json_request(Method::POST, "/chat/message", Some(&token), body),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_ai_reply_returns_trimmed_text_without_storing() {
    let backend = Arc::new(ScriptedBackend::replying(&["  The answer", " is 42.\n"]));
    let app = test_app_with(backend.clone()).await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/chat/ai",
            Some(&token),
            json!({"message": "What is the answer?", "conversationHistory": "Human: hi\nAI: hello"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["response"], "The answer is 42.");

    let request = backend.last_request().unwrap();
    assert_eq!(request.conversation_history, "Human: hi\nAI: hello");
    assert_eq!(request.user_input(), Some("What is the answer?"));
    assert!(request.system_prompt.contains("ada"));

    let response = send(&app, empty_request(Method::GET, "/chat/sessions", Some(&token))).await;
    assert_eq!(body_json(response).await["sessions"], json!([]));
}

#[tokio::test]
async fn test_ai_reply_maps_backend_failures() {
    let cases = [
        (
            AiError::BackendTimeout(Duration::from_secs(15)),
            StatusCode::GATEWAY_TIMEOUT,
        ),
        (
            AiError::BackendUnavailable("connection refused".into()),
            StatusCode::BAD_GATEWAY,
        ),
    ];

    for (error, expected) in cases {
        let app = test_app_with(Arc::new(ScriptedBackend::unavailable(error))).await;
        let token = signup(&app, "ada@example.com", "pw1").await;

        let response = send(
            &app,
            json_request(Method::POST, "/chat/ai", Some(&token), json!({"message": "hi"})),
        )
        .await;
        assert_eq!(response.status(), expected);
        assert_eq!(body_json(response).await["success"], false);
    }

    let app = test_app_with(Arc::new(ScriptedBackend::replying(&["   "]))).await;
    let token = signup(&app, "ada@example.com", "pw1").await;
    let response = send(
        &app,
        json_request(Method::POST, "/chat/ai", Some(&token), json!({"message": "hi"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_conversation_rest_aliases() {
    let app = test_app().await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/conversations",
            Some(&token),
            json!({"title": "Garden"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["title"], "Garden");
    let id = created["id"].as_str().unwrap().to_string();

    let response = send(&app, empty_request(Method::GET, "/conversations", Some(&token))).await;
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let response = send(
        &app,
        empty_request(
            Method::GET,
            &format!("/conversations/{id}/messages"),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));

    let response = send(
        &app,
        json_request(Method::POST, "/conversations", Some(&token), json!({"title": " "})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_update() {
    let backend = Arc::new(ScriptedBackend::replying(&["ok"]));
    let app = test_app_with(backend.clone()).await;
    let token = signup(&app, "ada@example.com", "pw1").await;

    let response = send(
        &app,
        json_request(
            Method::PUT,
            "/user/update",
            Some(&token),
            json!({"name": "  Ada Lovelace ", "prePrompt": "Answer in French."}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["name"], "Ada Lovelace");
    assert_eq!(json["prePrompt"], "Answer in French.");

    let response = send(
        &app,
        json_request(Method::PUT, "/user/update", Some(&token), json!({"name": "  "})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, empty_request(Method::GET, "/user/info", Some(&token))).await;
    let json = body_json(response).await;
    assert_eq!(json["user"]["name"], "Ada Lovelace");
    assert_eq!(json["user"]["prePrompt"], "Answer in French.");

    // The pre-prompt reaches the backend.
    send(
        &app,
        json_request(Method::POST, "/chat/ai", Some(&token), json!({"message": "hi"})),
    )
    .await;
    let request = backend.last_request().unwrap();
    assert!(request.system_prompt.contains("Ada Lovelace"));
    assert!(request.system_prompt.contains("Answer in French."));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app().await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}
