//! End-to-end router tests against the in-memory store.

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
    },
};
use notely::{
    api::{
        self, AppContext,
        handlers::auth::{AuthConfig, AuthState},
    },
    credentials::TokenKeys,
    identity::IdentityService,
    notes::NoteService,
    store::memory::MemoryStore,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const FRONTEND: &str = "http://localhost:3000";

fn test_app() -> Result<Router> {
    let store = Arc::new(MemoryStore::new());
    let auth = AuthState::new(AuthConfig::new(FRONTEND.to_string()), TokenKeys::development())?;
    api::app(AppContext {
        identity: IdentityService::new(store.clone()),
        notes: NoteService::new(store),
        auth: Arc::new(auth),
    })
}

struct Reply {
    status: StatusCode,
    location: Option<String>,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<Reply> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).context("response body is not JSON")?
    };

    Ok(Reply {
        status,
        location,
        body,
    })
}

async fn register(app: &Router, email: &str) -> Result<String> {
    let reply = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"name": "Test User", "email": email, "password": "secret1"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("register response has no token")
}

async fn create_note(app: &Router, token: &str, title: &str, content: &str) -> Result<String> {
    let reply = send(
        app,
        Method::POST,
        "/notes",
        Some(token),
        Some(json!({"title": title, "content": content})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["data"]["id"]
        .as_str()
        .map(str::to_string)
        .context("create response has no id")
}

#[tokio::test]
async fn register_login_and_me() -> Result<()> {
    let app = test_app()?;

    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "  Ada@Example.com ", "password": "secret1"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["message"], "User registered successfully");
    assert_eq!(reply.body["data"]["user"]["email"], "ada@example.com");
    assert_eq!(reply.body["data"]["user"]["name"], "Ada");
    assert_eq!(reply.body["data"]["user"]["hasPassword"], true);
    assert!(reply.body["data"]["user"].get("passwordHash").is_none());

    let reply = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "ADA@example.com", "password": "secret1"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["message"], "Login successful");
    let token = reply.body["data"]["token"]
        .as_str()
        .context("login response has no token")?
        .to_string();

    let reply = send(&app, Method::GET, "/auth/me", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["email"], "ada@example.com");

    let reply = send(&app, Method::POST, "/auth/logout", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["message"], "Logged out successfully");

    Ok(())
}

#[tokio::test]
async fn registration_validation() -> Result<()> {
    let app = test_app()?;
    register(&app, "dup@example.com").await?;

    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "DUP@example.com", "password": "another1"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"], "conflict");
    assert_eq!(reply.body["message"], "User already exists with this email");

    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "not-an-email", "password": "secret1"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "invalid_input");

    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "short@example.com", "password": "12345"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, Method::POST, "/auth/register", None, None).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);

    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let app = test_app()?;
    register(&app, "bob@example.com").await?;

    let wrong_password = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "bob@example.com", "password": "wrong-password"})),
    )
    .await?;
    let unknown_user = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "nobody@example.com", "password": "secret1"})),
    )
    .await?;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(wrong_password.body["message"], "Invalid email or password");

    let missing = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "bob@example.com"})),
    )
    .await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn guard_rejects_missing_and_invalid_tokens() -> Result<()> {
    let app = test_app()?;

    let reply = send(&app, Method::GET, "/notes", None, None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"], "unauthenticated");
    assert_eq!(reply.body["message"], "Access denied. No token provided");

    let reply = send(&app, Method::GET, "/auth/me", Some("garbage"), None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "Invalid token");

    let other_keys = TokenKeys::new(secrecy::SecretString::from("another-secret".to_string()));
    let forged = other_keys.issue(uuid::Uuid::new_v4(), "x@example.com")?;
    let reply = send(&app, Method::GET, "/notes/stats", Some(&forged), None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "Invalid token");

    Ok(())
}

#[tokio::test]
async fn note_lifecycle() -> Result<()> {
    let app = test_app()?;
    let token = register(&app, "life@example.com").await?;
    let id = create_note(&app, &token, "  Groceries ", " milk ").await?;

    let reply = send(&app, Method::GET, &format!("/notes/{id}"), Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["title"], "Groceries");
    assert_eq!(reply.body["data"]["content"], "milk");
    assert_eq!(reply.body["data"]["status"], "active");

    let reply = send(
        &app,
        Method::PUT,
        &format!("/notes/{id}"),
        Some(&token),
        Some(json!({"title": "Groceries", "content": "milk, eggs"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["content"], "milk, eggs");

    let archive = format!("/notes/{id}/archive");
    let reply = send(&app, Method::PUT, &archive, Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["status"], "archived");

    // Archiving twice is a wrong-state transition.
    let reply = send(&app, Method::PUT, &archive, Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"], "not_found");

    let reply = send(&app, Method::PUT, &format!("/notes/{id}/trash"), Some(&token), None).await?;
    assert_eq!(reply.body["data"]["status"], "trash");

    let reply = send(&app, Method::PUT, &format!("/notes/{id}/unarchive"), Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = send(&app, Method::PUT, &format!("/notes/{id}/restore"), Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["status"], "active");

    let reply = send(&app, Method::DELETE, &format!("/notes/{id}"), Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);

    let reply = send(&app, Method::GET, &format!("/notes/{id}"), Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "Note not found");

    Ok(())
}

#[tokio::test]
async fn note_input_validation() -> Result<()> {
    let app = test_app()?;
    let token = register(&app, "input@example.com").await?;

    let reply = send(
        &app,
        Method::POST,
        "/notes",
        Some(&token),
        Some(json!({"title": "   ", "content": "body"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "invalid_input");

    let reply = send(&app, Method::POST, "/notes", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, Method::GET, "/notes/not-a-uuid", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn notes_are_isolated_per_user() -> Result<()> {
    let app = test_app()?;
    let alice = register(&app, "alice@example.com").await?;
    let mallory = register(&app, "mallory@example.com").await?;
    let id = create_note(&app, &alice, "Private", "only mine").await?;

    for (method, uri) in [
        (Method::GET, format!("/notes/{id}")),
        (Method::PUT, format!("/notes/{id}/archive")),
        (Method::PUT, format!("/notes/{id}/trash")),
        (Method::DELETE, format!("/notes/{id}")),
    ] {
        let reply = send(&app, method, &uri, Some(&mallory), None).await?;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{uri}");
    }

    let reply = send(
        &app,
        Method::PUT,
        &format!("/notes/{id}"),
        Some(&mallory),
        Some(json!({"title": "Hijacked", "content": "nope"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = send(&app, Method::GET, "/notes", Some(&mallory), None).await?;
    assert_eq!(reply.body["data"]["pagination"]["total"], 0);

    let reply = send(&app, Method::GET, &format!("/notes/{id}"), Some(&alice), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["title"], "Private");

    Ok(())
}

#[tokio::test]
async fn listing_paginates_and_searches() -> Result<()> {
    let app = test_app()?;
    let token = register(&app, "pages@example.com").await?;
    for index in 0..12 {
        create_note(&app, &token, &format!("Note {index}"), "body").await?;
    }
    create_note(&app, &token, "Shopping", "buy Apples").await?;

    let reply = send(&app, Method::GET, "/notes?page=2&limit=5", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    let notes = reply.body["data"]["notes"]
        .as_array()
        .context("notes is not an array")?;
    assert_eq!(notes.len(), 5);
    assert_eq!(reply.body["data"]["pagination"]["page"], 2);
    assert_eq!(reply.body["data"]["pagination"]["limit"], 5);
    assert_eq!(reply.body["data"]["pagination"]["total"], 13);
    assert_eq!(reply.body["data"]["pagination"]["totalPages"], 3);

    let reply = send(&app, Method::GET, "/notes?search=apples", Some(&token), None).await?;
    assert_eq!(reply.body["data"]["pagination"]["total"], 1);
    assert_eq!(reply.body["data"]["notes"][0]["title"], "Shopping");

    let reply = send(&app, Method::GET, "/notes?page=abc", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, Method::GET, "/notes/archived", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["pagination"]["total"], 0);

    Ok(())
}

#[tokio::test]
async fn stats_and_profile_count_by_status() -> Result<()> {
    let app = test_app()?;
    let token = register(&app, "stats@example.com").await?;
    let first = create_note(&app, &token, "One", "1").await?;
    let second = create_note(&app, &token, "Two", "2").await?;
    create_note(&app, &token, "Three", "3").await?;

    send(&app, Method::PUT, &format!("/notes/{first}/archive"), Some(&token), None).await?;
    send(&app, Method::PUT, &format!("/notes/{second}/trash"), Some(&token), None).await?;

    let reply = send(&app, Method::GET, "/notes/stats", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body["data"],
        json!({"active": 1, "archived": 1, "trash": 1, "total": 3})
    );

    let reply = send(&app, Method::GET, "/auth/profile", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["user"]["email"], "stats@example.com");
    assert_eq!(reply.body["data"]["stats"]["total"], 3);

    Ok(())
}

#[tokio::test]
async fn google_sign_in_unconfigured_redirects_to_failure() -> Result<()> {
    let app = test_app()?;

    let reply = send(&app, Method::GET, "/auth/google", None, None).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/auth/google/failure"));

    let reply = send(&app, Method::GET, "/auth/google/failure", None, None).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(
        reply.location.as_deref(),
        Some("http://localhost:3000/login?error=google_auth_failed")
    );

    let reply = send(
        &app,
        Method::GET,
        "/auth/google/callback?code=abc&state=unknown",
        None,
        None,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/auth/google/failure"));

    Ok(())
}

#[tokio::test]
async fn health_and_openapi() -> Result<()> {
    let app = test_app()?;

    let reply = send(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["name"], "notely");
    assert_eq!(reply.body["database"], "ok");

    let reply = send(&app, Method::GET, "/openapi.json", None, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["paths"].get("/notes/{id}/archive").is_some());

    Ok(())
}
