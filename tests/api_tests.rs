use scholar_vault::{
    AppConfig, AppState, InMemoryRepository, MockMailer, MockStorageService, create_router,
    mailer::MailerState,
    repository::RepositoryState,
    storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

/// Serves the full router on an ephemeral port over the in-memory store.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let mailer = Arc::new(MockMailer::new()) as MailerState;
    let config = AppConfig::default();

    let state = AppState {
        repo,
        storage,
        mailer,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let generated = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert!(generated.headers().contains_key("x-request-id"));

    let echoed = client
        .get(format!("{}/health", app.address))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(echoed.headers()["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let paths = doc["paths"].as_object().unwrap();
    for path in ["/auth/signup", "/misc/search", "/admin/thesis/{id}", "/chat/send"] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn test_cors_preflight_is_answered() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/misc/search", app.address))
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_signup_login_submit_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let signup = client
        .post(format!("{}/auth/signup", app.address))
        .json(&json!({
            "email": "http@example.com",
            "password": "over-the-wire",
            "firstname": "Tim",
            "lastname": "Berners-Lee",
            "gender": "male",
            "dob": "1955-06-08",
            "phone": "0123456789",
            "address": "CERN",
            "profilePic": "https://cdn.example.com/tim.png",
            "role": "user"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(signup.status(), reqwest::StatusCode::OK);

    let login: Value = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"email": "http@example.com", "password": "over-the-wire"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["token"].as_str().unwrap();

    let submitted = client
        .post(format!("{}/scholar/submit_thesis", app.address))
        .bearer_auth(token)
        .json(&json!({"title": "Hypertext", "keywords": ["web"], "category": "AI"}))
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status(), reqwest::StatusCode::OK);
    let body: Value = submitted.json().await.unwrap();
    let user_id = login["user"]["id"].as_str().unwrap();
    assert_eq!(body["thesis"]["author_id"], user_id);

    // Local mode also accepts the developer override header.
    let mine: Value = client
        .get(format!("{}/scholar/submit_thesis", app.address))
        .header("x-user-id", user_id)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["theses"][0]["title"], "Hypertext");
}
