#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use scholar_vault::{
    AppState, InMemoryRepository, MockMailer, MockStorageService,
    auth::{hash_password, issue_token},
    config::AppConfig,
    create_router,
    models::{Thesis, User},
    repository::{NewThesis, NewUser, Repository, ThesisChanges},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

/// TestApp
///
/// A router over the in-memory store and the mocks. The concrete handles stay
/// reachable so tests can seed data and inspect side effects.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub mailer: Arc<MockMailer>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(MockStorageService::new(), MockMailer::new())
    }

    pub fn with(storage: MockStorageService, mailer: MockMailer) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let mailer = Arc::new(mailer);
        let config = AppConfig::default();
        let state = AppState {
            repo: repo.clone(),
            storage: Arc::new(storage),
            mailer: mailer.clone(),
            config: config.clone(),
        };
        Self {
            router: create_router(state),
            repo,
            mailer,
            config,
        }
    }

    /// Creates an account with the given role name (`admin`, `scholar`, `user`, `guest`).
    pub async fn seed_user(&self, role: &str, email: &str) -> User {
        let role = self
            .repo
            .find_role_by_name(role)
            .await
            .unwrap()
            .expect("seeded role");
        let password_hash = hash_password(PASSWORD.to_string(), self.config.bcrypt_cost)
            .await
            .unwrap();
        self.repo
            .create_user(NewUser {
                username: email.to_string(),
                email: email.to_string(),
                password_hash,
                role_id: role.id,
                firstname: "Ada".to_string(),
                lastname: format!("Tester{}", role.id),
                gender: Some("female".to_string()),
                dob: None,
                phone: Some("0123456789".to_string()),
                address: Some("1 Test Street".to_string()),
                profile_pic: None,
            })
            .await
            .unwrap()
    }

    pub fn token(&self, user: &User) -> String {
        issue_token(user, &self.config).unwrap()
    }

    pub async fn seed_thesis(&self, author: &User, title: &str, category: &str) -> Thesis {
        self.repo
            .create_thesis(NewThesis {
                title: title.to_string(),
                abstract_text: Some("An abstract".to_string()),
                keywords: vec!["rust".to_string(), "web".to_string()],
                category: category.to_string(),
                document_url: None,
                author_id: author.id,
            })
            .await
            .unwrap()
    }

    pub async fn approve(&self, thesis: &Thesis) {
        self.repo
            .update_thesis(
                thesis.thesis_id,
                ThesisChanges {
                    status: Some("approved".to_string()),
                    ..ThesisChanges::default()
                },
            )
            .await
            .unwrap();
    }

    /// Sends one request through the router and returns the status and JSON body
    /// (`Value::Null` when the body is not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send_raw(request).await
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

/// Collects the `field` names of a validation error body.
pub fn error_fields(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
