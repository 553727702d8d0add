mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, Uri, request::Parts},
};
use chrono::{Duration, Utc};
use common::{PASSWORD, TestApp};
use jsonwebtoken::{EncodingKey, Header, encode};
use scholar_vault::{
    MockMailer, MockStorageService, RepositoryState,
    auth::{Claims, NO_SESSION, PERMISSION_DENIED, Permission, has_permission, resolve_session},
    config::{AppConfig, Env},
    repository::Repository,
};
use serde_json::json;
use std::sync::Arc;

// --- HELPERS ---

fn expired_token(user_id: i64, config: &AppConfig) -> String {
    let issued = Utc::now() - Duration::hours(3);
    let claims = Claims {
        sub: user_id.to_string(),
        role_id: 1,
        email: "ghost@example.com".to_string(),
        username: "ghost@example.com".to_string(),
        firstname: "Ghost".to_string(),
        lastname: "User".to_string(),
        exp: (issued + Duration::hours(1)).timestamp() as usize,
        iat: issued.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

fn parts_with(header: Option<(&str, String)>) -> Parts {
    let mut builder = Request::builder().method(Method::GET).uri(Uri::from_static("/"));
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    let (parts, _) = builder.body(Body::empty()).unwrap().into_parts();
    parts
}

fn signup_body(email: &str, role: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "firstname": "Grace",
        "lastname": "Hopper",
        "gender": "female",
        "dob": "1990-05-17",
        "phone": "0123456789",
        "address": "42 Compiler Way",
        "profilePic": "https://cdn.example.com/grace.png",
        "role": role
    })
}

/// Pulls the `token=` query value out of the link embedded in a mail body.
fn token_from_mail(html: &str) -> String {
    let start = html.find("token=").expect("mail carries a token link") + "token=".len();
    html[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect()
}

// --- SESSION RESOLUTION ---

#[tokio::test]
async fn test_gated_route_without_token_is_401() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/admin/thesis", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], NO_SESSION);
}

#[tokio::test]
async fn test_authenticated_route_without_token_is_401() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/notifications", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], NO_SESSION);
}

#[tokio::test]
async fn test_invalid_token_is_401() {
    let app = TestApp::new();
    let (status, _) = app
        .send(Method::GET, "/admin/profile", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_401() {
    let app = TestApp::new();
    let user = app.seed_user("admin", "admin@example.com").await;
    let token = expired_token(user.id, &app.config);

    let (status, _) = app
        .send(Method::GET, "/admin/thesis", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_401() {
    let app = TestApp::new();
    let user = app.seed_user("admin", "admin@example.com").await;
    let foreign = AppConfig {
        jwt_secret: "some-other-secret".to_string(),
        ..AppConfig::default()
    };
    let token = scholar_vault::auth::issue_token(&user, &foreign).unwrap();

    let (status, _) = app
        .send(Method::GET, "/admin/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resolve_session_prefers_local_user_override() {
    let repo = Arc::new(scholar_vault::InMemoryRepository::new());
    let scholar_role = repo.find_role_by_name("scholar").await.unwrap().unwrap();
    let user = repo
        .create_user(scholar_vault::repository::NewUser {
            username: "dev@example.com".to_string(),
            email: "dev@example.com".to_string(),
            password_hash: "x".to_string(),
            role_id: scholar_role.id,
            firstname: "Dev".to_string(),
            lastname: "Eloper".to_string(),
            gender: None,
            dob: None,
            phone: None,
            address: None,
            profile_pic: None,
        })
        .await
        .unwrap();
    let repo: RepositoryState = repo;

    let parts = parts_with(Some(("x-user-id", user.id.to_string())));
    let local = AppConfig::default();
    let resolved = resolve_session(&parts, &repo, &local).await.unwrap();
    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.email, "dev@example.com");

    // The override is a local development aid only.
    let production = AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    };
    assert!(resolve_session(&parts, &repo, &production).await.is_none());

    // Unknown ids fall through to the (missing) bearer token.
    let unknown = parts_with(Some(("x-user-id", "999999".to_string())));
    assert!(resolve_session(&unknown, &repo, &local).await.is_none());
}

// --- PERMISSION GATE ---

#[tokio::test]
async fn test_role_without_permission_is_403() {
    let app = TestApp::new();
    let user = app.seed_user("user", "reader@example.com").await;
    let token = app.token(&user);

    let (status, body) = app
        .send(Method::GET, "/admin/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], PERMISSION_DENIED);

    let (status, _) = app
        .send(Method::GET, "/dashboard/admin", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_with_permission_passes_gate() {
    let app = TestApp::new();
    let admin = app.seed_user("admin", "admin@example.com").await;
    let token = app.token(&admin);

    let (status, body) = app
        .send(Method::GET, "/admin/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
}

#[tokio::test]
async fn test_methods_on_same_path_are_gated_separately() {
    let app = TestApp::new();
    let scholar = app.seed_user("scholar", "scholar@example.com").await;
    let token = app.token(&scholar);

    // MODIFY_USER is admin-only.
    let (status, _) = app
        .send(Method::GET, "/admin/user", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Scholars hold VIEW_THESIS, so the listing passes.
    let (status, _) = app
        .send(Method::GET, "/admin/thesis", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_permission_check_fails_closed_when_store_is_down() {
    let app = TestApp::new();
    let admin = app.seed_user("admin", "admin@example.com").await;
    let repo: RepositoryState = app.repo.clone();

    assert!(has_permission(&repo, admin.id, Permission::ViewHistory).await);
    app.repo.set_unavailable(true);
    assert!(!has_permission(&repo, admin.id, Permission::ViewHistory).await);

    let token = app.token(&admin);
    let (status, _) = app
        .send(Method::GET, "/admin/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deleted_user_token_is_denied_on_gated_routes() {
    let app = TestApp::new();
    let admin = app.seed_user("admin", "admin@example.com").await;
    let token = app.token(&admin);
    app.repo.delete_user(admin.id).await.unwrap();

    let (status, _) = app
        .send(Method::GET, "/admin/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// --- SIGNUP & LOGIN ---

#[tokio::test]
async fn test_signup_then_login() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/signup",
            None,
            Some(signup_body("grace@example.com", "scholar")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User signed up successfully");
    assert_eq!(body["user"]["username"], "grace@example.com");
    assert_eq!(body["user"]["verified"], false);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["user"]["id"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "grace@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    let token = body["token"].as_str().unwrap().to_string();

    // The issued token opens authenticated routes.
    let (status, body) = app
        .send(Method::GET, "/admin/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "scholar");
    assert_eq!(body["firstName"], "Grace");
}

#[tokio::test]
async fn test_signup_rejects_admin_role() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/signup",
            None,
            Some(signup_body("mallory@example.com", "admin")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid role");
    assert!(app.repo.get_user_by_email("mallory@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_signup_duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.seed_user("user", "taken@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/signup",
            None,
            Some(signup_body("taken@example.com", "user")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");
}

#[tokio::test]
async fn test_signup_reports_every_invalid_field() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({
                "email": "not-an-email",
                "password": "short",
                "firstname": "Grace",
                "lastname": "Hopper",
                "gender": "unknown",
                "dob": "yesterday",
                "phone": "123",
                "address": "42 Compiler Way",
                "profilePic": "nope",
                "role": "user"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    let fields = common::error_fields(&body);
    for field in ["email", "password", "gender", "dob", "phone", "profilePic"] {
        assert!(fields.contains(&field.to_string()), "missing {field} in {fields:?}");
    }
    assert!(!fields.contains(&"firstname".to_string()));
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let app = TestApp::new();
    app.seed_user("user", "reader@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "reader@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

// --- EMAIL VERIFICATION ---

#[tokio::test]
async fn test_email_verification_flow() {
    let app = TestApp::new();
    let user = app.seed_user("user", "reader@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/sendemail",
            None,
            Some(json!({"email": "reader@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification email sent");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "reader@example.com");
    assert!(sent[0].html.contains(&format!("{}/verify?token=", app.config.frontend_url)));
    let token = token_from_mail(&sent[0].html);
    assert_eq!(token.len(), 40);

    let (status, body) = app
        .send(Method::GET, &format!("/auth/verify?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email verified successfully");

    let stored = app.repo.get_user(user.id).await.unwrap().unwrap();
    assert!(stored.verified);
    assert!(stored.email_verified.is_some());
    assert!(stored.verification_token.is_none());

    // Tokens are single use.
    let (status, body) = app
        .send(Method::GET, &format!("/auth/verify?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invalid verification token");
}

#[tokio::test]
async fn test_verify_requires_token() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/auth/verify", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token is required");
}

#[tokio::test]
async fn test_expired_verification_token_is_rejected() {
    let app = TestApp::new();
    let user = app.seed_user("user", "reader@example.com").await;
    app.repo
        .set_verification_token(user.id, "abc123", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/auth/verify?token=abc123", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token expired");
}

#[tokio::test]
async fn test_verification_for_unknown_email_is_404() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/sendemail",
            None,
            Some(json!({"email": "nobody@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_mail_failure_is_500() {
    let app = TestApp::with(MockStorageService::new(), MockMailer::new_failing());
    app.seed_user("user", "reader@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/sendemail",
            None,
            Some(json!({"email": "reader@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal Server Error");
    assert!(body["error"].is_string());
}

// --- PASSWORD RESET ---

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    app.seed_user("user", "reader@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/resetmail",
            None,
            Some(json!({"email": "reader@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password reset email sent");

    let sent = app.mailer.sent();
    assert!(sent[0].html.contains("/auth/reset?token="));
    let token = token_from_mail(&sent[0].html);

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/resetpass",
            None,
            Some(json!({"token": token, "newPassword": "brand-new-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password has been reset successfully");

    // Old password no longer works, the new one does.
    let (status, _) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "reader@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "reader@example.com", "password": "brand-new-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The token was consumed.
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/resetpass",
            None,
            Some(json!({"token": token, "newPassword": "another-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or expired reset token");
}

#[tokio::test]
async fn test_reset_rejects_short_password() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/resetpass",
            None,
            Some(json!({"token": "abc", "newPassword": "short"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(common::error_fields(&body), vec!["newPassword".to_string()]);
}

#[tokio::test]
async fn test_expired_reset_token_is_rejected() {
    let app = TestApp::new();
    let user = app.seed_user("user", "reader@example.com").await;
    app.repo
        .set_reset_token(user.id, "feedbeef", Utc::now() - Duration::minutes(5))
        .await
        .unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/resetpass",
            None,
            Some(json!({"token": "feedbeef", "newPassword": "brand-new-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or expired reset token");
}
