use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
    repository::RepositoryState,
};

pub const NO_SESSION: &str = "Unauthorized: No session found";
pub const PERMISSION_DENIED: &str = "Unauthorized: Permission denied";

/// Claims
///
/// Payload of a session token. The principal travels inside the token so a
/// request can be attributed without a database round trip.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id as a decimal string.
    pub sub: String,
    pub role_id: i64,
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    /// Expiration Time: seconds since the epoch after which the token is rejected.
    pub exp: usize,
    /// Issued At.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved principal of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role_id: i64,
    pub email: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

impl From<&User> for AuthUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            role_id: u.role_id,
            email: u.email.clone(),
            username: u.username.clone(),
            firstname: u.firstname.clone(),
            lastname: u.lastname.clone(),
        }
    }
}

/// issue_token
///
/// Signs an HS256 session token for `user`, valid for `token_ttl_hours`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        role_id: user.role_id,
        email: user.email.clone(),
        username: user.username.clone(),
        firstname: user.firstname.clone(),
        lastname: user.lastname.clone(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))
}

/// decode_token
///
/// Verifies signature and expiry and returns the embedded principal. Any
/// failure, including a subject that is not an id, yields `None`.
pub fn decode_token(token: &str, secret: &str) -> Option<AuthUser> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let data = match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(error = %e, "session token rejected");
            return None;
        }
    };
    let claims = data.claims;
    Some(AuthUser {
        id: claims.sub.parse().ok()?,
        role_id: claims.role_id,
        email: claims.email,
        username: claims.username,
        firstname: claims.firstname,
        lastname: claims.lastname,
    })
}

/// resolve_session
///
/// 1. A principal already stored by the role gate wins.
/// 2. Local Bypass: in `Env::Local`, `x-user-id` naming an existing user resolves to that user.
/// 3. Otherwise `Authorization: Bearer <token>` is decoded.
pub async fn resolve_session(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Option<AuthUser> {
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Some(user.clone());
    }

    if config.env == Env::Local {
        let override_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok());
        if let Some(id) = override_id {
            if let Ok(Some(user)) = repo.get_user(id).await {
                return Some(AuthUser::from(&user));
            }
        }
    }

    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?
        .strip_prefix("Bearer ")?;

    decode_token(token.trim(), &config.jwt_secret)
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. Rejects with 401 when no
/// session can be resolved.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_session(parts, &repo, &config)
            .await
            .ok_or_else(|| ApiError::unauthorized(NO_SESSION))
    }
}

/// Permission
///
/// Names checked against a role's permission list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CreateUser,
    ModifyUser,
    DeleteUser,
    CreateThesis,
    ModifyThesis,
    DeleteThesis,
    SubmitThesis,
    MyThesis,
    ViewThesis,
    CreateGuideline,
    ModifyGuideline,
    DeleteGuideline,
    CreatePeerReview,
    ModifyPeerReview,
    DeletePeerReview,
    ViewProfile,
    UpdateProfile,
    UpdateComment,
    DeleteComment,
    ModerateComment,
    ViewEnquiries,
    ViewHistory,
    ViewAdminDashboard,
    ViewScholarDashboard,
}

impl Permission {
    pub const ALL: [Permission; 24] = [
        Permission::CreateUser,
        Permission::ModifyUser,
        Permission::DeleteUser,
        Permission::CreateThesis,
        Permission::ModifyThesis,
        Permission::DeleteThesis,
        Permission::SubmitThesis,
        Permission::MyThesis,
        Permission::ViewThesis,
        Permission::CreateGuideline,
        Permission::ModifyGuideline,
        Permission::DeleteGuideline,
        Permission::CreatePeerReview,
        Permission::ModifyPeerReview,
        Permission::DeletePeerReview,
        Permission::ViewProfile,
        Permission::UpdateProfile,
        Permission::UpdateComment,
        Permission::DeleteComment,
        Permission::ModerateComment,
        Permission::ViewEnquiries,
        Permission::ViewHistory,
        Permission::ViewAdminDashboard,
        Permission::ViewScholarDashboard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::CreateUser => "CREATE_USER",
            Permission::ModifyUser => "MODIFY_USER",
            Permission::DeleteUser => "DELETE_USER",
            Permission::CreateThesis => "CREATE_THESIS",
            Permission::ModifyThesis => "MODIFY_THESIS",
            Permission::DeleteThesis => "DELETE_THESIS",
            Permission::SubmitThesis => "SUBMIT_THESIS",
            Permission::MyThesis => "MY_THESIS",
            Permission::ViewThesis => "VIEW_THESIS",
            Permission::CreateGuideline => "CREATE_GUIDELINE",
            Permission::ModifyGuideline => "MODIFY_GUIDELINE",
            Permission::DeleteGuideline => "DELETE_GUIDELINE",
            Permission::CreatePeerReview => "CREATE_PEER_REVIEW",
            Permission::ModifyPeerReview => "MODIFY_PEER_REVIEW",
            Permission::DeletePeerReview => "DELETE_PEER_REVIEW",
            Permission::ViewProfile => "VIEW_PROFILE",
            Permission::UpdateProfile => "UPDATE_PROFILE",
            Permission::UpdateComment => "UPDATE_COMMENT",
            Permission::DeleteComment => "DELETE_COMMENT",
            Permission::ModerateComment => "MODERATE_COMMENT",
            Permission::ViewEnquiries => "VIEW_ENQUIRIES",
            Permission::ViewHistory => "VIEW_HISTORY",
            Permission::ViewAdminDashboard => "VIEW_ADMIN_DASHBOARD",
            Permission::ViewScholarDashboard => "VIEW_SCHOLAR_DASHBOARD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

/// has_permission
///
/// True when the user's role lists `permission`. Fails closed: a missing
/// user, role or permission record, or any store error, is a denial.
pub async fn has_permission(repo: &RepositoryState, user_id: i64, permission: Permission) -> bool {
    let lookup = async {
        let Some(user) = repo.get_user(user_id).await? else {
            return Ok(false);
        };
        let list = repo.role_permissions(user.role_id).await?;
        Ok::<_, crate::repository::RepoError>(
            list.is_some_and(|names| names.iter().any(|n| n == permission.as_str())),
        )
    };
    match lookup.await {
        Ok(granted) => granted,
        Err(e) => {
            tracing::error!(user_id, permission = permission.as_str(), error = %e, "permission lookup failed");
            false
        }
    }
}

/// role_gate
///
/// Route layer enforcing one permission. Resolves the session (401 when
/// absent), checks the permission (403 when missing), then stores the
/// principal in the request extensions so the handler's `AuthUser` extractor
/// does not resolve it twice.
///
/// Installed with `middleware::from_fn_with_state((state, permission), role_gate)`.
pub async fn role_gate(
    State((state, permission)): State<(AppState, Permission)>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let Some(user) = resolve_session(&parts, &state.repo, &state.config).await else {
        return ApiError::unauthorized(NO_SESSION).into_response();
    };

    if !has_permission(&state.repo, user.id, permission).await {
        tracing::warn!(user_id = user.id, permission = permission.as_str(), "permission denied");
        return ApiError::forbidden(PERMISSION_DENIED).into_response();
    }

    parts.extensions.insert(user);
    next.run(Request::from_parts(parts, body)).await
}

/// hash_password
///
/// Runs bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// generate_token
///
/// 20 random bytes, hex encoded (40 characters). Used for verification and reset links.
pub fn generate_token() -> String {
    let bytes: [u8; 20] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SEED_PERMISSIONS;

    #[test]
    fn seeded_permission_names_are_known() {
        for (_, names) in SEED_PERMISSIONS {
            for name in *names {
                assert!(Permission::parse(name).is_some(), "unknown permission {name}");
            }
        }
    }

    #[test]
    fn tokens_are_forty_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
