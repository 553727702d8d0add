use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    auth::{generate_token, hash_password, issue_token, verify_password},
    error::{ApiError, ApiResult},
    mailer::OutgoingMail,
    models::{
        AccountRequest, EmailRequest, LoginRequest, LoginResponse, MessageResponse,
        ResetPasswordRequest, SIGNUP_ROLES, TokenQuery, User, UserEnvelope,
    },
    repository::NewUser,
    validation::{ValidJson, parse_date},
};

/// Verification and reset links stay valid for one hour.
const LINK_TTL_HOURS: i64 = 1;

/// create_account
///
/// Shared by self-signup and admin account creation. The caller has already
/// decided whether `payload.role` is acceptable for its endpoint.
pub(crate) async fn create_account(state: &AppState, payload: AccountRequest) -> ApiResult<User> {
    let email = payload.email.trim().to_string();
    if state.repo.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::bad_request("Email already in use"));
    }

    let role = state
        .repo
        .find_role_by_name(&payload.role)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid role"))?;

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;

    let user = state
        .repo
        .create_user(NewUser {
            username: email.clone(),
            email,
            password_hash,
            role_id: role.id,
            firstname: payload.firstname.trim().to_string(),
            lastname: payload.lastname.trim().to_string(),
            gender: Some(payload.gender),
            dob: parse_date(&payload.dob),
            phone: Some(payload.phone),
            address: Some(payload.address.trim().to_string()),
            profile_pic: Some(payload.profile_pic),
        })
        .await?;

    tracing::info!(user_id = user.id, role = %role.role_name, "account created");
    Ok(user)
}

/// signup
///
/// [Public Route] Self-registration. Only the `user` and `scholar` roles can be
/// chosen here; admins are created through `/admin/user`.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = AccountRequest,
    responses(
        (status = 200, description = "Signed up", body = UserEnvelope),
        (status = 400, description = "Validation failed, duplicate email or invalid role")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<AccountRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    if !SIGNUP_ROLES.contains(&payload.role.as_str()) {
        return Err(ApiError::bad_request("Invalid role"));
    }
    let user = create_account(&state, payload).await?;
    Ok(Json(UserEnvelope {
        message: "User signed up successfully".to_string(),
        user: user.into(),
    }))
}

/// login
///
/// [Public Route] Exchanges credentials for a signed session token. Unknown
/// email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let user = state
        .repo
        .get_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = user.id, "login rejected");
        return Err(invalid());
    }

    let token = issue_token(&user, &state.config)?;
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user: user.into(),
    }))
}

/// send_verification_email
///
/// [Public Route] Stores a fresh verification token and mails the link to the user.
#[utoipa::path(
    post,
    path = "/auth/sendemail",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Mail sent", body = MessageResponse),
        (status = 404, description = "Unknown email"),
        (status = 500, description = "Mail delivery failed")
    )
)]
pub async fn send_verification_email(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = state
        .repo
        .get_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let token = generate_token();
    let expires = Utc::now() + Duration::hours(LINK_TTL_HOURS);
    state
        .repo
        .set_verification_token(user.id, &token, expires)
        .await?;

    let link = format!("{}/verify?token={}", state.config.frontend_url, token);
    state
        .mailer
        .send(OutgoingMail {
            to: user.email.clone(),
            subject: "Verify your email".to_string(),
            html: format!(
                "<p>Hello {},</p><p>Please verify your email address by clicking \
                 <a href=\"{link}\">this link</a>. The link expires in one hour.</p>",
                user.firstname
            ),
        })
        .await?;

    Ok(Json(MessageResponse::new("Verification email sent")))
}

/// verify_email
///
/// [Public Route] Consumes a verification token.
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(TokenQuery),
    responses(
        (status = 200, description = "Verified", body = MessageResponse),
        (status = 400, description = "Missing or expired token"),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let user = state
        .repo
        .find_user_by_verification_token(token.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Invalid verification token"))?;

    if user
        .verification_token_expires
        .is_none_or(|expires| expires < Utc::now())
    {
        return Err(ApiError::bad_request("Token expired"));
    }

    state.repo.mark_email_verified(user.id).await?;
    tracing::info!(user_id = user.id, "email verified");
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// send_reset_email
///
/// [Public Route] Starts the password reset flow.
#[utoipa::path(
    post,
    path = "/auth/resetmail",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Mail sent", body = MessageResponse),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn send_reset_email(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = state
        .repo
        .get_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let token = generate_token();
    let expires = Utc::now() + Duration::hours(LINK_TTL_HOURS);
    state.repo.set_reset_token(user.id, &token, expires).await?;

    let link = format!("{}/auth/reset?token={}", state.config.frontend_url, token);
    state
        .mailer
        .send(OutgoingMail {
            to: user.email.clone(),
            subject: "Reset your password".to_string(),
            html: format!(
                "<p>Hello {},</p><p>You requested a password reset. Click \
                 <a href=\"{link}\">here</a> to choose a new password. The link \
                 expires in one hour.</p>",
                user.firstname
            ),
        })
        .await?;

    Ok(Json(MessageResponse::new("Password reset email sent")))
}

/// reset_password
///
/// [Public Route] Sets a new password using a reset token.
#[utoipa::path(
    post,
    path = "/auth/resetpass",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let invalid = || ApiError::bad_request("Invalid or expired reset token");

    let user = state
        .repo
        .find_user_by_reset_token(payload.token.trim())
        .await?
        .ok_or_else(invalid)?;
    if user
        .reset_token_expires
        .is_none_or(|expires| expires < Utc::now())
    {
        return Err(invalid());
    }

    let hash = hash_password(payload.new_password, state.config.bcrypt_cost).await?;
    state.repo.reset_password(user.id, &hash).await?;
    tracing::info!(user_id = user.id, "password reset");
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully",
    )))
}
