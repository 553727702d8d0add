use axum::{
    Json,
    extract::{Path, State},
};

use super::{audit, auth::create_account, non_empty, path_id};
use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::{ApiError, ApiResult},
    models::{
        ASSIGNABLE_ROLES, AccountRequest, HistoryResponse, MessageResponse, ProfileResponse,
        UpdateUserRequest, UserEnvelope, UserListResponse,
    },
    repository::{ThesisFilter, ThesisOrder, UserChanges},
    validation::{ValidJson, parse_date},
};

const HISTORY_LIMIT: i64 = 100;

/// list_users
///
/// [Gated Route: MODIFY_USER] Every account. Hashes and tokens are never serialized.
#[utoipa::path(
    get,
    path = "/admin/user",
    responses((status = 200, description = "Users", body = UserListResponse))
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UserListResponse>> {
    let users = state.repo.list_users().await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// create_user
///
/// [Gated Route: CREATE_USER] Administrative account creation. Unlike signup,
/// any assignable role, `admin` included, may be granted.
#[utoipa::path(
    post,
    path = "/admin/user",
    request_body = AccountRequest,
    responses(
        (status = 200, description = "Created", body = UserEnvelope),
        (status = 400, description = "Validation failed, duplicate email or invalid role")
    )
)]
pub async fn create_user(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<AccountRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    if !ASSIGNABLE_ROLES.contains(&payload.role.as_str()) {
        return Err(ApiError::bad_request("Invalid role"));
    }
    let user = create_account(&state, payload).await?;
    audit(
        &state,
        id,
        "CREATE_USER",
        format!("Created user {} ({})", user.id, user.email),
    )
    .await;
    Ok(Json(UserEnvelope {
        message: "User created successfully".to_string(),
        user: user.into(),
    }))
}

/// update_user
///
/// [Gated Route: MODIFY_USER] Partial update. A new password is rehashed; a new
/// role is resolved by name.
#[utoipa::path(
    put,
    path = "/admin/user/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserEnvelope),
        (status = 400, description = "Validation failed, email taken or invalid role"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    AuthUser { id: actor_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    let id = path_id(&id)?;
    if state.repo.get_user(id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let email = non_empty(payload.email);
    if let Some(email) = &email {
        if let Some(owner) = state.repo.get_user_by_email(email).await? {
            if owner.id != id {
                return Err(ApiError::bad_request("Email already in use"));
            }
        }
    }

    let role_id = match payload.role_name.as_deref() {
        Some(name) => Some(
            state
                .repo
                .find_role_by_name(name)
                .await?
                .ok_or_else(|| ApiError::bad_request("Invalid role"))?
                .id,
        ),
        None => None,
    };

    let password_hash = match payload.password {
        Some(password) => Some(hash_password(password, state.config.bcrypt_cost).await?),
        None => None,
    };

    let changes = UserChanges {
        email,
        firstname: non_empty(payload.firstname),
        lastname: non_empty(payload.lastname),
        gender: payload.gender,
        dob: payload.dob.as_deref().and_then(parse_date),
        phone: payload.phone,
        address: payload.address,
        profile_pic: payload.profile_pic,
        role_id,
        password_hash,
    };
    let user = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    audit(&state, actor_id, "UPDATE_USER", format!("Updated user {id}")).await;
    Ok(Json(UserEnvelope {
        message: "User updated successfully".to_string(),
        user: user.into(),
    }))
}

/// delete_user
///
/// [Gated Route: DELETE_USER] Removes the account and everything that depends on it.
#[utoipa::path(
    delete,
    path = "/admin/user/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    AuthUser { id: actor_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = path_id(&id)?;
    if !state.repo.delete_user(id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    audit(&state, actor_id, "DELETE_USER", format!("Deleted user {id}")).await;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// get_profile
///
/// [Authenticated Route] The caller's profile with role name, number of theses
/// and the total downloads those theses received.
#[utoipa::path(
    get,
    path = "/admin/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ProfileResponse>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let role = state
        .repo
        .get_role(user.role_id)
        .await?
        .map(|r| r.role_name)
        .unwrap_or_default();

    let filter = ThesisFilter {
        author_id: Some(id),
        ..ThesisFilter::default()
    };
    let (theses, total) = state
        .repo
        .search_theses(&filter, ThesisOrder::Newest, None)
        .await?;
    let downloads_count = theses
        .iter()
        .map(|t| i64::from(t.thesis.downloads_count))
        .sum();

    Ok(Json(ProfileResponse {
        first_name: user.firstname,
        last_name: user.lastname,
        dob: user.dob,
        gender: user.gender,
        phone: user.phone,
        email: user.email,
        joined: user.created_at,
        role,
        theses_count: total,
        downloads_count,
        address: user.address,
        profile_pic: user.profile_pic,
    }))
}

/// list_history
///
/// [Gated Route: VIEW_HISTORY] The most recent audit trail entries, newest first.
#[utoipa::path(
    get,
    path = "/admin/history",
    responses((status = 200, description = "Audit trail", body = [HistoryResponse]))
)]
pub async fn list_history(State(state): State<AppState>) -> ApiResult<Json<Vec<HistoryResponse>>> {
    let entries = state.repo.list_history(HISTORY_LIMIT).await?;
    Ok(Json(entries.into_iter().map(HistoryResponse::from).collect()))
}
