use axum::{
    Json,
    extract::{Path, State},
};

use super::path_id;
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        CreateNotificationRequest, MessageResponse, NotificationEnvelope, NotificationResponse,
    },
    validation::ValidJson,
};

const NOT_FOUND: &str = "Notification not found or unauthorized";

/// list_notifications
///
/// [Authenticated Route] The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/notifications",
    responses((status = 200, description = "My Notifications", body = [NotificationResponse]))
)]
pub async fn list_notifications(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let notifications = state.repo.list_notifications(id).await?;
    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

/// create_notification
///
/// [Authenticated Route] Addressed to `user_id`, or to the caller when omitted.
#[utoipa::path(
    post,
    path = "/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 200, description = "Created", body = NotificationEnvelope),
        (status = 404, description = "Recipient not found")
    )
)]
pub async fn create_notification(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateNotificationRequest>,
) -> ApiResult<Json<NotificationEnvelope>> {
    let recipient = payload.user_id.unwrap_or(id);
    if recipient != id && state.repo.get_user(recipient).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let notification = state
        .repo
        .create_notification(recipient, &payload.message)
        .await?;
    Ok(Json(NotificationEnvelope {
        message: "Notification created successfully".to_string(),
        notification: notification.into(),
    }))
}

/// mark_notification_read
///
/// [Authenticated Route] Only the recipient can mark a notification as read.
#[utoipa::path(
    put,
    path = "/notifications/{id}",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read", body = NotificationEnvelope),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn mark_notification_read(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<NotificationEnvelope>> {
    let id = path_id(&id)?;
    let notification = state
        .repo
        .mark_notification_read(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(Json(NotificationEnvelope {
        message: "Notification marked as read".to_string(),
        notification: notification.into(),
    }))
}

/// delete_notification
///
/// [Authenticated Route] Only the recipient can delete a notification.
#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn delete_notification(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = path_id(&id)?;
    if !state.repo.delete_notification(id, user_id).await? {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    Ok(Json(MessageResponse::new("Notification deleted successfully")))
}
