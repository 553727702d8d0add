use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::path_id;
use crate::{
    AppState,
    auth::{AuthUser, Permission, has_permission},
    error::{ApiError, ApiResult},
    models::{
        CommentEnvelope, CommentQuery, CommentResponse, CreateCommentRequest, MessageResponse,
        UpdateCommentRequest, parse_id,
    },
    validation::ValidJson,
};

/// list_comments
///
/// [Public Route] Comments on one thesis, newest first, each with a summary of its author.
#[utoipa::path(
    get,
    path = "/comments",
    params(CommentQuery),
    responses(
        (status = 200, description = "Comments", body = [CommentResponse]),
        (status = 400, description = "Missing thesis_id")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let thesis_id = query
        .thesis_id
        .as_deref()
        .and_then(parse_id)
        .ok_or_else(|| ApiError::bad_request("Thesis ID is required"))?;

    let comments = state.repo.list_comments(thesis_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

/// create_comment
///
/// [Authenticated Route] Posts a comment as the caller.
#[utoipa::path(
    post,
    path = "/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment Added", body = CommentEnvelope),
        (status = 404, description = "Thesis not found")
    )
)]
pub async fn create_comment(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateCommentRequest>,
) -> ApiResult<Json<CommentEnvelope>> {
    let thesis_id = payload
        .thesis_id
        .ok_or_else(|| ApiError::invalid("thesis_id", "is required"))?;
    if state.repo.get_thesis(thesis_id).await?.is_none() {
        return Err(ApiError::not_found("Thesis not found"));
    }

    let comment = state
        .repo
        .create_comment(thesis_id, id, payload.message_content.trim())
        .await?;
    Ok(Json(CommentEnvelope {
        message: "Comment added successfully".to_string(),
        comment: comment.into(),
    }))
}

/// update_comment
///
/// [Gated Route: UPDATE_COMMENT] Only the author may edit a comment.
#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = CommentEnvelope),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateCommentRequest>,
) -> ApiResult<Json<CommentEnvelope>> {
    let id = path_id(&id)?;
    let comment = state
        .repo
        .get_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.user_id != user_id {
        return Err(ApiError::forbidden("Unauthorized to update this comment"));
    }

    let updated = state
        .repo
        .update_comment(id, payload.message_content.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    Ok(Json(CommentEnvelope {
        message: "Comment updated successfully".to_string(),
        comment: updated.into(),
    }))
}

/// delete_comment
///
/// [Gated Route: DELETE_COMMENT] Deletes a comment, with two tiers of authorization.
///
/// *RBAC/Ownership*: the author can always delete; anyone else needs MODERATE_COMMENT.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Neither author nor moderator"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = path_id(&id)?;
    let comment = state
        .repo
        .get_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if comment.user_id != user_id
        && !has_permission(&state.repo, user_id, Permission::ModerateComment).await
    {
        return Err(ApiError::forbidden("Unauthorized to delete this comment"));
    }

    if !state.repo.delete_comment(id).await? {
        return Err(ApiError::not_found("Comment not found"));
    }
    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}
