use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        ChatMessageResponse, ConversationListResponse, ConversationQuery, ConversationResponse,
        ConversationSummary, SendMessageRequest, SendMessageResponse, parse_id,
    },
    validation::ValidJson,
};

/// send_message
///
/// [Authenticated Route] Sends a direct message. The sender is always the caller.
#[utoipa::path(
    post,
    path = "/chat/send",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Sent", body = SendMessageResponse),
        (status = 404, description = "Receiver not found")
    )
)]
pub async fn send_message(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResponse>> {
    let receiver_id = payload
        .receiver_id
        .ok_or_else(|| ApiError::invalid("receiverId", "is required"))?;
    if state.repo.get_user(receiver_id).await?.is_none() {
        return Err(ApiError::not_found("Receiver not found"));
    }

    let message = state
        .repo
        .send_message(id, receiver_id, payload.content.trim())
        .await?;
    Ok(Json(SendMessageResponse {
        message: "Message sent successfully".to_string(),
        new_message: message.into(),
    }))
}

/// get_conversation
///
/// [Authenticated Route] Messages between the caller and `with`, both
/// directions, oldest first.
#[utoipa::path(
    get,
    path = "/chat/conversation",
    params(ConversationQuery),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 400, description = "Missing counterpart")
    )
)]
pub async fn get_conversation(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<Json<ConversationResponse>> {
    let other = query
        .with
        .as_deref()
        .and_then(parse_id)
        .ok_or_else(|| ApiError::invalid("with", "A valid user id is required"))?;

    let messages = state.repo.conversation(id, other).await?;
    Ok(Json(ConversationResponse {
        conversation: messages
            .into_iter()
            .map(ChatMessageResponse::from)
            .collect(),
    }))
}

/// list_conversations
///
/// [Authenticated Route] One entry per counterpart with the latest message exchanged.
#[utoipa::path(
    get,
    path = "/chat/list",
    responses((status = 200, description = "Conversations", body = ConversationListResponse))
)]
pub async fn list_conversations(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ConversationListResponse>> {
    let partners = state.repo.conversation_partners(id).await?;
    Ok(Json(ConversationListResponse {
        conversations: partners
            .into_iter()
            .map(ConversationSummary::from)
            .collect(),
    }))
}
