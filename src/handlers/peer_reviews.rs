use axum::{
    Json,
    extract::{Path, State},
};

use super::{audit, path_id};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        CreatePeerReviewRequest, MessageResponse, PeerReviewEnvelope, PeerReviewResponse,
        UpdatePeerReviewRequest,
    },
    repository::{NewPeerReview, PeerReviewChanges},
    validation::{ValidJson, parse_datetime},
};

const DEFAULT_STATUS: &str = "pending";

/// list_peer_reviews
///
/// [Gated Route: VIEW_THESIS] Every review with its thesis title and reviewer email.
#[utoipa::path(
    get,
    path = "/admin/peerreview",
    responses((status = 200, description = "Peer reviews", body = [PeerReviewResponse]))
)]
pub async fn list_peer_reviews(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PeerReviewResponse>>> {
    let reviews = state.repo.list_peer_reviews().await?;
    Ok(Json(
        reviews.into_iter().map(PeerReviewResponse::from).collect(),
    ))
}

/// create_peer_review
///
/// [Gated Route: CREATE_PEER_REVIEW] Files a review authored by the caller.
#[utoipa::path(
    post,
    path = "/admin/peerreview",
    request_body = CreatePeerReviewRequest,
    responses(
        (status = 200, description = "Created", body = PeerReviewEnvelope),
        (status = 404, description = "Thesis not found")
    )
)]
pub async fn create_peer_review(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreatePeerReviewRequest>,
) -> ApiResult<Json<PeerReviewEnvelope>> {
    let thesis_id = payload
        .thesis_id
        .ok_or_else(|| ApiError::invalid("thesis_id", "is required"))?;
    let review_date = parse_datetime(&payload.review_date)
        .ok_or_else(|| ApiError::invalid("review_date", "Invalid date"))?;

    if state.repo.get_thesis(thesis_id).await?.is_none() {
        return Err(ApiError::not_found("Thesis not found"));
    }

    let review = state
        .repo
        .create_peer_review(NewPeerReview {
            title: payload.title.trim().to_string(),
            review: payload.review,
            review_date,
            status: payload.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            thesis_id,
            reviewer_id: id,
        })
        .await?;

    audit(
        &state,
        id,
        "CREATE_PEER_REVIEW",
        format!("Created peer review {} for thesis {thesis_id}", review.id),
    )
    .await;
    Ok(Json(PeerReviewEnvelope {
        message: "Peer review created successfully".to_string(),
        peer_review: review.into(),
    }))
}

/// update_peer_review
///
/// [Gated Route: MODIFY_PEER_REVIEW] Partial update. The editor becomes the reviewer of record.
#[utoipa::path(
    put,
    path = "/admin/peerreview/{id}",
    params(("id" = String, Path, description = "Peer review ID")),
    request_body = UpdatePeerReviewRequest,
    responses(
        (status = 200, description = "Updated", body = PeerReviewEnvelope),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_peer_review(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdatePeerReviewRequest>,
) -> ApiResult<Json<PeerReviewEnvelope>> {
    let id = path_id(&id)?;
    let review_date = match payload.review_date.as_deref() {
        Some(raw) => Some(
            parse_datetime(raw).ok_or_else(|| ApiError::invalid("review_date", "Invalid date"))?,
        ),
        None => None,
    };

    let review = state
        .repo
        .update_peer_review(
            id,
            PeerReviewChanges {
                title: payload.title.map(|t| t.trim().to_string()),
                review: payload.review,
                review_date,
                status: payload.status,
                reviewer_id: user_id,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Peer review not found"))?;

    audit(&state, user_id, "UPDATE_PEER_REVIEW", format!("Updated peer review {id}")).await;
    Ok(Json(PeerReviewEnvelope {
        message: "Peer review updated successfully".to_string(),
        peer_review: review.into(),
    }))
}

/// delete_peer_review
///
/// [Gated Route: DELETE_PEER_REVIEW]
#[utoipa::path(
    delete,
    path = "/admin/peerreview/{id}",
    params(("id" = String, Path, description = "Peer review ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_peer_review(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = path_id(&id)?;
    if !state.repo.delete_peer_review(id).await? {
        return Err(ApiError::not_found("Peer review not found"));
    }
    audit(&state, user_id, "DELETE_PEER_REVIEW", format!("Deleted peer review {id}")).await;
    Ok(Json(MessageResponse::new("Peer review deleted successfully")))
}
