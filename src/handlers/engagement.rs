use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        DownloadCountResponse, MessageResponse, TrackRequest, ViewCountResponse, VoteRequest,
        VoteType,
    },
    repository::{EventKind, VoteOutcome},
    validation::ValidJson,
};

/// vote
///
/// [Authenticated Route] Casts or flips the caller's vote on a thesis.
///
/// *Idempotency*: one vote row per (thesis, user). Voting the same way twice is
/// rejected; voting the other way moves both counters.
#[utoipa::path(
    post,
    path = "/misc/vote",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Registered or updated", body = MessageResponse),
        (status = 400, description = "Already voted this way"),
        (status = 404, description = "Thesis not found")
    )
)]
pub async fn vote(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<VoteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let thesis_id = payload
        .thesis_id
        .ok_or_else(|| ApiError::invalid("thesisId", "is required"))?;
    let vote = VoteType::parse(&payload.vote_type)
        .ok_or_else(|| ApiError::invalid("voteType", "Invalid vote type"))?;

    let outcome = state
        .repo
        .record_vote(thesis_id, id, vote)
        .await?
        .ok_or_else(|| ApiError::not_found("Thesis not found"))?;

    tracing::debug!(thesis_id, user_id = id, vote = vote.as_str(), ?outcome, "vote cast");
    match outcome {
        VoteOutcome::Registered => Ok(Json(MessageResponse::new("Vote registered successfully"))),
        VoteOutcome::Changed => Ok(Json(MessageResponse::new("Vote updated successfully"))),
        VoteOutcome::Unchanged => Err(ApiError::bad_request("You have already voted this way")),
    }
}

async fn track(state: &AppState, kind: EventKind, payload: TrackRequest) -> ApiResult<i64> {
    let thesis_id = payload
        .thesis_id
        .ok_or_else(|| ApiError::invalid("thesisId", "is required"))?;
    state
        .repo
        .track_event(kind, thesis_id, payload.ip_address.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Thesis not found"))
}

/// track_view
///
/// [Public Route] Counts a view, at most once per IP address per 24 hours,
/// and returns the thesis' view count.
#[utoipa::path(
    post,
    path = "/misc/view",
    request_body = TrackRequest,
    responses(
        (status = 200, description = "Current view count", body = ViewCountResponse),
        (status = 404, description = "Thesis not found")
    )
)]
pub async fn track_view(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<TrackRequest>,
) -> ApiResult<Json<ViewCountResponse>> {
    let views = track(&state, EventKind::View, payload).await?;
    Ok(Json(ViewCountResponse { views }))
}

/// track_download
///
/// [Public Route] Same rule as `track_view`, for downloads.
#[utoipa::path(
    post,
    path = "/misc/download",
    request_body = TrackRequest,
    responses(
        (status = 200, description = "Current download count", body = DownloadCountResponse),
        (status = 404, description = "Thesis not found")
    )
)]
pub async fn track_download(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<TrackRequest>,
) -> ApiResult<Json<DownloadCountResponse>> {
    let downloads = track(&state, EventKind::Download, payload).await?;
    Ok(Json(DownloadCountResponse { downloads }))
}
