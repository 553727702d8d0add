use axum::{
    Json,
    extract::{Path, State},
};

use super::{audit, non_empty, path_id};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{GuidelineEnvelope, GuidelineRequest, GuidelineResponse, MessageResponse},
    repository::NewGuideline,
    validation::ValidJson,
};

const DUPLICATE_TITLE: &str = "A guideline with this title already exists";

/// list_guidelines
///
/// [Public Route] Submission guidelines, each with the username that added it.
#[utoipa::path(
    get,
    path = "/admin/guidelines",
    responses((status = 200, description = "Guidelines", body = [GuidelineResponse]))
)]
pub async fn list_guidelines(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<GuidelineResponse>>> {
    let guidelines = state.repo.list_guidelines().await?;
    Ok(Json(
        guidelines.into_iter().map(GuidelineResponse::from).collect(),
    ))
}

/// create_guideline
///
/// [Gated Route: CREATE_GUIDELINE] Titles are unique.
#[utoipa::path(
    post,
    path = "/admin/guidelines",
    request_body = GuidelineRequest,
    responses(
        (status = 200, description = "Created", body = GuidelineEnvelope),
        (status = 400, description = "Validation failed or duplicate title")
    )
)]
pub async fn create_guideline(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<GuidelineRequest>,
) -> ApiResult<Json<GuidelineEnvelope>> {
    let title = payload.title.trim().to_string();
    if state.repo.get_guideline_by_title(&title).await?.is_some() {
        return Err(ApiError::bad_request(DUPLICATE_TITLE));
    }

    let guideline = state
        .repo
        .create_guideline(NewGuideline {
            title,
            description: payload.description,
            file_url: non_empty(payload.file_url),
            user_id: id,
        })
        .await?;

    audit(
        &state,
        id,
        "CREATE_GUIDELINE",
        format!("Created guideline \"{}\"", guideline.title),
    )
    .await;
    Ok(Json(GuidelineEnvelope {
        message: "Guideline created successfully".to_string(),
        guideline: guideline.into(),
    }))
}

/// update_guideline
///
/// [Gated Route: MODIFY_GUIDELINE] Replaces title, description and file link.
#[utoipa::path(
    put,
    path = "/admin/guidelines/{id}",
    params(("id" = String, Path, description = "Guideline ID")),
    request_body = GuidelineRequest,
    responses(
        (status = 200, description = "Updated", body = GuidelineEnvelope),
        (status = 400, description = "Duplicate title"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_guideline(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<GuidelineRequest>,
) -> ApiResult<Json<GuidelineEnvelope>> {
    let id = path_id(&id)?;
    let title = payload.title.trim().to_string();
    if let Some(other) = state.repo.get_guideline_by_title(&title).await? {
        if other.id != id {
            return Err(ApiError::bad_request(DUPLICATE_TITLE));
        }
    }

    let file_url = non_empty(payload.file_url);
    let guideline = state
        .repo
        .update_guideline(id, &title, &payload.description, file_url.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Guideline not found"))?;

    audit(&state, user_id, "UPDATE_GUIDELINE", format!("Updated guideline {id}")).await;
    Ok(Json(GuidelineEnvelope {
        message: "Guideline updated successfully".to_string(),
        guideline: guideline.into(),
    }))
}

/// delete_guideline
///
/// [Gated Route: DELETE_GUIDELINE]
#[utoipa::path(
    delete,
    path = "/admin/guidelines/{id}",
    params(("id" = String, Path, description = "Guideline ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_guideline(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = path_id(&id)?;
    if !state.repo.delete_guideline(id).await? {
        return Err(ApiError::not_found("Guideline not found"));
    }
    audit(&state, user_id, "DELETE_GUIDELINE", format!("Deleted guideline {id}")).await;
    Ok(Json(MessageResponse::new("Guideline deleted successfully")))
}
