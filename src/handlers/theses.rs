use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, NaiveTime};

use super::{audit, non_empty, path_id};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        AdminSearchRequest, DEFAULT_CATEGORY, HomeResponse, MessageResponse, Pagination,
        PublicSearchQuery, SearchResponse, SubmitThesisRequest, ThesisDetail, ThesisEnvelope,
        ThesisListResponse, ThesisResponse, ThesisStatus, UpdateThesisRequest, UploadRequest,
        UploadResponse,
    },
    repository::{NewThesis, Page, ThesisChanges, ThesisFilter, ThesisOrder},
    storage::DocumentKey,
    validation::{ValidJson, parse_date},
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;
const FEATURED_COUNT: i64 = 10;
const HOME_COUNT: i64 = 3;

fn approved() -> ThesisFilter {
    ThesisFilter {
        status: Some(ThesisStatus::Approved.as_str().to_string()),
        ..ThesisFilter::default()
    }
}

fn to_list(rows: Vec<ThesisDetail>) -> Vec<ThesisResponse> {
    rows.into_iter().map(ThesisResponse::from).collect()
}

/// list_theses
///
/// [Gated Route: VIEW_THESIS] Every thesis in every status, newest first.
#[utoipa::path(
    get,
    path = "/admin/thesis",
    responses((status = 200, description = "All theses", body = ThesisListResponse))
)]
pub async fn list_theses(State(state): State<AppState>) -> ApiResult<Json<ThesisListResponse>> {
    let (rows, _) = state
        .repo
        .search_theses(&ThesisFilter::default(), ThesisOrder::Newest, None)
        .await?;
    Ok(Json(ThesisListResponse {
        theses: to_list(rows),
    }))
}

/// update_thesis
///
/// [Gated Route: MODIFY_THESIS] Partial update. A status change notifies the author.
#[utoipa::path(
    put,
    path = "/admin/thesis/{id}",
    params(("id" = String, Path, description = "Thesis ID")),
    request_body = UpdateThesisRequest,
    responses(
        (status = 200, description = "Updated", body = ThesisEnvelope),
        (status = 404, description = "Thesis or reviewer not found")
    )
)]
pub async fn update_thesis(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateThesisRequest>,
) -> ApiResult<Json<ThesisEnvelope>> {
    let id = path_id(&id)?;
    let existing = state
        .repo
        .get_thesis(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Thesis not found"))?;

    if let Some(reviewer_id) = payload.reviewer_id {
        if state.repo.get_user(reviewer_id).await?.is_none() {
            return Err(ApiError::not_found("Reviewer not found"));
        }
    }

    let changes = ThesisChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        abstract_text: payload.abstract_text,
        keywords: payload.keywords.map(|k| k.into_list()),
        category: non_empty(payload.category),
        status: payload.status,
        document_url: payload.document_url,
        reviewer_id: payload.reviewer_id,
    };
    let thesis = state
        .repo
        .update_thesis(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Thesis not found"))?;

    if thesis.status != existing.status {
        notify_status_change(&state, thesis.author_id, &thesis.title, &thesis.status).await;
    }
    audit(&state, user_id, "UPDATE_THESIS", format!("Updated thesis {id}")).await;

    Ok(Json(ThesisEnvelope {
        message: "Thesis updated successfully".to_string(),
        thesis: thesis.into(),
    }))
}

/// Tells the author their thesis moved to a new status. Best effort.
async fn notify_status_change(state: &AppState, author_id: i64, title: &str, status: &str) {
    let message: String = format!("Your thesis \"{title}\" is now {status}")
        .chars()
        .take(255)
        .collect();
    if let Err(e) = state.repo.create_notification(author_id, &message).await {
        tracing::warn!(author_id, error = %e, "failed to notify author of status change");
    }
}

/// delete_thesis
///
/// [Gated Route: DELETE_THESIS] Removes the thesis together with its views,
/// downloads, comments, peer reviews and votes.
#[utoipa::path(
    delete,
    path = "/admin/thesis/{id}",
    params(("id" = String, Path, description = "Thesis ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_thesis(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = path_id(&id)?;
    if !state.repo.delete_thesis(id).await? {
        return Err(ApiError::not_found("Thesis not found"));
    }
    audit(&state, user_id, "DELETE_THESIS", format!("Deleted thesis {id}")).await;
    Ok(Json(MessageResponse::new("Thesis deleted successfully")))
}

/// submit_thesis
///
/// [Authenticated Route] Creates a thesis authored by the caller. New
/// submissions always start out `pending`.
#[utoipa::path(
    post,
    path = "/scholar/submit_thesis",
    request_body = SubmitThesisRequest,
    responses(
        (status = 200, description = "Submitted", body = ThesisEnvelope),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn submit_thesis(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SubmitThesisRequest>,
) -> ApiResult<Json<ThesisEnvelope>> {
    let thesis = state
        .repo
        .create_thesis(NewThesis {
            title: payload.title.trim().to_string(),
            abstract_text: payload.abstract_text,
            keywords: payload.keywords.map(|k| k.into_list()).unwrap_or_default(),
            category: non_empty(payload.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            document_url: non_empty(payload.document_url),
            author_id: id,
        })
        .await?;

    tracing::info!(thesis_id = thesis.thesis_id, author_id = id, "thesis submitted");
    Ok(Json(ThesisEnvelope {
        message: "Thesis created successfully".to_string(),
        thesis: thesis.into(),
    }))
}

/// my_theses
///
/// [Authenticated Route] The caller's own submissions in every status.
#[utoipa::path(
    get,
    path = "/scholar/submit_thesis",
    responses((status = 200, description = "My theses", body = ThesisListResponse))
)]
pub async fn my_theses(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ThesisListResponse>> {
    let filter = ThesisFilter {
        author_id: Some(id),
        ..ThesisFilter::default()
    };
    let (rows, _) = state
        .repo
        .search_theses(&filter, ThesisOrder::Newest, None)
        .await?;
    Ok(Json(ThesisListResponse {
        theses: to_list(rows),
    }))
}

/// admin_search
///
/// [Gated Route: VIEW_THESIS] Structured search over all theses. Date bounds
/// cover whole days on both ends.
#[utoipa::path(
    post,
    path = "/admin/search",
    request_body = AdminSearchRequest,
    responses(
        (status = 200, description = "Matches", body = ThesisListResponse),
        (status = 400, description = "Invalid search parameters")
    )
)]
pub async fn admin_search(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<AdminSearchRequest>,
) -> ApiResult<Json<ThesisListResponse>> {
    let start_of = |raw: Option<String>| {
        non_empty(raw)
            .and_then(|d| parse_date(&d))
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    };

    let filter = ThesisFilter {
        title: non_empty(payload.search),
        author_name: non_empty(payload.author_name),
        category: non_empty(payload.category),
        keywords: payload.keywords.map(|k| k.into_list()).unwrap_or_default(),
        created_from: start_of(payload.start_date),
        created_before: start_of(payload.end_date).map(|end| end + Duration::days(1)),
        status: non_empty(payload.status),
        ..ThesisFilter::default()
    };

    let (rows, total) = state
        .repo
        .search_theses(&filter, ThesisOrder::Newest, None)
        .await?;
    tracing::debug!(total, "admin search");
    Ok(Json(ThesisListResponse {
        theses: to_list(rows),
    }))
}

/// Parses an optional positive integer query parameter.
fn bounded(raw: Option<&str>, field: &str, default: i64, max: i64) -> ApiResult<i64> {
    let message = if max == i64::MAX {
        format!("{field} must be a positive integer")
    } else {
        format!("{field} must be between 1 and {max}")
    };
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<i64>()
            .ok()
            .filter(|n| (1..=max).contains(n))
            .ok_or_else(|| ApiError::invalid(field, message)),
    }
}

/// public_search
///
/// [Public Route] Paginated search over approved theses. `searchText` matches
/// title, category, any keyword, or the author's name.
#[utoipa::path(
    get,
    path = "/misc/search",
    params(PublicSearchQuery),
    responses(
        (status = 200, description = "Page of matches", body = SearchResponse),
        (status = 400, description = "Invalid page or limit")
    )
)]
pub async fn public_search(
    State(state): State<AppState>,
    Query(query): Query<PublicSearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let page = bounded(query.page.as_deref(), "page", 1, i64::MAX)?;
    let limit = bounded(query.limit.as_deref(), "limit", DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)?;

    let filter = ThesisFilter {
        text: non_empty(query.search_text),
        ..approved()
    };
    let (rows, total) = state
        .repo
        .search_theses(
            &filter,
            ThesisOrder::Newest,
            Some(Page {
                limit,
                offset: (page - 1).saturating_mul(limit),
            }),
        )
        .await?;

    Ok(Json(SearchResponse {
        theses: to_list(rows),
        pagination: Pagination {
            current_page: page,
            total_pages: (total + limit - 1) / limit,
            total_items: total,
            items_per_page: limit,
        },
    }))
}

/// featured_theses
///
/// [Public Route] The ten most upvoted approved theses.
#[utoipa::path(
    get,
    path = "/misc/featured",
    responses((status = 200, description = "Top theses", body = ThesisListResponse))
)]
pub async fn featured_theses(State(state): State<AppState>) -> ApiResult<Json<ThesisListResponse>> {
    let (rows, _) = state
        .repo
        .search_theses(
            &approved(),
            ThesisOrder::MostUpvoted,
            Some(Page {
                limit: FEATURED_COUNT,
                offset: 0,
            }),
        )
        .await?;
    Ok(Json(ThesisListResponse {
        theses: to_list(rows),
    }))
}

/// home
///
/// [Public Route] Landing page data: the newest and the most upvoted approved theses.
#[utoipa::path(
    get,
    path = "/misc/home",
    responses((status = 200, description = "Home feed", body = HomeResponse))
)]
pub async fn home(State(state): State<AppState>) -> ApiResult<Json<HomeResponse>> {
    let first = Some(Page {
        limit: HOME_COUNT,
        offset: 0,
    });
    let filter = approved();
    let (latest, _) = state
        .repo
        .search_theses(&filter, ThesisOrder::Newest, first)
        .await?;
    let (featured, _) = state
        .repo
        .search_theses(&filter, ThesisOrder::MostUpvoted, first)
        .await?;
    Ok(Json(HomeResponse {
        latest: to_list(latest),
        featured: to_list(featured),
    }))
}

/// upload_document
///
/// [Authenticated Route] Issues a short-lived presigned URL so the browser can
/// PUT a thesis PDF straight into the bucket.
#[utoipa::path(
    post,
    path = "/scholar/upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "URL", body = UploadResponse),
        (status = 400, description = "Not a PDF")
    )
)]
pub async fn upload_document(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    let key = DocumentKey::for_thesis(id, &payload.filename);
    let upload_url = state.storage.presign_document_upload(&key).await?;

    tracing::info!(user_id = id, key = %key, "presigned upload issued");
    Ok(Json(UploadResponse {
        upload_url,
        resource_key: key.into_string(),
    }))
}
