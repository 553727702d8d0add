use axum::{Json, extract::State};

use crate::{
    AppState,
    error::ApiResult,
    models::{EnquiryEnvelope, EnquiryRequest, EnquiryResponse},
    repository::NewEnquiry,
    validation::ValidJson,
};

/// list_enquiries
///
/// [Gated Route: VIEW_ENQUIRIES] Contact form submissions, newest first.
#[utoipa::path(
    get,
    path = "/enquiry",
    responses((status = 200, description = "Enquiries", body = [EnquiryResponse]))
)]
pub async fn list_enquiries(State(state): State<AppState>) -> ApiResult<Json<Vec<EnquiryResponse>>> {
    let enquiries = state.repo.list_enquiries().await?;
    Ok(Json(enquiries.into_iter().map(EnquiryResponse::from).collect()))
}

/// submit_enquiry
///
/// [Public Route] Contact form.
#[utoipa::path(
    post,
    path = "/enquiry",
    request_body = EnquiryRequest,
    responses(
        (status = 200, description = "Submitted", body = EnquiryEnvelope),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn submit_enquiry(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<EnquiryRequest>,
) -> ApiResult<Json<EnquiryEnvelope>> {
    let enquiry = state
        .repo
        .create_enquiry(NewEnquiry {
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            subject: payload.subject.trim().to_string(),
            message: payload.message,
        })
        .await?;
    tracing::info!(enquiry_id = enquiry.id, "enquiry received");
    Ok(Json(EnquiryEnvelope {
        message: "Enquiry submitted successfully".to_string(),
        enquiry: enquiry.into(),
    }))
}
