use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod repository;
pub mod storage;
pub mod validation;

// Module for routing segregation (Public, Authenticated, Gated).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use mailer::{MailerState, MockMailer, SmtpMailer};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Generates the OpenAPI document from every `#[utoipa::path]` handler and
/// `ToSchema` model. Served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup, handlers::auth::login, handlers::auth::send_verification_email,
        handlers::auth::verify_email, handlers::auth::send_reset_email,
        handlers::auth::reset_password,
        handlers::theses::list_theses, handlers::theses::update_thesis,
        handlers::theses::delete_thesis, handlers::theses::submit_thesis,
        handlers::theses::my_theses, handlers::theses::admin_search,
        handlers::theses::public_search, handlers::theses::featured_theses,
        handlers::theses::home, handlers::theses::upload_document,
        handlers::engagement::vote, handlers::engagement::track_view,
        handlers::engagement::track_download,
        handlers::comments::list_comments, handlers::comments::create_comment,
        handlers::comments::update_comment, handlers::comments::delete_comment,
        handlers::peer_reviews::list_peer_reviews, handlers::peer_reviews::create_peer_review,
        handlers::peer_reviews::update_peer_review, handlers::peer_reviews::delete_peer_review,
        handlers::guidelines::list_guidelines, handlers::guidelines::create_guideline,
        handlers::guidelines::update_guideline, handlers::guidelines::delete_guideline,
        handlers::users::list_users, handlers::users::create_user, handlers::users::update_user,
        handlers::users::delete_user, handlers::users::get_profile, handlers::users::list_history,
        handlers::notifications::list_notifications,
        handlers::notifications::create_notification,
        handlers::notifications::mark_notification_read,
        handlers::notifications::delete_notification,
        handlers::chat::send_message, handlers::chat::get_conversation,
        handlers::chat::list_conversations,
        handlers::dashboards::admin_dashboard, handlers::dashboards::scholar_dashboard,
        handlers::dashboards::user_dashboard,
        handlers::enquiries::list_enquiries, handlers::enquiries::submit_enquiry
    ),
    components(
        schemas(
            error::ErrorBody, error::FieldError,
            models::AccountRequest, models::LoginRequest, models::EmailRequest,
            models::ResetPasswordRequest, models::UpdateUserRequest, models::KeywordsInput,
            models::SubmitThesisRequest, models::UpdateThesisRequest,
            models::AdminSearchRequest, models::VoteRequest, models::TrackRequest,
            models::CreateCommentRequest, models::UpdateCommentRequest,
            models::CreatePeerReviewRequest, models::UpdatePeerReviewRequest,
            models::GuidelineRequest, models::CreateNotificationRequest,
            models::SendMessageRequest, models::EnquiryRequest, models::UploadRequest,
            models::MessageResponse, models::PersonSummary, models::UserResponse,
            models::UserEnvelope, models::UserListResponse, models::LoginResponse,
            models::ProfileResponse, models::ThesisResponse, models::ThesisEnvelope,
            models::ThesisListResponse, models::Pagination, models::SearchResponse,
            models::HomeResponse, models::ViewCountResponse, models::DownloadCountResponse,
            models::CommentResponse, models::CommentEnvelope, models::PeerReviewResponse,
            models::PeerReviewEnvelope, models::GuidelineResponse, models::GuidelineEnvelope,
            models::NotificationUserInfo, models::NotificationResponse,
            models::NotificationEnvelope, models::ChatMessageResponse,
            models::SendMessageResponse, models::ConversationResponse,
            models::ConversationSummary, models::ConversationListResponse,
            models::HistoryResponse, models::EnquiryResponse, models::EnquiryEnvelope,
            models::UploadResponse, models::ThesisViews, models::ThesisDownloads,
            models::WeeklyActivity, models::AdminDashboard, models::ScholarDashboard,
            models::UserDashboard,
        )
    ),
    tags(
        (name = "scholar-vault", description = "ScholarVault Thesis Repository API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single immutable container of shared services, cloned into every
/// request. Each service sits behind an `Arc<dyn Trait>` so tests can swap in
/// the in-memory repository and the mocks.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Document storage for presigned thesis uploads.
    pub storage: StorageState,
    /// Outbound mail for verification and password reset.
    pub mailer: MailerState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// session_layer
///
/// Guards `authenticated_routes`. The `AuthUser` extractor rejects with 401
/// when no session resolves; otherwise the principal is stored in the request
/// extensions so the handler's own extractor reuses it.
async fn session_layer(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = match config
        .cors_origin
        .as_deref()
        .and_then(|o| HeaderValue::from_str(o).ok())
    {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(origin)
        .allow_headers(Any)
}

/// create_router
///
/// Assembles the routing tree, applies the access layers per group, and wraps
/// everything in the observability stack.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = cors_layer(&state.config);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                session_layer,
            )),
        )
        // Each gated method carries its own role gate.
        .merge(admin::admin_routes(&state))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: tags every log line of a request with its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
