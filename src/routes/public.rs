use crate::{
    AppState,
    handlers::{auth, comments, engagement, enquiries, guidelines, theses},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the account lifecycle, the public
/// catalogue of approved theses, engagement tracking and the contact form.
///
/// Visibility Mandate:
/// Catalogue handlers in this module (`/misc/*`) filter on `status = approved`
/// so pending, rejected or deleted submissions never leak to anonymous clients.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Returns "ok" without touching the database.
        .route("/health", get(|| async { "ok" }))
        // --- Account Lifecycle ---
        .route("/auth/signup", post(auth::signup))
        // POST /auth/login
        // Exchanges credentials for a signed bearer token.
        .route("/auth/login", post(auth::login))
        .route("/auth/sendemail", post(auth::send_verification_email))
        .route("/auth/verify", get(auth::verify_email))
        .route("/auth/resetmail", post(auth::send_reset_email))
        .route("/auth/resetpass", post(auth::reset_password))
        // --- Public Catalogue ---
        // GET /misc/search?searchText=...&page=...&limit=...
        .route("/misc/search", get(theses::public_search))
        .route("/misc/featured", get(theses::featured_theses))
        .route("/misc/home", get(theses::home))
        // POST /misc/view, /misc/download
        // Counted at most once per IP address per 24 hours.
        .route("/misc/view", post(engagement::track_view))
        .route("/misc/download", post(engagement::track_download))
        .route("/comments", get(comments::list_comments))
        .route("/admin/guidelines", get(guidelines::list_guidelines))
        // POST /enquiry
        // Contact form. Listing enquiries is gated.
        .route("/enquiry", post(enquiries::submit_enquiry))
}
