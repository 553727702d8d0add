use crate::{
    AppState,
    auth::{Permission, role_gate},
    handlers::{comments, dashboards, enquiries, guidelines, peer_reviews, theses, users},
};
use axum::{
    Router, middleware,
    routing::{MethodRouter, delete, get, post, put},
};

/// gated
///
/// Wraps one method route in the role gate for `permission`. A request without
/// a session is answered 401, one whose role lacks the permission 403, before
/// the handler runs.
fn gated(
    state: &AppState,
    permission: Permission,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        (state.clone(), permission),
        role_gate,
    ))
}

/// Gated Router Module
///
/// Every route here requires a named permission. Methods on the same path can
/// need different permissions (e.g. `PUT` vs `DELETE /admin/thesis/{id}`), so
/// each method is gated on its own and the paths are registered once per method.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    use Permission::*;

    Router::new()
        // --- Theses ---
        .route("/admin/thesis", gated(state, ViewThesis, get(theses::list_theses)))
        .route("/admin/thesis/{id}", gated(state, ModifyThesis, put(theses::update_thesis)))
        .route("/admin/thesis/{id}", gated(state, DeleteThesis, delete(theses::delete_thesis)))
        .route("/admin/search", gated(state, ViewThesis, post(theses::admin_search)))
        // --- Comment moderation ---
        // Ownership (and MODERATE_COMMENT for deletes) is checked in the handler.
        .route("/comments/{id}", gated(state, UpdateComment, put(comments::update_comment)))
        .route("/comments/{id}", gated(state, DeleteComment, delete(comments::delete_comment)))
        // --- Peer reviews ---
        .route(
            "/admin/peerreview",
            gated(state, ViewThesis, get(peer_reviews::list_peer_reviews)),
        )
        .route(
            "/admin/peerreview",
            gated(state, CreatePeerReview, post(peer_reviews::create_peer_review)),
        )
        .route(
            "/admin/peerreview/{id}",
            gated(state, ModifyPeerReview, put(peer_reviews::update_peer_review)),
        )
        .route(
            "/admin/peerreview/{id}",
            gated(state, DeletePeerReview, delete(peer_reviews::delete_peer_review)),
        )
        // --- Guidelines (listing is public) ---
        .route(
            "/admin/guidelines",
            gated(state, CreateGuideline, post(guidelines::create_guideline)),
        )
        .route(
            "/admin/guidelines/{id}",
            gated(state, ModifyGuideline, put(guidelines::update_guideline)),
        )
        .route(
            "/admin/guidelines/{id}",
            gated(state, DeleteGuideline, delete(guidelines::delete_guideline)),
        )
        // --- Users & audit ---
        .route("/admin/user", gated(state, ModifyUser, get(users::list_users)))
        .route("/admin/user", gated(state, CreateUser, post(users::create_user)))
        .route("/admin/user/{id}", gated(state, ModifyUser, put(users::update_user)))
        .route("/admin/user/{id}", gated(state, DeleteUser, delete(users::delete_user)))
        .route("/admin/history", gated(state, ViewHistory, get(users::list_history)))
        // --- Dashboards ---
        .route(
            "/dashboard/admin",
            gated(state, ViewAdminDashboard, get(dashboards::admin_dashboard)),
        )
        .route(
            "/dashboard/scholar",
            gated(state, ViewScholarDashboard, get(dashboards::scholar_dashboard)),
        )
        // GET /enquiry
        // Submitting an enquiry is public; reading them is not.
        .route("/enquiry", gated(state, ViewEnquiries, get(enquiries::list_enquiries)))
}
