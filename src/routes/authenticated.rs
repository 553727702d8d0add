use crate::{
    AppState,
    handlers::{chat, comments, dashboards, engagement, notifications, theses, users},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes open to any valid session, whatever its role. The router is wrapped
/// in the session layer in `create_router`; handlers then read the principal
/// through the `AuthUser` extractor and scope every query to it (own theses,
/// own notifications, own conversations).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /scholar/submit_thesis
        // Lists or creates the caller's own submissions. New submissions start `pending`.
        .route(
            "/scholar/submit_thesis",
            get(theses::my_theses).post(theses::submit_thesis),
        )
        // POST /scholar/upload
        // Presigned PUT URL for a thesis PDF; the file goes straight to the bucket.
        .route("/scholar/upload", post(theses::upload_document))
        // POST /misc/vote
        // One vote per user per thesis; the voter is always the caller.
        .route("/misc/vote", post(engagement::vote))
        .route("/comments", post(comments::create_comment))
        .route("/admin/profile", get(users::get_profile))
        // --- Notifications ---
        // Ownership is enforced in the repository: only the recipient sees or changes them.
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route(
            "/notifications/{id}",
            put(notifications::mark_notification_read).delete(notifications::delete_notification),
        )
        // --- Chat ---
        .route("/chat/send", post(chat::send_message))
        .route("/chat/conversation", get(chat::get_conversation))
        .route("/chat/list", get(chat::list_conversations))
        .route("/dashboard/user", get(dashboards::user_dashboard))
}
