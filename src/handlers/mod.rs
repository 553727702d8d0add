//! Route handlers, one module per resource.
//!
//! Every handler follows the same contract: extract and validate the body,
//! check existence, mutate through the repository, and answer with a JSON
//! envelope. Failures are `ApiError`s and render themselves.

pub mod auth;
pub mod chat;
pub mod comments;
pub mod dashboards;
pub mod engagement;
pub mod enquiries;
pub mod guidelines;
pub mod notifications;
pub mod peer_reviews;
pub mod theses;
pub mod users;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::parse_id,
};

/// path_id
///
/// Parses an `{id}` path segment.
pub(crate) fn path_id(raw: &str) -> ApiResult<i64> {
    parse_id(raw).ok_or_else(|| ApiError::invalid("id", "Invalid id"))
}

/// Trims the value and drops it when nothing is left.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// audit
///
/// Appends a row to the history table. The mutation it describes has already
/// been committed, so a failure here is logged and the request still succeeds.
pub(crate) async fn audit(state: &AppState, user_id: i64, action: &str, description: String) {
    if let Err(e) = state
        .repo
        .record_history(user_id, action, &description)
        .await
    {
        tracing::warn!(user_id, action, error = %e, "failed to record history");
    }
}
