use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Comment, CommentDetail, ConversationEntry, ConversationPartner, DirectMessage, Enquiry,
    Guideline, GuidelineDetail, HistoryEntry, Notification, NotificationDetail, PeerReview,
    PeerReviewDetail, Role, Thesis, ThesisDetail, ThesisTally, User, VoteType, WeekdayTally,
};

mod memory;
mod postgres;

pub use memory::{InMemoryRepository, SEED_PERMISSIONS};
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failure of the persistence layer. Handlers surface it as a 500 carrying the raw message.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Another account already holds this email, compared case-insensitively.
    #[error("email already in use")]
    DuplicateEmail,
}

pub type RepoResult<T> = Result<T, RepoError>;

// --- Write Inputs ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
    pub firstname: String,
    pub lastname: String,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_pic: Option<String>,
}

/// Partial user update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_pic: Option<String>,
    pub role_id: Option<i64>,
    pub password_hash: Option<String>,
}

/// A new submission. The repository always stores it as `pending`.
#[derive(Debug, Clone)]
pub struct NewThesis {
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub document_url: Option<String>,
    pub author_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ThesisChanges {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub document_url: Option<String>,
    pub reviewer_id: Option<i64>,
}

/// ThesisFilter
///
/// Search criteria. All set criteria must hold. Text matches are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default)]
pub struct ThesisFilter {
    /// Matches the title, the category, any keyword, or the author's first or last name.
    pub text: Option<String>,
    pub title: Option<String>,
    /// One word matches first or last name; two words match first then last.
    pub author_name: Option<String>,
    /// Exact category, ignoring case.
    pub category: Option<String>,
    /// Thesis carries at least one of these keywords, ignoring case.
    pub keywords: Vec<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub author_id: Option<i64>,
}

impl ThesisFilter {
    /// Splits `author_name` into the (first, last) name patterns it stands for.
    pub fn author_terms(&self) -> Option<(String, Option<String>)> {
        let name = self.author_name.as_deref()?.trim();
        let mut words = name.split_whitespace();
        let first = words.next()?.to_string();
        Some((first, words.next().map(str::to_string)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThesisOrder {
    Newest,
    MostUpvoted,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// VoteOutcome
///
/// Result of casting a vote on an existing thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote by this user on this thesis.
    Registered,
    /// Previous vote in the opposite direction was flipped.
    Changed,
    /// Same direction as the existing vote; nothing changed.
    Unchanged,
}

/// Engagement events counted once per IP per 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    View,
    Download,
}

#[derive(Debug, Clone)]
pub struct NewPeerReview {
    pub title: String,
    pub review: String,
    pub review_date: DateTime<Utc>,
    pub status: String,
    pub thesis_id: i64,
    pub reviewer_id: i64,
}

/// Partial peer review update. The reviewer is always reassigned to the editor.
#[derive(Debug, Clone)]
pub struct PeerReviewChanges {
    pub title: Option<String>,
    pub review: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub reviewer_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewGuideline {
    pub title: String,
    pub description: String,
    pub file_url: Option<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewEnquiry {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
///
/// `Ok(None)` / `Ok(false)` mean "no such row"; `Err` means the store itself failed.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Roles ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>>;
    // Removes the user and every row that depends on them.
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;
    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
    // The role's first permission record, if any.
    async fn role_permissions(&self, role_id: i64) -> RepoResult<Option<Vec<String>>>;

    // --- Verification & Reset Tokens ---
    async fn set_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> RepoResult<()>;
    async fn find_user_by_verification_token(&self, token: &str) -> RepoResult<Option<User>>;
    // Sets `email_verified`/`verified` and clears the verification token.
    async fn mark_email_verified(&self, user_id: i64) -> RepoResult<()>;
    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> RepoResult<()>;
    async fn find_user_by_reset_token(&self, token: &str) -> RepoResult<Option<User>>;
    // Stores the new hash and clears the reset token.
    async fn reset_password(&self, user_id: i64, password_hash: &str) -> RepoResult<()>;

    // --- Theses ---
    async fn create_thesis(&self, thesis: NewThesis) -> RepoResult<Thesis>;
    async fn get_thesis(&self, id: i64) -> RepoResult<Option<Thesis>>;
    async fn update_thesis(&self, id: i64, changes: ThesisChanges) -> RepoResult<Option<Thesis>>;
    // Removes views, downloads, comments, peer reviews, votes and the thesis atomically.
    async fn delete_thesis(&self, id: i64) -> RepoResult<bool>;
    // Returns the requested page and the total number of matches.
    async fn search_theses(
        &self,
        filter: &ThesisFilter,
        order: ThesisOrder,
        page: Option<Page>,
    ) -> RepoResult<(Vec<ThesisDetail>, i64)>;

    // --- Engagement ---
    // `None` when the thesis does not exist. Vote row and counters change together.
    async fn record_vote(
        &self,
        thesis_id: i64,
        user_id: i64,
        vote: VoteType,
    ) -> RepoResult<Option<VoteOutcome>>;
    // Counts the event unless this IP already did so in the last 24 hours.
    // Returns the thesis counter afterwards, or `None` when the thesis does not exist.
    async fn track_event(&self, kind: EventKind, thesis_id: i64, ip: &str)
    -> RepoResult<Option<i64>>;

    // --- Comments ---
    async fn list_comments(&self, thesis_id: i64) -> RepoResult<Vec<CommentDetail>>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(
        &self,
        thesis_id: i64,
        user_id: i64,
        content: &str,
    ) -> RepoResult<Comment>;
    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;

    // --- Peer Reviews ---
    async fn list_peer_reviews(&self) -> RepoResult<Vec<PeerReviewDetail>>;
    async fn create_peer_review(&self, review: NewPeerReview) -> RepoResult<PeerReview>;
    async fn update_peer_review(
        &self,
        id: i64,
        changes: PeerReviewChanges,
    ) -> RepoResult<Option<PeerReview>>;
    async fn delete_peer_review(&self, id: i64) -> RepoResult<bool>;

    // --- Guidelines ---
    async fn list_guidelines(&self) -> RepoResult<Vec<GuidelineDetail>>;
    async fn get_guideline_by_title(&self, title: &str) -> RepoResult<Option<Guideline>>;
    async fn create_guideline(&self, guideline: NewGuideline) -> RepoResult<Guideline>;
    async fn update_guideline(
        &self,
        id: i64,
        title: &str,
        description: &str,
        file_url: Option<&str>,
    ) -> RepoResult<Option<Guideline>>;
    async fn delete_guideline(&self, id: i64) -> RepoResult<bool>;

    // --- Notifications ---
    async fn list_notifications(&self, user_id: i64) -> RepoResult<Vec<NotificationDetail>>;
    async fn create_notification(&self, user_id: i64, message: &str) -> RepoResult<Notification>;
    // Ownership enforced: only the recipient can mark or delete.
    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: i64,
    ) -> RepoResult<Option<Notification>>;
    async fn delete_notification(&self, id: i64, user_id: i64) -> RepoResult<bool>;

    // --- Chat ---
    async fn send_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> RepoResult<DirectMessage>;
    // Both directions, oldest first.
    async fn conversation(&self, user_id: i64, other_id: i64) -> RepoResult<Vec<ConversationEntry>>;
    // One entry per counterpart, most recent conversation first.
    async fn conversation_partners(&self, user_id: i64) -> RepoResult<Vec<ConversationPartner>>;

    // --- Audit Trail ---
    async fn record_history(&self, user_id: i64, action: &str, description: &str)
    -> RepoResult<()>;
    async fn list_history(&self, limit: i64) -> RepoResult<Vec<HistoryEntry>>;

    // --- Enquiries ---
    async fn list_enquiries(&self) -> RepoResult<Vec<Enquiry>>;
    async fn create_enquiry(&self, enquiry: NewEnquiry) -> RepoResult<Enquiry>;

    // --- Statistics ---
    async fn count_users(&self) -> RepoResult<i64>;
    async fn count_theses(&self, author_id: Option<i64>, status: Option<&str>) -> RepoResult<i64>;
    // Event counts per thesis, largest first, optionally restricted to one author.
    async fn event_tallies(
        &self,
        kind: EventKind,
        author_id: Option<i64>,
    ) -> RepoResult<Vec<ThesisTally>>;
    // Event counts per ISO weekday since the given instant.
    async fn weekday_tallies(
        &self,
        kind: EventKind,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<WeekdayTally>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
