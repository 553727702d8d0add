use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::FieldError,
    storage::DOCUMENT_CONTENT_TYPE,
    validation::{Checks, Validate, parse_date},
};

// --- Vocabulary ---

pub const GENDERS: &[&str] = &["male", "female", "other"];
pub const SIGNUP_ROLES: &[&str] = &["user", "scholar"];
pub const ASSIGNABLE_ROLES: &[&str] = &["user", "admin", "scholar"];
pub const REVIEW_STATUSES: &[&str] = &["pending", "in review", "completed"];
pub const DEFAULT_CATEGORY: &str = "Other";

/// ThesisStatus
///
/// Lifecycle of a submission. Only `Approved` theses are visible on the public surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThesisStatus {
    Pending,
    Approved,
    Rejected,
    Deleted,
}

impl ThesisStatus {
    pub const ALL: &'static [&'static str] = &["pending", "approved", "rejected", "deleted"];

    pub fn as_str(self) -> &'static str {
        match self {
            ThesisStatus::Pending => "pending",
            ThesisStatus::Approved => "approved",
            ThesisStatus::Rejected => "rejected",
            ThesisStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ThesisStatus::Pending),
            "approved" => Some(ThesisStatus::Approved),
            "rejected" => Some(ThesisStatus::Rejected),
            "deleted" => Some(ThesisStatus::Deleted),
            _ => None,
        }
    }
}

/// VoteType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub const ALL: &'static [&'static str] = &["UPVOTE", "DOWNVOTE"];

    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Upvote => "UPVOTE",
            VoteType::Downvote => "DOWNVOTE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UPVOTE" => Some(VoteType::Upvote),
            "DOWNVOTE" => Some(VoteType::Downvote),
            _ => None,
        }
    }
}

/// Deserializes an optional id sent either as a JSON number or a decimal string.
pub mod flexible_id {
    use serde::{Deserialize, Deserializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawId>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawId::Number(n)) => Ok(Some(n)),
            Some(RawId::Text(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid id `{s}`"))),
        }
    }
}

/// Parses a path or query id. Ids are positive 64-bit integers.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

// --- Stored Records (Mapped to Database) ---

#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: i64,
    pub role_name: String,
}

/// User
///
/// Canonical account row. Never serialized directly; responses go through
/// `UserResponse` so hashes and tokens stay server-side.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
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
    pub verified: bool,
    pub email_verified: Option<DateTime<Utc>>,
    pub verification_token: Option<String>,
    pub verification_token_expires: Option<DateTime<Utc>>,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thesis
#[derive(Debug, Clone, FromRow)]
pub struct Thesis {
    pub thesis_id: i64,
    pub title: String,
    /// `abstract` is a reserved word in Rust.
    #[sqlx(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub document_url: Option<String>,
    pub status: String,
    pub author_id: i64,
    pub reviewer_id: Option<i64>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub views_count: i32,
    pub downloads_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Person
///
/// The public face of a user as embedded in other resources.
#[derive(Debug, Clone, FromRow)]
pub struct Person {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub profile_pic: Option<String>,
}

impl From<&User> for Person {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            firstname: u.firstname.clone(),
            lastname: u.lastname.clone(),
            profile_pic: u.profile_pic.clone(),
        }
    }
}

/// A thesis joined with its author and assigned reviewer.
#[derive(Debug, Clone)]
pub struct ThesisDetail {
    pub thesis: Thesis,
    pub author: Option<Person>,
    pub reviewer: Option<Person>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub thesis_id: i64,
    pub user_id: i64,
    pub message_content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommentDetail {
    pub comment: Comment,
    pub author: Option<Person>,
}

/// PeerReview
///
/// A review record authored by a reviewer against a thesis.
#[derive(Debug, Clone, FromRow)]
pub struct PeerReview {
    pub id: i64,
    pub title: String,
    pub review: String,
    pub review_date: DateTime<Utc>,
    pub status: String,
    pub thesis_id: i64,
    pub reviewer_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PeerReviewDetail {
    pub review: PeerReview,
    pub thesis_title: Option<String>,
    pub reviewer_email: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Guideline {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub file_url: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GuidelineDetail {
    pub guideline: Guideline,
    pub added_by: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationDetail {
    pub notification: Notification,
    pub user: Option<Person>,
}

/// DirectMessage
///
/// A chat message between two users.
#[derive(Debug, Clone, FromRow)]
pub struct DirectMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub message: DirectMessage,
    pub sender_username: String,
    pub receiver_username: String,
}

/// One counterpart of the principal together with the latest message exchanged.
#[derive(Debug, Clone)]
pub struct ConversationPartner {
    pub user_id: i64,
    pub username: String,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Enquiry {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Count of view or download events for one thesis.
#[derive(Debug, Clone, FromRow)]
pub struct ThesisTally {
    pub thesis_id: i64,
    pub title: String,
    pub category: String,
    pub count: i64,
}

/// Count of events on one ISO weekday (1 = Monday .. 7 = Sunday).
#[derive(Debug, Clone, FromRow)]
pub struct WeekdayTally {
    pub iso_day: i32,
    pub count: i64,
}

// --- Request Payloads (Input Schemas) ---

/// AccountRequest
///
/// Shared body for self-signup (POST /auth/signup) and admin account creation
/// (POST /admin/user). The role set each endpoint accepts is narrower than the
/// schema: signup never grants `admin`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AccountRequest {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub gender: String,
    pub dob: String,
    pub phone: String,
    pub address: String,
    #[serde(rename = "profilePic")]
    pub profile_pic: String,
    pub role: String,
}

impl Validate for AccountRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.email("email", &self.email);
        c.length("password", &self.password, 8, None);
        c.required("firstname", &self.firstname);
        c.required("lastname", &self.lastname);
        c.one_of("gender", &self.gender, GENDERS);
        if parse_date(&self.dob).is_none() {
            c.fail("dob", "Invalid date");
        }
        c.length("phone", &self.phone, 10, Some(15));
        c.required("address", &self.address);
        c.url("profilePic", &self.profile_pic);
        c.required("role", &self.role);
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.email("email", &self.email);
        c.required("password", &self.password);
        c.finish()
    }
}

/// Body of the verification and reset mail endpoints.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EmailRequest {
    pub email: String,
}

impl Validate for EmailRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        if c.required("email", &self.email) {
            c.email("email", &self.email);
        }
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.required("token", &self.token);
        if c.required("newPassword", &self.new_password) {
            c.length("newPassword", &self.new_password, 8, None);
        }
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// UpdateUserRequest
///
/// Partial update (PUT /admin/user/{id}). Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "profilePic")]
    pub profile_pic: Option<String>,
    pub role_name: Option<String>,
    pub password: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        if let Some(email) = &self.email {
            c.email("email", email);
        }
        if let Some(v) = &self.firstname {
            c.required("firstname", v);
        }
        if let Some(v) = &self.lastname {
            c.required("lastname", v);
        }
        if let Some(v) = &self.gender {
            c.one_of("gender", v, GENDERS);
        }
        if let Some(v) = &self.dob {
            if parse_date(v).is_none() {
                c.fail("dob", "Invalid date");
            }
        }
        if let Some(v) = &self.phone {
            c.length("phone", v, 10, Some(15));
        }
        if let Some(v) = &self.profile_pic {
            c.url("profilePic", v);
        }
        if let Some(v) = &self.role_name {
            c.one_of("role_name", v, ASSIGNABLE_ROLES);
        }
        if let Some(v) = &self.password {
            c.length("password", v, 6, None);
        }
        c.finish()
    }
}

/// Keywords arrive either as a JSON list or a comma-separated string.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum KeywordsInput {
    List(Vec<String>),
    Text(String),
}

impl KeywordsInput {
    pub fn into_list(self) -> Vec<String> {
        let raw = match self {
            KeywordsInput::List(items) => items,
            KeywordsInput::Text(text) => text.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// SubmitThesisRequest
///
/// Body of POST /scholar/submit_thesis. Any client-provided status is ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SubmitThesisRequest {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<KeywordsInput>,
    pub category: Option<String>,
    pub document_url: Option<String>,
}

impl Validate for SubmitThesisRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.length("title", self.title.trim(), 1, Some(255));
        if let Some(category) = &self.category {
            c.length("category", category, 0, Some(100));
        }
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateThesisRequest {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<KeywordsInput>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub document_url: Option<String>,
    #[serde(deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = Option<String>)]
    pub reviewer_id: Option<i64>,
}

impl Validate for UpdateThesisRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        if let Some(title) = &self.title {
            c.length("title", title.trim(), 1, Some(255));
        }
        if let Some(status) = &self.status {
            c.one_of("status", status, ThesisStatus::ALL);
        }
        c.finish()
    }
}

/// AdminSearchRequest
///
/// Filters for POST /admin/search. Every filter is optional and they combine with AND.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AdminSearchRequest {
    pub search: Option<String>,
    pub author_name: Option<String>,
    pub category: Option<String>,
    pub keywords: Option<KeywordsInput>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
}

impl Validate for AdminSearchRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        if let Some(v) = &self.start_date {
            c.date("start_date", v);
        }
        if let Some(v) = &self.end_date {
            c.date("end_date", v);
        }
        if let Some(v) = &self.status {
            c.one_of("status", v, ThesisStatus::ALL);
        }
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PublicSearchQuery {
    #[serde(rename = "searchText")]
    pub search_text: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct VoteRequest {
    #[serde(rename = "thesisId", deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = String)]
    pub thesis_id: Option<i64>,
    #[serde(rename = "voteType")]
    pub vote_type: String,
}

impl Validate for VoteRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.present("thesisId", &self.thesis_id);
        c.one_of("voteType", &self.vote_type, VoteType::ALL);
        c.finish()
    }
}

/// TrackRequest
///
/// Body of POST /misc/view and POST /misc/download.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TrackRequest {
    #[serde(rename = "thesisId", deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = String)]
    pub thesis_id: Option<i64>,
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
}

impl Validate for TrackRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.present("thesisId", &self.thesis_id);
        c.length("ipAddress", self.ip_address.trim(), 1, Some(45));
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CommentQuery {
    pub thesis_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateCommentRequest {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = String)]
    pub thesis_id: Option<i64>,
    pub message_content: String,
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.present("thesis_id", &self.thesis_id);
        c.required("message_content", &self.message_content);
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateCommentRequest {
    pub message_content: String,
}

impl Validate for UpdateCommentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.required("message_content", &self.message_content);
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreatePeerReviewRequest {
    pub title: String,
    #[serde(deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = String)]
    pub thesis_id: Option<i64>,
    pub review_date: String,
    pub status: Option<String>,
    pub review: String,
}

impl Validate for CreatePeerReviewRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.required("title", &self.title);
        c.present("thesis_id", &self.thesis_id);
        c.date("review_date", &self.review_date);
        if let Some(status) = &self.status {
            c.one_of("status", status, REVIEW_STATUSES);
        }
        c.required("review", &self.review);
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdatePeerReviewRequest {
    pub title: Option<String>,
    pub review: Option<String>,
    pub review_date: Option<String>,
    pub status: Option<String>,
}

impl Validate for UpdatePeerReviewRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        if let Some(v) = &self.title {
            c.required("title", v);
        }
        if let Some(v) = &self.review {
            c.required("review", v);
        }
        if let Some(v) = &self.review_date {
            c.date("review_date", v);
        }
        if let Some(v) = &self.status {
            c.one_of("status", v, REVIEW_STATUSES);
        }
        c.finish()
    }
}

/// Body of POST and PUT /admin/guidelines.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct GuidelineRequest {
    pub title: String,
    pub description: String,
    pub file_url: Option<String>,
}

impl Validate for GuidelineRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.length("title", self.title.trim(), 1, Some(255));
        c.required("description", &self.description);
        if let Some(url) = self.file_url.as_deref().filter(|u| !u.is_empty()) {
            c.url("file_url", url);
        }
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateNotificationRequest {
    pub message: String,
    #[serde(deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = Option<String>)]
    pub user_id: Option<i64>,
}

impl Validate for CreateNotificationRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.length("message", &self.message, 1, Some(255));
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SendMessageRequest {
    #[serde(rename = "receiverId", deserialize_with = "flexible_id::deserialize")]
    #[schema(value_type = String)]
    pub receiver_id: Option<i64>,
    pub content: String,
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.present("receiverId", &self.receiver_id);
        c.required("content", &self.content);
        c.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationQuery {
    pub with: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EnquiryRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl Validate for EnquiryRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.length("name", self.name.trim(), 1, Some(50));
        if c.length("email", &self.email, 1, Some(50)) {
            c.email("email", &self.email);
        }
        c.required("message", &self.message);
        c.length("subject", self.subject.trim(), 1, Some(100));
        c.finish()
    }
}

/// UploadRequest
///
/// Input for POST /scholar/upload. Only PDF documents are accepted.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UploadRequest {
    pub filename: String,
    pub file_type: String,
}

impl Validate for UploadRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut c = Checks::new();
        c.required("filename", &self.filename);
        c.one_of("file_type", &self.file_type, &[DOCUMENT_CONTENT_TYPE]);
        c.finish()
    }
}

// --- Response Payloads (Output Schemas) ---

/// Generic `{message}` envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct PersonSummary {
    pub id: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    #[serde(rename = "profilePic")]
    pub profile_pic: Option<String>,
}

impl From<Person> for PersonSummary {
    fn from(p: Person) -> Self {
        Self {
            id: p.id.to_string(),
            username: p.username,
            firstname: p.firstname,
            lastname: p.lastname,
            profile_pic: p.profile_pic,
        }
    }
}

/// UserResponse
///
/// Account representation returned to clients. Hashes and tokens never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role_id: String,
    pub gender: Option<String>,
    #[ts(type = "string | null")]
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "profilePic")]
    pub profile_pic: Option<String>,
    pub verified: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username,
            email: u.email,
            firstname: u.firstname,
            lastname: u.lastname,
            role_id: u.role_id.to_string(),
            gender: u.gender,
            dob: u.dob,
            phone: u.phone,
            address: u.address,
            profile_pic: u.profile_pic,
            verified: u.verified,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct UserEnvelope {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

/// ProfileResponse
///
/// GET /admin/profile. `downloadsCount` is the total downloads across the user's theses.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileResponse {
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string | null")]
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: String,
    #[ts(type = "string")]
    pub joined: DateTime<Utc>,
    pub role: String,
    pub theses_count: i64,
    pub downloads_count: i64,
    pub address: Option<String>,
    pub profile_pic: Option<String>,
}

/// ThesisResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ThesisResponse {
    pub thesis_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub document_url: Option<String>,
    pub status: String,
    pub author_id: String,
    pub reviewer_id: Option<String>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub views_count: i32,
    pub downloads_count: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<PersonSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<PersonSummary>,
}

impl From<Thesis> for ThesisResponse {
    fn from(t: Thesis) -> Self {
        Self {
            thesis_id: t.thesis_id.to_string(),
            title: t.title,
            abstract_text: t.abstract_text,
            keywords: t.keywords,
            category: t.category,
            document_url: t.document_url,
            status: t.status,
            author_id: t.author_id.to_string(),
            reviewer_id: t.reviewer_id.map(|id| id.to_string()),
            upvotes: t.upvotes,
            downvotes: t.downvotes,
            views_count: t.views_count,
            downloads_count: t.downloads_count,
            created_at: t.created_at,
            updated_at: t.updated_at,
            author: None,
            reviewer: None,
        }
    }
}

impl From<ThesisDetail> for ThesisResponse {
    fn from(d: ThesisDetail) -> Self {
        let mut out = ThesisResponse::from(d.thesis);
        out.author = d.author.map(PersonSummary::from);
        out.reviewer = d.reviewer.map(PersonSummary::from);
        out
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ThesisEnvelope {
    pub message: String,
    pub thesis: ThesisResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ThesisListResponse {
    pub theses: Vec<ThesisResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct SearchResponse {
    pub theses: Vec<ThesisResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct HomeResponse {
    pub latest: Vec<ThesisResponse>,
    pub featured: Vec<ThesisResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ViewCountResponse {
    pub views: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct DownloadCountResponse {
    pub downloads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct CommentResponse {
    pub id: String,
    pub thesis_id: String,
    pub user_id: String,
    pub message_content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PersonSummary>,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id.to_string(),
            thesis_id: c.thesis_id.to_string(),
            user_id: c.user_id.to_string(),
            message_content: c.message_content,
            created_at: c.created_at,
            updated_at: c.updated_at,
            user: None,
        }
    }
}

impl From<CommentDetail> for CommentResponse {
    fn from(d: CommentDetail) -> Self {
        let mut out = CommentResponse::from(d.comment);
        out.user = d.author.map(PersonSummary::from);
        out
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct CommentEnvelope {
    pub message: String,
    pub comment: CommentResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct PeerReviewResponse {
    pub id: String,
    pub title: String,
    pub review: String,
    #[ts(type = "string")]
    pub review_date: DateTime<Utc>,
    pub status: String,
    pub thesis_id: String,
    pub reviewer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thesis_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_email: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<PeerReview> for PeerReviewResponse {
    fn from(r: PeerReview) -> Self {
        Self {
            id: r.id.to_string(),
            title: r.title,
            review: r.review,
            review_date: r.review_date,
            status: r.status,
            thesis_id: r.thesis_id.to_string(),
            reviewer_id: r.reviewer_id.to_string(),
            thesis_title: None,
            reviewer_email: None,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<PeerReviewDetail> for PeerReviewResponse {
    fn from(d: PeerReviewDetail) -> Self {
        let mut out = PeerReviewResponse::from(d.review);
        out.thesis_title = d.thesis_title;
        out.reviewer_email = d.reviewer_email;
        out
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct PeerReviewEnvelope {
    pub message: String,
    #[serde(rename = "peerReview")]
    pub peer_review: PeerReviewResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct GuidelineResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "fileUrl")]
    pub file_url: Option<String>,
    pub user_id: String,
    #[serde(rename = "addedBy", skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<Guideline> for GuidelineResponse {
    fn from(g: Guideline) -> Self {
        Self {
            id: g.id.to_string(),
            title: g.title,
            description: g.description,
            file_url: g.file_url,
            user_id: g.user_id.to_string(),
            added_by: None,
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

impl From<GuidelineDetail> for GuidelineResponse {
    fn from(d: GuidelineDetail) -> Self {
        let mut out = GuidelineResponse::from(d.guideline);
        out.added_by = d.added_by;
        out
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct GuidelineEnvelope {
    pub message: String,
    pub guideline: GuidelineResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct NotificationUserInfo {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(rename = "profilePic")]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct NotificationResponse {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub read: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "userInfo", skip_serializing_if = "Option::is_none")]
    pub user_info: Option<NotificationUserInfo>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            user_id: n.user_id.to_string(),
            message: n.message,
            read: n.read,
            created_at: n.created_at,
            updated_at: n.updated_at,
            user_info: None,
        }
    }
}

impl From<NotificationDetail> for NotificationResponse {
    fn from(d: NotificationDetail) -> Self {
        let mut out = NotificationResponse::from(d.notification);
        out.user_info = d.user.map(|p| NotificationUserInfo {
            firstname: p.firstname,
            lastname: p.lastname,
            email: p.email,
            profile_pic: p.profile_pic,
        });
        out
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct NotificationEnvelope {
    pub message: String,
    pub notification: NotificationResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChatMessageResponse {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_username: Option<String>,
}

impl From<DirectMessage> for ChatMessageResponse {
    fn from(m: DirectMessage) -> Self {
        Self {
            id: m.id.to_string(),
            sender_id: m.sender_id.to_string(),
            receiver_id: m.receiver_id.to_string(),
            content: m.content,
            created_at: m.created_at,
            sender_username: None,
            receiver_username: None,
        }
    }
}

impl From<ConversationEntry> for ChatMessageResponse {
    fn from(e: ConversationEntry) -> Self {
        let mut out = ChatMessageResponse::from(e.message);
        out.sender_username = Some(e.sender_username);
        out.receiver_username = Some(e.receiver_username);
        out
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct SendMessageResponse {
    pub message: String,
    #[serde(rename = "newMessage")]
    pub new_message: ChatMessageResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ConversationResponse {
    pub conversation: Vec<ChatMessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConversationSummary {
    pub user_id: String,
    pub username: String,
    pub last_message: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

impl From<ConversationPartner> for ConversationSummary {
    fn from(p: ConversationPartner) -> Self {
        Self {
            user_id: p.user_id.to_string(),
            username: p.username,
            last_message: p.last_message,
            timestamp: p.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct HistoryResponse {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub description: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryResponse {
    fn from(h: HistoryEntry) -> Self {
        Self {
            id: h.id.to_string(),
            user_id: h.user_id.to_string(),
            action: h.action,
            description: h.description,
            created_at: h.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct EnquiryResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<Enquiry> for EnquiryResponse {
    fn from(e: Enquiry) -> Self {
        Self {
            id: e.id.to_string(),
            name: e.name,
            email: e.email,
            subject: e.subject,
            message: e.message,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct EnquiryEnvelope {
    pub message: String,
    pub enquiry: EnquiryResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct UploadResponse {
    pub upload_url: String,
    pub resource_key: String,
}

// --- Dashboards ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ThesisViews {
    pub title: String,
    pub category: String,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ThesisDownloads {
    pub title: String,
    pub category: String,
    pub downloads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct WeeklyActivity {
    pub day: String,
    pub views: i64,
    pub downloads: i64,
}

/// AdminDashboard
///
/// Site-wide totals plus per-thesis breakdowns and the top five of each.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminDashboard {
    pub total_users: i64,
    pub total_theses: i64,
    pub under_review_theses: i64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub total_views_by_thesis: Vec<ThesisViews>,
    pub total_downloads_by_thesis: Vec<ThesisDownloads>,
    pub most_viewed_theses: Vec<ThesisViews>,
    pub most_downloaded_theses: Vec<ThesisDownloads>,
}

/// ScholarDashboard
///
/// Category maps always carry `Total`, `AI`, `ML` and `NLP`; the weekly series
/// runs Monday through Sunday.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScholarDashboard {
    pub total_users: i64,
    pub total_theses: i64,
    pub under_review_theses: i64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub views_by_category: BTreeMap<String, i64>,
    pub downloads_by_category: BTreeMap<String, i64>,
    pub weekly_data: Vec<WeeklyActivity>,
}

/// UserDashboard
///
/// The admin aggregates restricted to the principal's own theses.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserDashboard {
    pub total_user_theses: i64,
    pub under_review_user_theses: i64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub total_views_by_user_thesis: Vec<ThesisViews>,
    pub total_downloads_by_user_thesis: Vec<ThesisDownloads>,
    pub most_viewed_theses: Vec<ThesisViews>,
    pub most_downloaded_theses: Vec<ThesisDownloads>,
}
