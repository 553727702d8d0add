use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};

use super::{
    EventKind, NewEnquiry, NewGuideline, NewPeerReview, NewThesis, NewUser, Page,
    PeerReviewChanges, RepoError, RepoResult, Repository, ThesisChanges, ThesisFilter,
    ThesisOrder, UserChanges, VoteOutcome,
};
use crate::models::{
    Comment, CommentDetail, ConversationEntry, ConversationPartner, DirectMessage, Enquiry,
    Guideline, GuidelineDetail, HistoryEntry, Notification, NotificationDetail, PeerReview,
    PeerReviewDetail, Person, Role, Thesis, ThesisDetail, ThesisStatus, ThesisTally, User,
    VoteType, WeekdayTally,
};

/// Roles and permission lists every fresh store starts with.
pub const SEED_PERMISSIONS: &[(&str, &[&str])] = &[
    (
        "admin",
        &[
            "CREATE_USER",
            "MODIFY_USER",
            "DELETE_USER",
            "CREATE_THESIS",
            "MODIFY_THESIS",
            "DELETE_THESIS",
            "CREATE_GUIDELINE",
            "MODIFY_GUIDELINE",
            "DELETE_GUIDELINE",
            "VIEW_THESIS",
            "CREATE_PEER_REVIEW",
            "MODIFY_PEER_REVIEW",
            "DELETE_PEER_REVIEW",
            "VIEW_PROFILE",
            "UPDATE_PROFILE",
            "UPDATE_COMMENT",
            "DELETE_COMMENT",
            "MODERATE_COMMENT",
            "VIEW_ENQUIRIES",
            "VIEW_HISTORY",
            "VIEW_ADMIN_DASHBOARD",
            "VIEW_SCHOLAR_DASHBOARD",
        ],
    ),
    (
        "scholar",
        &[
            "CREATE_THESIS",
            "MODIFY_THESIS",
            "DELETE_THESIS",
            "SUBMIT_THESIS",
            "CREATE_GUIDELINE",
            "MODIFY_GUIDELINE",
            "DELETE_GUIDELINE",
            "VIEW_THESIS",
            "CREATE_PEER_REVIEW",
            "MODIFY_PEER_REVIEW",
            "DELETE_PEER_REVIEW",
            "MY_THESIS",
            "VIEW_PROFILE",
            "UPDATE_PROFILE",
            "UPDATE_COMMENT",
            "DELETE_COMMENT",
            "MODERATE_COMMENT",
            "VIEW_SCHOLAR_DASHBOARD",
        ],
    ),
    (
        "user",
        &[
            "VIEW_THESIS",
            "SUBMIT_THESIS",
            "MY_THESIS",
            "VIEW_PROFILE",
            "UPDATE_PROFILE",
            "UPDATE_COMMENT",
            "DELETE_COMMENT",
        ],
    ),
    ("guest", &["VIEW_THESIS"]),
];

#[derive(Debug, Clone)]
struct Vote {
    thesis_id: i64,
    user_id: i64,
    vote: VoteType,
}

#[derive(Debug, Clone)]
struct Event {
    kind: EventKind,
    thesis_id: i64,
    ip: String,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    roles: Vec<Role>,
    permissions: Vec<(i64, i64, Vec<String>)>,
    users: Vec<User>,
    theses: Vec<Thesis>,
    votes: Vec<Vote>,
    events: Vec<Event>,
    comments: Vec<Comment>,
    peer_reviews: Vec<PeerReview>,
    guidelines: Vec<Guideline>,
    notifications: Vec<Notification>,
    messages: Vec<DirectMessage>,
    history: Vec<HistoryEntry>,
    enquiries: Vec<Enquiry>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Mirrors the case-insensitive unique index on `users.email`.
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .iter()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn person(&self, id: i64) -> Option<Person> {
        self.users.iter().find(|u| u.id == id).map(Person::from)
    }

    fn thesis_mut(&mut self, id: i64) -> Option<&mut Thesis> {
        self.theses.iter_mut().find(|t| t.thesis_id == id)
    }

    /// Drops a thesis and everything hanging off it.
    fn remove_thesis(&mut self, id: i64) -> bool {
        let before = self.theses.len();
        self.theses.retain(|t| t.thesis_id != id);
        self.events.retain(|e| e.thesis_id != id);
        self.comments.retain(|c| c.thesis_id != id);
        self.peer_reviews.retain(|p| p.thesis_id != id);
        self.votes.retain(|v| v.thesis_id != id);
        self.theses.len() != before
    }

    fn matches(&self, t: &Thesis, f: &ThesisFilter) -> bool {
        let author = self.users.iter().find(|u| u.id == t.author_id);
        let (first, last, username) = author
            .map(|a| {
                (
                    a.firstname.to_lowercase(),
                    a.lastname.to_lowercase(),
                    a.username.to_lowercase(),
                )
            })
            .unwrap_or_default();

        if let Some(text) = f.text.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = text.to_lowercase();
            let hit = contains(&t.title, &needle)
                || contains(&t.category, &needle)
                || first.contains(&needle)
                || last.contains(&needle)
                || username.contains(&needle)
                || t.keywords.iter().any(|k| contains(k, &needle));
            if !hit {
                return false;
            }
        }
        if let Some(title) = f.title.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !contains(&t.title, &title.to_lowercase()) {
                return false;
            }
        }
        match f.author_terms() {
            Some((a, Some(b))) => {
                if !(first.contains(&a.to_lowercase()) && last.contains(&b.to_lowercase())) {
                    return false;
                }
            }
            Some((w, None)) => {
                let w = w.to_lowercase();
                if !(first.contains(&w) || last.contains(&w)) {
                    return false;
                }
            }
            None => {}
        }
        if let Some(category) = f.category.as_deref().filter(|s| !s.is_empty()) {
            if !contains(&t.category, &category.to_lowercase()) {
                return false;
            }
        }
        if !f.keywords.is_empty() {
            let hit = t
                .keywords
                .iter()
                .any(|k| f.keywords.iter().any(|w| k.to_lowercase() == w.to_lowercase()));
            if !hit {
                return false;
            }
        }
        if f.created_from.is_some_and(|from| t.created_at < from) {
            return false;
        }
        if f.created_before.is_some_and(|before| t.created_at >= before) {
            return false;
        }
        if f.status.as_deref().is_some_and(|s| t.status != s) {
            return false;
        }
        if f.author_id.is_some_and(|id| t.author_id != id) {
            return false;
        }
        true
    }

    fn tallies(&self, kind: EventKind, author_id: Option<i64>) -> Vec<ThesisTally> {
        let mut counts: HashMap<i64, i64> = HashMap::new();
        for e in self.events.iter().filter(|e| e.kind == kind) {
            *counts.entry(e.thesis_id).or_default() += 1;
        }
        let mut out: Vec<ThesisTally> = self
            .theses
            .iter()
            .filter(|t| author_id.is_none_or(|id| t.author_id == id))
            .filter_map(|t| {
                counts.get(&t.thesis_id).map(|count| ThesisTally {
                    thesis_id: t.thesis_id,
                    title: t.title.clone(),
                    category: t.category.clone(),
                    count: *count,
                })
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then(a.thesis_id.cmp(&b.thesis_id)));
        out
    }
}

fn contains(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

/// InMemoryRepository
///
/// A lock-protected, process-local store with the same semantics as the
/// Postgres repository. Backs the test suite and database-less local runs.
pub struct InMemoryRepository {
    store: Mutex<Store>,
    unavailable: AtomicBool,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// new
    ///
    /// Creates an empty store holding only the seeded roles and permissions.
    pub fn new() -> Self {
        let mut store = Store::default();
        for (name, permissions) in SEED_PERMISSIONS {
            let role_id = store.next_id();
            store.roles.push(Role {
                id: role_id,
                role_name: name.to_string(),
            });
            let permission_id = store.next_id();
            store.permissions.push((
                permission_id,
                role_id,
                permissions.iter().map(|p| p.to_string()).collect(),
            ));
        }
        Self {
            store: Mutex::new(store),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail, simulating a lost database.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Shifts every recorded view and download into the past.
    pub fn age_events(&self, by: Duration) {
        if let Ok(mut store) = self.store.lock() {
            for e in store.events.iter_mut() {
                e.at -= by;
            }
        }
    }

    fn store(&self) -> RepoResult<MutexGuard<'_, Store>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("in-memory store switched off".to_string()));
        }
        self.store
            .lock()
            .map_err(|_| RepoError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Users & Roles ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.store()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store()?
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.store()?.users.clone())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store()?;
        if store.email_taken(&user.email, None) {
            return Err(RepoError::DuplicateEmail);
        }
        let now = Utc::now();
        let created = User {
            id: store.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role_id: user.role_id,
            firstname: user.firstname,
            lastname: user.lastname,
            gender: user.gender,
            dob: user.dob,
            phone: user.phone,
            address: user.address,
            profile_pic: user.profile_pic,
            verified: false,
            email_verified: None,
            verification_token: None,
            verification_token_expires: None,
            reset_token: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut store = self.store()?;
        if let Some(email) = &changes.email {
            if store.email_taken(email, Some(id)) {
                return Err(RepoError::DuplicateEmail);
            }
        }
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.firstname {
            user.firstname = v;
        }
        if let Some(v) = changes.lastname {
            user.lastname = v;
        }
        if changes.gender.is_some() {
            user.gender = changes.gender;
        }
        if changes.dob.is_some() {
            user.dob = changes.dob;
        }
        if changes.phone.is_some() {
            user.phone = changes.phone;
        }
        if changes.address.is_some() {
            user.address = changes.address;
        }
        if changes.profile_pic.is_some() {
            user.profile_pic = changes.profile_pic;
        }
        if let Some(v) = changes.role_id {
            user.role_id = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store()?;
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        let authored: Vec<i64> = store
            .theses
            .iter()
            .filter(|t| t.author_id == id)
            .map(|t| t.thesis_id)
            .collect();
        for thesis_id in authored {
            store.remove_thesis(thesis_id);
        }
        for t in store.theses.iter_mut().filter(|t| t.reviewer_id == Some(id)) {
            t.reviewer_id = None;
        }
        store.votes.retain(|v| v.user_id != id);
        store.comments.retain(|c| c.user_id != id);
        store.peer_reviews.retain(|p| p.reviewer_id != id);
        store.guidelines.retain(|g| g.user_id != id);
        store.notifications.retain(|n| n.user_id != id);
        store
            .messages
            .retain(|m| m.sender_id != id && m.receiver_id != id);
        store.history.retain(|h| h.user_id != id);
        Ok(true)
    }

    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>> {
        Ok(self.store()?.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        Ok(self
            .store()?
            .roles
            .iter()
            .find(|r| r.role_name == name)
            .cloned())
    }

    async fn role_permissions(&self, role_id: i64) -> RepoResult<Option<Vec<String>>> {
        Ok(self
            .store()?
            .permissions
            .iter()
            .filter(|(_, rid, _)| *rid == role_id)
            .min_by_key(|(id, _, _)| *id)
            .map(|(_, _, list)| list.clone()))
    }

    // --- Verification & Reset Tokens ---

    async fn set_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut store = self.store()?;
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.verification_token = Some(token.to_string());
            user.verification_token_expires = Some(expires);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_user_by_verification_token(&self, token: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store()?
            .users
            .iter()
            .find(|u| u.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn mark_email_verified(&self, user_id: i64) -> RepoResult<()> {
        let mut store = self.store()?;
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            let now = Utc::now();
            user.email_verified = Some(now);
            user.verified = true;
            user.verification_token = None;
            user.verification_token_expires = None;
            user.updated_at = now;
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut store = self.store()?;
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.reset_token = Some(token.to_string());
            user.reset_token_expires = Some(expires);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_user_by_reset_token(&self, token: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store()?
            .users
            .iter()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn reset_password(&self, user_id: i64, password_hash: &str) -> RepoResult<()> {
        let mut store = self.store()?;
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = password_hash.to_string();
            user.reset_token = None;
            user.reset_token_expires = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    // --- Theses ---

    async fn create_thesis(&self, thesis: NewThesis) -> RepoResult<Thesis> {
        let mut store = self.store()?;
        let now = Utc::now();
        let created = Thesis {
            thesis_id: store.next_id(),
            title: thesis.title,
            abstract_text: thesis.abstract_text,
            keywords: thesis.keywords,
            category: thesis.category,
            document_url: thesis.document_url,
            status: ThesisStatus::Pending.as_str().to_string(),
            author_id: thesis.author_id,
            reviewer_id: None,
            upvotes: 0,
            downvotes: 0,
            views_count: 0,
            downloads_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.theses.push(created.clone());
        Ok(created)
    }

    async fn get_thesis(&self, id: i64) -> RepoResult<Option<Thesis>> {
        Ok(self
            .store()?
            .theses
            .iter()
            .find(|t| t.thesis_id == id)
            .cloned())
    }

    async fn update_thesis(&self, id: i64, changes: ThesisChanges) -> RepoResult<Option<Thesis>> {
        let mut store = self.store()?;
        let Some(thesis) = store.thesis_mut(id) else {
            return Ok(None);
        };
        if let Some(v) = changes.title {
            thesis.title = v;
        }
        if changes.abstract_text.is_some() {
            thesis.abstract_text = changes.abstract_text;
        }
        if let Some(v) = changes.keywords {
            thesis.keywords = v;
        }
        if let Some(v) = changes.category {
            thesis.category = v;
        }
        if let Some(v) = changes.status {
            thesis.status = v;
        }
        if changes.document_url.is_some() {
            thesis.document_url = changes.document_url;
        }
        if changes.reviewer_id.is_some() {
            thesis.reviewer_id = changes.reviewer_id;
        }
        thesis.updated_at = Utc::now();
        Ok(Some(thesis.clone()))
    }

    async fn delete_thesis(&self, id: i64) -> RepoResult<bool> {
        Ok(self.store()?.remove_thesis(id))
    }

    async fn search_theses(
        &self,
        filter: &ThesisFilter,
        order: ThesisOrder,
        page: Option<Page>,
    ) -> RepoResult<(Vec<ThesisDetail>, i64)> {
        let store = self.store()?;
        let mut hits: Vec<&Thesis> = store
            .theses
            .iter()
            .filter(|t| store.matches(t, filter))
            .collect();
        match order {
            ThesisOrder::Newest => hits.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then(b.thesis_id.cmp(&a.thesis_id))
            }),
            ThesisOrder::MostUpvoted => hits.sort_by(|a, b| {
                b.upvotes
                    .cmp(&a.upvotes)
                    .then(b.created_at.cmp(&a.created_at))
            }),
        }
        let total = hits.len() as i64;
        let (skip, take) = match page {
            Some(p) => (p.offset.max(0) as usize, p.limit.max(0) as usize),
            None => (0, hits.len()),
        };
        let details = hits
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|t| ThesisDetail {
                author: store.person(t.author_id),
                reviewer: t.reviewer_id.and_then(|id| store.person(id)),
                thesis: t.clone(),
            })
            .collect();
        Ok((details, total))
    }

    // --- Engagement ---

    async fn record_vote(
        &self,
        thesis_id: i64,
        user_id: i64,
        vote: VoteType,
    ) -> RepoResult<Option<VoteOutcome>> {
        let mut store = self.store()?;
        if store.thesis_mut(thesis_id).is_none() {
            return Ok(None);
        }
        let existing = store
            .votes
            .iter()
            .position(|v| v.thesis_id == thesis_id && v.user_id == user_id);
        let (outcome, up, down) = match existing {
            Some(i) if store.votes[i].vote == vote => return Ok(Some(VoteOutcome::Unchanged)),
            Some(i) => {
                store.votes[i].vote = vote;
                match vote {
                    VoteType::Upvote => (VoteOutcome::Changed, 1, -1),
                    VoteType::Downvote => (VoteOutcome::Changed, -1, 1),
                }
            }
            None => {
                store.votes.push(Vote {
                    thesis_id,
                    user_id,
                    vote,
                });
                match vote {
                    VoteType::Upvote => (VoteOutcome::Registered, 1, 0),
                    VoteType::Downvote => (VoteOutcome::Registered, 0, 1),
                }
            }
        };
        if let Some(thesis) = store.thesis_mut(thesis_id) {
            thesis.upvotes = (thesis.upvotes + up).max(0);
            thesis.downvotes = (thesis.downvotes + down).max(0);
        }
        Ok(Some(outcome))
    }

    async fn track_event(
        &self,
        kind: EventKind,
        thesis_id: i64,
        ip: &str,
    ) -> RepoResult<Option<i64>> {
        let mut store = self.store()?;
        if store.thesis_mut(thesis_id).is_none() {
            return Ok(None);
        }
        let now = Utc::now();
        let window_start = now - Duration::hours(24);
        let seen_recently = store.events.iter().any(|e| {
            e.kind == kind && e.thesis_id == thesis_id && e.ip == ip && e.at > window_start
        });
        if !seen_recently {
            store.events.push(Event {
                kind,
                thesis_id,
                ip: ip.to_string(),
                at: now,
            });
        }
        let Some(thesis) = store.thesis_mut(thesis_id) else {
            return Ok(None);
        };
        let counter = match kind {
            EventKind::View => &mut thesis.views_count,
            EventKind::Download => &mut thesis.downloads_count,
        };
        if !seen_recently {
            *counter += 1;
        }
        Ok(Some(i64::from(*counter)))
    }

    // --- Comments ---

    async fn list_comments(&self, thesis_id: i64) -> RepoResult<Vec<CommentDetail>> {
        let store = self.store()?;
        let mut comments: Vec<&Comment> = store
            .comments
            .iter()
            .filter(|c| c.thesis_id == thesis_id)
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments
            .into_iter()
            .map(|c| CommentDetail {
                author: store.person(c.user_id),
                comment: c.clone(),
            })
            .collect())
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        Ok(self.store()?.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create_comment(
        &self,
        thesis_id: i64,
        user_id: i64,
        content: &str,
    ) -> RepoResult<Comment> {
        let mut store = self.store()?;
        let now = Utc::now();
        let comment = Comment {
            id: store.next_id(),
            thesis_id,
            user_id,
            message_content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        store.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>> {
        let mut store = self.store()?;
        let Some(comment) = store.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        comment.message_content = content.to_string();
        comment.updated_at = Utc::now();
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store()?;
        let before = store.comments.len();
        store.comments.retain(|c| c.id != id);
        Ok(store.comments.len() != before)
    }

    // --- Peer Reviews ---

    async fn list_peer_reviews(&self) -> RepoResult<Vec<PeerReviewDetail>> {
        let store = self.store()?;
        let mut reviews: Vec<&PeerReview> = store.peer_reviews.iter().collect();
        reviews.sort_by(|a, b| b.review_date.cmp(&a.review_date).then(b.id.cmp(&a.id)));
        Ok(reviews
            .into_iter()
            .map(|r| PeerReviewDetail {
                thesis_title: store
                    .theses
                    .iter()
                    .find(|t| t.thesis_id == r.thesis_id)
                    .map(|t| t.title.clone()),
                reviewer_email: store.person(r.reviewer_id).map(|p| p.email),
                review: r.clone(),
            })
            .collect())
    }

    async fn create_peer_review(&self, review: NewPeerReview) -> RepoResult<PeerReview> {
        let mut store = self.store()?;
        let now = Utc::now();
        let created = PeerReview {
            id: store.next_id(),
            title: review.title,
            review: review.review,
            review_date: review.review_date,
            status: review.status,
            thesis_id: review.thesis_id,
            reviewer_id: review.reviewer_id,
            created_at: now,
            updated_at: now,
        };
        store.peer_reviews.push(created.clone());
        Ok(created)
    }

    async fn update_peer_review(
        &self,
        id: i64,
        changes: PeerReviewChanges,
    ) -> RepoResult<Option<PeerReview>> {
        let mut store = self.store()?;
        let Some(review) = store.peer_reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.title {
            review.title = v;
        }
        if let Some(v) = changes.review {
            review.review = v;
        }
        if let Some(v) = changes.review_date {
            review.review_date = v;
        }
        if let Some(v) = changes.status {
            review.status = v;
        }
        review.reviewer_id = changes.reviewer_id;
        review.updated_at = Utc::now();
        Ok(Some(review.clone()))
    }

    async fn delete_peer_review(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store()?;
        let before = store.peer_reviews.len();
        store.peer_reviews.retain(|r| r.id != id);
        Ok(store.peer_reviews.len() != before)
    }

    // --- Guidelines ---

    async fn list_guidelines(&self) -> RepoResult<Vec<GuidelineDetail>> {
        let store = self.store()?;
        let mut guidelines: Vec<&Guideline> = store.guidelines.iter().collect();
        guidelines.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(guidelines
            .into_iter()
            .map(|g| GuidelineDetail {
                added_by: store.person(g.user_id).map(|p| p.username),
                guideline: g.clone(),
            })
            .collect())
    }

    async fn get_guideline_by_title(&self, title: &str) -> RepoResult<Option<Guideline>> {
        Ok(self
            .store()?
            .guidelines
            .iter()
            .find(|g| g.title == title)
            .cloned())
    }

    async fn create_guideline(&self, guideline: NewGuideline) -> RepoResult<Guideline> {
        let mut store = self.store()?;
        let now = Utc::now();
        let created = Guideline {
            id: store.next_id(),
            title: guideline.title,
            description: guideline.description,
            file_url: guideline.file_url,
            user_id: guideline.user_id,
            created_at: now,
            updated_at: now,
        };
        store.guidelines.push(created.clone());
        Ok(created)
    }

    async fn update_guideline(
        &self,
        id: i64,
        title: &str,
        description: &str,
        file_url: Option<&str>,
    ) -> RepoResult<Option<Guideline>> {
        let mut store = self.store()?;
        let Some(guideline) = store.guidelines.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        guideline.title = title.to_string();
        guideline.description = description.to_string();
        guideline.file_url = file_url.map(str::to_string);
        guideline.updated_at = Utc::now();
        Ok(Some(guideline.clone()))
    }

    async fn delete_guideline(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store()?;
        let before = store.guidelines.len();
        store.guidelines.retain(|g| g.id != id);
        Ok(store.guidelines.len() != before)
    }

    // --- Notifications ---

    async fn list_notifications(&self, user_id: i64) -> RepoResult<Vec<NotificationDetail>> {
        let store = self.store()?;
        let mut notifications: Vec<&Notification> = store
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications
            .into_iter()
            .map(|n| NotificationDetail {
                user: store.person(n.user_id),
                notification: n.clone(),
            })
            .collect())
    }

    async fn create_notification(&self, user_id: i64, message: &str) -> RepoResult<Notification> {
        let mut store = self.store()?;
        let now = Utc::now();
        let created = Notification {
            id: store.next_id(),
            user_id,
            message: message.to_string(),
            read: false,
            created_at: now,
            updated_at: now,
        };
        store.notifications.push(created.clone());
        Ok(created)
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: i64,
    ) -> RepoResult<Option<Notification>> {
        let mut store = self.store()?;
        let Some(n) = store
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        else {
            return Ok(None);
        };
        n.read = true;
        n.updated_at = Utc::now();
        Ok(Some(n.clone()))
    }

    async fn delete_notification(&self, id: i64, user_id: i64) -> RepoResult<bool> {
        let mut store = self.store()?;
        let before = store.notifications.len();
        store
            .notifications
            .retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(store.notifications.len() != before)
    }

    // --- Chat ---

    async fn send_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> RepoResult<DirectMessage> {
        let mut store = self.store()?;
        let message = DirectMessage {
            id: store.next_id(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        store.messages.push(message.clone());
        Ok(message)
    }

    async fn conversation(&self, user_id: i64, other_id: i64) -> RepoResult<Vec<ConversationEntry>> {
        let store = self.store()?;
        let mut messages: Vec<&DirectMessage> = store
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.receiver_id == other_id)
                    || (m.sender_id == other_id && m.receiver_id == user_id)
            })
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages
            .into_iter()
            .map(|m| ConversationEntry {
                sender_username: store.person(m.sender_id).map(|p| p.username).unwrap_or_default(),
                receiver_username: store
                    .person(m.receiver_id)
                    .map(|p| p.username)
                    .unwrap_or_default(),
                message: m.clone(),
            })
            .collect())
    }

    async fn conversation_partners(&self, user_id: i64) -> RepoResult<Vec<ConversationPartner>> {
        let store = self.store()?;
        let mut latest: HashMap<i64, &DirectMessage> = HashMap::new();
        for m in store
            .messages
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
        {
            let partner = if m.sender_id == user_id {
                m.receiver_id
            } else {
                m.sender_id
            };
            let newer = latest
                .get(&partner)
                .is_none_or(|prev| (m.created_at, m.id) > (prev.created_at, prev.id));
            if newer {
                latest.insert(partner, m);
            }
        }
        let mut partners: Vec<ConversationPartner> = latest
            .into_iter()
            .filter_map(|(partner, m)| {
                store.person(partner).map(|p| ConversationPartner {
                    user_id: partner,
                    username: p.username,
                    last_message: m.content.clone(),
                    timestamp: m.created_at,
                })
            })
            .collect();
        partners.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.user_id.cmp(&b.user_id)));
        Ok(partners)
    }

    // --- Audit Trail ---

    async fn record_history(
        &self,
        user_id: i64,
        action: &str,
        description: &str,
    ) -> RepoResult<()> {
        let mut store = self.store()?;
        let entry = HistoryEntry {
            id: store.next_id(),
            user_id,
            action: action.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        store.history.push(entry);
        Ok(())
    }

    async fn list_history(&self, limit: i64) -> RepoResult<Vec<HistoryEntry>> {
        let store = self.store()?;
        let mut entries = store.history.clone();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    // --- Enquiries ---

    async fn list_enquiries(&self) -> RepoResult<Vec<Enquiry>> {
        let store = self.store()?;
        let mut enquiries = store.enquiries.clone();
        enquiries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(enquiries)
    }

    async fn create_enquiry(&self, enquiry: NewEnquiry) -> RepoResult<Enquiry> {
        let mut store = self.store()?;
        let now = Utc::now();
        let created = Enquiry {
            id: store.next_id(),
            name: enquiry.name,
            email: enquiry.email,
            subject: enquiry.subject,
            message: enquiry.message,
            created_at: now,
            updated_at: now,
        };
        store.enquiries.push(created.clone());
        Ok(created)
    }

    // --- Statistics ---

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.store()?.users.len() as i64)
    }

    async fn count_theses(&self, author_id: Option<i64>, status: Option<&str>) -> RepoResult<i64> {
        Ok(self
            .store()?
            .theses
            .iter()
            .filter(|t| author_id.is_none_or(|id| t.author_id == id))
            .filter(|t| status.is_none_or(|s| t.status == s))
            .count() as i64)
    }

    async fn event_tallies(
        &self,
        kind: EventKind,
        author_id: Option<i64>,
    ) -> RepoResult<Vec<ThesisTally>> {
        Ok(self.store()?.tallies(kind, author_id))
    }

    async fn weekday_tallies(
        &self,
        kind: EventKind,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<WeekdayTally>> {
        let store = self.store()?;
        let mut counts: HashMap<i32, i64> = HashMap::new();
        for e in store
            .events
            .iter()
            .filter(|e| e.kind == kind && e.at >= since)
        {
            let day = e.at.weekday().number_from_monday() as i32;
            *counts.entry(day).or_default() += 1;
        }
        let mut tallies: Vec<WeekdayTally> = counts
            .into_iter()
            .map(|(iso_day, count)| WeekdayTally { iso_day, count })
            .collect();
        tallies.sort_by_key(|t| t.iso_day);
        Ok(tallies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, role_id: i64) -> NewUser {
        NewUser {
            username: email.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role_id,
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            gender: None,
            dob: None,
            phone: None,
            address: None,
            profile_pic: None,
        }
    }

    fn new_thesis(author_id: i64, title: &str) -> NewThesis {
        NewThesis {
            title: title.to_string(),
            abstract_text: None,
            keywords: vec!["ai".to_string()],
            category: "AI".to_string(),
            document_url: None,
            author_id,
        }
    }

    #[tokio::test]
    async fn seeded_roles_carry_permissions() {
        let repo = InMemoryRepository::new();
        let admin = repo.find_role_by_name("admin").await.unwrap().unwrap();
        let perms = repo.role_permissions(admin.id).await.unwrap().unwrap();
        assert!(perms.contains(&"DELETE_THESIS".to_string()));
        let guest = repo.find_role_by_name("guest").await.unwrap().unwrap();
        assert_eq!(
            repo.role_permissions(guest.id).await.unwrap().unwrap(),
            vec!["VIEW_THESIS"]
        );
    }

    #[tokio::test]
    async fn vote_flip_moves_both_counters() {
        let repo = InMemoryRepository::new();
        let user = repo.create_user(new_user("a@b.co", 3)).await.unwrap();
        let thesis = repo.create_thesis(new_thesis(user.id, "T")).await.unwrap();

        let first = repo.record_vote(thesis.thesis_id, user.id, VoteType::Upvote).await;
        assert_eq!(first.unwrap(), Some(VoteOutcome::Registered));
        let again = repo.record_vote(thesis.thesis_id, user.id, VoteType::Upvote).await;
        assert_eq!(again.unwrap(), Some(VoteOutcome::Unchanged));
        let flip = repo.record_vote(thesis.thesis_id, user.id, VoteType::Downvote).await;
        assert_eq!(flip.unwrap(), Some(VoteOutcome::Changed));

        let t = repo.get_thesis(thesis.thesis_id).await.unwrap().unwrap();
        assert_eq!((t.upvotes, t.downvotes), (0, 1));
        assert_eq!(repo.record_vote(999, user.id, VoteType::Upvote).await.unwrap(), None);
    }

    #[tokio::test]
    async fn events_count_once_per_ip_per_day() {
        let repo = InMemoryRepository::new();
        let user = repo.create_user(new_user("a@b.co", 3)).await.unwrap();
        let thesis = repo.create_thesis(new_thesis(user.id, "T")).await.unwrap();
        let id = thesis.thesis_id;

        assert_eq!(repo.track_event(EventKind::View, id, "1.1.1.1").await.unwrap(), Some(1));
        assert_eq!(repo.track_event(EventKind::View, id, "1.1.1.1").await.unwrap(), Some(1));
        assert_eq!(repo.track_event(EventKind::View, id, "2.2.2.2").await.unwrap(), Some(2));
        assert_eq!(repo.track_event(EventKind::Download, id, "1.1.1.1").await.unwrap(), Some(1));

        repo.age_events(Duration::hours(25));
        assert_eq!(repo.track_event(EventKind::View, id, "1.1.1.1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn delete_thesis_removes_dependents() {
        let repo = InMemoryRepository::new();
        let user = repo.create_user(new_user("a@b.co", 1)).await.unwrap();
        let thesis = repo.create_thesis(new_thesis(user.id, "T")).await.unwrap();
        let id = thesis.thesis_id;
        repo.create_comment(id, user.id, "hi").await.unwrap();
        repo.record_vote(id, user.id, VoteType::Upvote).await.unwrap();
        repo.track_event(EventKind::Download, id, "1.1.1.1").await.unwrap();

        assert!(repo.delete_thesis(id).await.unwrap());
        assert!(repo.list_comments(id).await.unwrap().is_empty());
        assert!(repo.event_tallies(EventKind::Download, None).await.unwrap().is_empty());
        assert!(!repo.delete_thesis(id).await.unwrap());
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let repo = InMemoryRepository::new();
        let ada = repo.create_user(new_user("ada@example.com", 1)).await.unwrap();
        let bob = repo.create_user(new_user("bob@example.com", 1)).await.unwrap();

        let clash = repo.create_user(new_user("ADA@Example.com", 1)).await;
        assert!(matches!(clash, Err(RepoError::DuplicateEmail)));

        let steal = UserChanges {
            email: Some("Ada@Example.COM".to_string()),
            ..UserChanges::default()
        };
        assert!(matches!(
            repo.update_user(bob.id, steal).await,
            Err(RepoError::DuplicateEmail)
        ));

        // Re-casing one's own address is fine.
        let recase = UserChanges {
            email: Some("ADA@example.com".to_string()),
            ..UserChanges::default()
        };
        let updated = repo.update_user(ada.id, recase).await.unwrap().unwrap();
        assert_eq!(updated.email, "ADA@example.com");

        let err = crate::error::ApiError::from(RepoError::DuplicateEmail);
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Email already in use");
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let repo = InMemoryRepository::new();
        repo.set_unavailable(true);
        assert!(repo.count_users().await.is_err());
        repo.set_unavailable(false);
        assert_eq!(repo.count_users().await.unwrap(), 0);
    }
}
