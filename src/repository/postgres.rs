use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};

use super::{
    EventKind, NewEnquiry, NewGuideline, NewPeerReview, NewThesis, NewUser, Page,
    PeerReviewChanges, RepoError, RepoResult, Repository, ThesisChanges, ThesisFilter, ThesisOrder,
    UserChanges, VoteOutcome,
};
use crate::models::{
    Comment, CommentDetail, ConversationEntry, ConversationPartner, DirectMessage, Enquiry,
    Guideline, GuidelineDetail, HistoryEntry, Notification, NotificationDetail, PeerReview,
    PeerReviewDetail, Person, Role, Thesis, ThesisDetail, ThesisStatus, ThesisTally, User,
    VoteType, WeekdayTally,
};

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. The schema lives in
/// `migrations/` and is applied at startup.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the people referenced by a batch of rows in one round trip.
    async fn people(&self, ids: Vec<i64>) -> RepoResult<HashMap<i64, Person>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, Person>(
            "SELECT id, username, email, firstname, lastname, profile_pic FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }
}

/// Maps the `users_email_lower_key` unique violation to `DuplicateEmail`.
fn email_conflict(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::DuplicateEmail,
        _ => RepoError::Database(e),
    }
}

fn event_table(kind: EventKind) -> (&'static str, &'static str) {
    match kind {
        EventKind::View => ("thesis_views", "views_count"),
        EventKind::Download => ("thesis_downloads", "downloads_count"),
    }
}

/// Wraps user text in `%…%`, escaping `%`, `_` and `\` so they match literally.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Pushes `<column> ILIKE <pattern> ESCAPE '\'`.
fn push_ilike(builder: &mut QueryBuilder<'_, Postgres>, column: &str, pattern: &str) {
    builder.push(column);
    builder.push(" ILIKE ");
    builder.push_bind(pattern.to_string());
    builder.push(r" ESCAPE '\'");
}

/// Appends the `WHERE` clauses for a thesis search. Expects `t` (theses) and
/// `a` (author) in scope.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ThesisFilter) {
    builder.push(" WHERE TRUE");

    if let Some(text) = filter.text.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(text);
        builder.push(" AND (");
        push_ilike(builder, "t.title", &pattern);
        builder.push(" OR ");
        push_ilike(builder, "t.category", &pattern);
        builder.push(" OR ");
        push_ilike(builder, "a.firstname", &pattern);
        builder.push(" OR ");
        push_ilike(builder, "a.lastname", &pattern);
        builder.push(" OR ");
        push_ilike(builder, "a.username", &pattern);
        builder.push(" OR EXISTS (SELECT 1 FROM unnest(t.keywords) k WHERE ");
        push_ilike(builder, "k", &pattern);
        builder.push("))");
    }

    if let Some(title) = filter.title.as_deref().filter(|s| !s.trim().is_empty()) {
        builder.push(" AND ");
        push_ilike(builder, "t.title", &like_pattern(title));
    }

    match filter.author_terms() {
        Some((first, Some(last))) => {
            builder.push(" AND ");
            push_ilike(builder, "a.firstname", &like_pattern(&first));
            builder.push(" AND ");
            push_ilike(builder, "a.lastname", &like_pattern(&last));
        }
        Some((word, None)) => {
            let pattern = like_pattern(&word);
            builder.push(" AND (");
            push_ilike(builder, "a.firstname", &pattern);
            builder.push(" OR ");
            push_ilike(builder, "a.lastname", &pattern);
            builder.push(")");
        }
        None => {}
    }

    if let Some(category) = filter.category.as_deref().filter(|s| !s.trim().is_empty()) {
        builder.push(" AND ");
        push_ilike(builder, "t.category", &like_pattern(category));
    }

    if !filter.keywords.is_empty() {
        let wanted: Vec<String> = filter.keywords.iter().map(|k| k.to_lowercase()).collect();
        builder.push(" AND EXISTS (SELECT 1 FROM unnest(t.keywords) k WHERE lower(k) = ANY(");
        builder.push_bind(wanted);
        builder.push("))");
    }

    if let Some(from) = filter.created_from {
        builder.push(" AND t.created_at >= ");
        builder.push_bind(from);
    }
    if let Some(before) = filter.created_before {
        builder.push(" AND t.created_at < ");
        builder.push_bind(before);
    }
    if let Some(status) = &filter.status {
        builder.push(" AND t.status = ");
        builder.push_bind(status.clone());
    }
    if let Some(author_id) = filter.author_id {
        builder.push(" AND t.author_id = ");
        builder.push_bind(author_id);
    }
}

#[derive(FromRow)]
struct CommentRow {
    #[sqlx(flatten)]
    comment: Comment,
    username: String,
    email: String,
    firstname: String,
    lastname: String,
    profile_pic: Option<String>,
}

#[derive(FromRow)]
struct PeerReviewRow {
    #[sqlx(flatten)]
    review: PeerReview,
    thesis_title: Option<String>,
    reviewer_email: Option<String>,
}

#[derive(FromRow)]
struct GuidelineRow {
    #[sqlx(flatten)]
    guideline: Guideline,
    added_by: Option<String>,
}

#[derive(FromRow)]
struct ConversationRow {
    #[sqlx(flatten)]
    message: DirectMessage,
    sender_username: String,
    receiver_username: String,
}

#[derive(FromRow)]
struct PartnerRow {
    partner_id: i64,
    username: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users & Roles ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (username, email, password_hash, role_id, firstname, lastname,
                 gender, dob, phone, address, profile_pic)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role_id)
        .bind(user.firstname)
        .bind(user.lastname)
        .bind(user.gender)
        .bind(user.dob)
        .bind(user.phone)
        .bind(user.address)
        .bind(user.profile_pic)
        .fetch_one(&self.pool)
        .await
        .map_err(email_conflict)?;
        Ok(created)
    }

    /// update_user
    ///
    /// COALESCE keeps every column the caller did not supply.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                firstname = COALESCE($3, firstname),
                lastname = COALESCE($4, lastname),
                gender = COALESCE($5, gender),
                dob = COALESCE($6, dob),
                phone = COALESCE($7, phone),
                address = COALESCE($8, address),
                profile_pic = COALESCE($9, profile_pic),
                role_id = COALESCE($10, role_id),
                password_hash = COALESCE($11, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.firstname)
        .bind(changes.lastname)
        .bind(changes.gender)
        .bind(changes.dob)
        .bind(changes.phone)
        .bind(changes.address)
        .bind(changes.profile_pic)
        .bind(changes.role_id)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(email_conflict)?;
        Ok(updated)
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        // Dependent rows go through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, role_name FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, role_name FROM roles WHERE role_name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn role_permissions(&self, role_id: i64) -> RepoResult<Option<Vec<String>>> {
        let permissions = sqlx::query_scalar::<_, Vec<String>>(
            "SELECT permission FROM permissions WHERE role_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permissions)
    }

    // --- Verification & Reset Tokens ---

    async fn set_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> RepoResult<()> {
        sqlx::query(
            "UPDATE users SET verification_token = $2, verification_token_expires = $3, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_verification_token(&self, token: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE verification_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn mark_email_verified(&self, user_id: i64) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email_verified = now(),
                verified = TRUE,
                verification_token = NULL,
                verification_token_expires = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> RepoResult<()> {
        sqlx::query(
            "UPDATE users SET reset_token = $2, reset_token_expires = $3, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_reset_token(&self, token: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE reset_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn reset_password(&self, user_id: i64, password_hash: &str) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                reset_token = NULL,
                reset_token_expires = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Theses ---

    async fn create_thesis(&self, thesis: NewThesis) -> RepoResult<Thesis> {
        let created = sqlx::query_as::<_, Thesis>(
            r#"
            INSERT INTO theses (title, abstract, keywords, category, document_url, status, author_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(thesis.title)
        .bind(thesis.abstract_text)
        .bind(thesis.keywords)
        .bind(thesis.category)
        .bind(thesis.document_url)
        .bind(ThesisStatus::Pending.as_str())
        .bind(thesis.author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_thesis(&self, id: i64) -> RepoResult<Option<Thesis>> {
        let thesis = sqlx::query_as::<_, Thesis>("SELECT * FROM theses WHERE thesis_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(thesis)
    }

    async fn update_thesis(&self, id: i64, changes: ThesisChanges) -> RepoResult<Option<Thesis>> {
        let updated = sqlx::query_as::<_, Thesis>(
            r#"
            UPDATE theses SET
                title = COALESCE($2, title),
                abstract = COALESCE($3, abstract),
                keywords = COALESCE($4, keywords),
                category = COALESCE($5, category),
                status = COALESCE($6, status),
                document_url = COALESCE($7, document_url),
                reviewer_id = COALESCE($8, reviewer_id),
                updated_at = now()
            WHERE thesis_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.abstract_text)
        .bind(changes.keywords)
        .bind(changes.category)
        .bind(changes.status)
        .bind(changes.document_url)
        .bind(changes.reviewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    /// delete_thesis
    ///
    /// Dependents are removed explicitly inside one transaction so a failure
    /// part-way leaves nothing half-deleted.
    async fn delete_thesis(&self, id: i64) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "thesis_views",
            "thesis_downloads",
            "thesis_comments",
            "peer_messages",
            "thesis_votes",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE thesis_id = $1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let result = sqlx::query("DELETE FROM theses WHERE thesis_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_theses(
        &self,
        filter: &ThesisFilter,
        order: ThesisOrder,
        page: Option<Page>,
    ) -> RepoResult<(Vec<ThesisDetail>, i64)> {
        let mut count_query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM theses t JOIN users a ON a.id = t.author_id",
        );
        push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT t.* FROM theses t JOIN users a ON a.id = t.author_id");
        push_filter(&mut query, filter);
        query.push(match order {
            ThesisOrder::Newest => " ORDER BY t.created_at DESC, t.thesis_id DESC",
            ThesisOrder::MostUpvoted => " ORDER BY t.upvotes DESC, t.created_at DESC",
        });
        if let Some(page) = page {
            query.push(" LIMIT ");
            query.push_bind(page.limit);
            query.push(" OFFSET ");
            query.push_bind(page.offset);
        }
        let theses: Vec<Thesis> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut ids: Vec<i64> = theses
            .iter()
            .flat_map(|t| std::iter::once(t.author_id).chain(t.reviewer_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let people = self.people(ids).await?;

        let details = theses
            .into_iter()
            .map(|thesis| ThesisDetail {
                author: people.get(&thesis.author_id).cloned(),
                reviewer: thesis.reviewer_id.and_then(|id| people.get(&id).cloned()),
                thesis,
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
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT thesis_id FROM theses WHERE thesis_id = $1 FOR UPDATE",
        )
        .bind(thesis_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT vote_type FROM thesis_votes WHERE thesis_id = $1 AND user_id = $2",
        )
        .bind(thesis_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (outcome, up, down) = match (previous.as_deref().and_then(VoteType::parse), vote) {
            (Some(prev), _) if prev == vote => return Ok(Some(VoteOutcome::Unchanged)),
            (Some(_), VoteType::Upvote) => (VoteOutcome::Changed, 1, -1),
            (Some(_), VoteType::Downvote) => (VoteOutcome::Changed, -1, 1),
            (None, VoteType::Upvote) => (VoteOutcome::Registered, 1, 0),
            (None, VoteType::Downvote) => (VoteOutcome::Registered, 0, 1),
        };

        sqlx::query(
            r#"
            INSERT INTO thesis_votes (thesis_id, user_id, vote_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (thesis_id, user_id)
            DO UPDATE SET vote_type = EXCLUDED.vote_type, updated_at = now()
            "#,
        )
        .bind(thesis_id)
        .bind(user_id)
        .bind(vote.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE theses SET
                upvotes = GREATEST(upvotes + $2, 0),
                downvotes = GREATEST(downvotes + $3, 0)
            WHERE thesis_id = $1
            "#,
        )
        .bind(thesis_id)
        .bind(up)
        .bind(down)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(outcome))
    }

    async fn track_event(
        &self,
        kind: EventKind,
        thesis_id: i64,
        ip: &str,
    ) -> RepoResult<Option<i64>> {
        let (table, counter) = event_table(kind);
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, i32>(&format!(
            "SELECT {counter} FROM theses WHERE thesis_id = $1 FOR UPDATE"
        ))
        .bind(thesis_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };

        let seen_recently = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {table} WHERE thesis_id = $1 AND ip_address = $2 AND created_at > now() - INTERVAL '24 hours')"
        ))
        .bind(thesis_id)
        .bind(ip)
        .fetch_one(&mut *tx)
        .await?;
        if seen_recently {
            return Ok(Some(i64::from(current)));
        }

        sqlx::query(&format!(
            "INSERT INTO {table} (thesis_id, ip_address) VALUES ($1, $2)"
        ))
        .bind(thesis_id)
        .bind(ip)
        .execute(&mut *tx)
        .await?;
        let updated = sqlx::query_scalar::<_, i32>(&format!(
            "UPDATE theses SET {counter} = {counter} + 1 WHERE thesis_id = $1 RETURNING {counter}"
        ))
        .bind(thesis_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(i64::from(updated)))
    }

    // --- Comments ---

    async fn list_comments(&self, thesis_id: i64) -> RepoResult<Vec<CommentDetail>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.*, u.username, u.email, u.firstname, u.lastname, u.profile_pic
            FROM thesis_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.thesis_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(thesis_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| CommentDetail {
                author: Some(Person {
                    id: r.comment.user_id,
                    username: r.username,
                    email: r.email,
                    firstname: r.firstname,
                    lastname: r.lastname,
                    profile_pic: r.profile_pic,
                }),
                comment: r.comment,
            })
            .collect())
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM thesis_comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn create_comment(
        &self,
        thesis_id: i64,
        user_id: i64,
        content: &str,
    ) -> RepoResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO thesis_comments (thesis_id, user_id, message_content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(thesis_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "UPDATE thesis_comments SET message_content = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM thesis_comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Peer Reviews ---

    async fn list_peer_reviews(&self) -> RepoResult<Vec<PeerReviewDetail>> {
        let rows = sqlx::query_as::<_, PeerReviewRow>(
            r#"
            SELECT p.*, t.title AS thesis_title, u.email AS reviewer_email
            FROM peer_messages p
            LEFT JOIN theses t ON t.thesis_id = p.thesis_id
            LEFT JOIN users u ON u.id = p.reviewer_id
            ORDER BY p.review_date DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| PeerReviewDetail {
                review: r.review,
                thesis_title: r.thesis_title,
                reviewer_email: r.reviewer_email,
            })
            .collect())
    }

    async fn create_peer_review(&self, review: NewPeerReview) -> RepoResult<PeerReview> {
        let created = sqlx::query_as::<_, PeerReview>(
            r#"
            INSERT INTO peer_messages (title, review, review_date, status, thesis_id, reviewer_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(review.title)
        .bind(review.review)
        .bind(review.review_date)
        .bind(review.status)
        .bind(review.thesis_id)
        .bind(review.reviewer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_peer_review(
        &self,
        id: i64,
        changes: PeerReviewChanges,
    ) -> RepoResult<Option<PeerReview>> {
        let updated = sqlx::query_as::<_, PeerReview>(
            r#"
            UPDATE peer_messages SET
                title = COALESCE($2, title),
                review = COALESCE($3, review),
                review_date = COALESCE($4, review_date),
                status = COALESCE($5, status),
                reviewer_id = $6,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.review)
        .bind(changes.review_date)
        .bind(changes.status)
        .bind(changes.reviewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_peer_review(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM peer_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Guidelines ---

    async fn list_guidelines(&self) -> RepoResult<Vec<GuidelineDetail>> {
        let rows = sqlx::query_as::<_, GuidelineRow>(
            r#"
            SELECT g.*, u.username AS added_by
            FROM guidelines g
            LEFT JOIN users u ON u.id = g.user_id
            ORDER BY g.created_at DESC, g.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| GuidelineDetail {
                guideline: r.guideline,
                added_by: r.added_by,
            })
            .collect())
    }

    async fn get_guideline_by_title(&self, title: &str) -> RepoResult<Option<Guideline>> {
        let guideline = sqlx::query_as::<_, Guideline>("SELECT * FROM guidelines WHERE title = $1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(guideline)
    }

    async fn create_guideline(&self, guideline: NewGuideline) -> RepoResult<Guideline> {
        let created = sqlx::query_as::<_, Guideline>(
            "INSERT INTO guidelines (title, description, file_url, user_id) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(guideline.title)
        .bind(guideline.description)
        .bind(guideline.file_url)
        .bind(guideline.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_guideline(
        &self,
        id: i64,
        title: &str,
        description: &str,
        file_url: Option<&str>,
    ) -> RepoResult<Option<Guideline>> {
        let updated = sqlx::query_as::<_, Guideline>(
            r#"
            UPDATE guidelines SET title = $2, description = $3, file_url = $4, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(file_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_guideline(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM guidelines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Notifications ---

    async fn list_notifications(&self, user_id: i64) -> RepoResult<Vec<NotificationDetail>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let people = self.people(vec![user_id]).await?;
        Ok(notifications
            .into_iter()
            .map(|notification| NotificationDetail {
                user: people.get(&notification.user_id).cloned(),
                notification,
            })
            .collect())
    }

    async fn create_notification(&self, user_id: i64, message: &str) -> RepoResult<Notification> {
        let created = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, message) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: i64,
    ) -> RepoResult<Option<Notification>> {
        let updated = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET read = TRUE, updated_at = now() WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_notification(&self, id: i64, user_id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Chat ---

    async fn send_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> RepoResult<DirectMessage> {
        let message = sqlx::query_as::<_, DirectMessage>(
            "INSERT INTO messages (sender_id, receiver_id, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn conversation(&self, user_id: i64, other_id: i64) -> RepoResult<Vec<ConversationEntry>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT m.*, s.username AS sender_username, r.username AS receiver_username
            FROM messages m
            JOIN users s ON s.id = m.sender_id
            JOIN users r ON r.id = m.receiver_id
            WHERE (m.sender_id = $1 AND m.receiver_id = $2)
               OR (m.sender_id = $2 AND m.receiver_id = $1)
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ConversationEntry {
                message: r.message,
                sender_username: r.sender_username,
                receiver_username: r.receiver_username,
            })
            .collect())
    }

    async fn conversation_partners(&self, user_id: i64) -> RepoResult<Vec<ConversationPartner>> {
        let rows = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT DISTINCT ON (x.partner_id)
                x.partner_id, u.username, x.content, x.created_at
            FROM (
                SELECT
                    CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id,
                    content, created_at, id
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
            ) x
            JOIN users u ON u.id = x.partner_id
            ORDER BY x.partner_id, x.created_at DESC, x.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut partners: Vec<ConversationPartner> = rows
            .into_iter()
            .map(|r| ConversationPartner {
                user_id: r.partner_id,
                username: r.username,
                last_message: r.content,
                timestamp: r.created_at,
            })
            .collect();
        partners.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(partners)
    }

    // --- Audit Trail ---

    async fn record_history(
        &self,
        user_id: i64,
        action: &str,
        description: &str,
    ) -> RepoResult<()> {
        sqlx::query("INSERT INTO history (user_id, action, description) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(action)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_history(&self, limit: i64) -> RepoResult<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            "SELECT * FROM history ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // --- Enquiries ---

    async fn list_enquiries(&self) -> RepoResult<Vec<Enquiry>> {
        let enquiries = sqlx::query_as::<_, Enquiry>(
            "SELECT * FROM enquiries ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(enquiries)
    }

    async fn create_enquiry(&self, enquiry: NewEnquiry) -> RepoResult<Enquiry> {
        let created = sqlx::query_as::<_, Enquiry>(
            "INSERT INTO enquiries (name, email, subject, message) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(enquiry.name)
        .bind(enquiry.email)
        .bind(enquiry.subject)
        .bind(enquiry.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    // --- Statistics ---

    async fn count_users(&self) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_theses(&self, author_id: Option<i64>, status: Option<&str>) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM theses
            WHERE ($1::BIGINT IS NULL OR author_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            "#,
        )
        .bind(author_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn event_tallies(
        &self,
        kind: EventKind,
        author_id: Option<i64>,
    ) -> RepoResult<Vec<ThesisTally>> {
        let (table, _) = event_table(kind);
        let tallies = sqlx::query_as::<_, ThesisTally>(&format!(
            r#"
            SELECT t.thesis_id, t.title, t.category, COUNT(e.id) AS count
            FROM {table} e
            JOIN theses t ON t.thesis_id = e.thesis_id
            WHERE ($1::BIGINT IS NULL OR t.author_id = $1)
            GROUP BY t.thesis_id, t.title, t.category
            ORDER BY count DESC, t.thesis_id
            "#
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tallies)
    }

    async fn weekday_tallies(
        &self,
        kind: EventKind,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<WeekdayTally>> {
        let (table, _) = event_table(kind);
        let tallies = sqlx::query_as::<_, WeekdayTally>(&format!(
            r#"
            SELECT EXTRACT(ISODOW FROM created_at AT TIME ZONE 'UTC')::INT AS iso_day, COUNT(*) AS count
            FROM {table}
            WHERE created_at >= $1
            GROUP BY 1
            ORDER BY 1
            "#
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(tallies)
    }
}
