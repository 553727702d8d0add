use std::collections::BTreeMap;

use axum::{Json, extract::State};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiResult,
    models::{
        AdminDashboard, ScholarDashboard, ThesisDownloads, ThesisStatus, ThesisTally,
        ThesisViews, UserDashboard, WeeklyActivity, WeekdayTally,
    },
    repository::EventKind,
};

const TOP_COUNT: usize = 5;
const CATEGORY_KEYS: [&str; 4] = ["Total", "AI", "ML", "NLP"];
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn views(tallies: &[ThesisTally]) -> Vec<ThesisViews> {
    tallies
        .iter()
        .map(|t| ThesisViews {
            title: t.title.clone(),
            category: t.category.clone(),
            views: t.count,
        })
        .collect()
}

fn downloads(tallies: &[ThesisTally]) -> Vec<ThesisDownloads> {
    tallies
        .iter()
        .map(|t| ThesisDownloads {
            title: t.title.clone(),
            category: t.category.clone(),
            downloads: t.count,
        })
        .collect()
}

fn total(tallies: &[ThesisTally]) -> i64 {
    tallies.iter().map(|t| t.count).sum()
}

/// Sums tallies per category. `Total`, `AI`, `ML` and `NLP` are always present.
fn by_category(tallies: &[ThesisTally]) -> BTreeMap<String, i64> {
    let mut out: BTreeMap<String, i64> = CATEGORY_KEYS
        .iter()
        .map(|k| (k.to_string(), 0))
        .collect();
    for t in tallies {
        *out.entry(t.category.clone()).or_insert(0) += t.count;
        *out.entry("Total".to_string()).or_insert(0) += t.count;
    }
    out
}

fn on_day(tallies: &[WeekdayTally], day: i32) -> i64 {
    tallies
        .iter()
        .filter(|t| t.iso_day == day)
        .map(|t| t.count)
        .sum()
}

fn weekly(views: &[WeekdayTally], downloads: &[WeekdayTally]) -> Vec<WeeklyActivity> {
    WEEKDAYS
        .iter()
        .zip(1..)
        .map(|(name, day)| WeeklyActivity {
            day: name.to_string(),
            views: on_day(views, day),
            downloads: on_day(downloads, day),
        })
        .collect()
}

/// admin_dashboard
///
/// [Gated Route: VIEW_ADMIN_DASHBOARD] Site-wide totals, per-thesis counts and the top five.
#[utoipa::path(
    get,
    path = "/dashboard/admin",
    responses((status = 200, description = "Stats", body = AdminDashboard))
)]
pub async fn admin_dashboard(State(state): State<AppState>) -> ApiResult<Json<AdminDashboard>> {
    let pending = ThesisStatus::Pending.as_str();
    let view_tallies = state.repo.event_tallies(EventKind::View, None).await?;
    let download_tallies = state.repo.event_tallies(EventKind::Download, None).await?;

    let total_views_by_thesis = views(&view_tallies);
    let total_downloads_by_thesis = downloads(&download_tallies);

    Ok(Json(AdminDashboard {
        total_users: state.repo.count_users().await?,
        total_theses: state.repo.count_theses(None, None).await?,
        under_review_theses: state.repo.count_theses(None, Some(pending)).await?,
        total_views: total(&view_tallies),
        total_downloads: total(&download_tallies),
        most_viewed_theses: total_views_by_thesis.iter().take(TOP_COUNT).cloned().collect(),
        most_downloaded_theses: total_downloads_by_thesis
            .iter()
            .take(TOP_COUNT)
            .cloned()
            .collect(),
        total_views_by_thesis,
        total_downloads_by_thesis,
    }))
}

/// scholar_dashboard
///
/// [Gated Route: VIEW_SCHOLAR_DASHBOARD] Totals, per-category breakdowns and
/// the last seven days of activity by weekday.
#[utoipa::path(
    get,
    path = "/dashboard/scholar",
    responses((status = 200, description = "Stats", body = ScholarDashboard))
)]
pub async fn scholar_dashboard(State(state): State<AppState>) -> ApiResult<Json<ScholarDashboard>> {
    let pending = ThesisStatus::Pending.as_str();
    let view_tallies = state.repo.event_tallies(EventKind::View, None).await?;
    let download_tallies = state.repo.event_tallies(EventKind::Download, None).await?;

    let since = Utc::now() - Duration::days(7);
    let weekly_views = state.repo.weekday_tallies(EventKind::View, since).await?;
    let weekly_downloads = state
        .repo
        .weekday_tallies(EventKind::Download, since)
        .await?;

    Ok(Json(ScholarDashboard {
        total_users: state.repo.count_users().await?,
        total_theses: state.repo.count_theses(None, None).await?,
        under_review_theses: state.repo.count_theses(None, Some(pending)).await?,
        total_views: total(&view_tallies),
        total_downloads: total(&download_tallies),
        views_by_category: by_category(&view_tallies),
        downloads_by_category: by_category(&download_tallies),
        weekly_data: weekly(&weekly_views, &weekly_downloads),
    }))
}

/// user_dashboard
///
/// [Authenticated Route] The admin aggregates restricted to the caller's own theses.
#[utoipa::path(
    get,
    path = "/dashboard/user",
    responses((status = 200, description = "Stats", body = UserDashboard))
)]
pub async fn user_dashboard(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<UserDashboard>> {
    let pending = ThesisStatus::Pending.as_str();
    let view_tallies = state.repo.event_tallies(EventKind::View, Some(id)).await?;
    let download_tallies = state
        .repo
        .event_tallies(EventKind::Download, Some(id))
        .await?;

    let by_thesis_views = views(&view_tallies);
    let by_thesis_downloads = downloads(&download_tallies);

    Ok(Json(UserDashboard {
        total_user_theses: state.repo.count_theses(Some(id), None).await?,
        under_review_user_theses: state.repo.count_theses(Some(id), Some(pending)).await?,
        total_views: total(&view_tallies),
        total_downloads: total(&download_tallies),
        most_viewed_theses: by_thesis_views.iter().take(TOP_COUNT).cloned().collect(),
        most_downloaded_theses: by_thesis_downloads.iter().take(TOP_COUNT).cloned().collect(),
        total_views_by_user_thesis: by_thesis_views,
        total_downloads_by_user_thesis: by_thesis_downloads,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(category: &str, count: i64) -> ThesisTally {
        ThesisTally {
            thesis_id: 1,
            title: "t".to_string(),
            category: category.to_string(),
            count,
        }
    }

    #[test]
    fn category_map_always_has_fixed_keys() {
        let map = by_category(&[tally("AI", 3), tally("Biology", 2)]);
        assert_eq!(map["Total"], 5);
        assert_eq!(map["AI"], 3);
        assert_eq!(map["ML"], 0);
        assert_eq!(map["NLP"], 0);
        assert_eq!(map["Biology"], 2);
    }

    #[test]
    fn weekly_series_runs_monday_to_sunday() {
        let series = weekly(
            &[WeekdayTally { iso_day: 1, count: 4 }],
            &[WeekdayTally { iso_day: 7, count: 2 }],
        );
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].day, "Monday");
        assert_eq!(series[0].views, 4);
        assert_eq!(series[6].day, "Sunday");
        assert_eq!(series[6].downloads, 2);
    }
}
