use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;

use super::{visitor::VisitorSignals, ApiError, App, Envelope};
use crate::auth::{Admin, Member, Viewer};
use crate::model::{EngagementTotals, Page, PostFilter, Status};
use crate::tracker::{DailyAnalytics, LikeOutcome, PostPage, PostSummary, ViewOutcome, ViewerListing, Visitor};

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn router() -> Router<App> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/recent", get(recent))
        .route("/stats", get(stats))
        .route("/:id", get(summary).delete(remove))
        .route("/:id/view", post(record_view))
        .route("/:id/like", post(toggle_like))
        .route("/:id/viewers", get(viewers))
        .route("/:id/analytics", get(analytics))
}

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPosts {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub author: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[instrument(skip(app, admin), fields(author = %admin.0.user))]
async fn create(
    State(app): State<App>,
    admin: Admin,
    Json(payload): Json<CreatePost>,
) -> Result<(StatusCode, Json<Envelope<PostSummary>>), ApiError> {
    let Admin(identity) = admin;
    let post = app
        .engagement
        .create_post(&identity.user, &payload.title, payload.status, &payload.tags)
        .await?;

    Ok((StatusCode::CREATED, Json(Envelope::success(post))))
}

async fn list(State(app): State<App>, Query(query): Query<ListPosts>) -> Reply<PostPage> {
    let filter = PostFilter::new(query.author, query.tag, query.search);
    let page = Page::new(query.page, query.limit);

    let posts = app.engagement.list_posts(filter, page).await?;
    Ok(Json(Envelope::success(posts)))
}

async fn recent(State(app): State<App>, _admin: Admin) -> Reply<Vec<PostSummary>> {
    let posts = app.engagement.recent_posts().await?;
    Ok(Json(Envelope::success(posts)))
}

#[instrument(skip(app, admin), fields(by = %admin.0.user))]
async fn remove(State(app): State<App>, Path(id): Path<String>, admin: Admin) -> Reply<PostSummary> {
    let post = app.engagement.delete_post(&id).await?;
    Ok(Json(Envelope::success(post)))
}

async fn stats(State(app): State<App>, _admin: Admin) -> Reply<EngagementTotals> {
    let totals = app.engagement.totals().await?;
    Ok(Json(Envelope::success(totals)))
}

async fn summary(State(app): State<App>, Path(id): Path<String>) -> Reply<PostSummary> {
    let post = app.engagement.post_summary(&id).await?;
    Ok(Json(Envelope::success(post)))
}

/// Counts a view of the post. Administrators are answered with the current count and never counted.
#[instrument(skip(app, viewer, signals))]
async fn record_view(
    State(app): State<App>,
    Path(id): Path<String>,
    viewer: Viewer,
    signals: VisitorSignals,
) -> Reply<ViewOutcome> {
    let Viewer(identity) = viewer;

    if let Some(admin) = identity.as_ref().filter(|identity| identity.is_admin()) {
        tracing::debug!(user = %admin.user, "administrator visit is not counted");
        let outcome = app.engagement.peek_views(&id).await?;
        return Ok(Json(Envelope::success(outcome)));
    }

    let visitor = Visitor::new(identity.map(|identity| identity.user), signals.anon_token, signals.ip);
    let outcome = app.engagement.record_view(&id, visitor).await?;

    Ok(Json(Envelope::success(outcome)))
}

async fn toggle_like(State(app): State<App>, Path(id): Path<String>, Member(identity): Member) -> Reply<LikeOutcome> {
    let outcome = app.engagement.toggle_like(&id, &identity.user).await?;
    Ok(Json(Envelope::success(outcome)))
}

async fn viewers(State(app): State<App>, Path(id): Path<String>, _admin: Admin) -> Reply<ViewerListing> {
    let listing = app.engagement.list_viewers(&id).await?;
    Ok(Json(Envelope::success(listing)))
}

async fn analytics(State(app): State<App>, Path(id): Path<String>, _admin: Admin) -> Reply<DailyAnalytics> {
    let analytics = app.engagement.daily_views(&id).await?;
    Ok(Json(Envelope::success(analytics)))
}
