use std::collections::HashMap;

use derive_new::new;
use itertools::Itertools;
use serde::Serialize;
use snafu::{ensure, Location, OptionExt, ResultExt, Snafu};
use tracing::instrument;

use crate::database::{Database, DatabaseError};
use crate::model::{DailyViews, EngagementTotals, Page, Post, PostFilter, Status, User, UserId};
use crate::time::{self, Timestamp};

pub use listing::*;
pub use view::*;

mod like;
mod listing;
mod view;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngagementError {
    #[snafu(display("post `{post_id}` does not exist"))]
    NotFound { post_id: String },

    #[snafu(display("`{value}` is not a valid post id"))]
    InvalidIdentifier { value: String },

    #[snafu(display("{reason}"))]
    InvalidInput { reason: String },

    #[snafu(display("could not access post storage at {location}: {source}"))]
    Persistence {
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = EngagementError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub likes: usize,
    pub liked_by: Vec<UserId>,
    pub liked: bool,
}

/// The public face of a post. Visitor data never leaves through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: UserId,
    pub status: Status,
    pub created_at: Timestamp,
    pub published_at: Option<Timestamp>,
    pub tags: Vec<String>,
    pub view_count: u64,
    pub likes: usize,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        PostSummary {
            id: post.id.key(),
            title: post.title.clone(),
            slug: post.slug.clone(),
            author: post.author.clone(),
            status: post.status,
            created_at: post.created_at,
            published_at: post.published_at,
            tags: post.tags.clone(),
            view_count: post.view_count,
            likes: post.likes.len(),
        }
    }
}

/// Number of posts returned by [Engagement::recent_posts].
pub const RECENT_POSTS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    pub results: usize,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyAnalytics {
    pub view_count: u64,
    pub days: Vec<DailyViews>,
}

/// Reads a post, applies one engagement operation to it and writes it back.
///
/// Every operation is a plain read-modify-write of the whole document. Two concurrent writers on
/// the same post race and the last write wins, which can under-count views during bursts.
#[derive(Debug, Clone, new)]
pub struct Engagement {
    database: Database,
    retention: Retention,
}

impl Engagement {
    #[instrument(skip(self), fields(counted))]
    pub async fn record_view(&self, post_id: &str, visitor: Visitor) -> Result<ViewOutcome> {
        let mut post = self.load(post_id).await?;

        let outcome = post.add_view(&visitor, time::now(), self.retention);
        tracing::Span::current().record("counted", outcome.counted);

        post.save(&self.database).await.context(PersistenceSnafu)?;

        tracing::info!(post.id = %post.id, view_count = outcome.view_count, counted = outcome.counted, "recorded view");
        Ok(outcome)
    }

    /// The current view count, reported as not counted. Used for visits that must never count.
    #[instrument(skip(self))]
    pub async fn peek_views(&self, post_id: &str) -> Result<ViewOutcome> {
        let post = self.load(post_id).await?;
        Ok(ViewOutcome::new(post.view_count, false))
    }

    #[instrument(skip(self))]
    pub async fn toggle_like(&self, post_id: &str, user: &UserId) -> Result<LikeOutcome> {
        let mut post = self.load(post_id).await?;

        let likes = post.toggle_like(user);
        post.save(&self.database).await.context(PersistenceSnafu)?;

        let liked = post.is_liked_by(user);
        tracing::info!(post.id = %post.id, %user, likes, liked, "toggled like");

        Ok(LikeOutcome {
            likes,
            liked_by: post.likes,
            liked,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_viewers(&self, post_id: &str) -> Result<ViewerListing> {
        let post = self.load(post_id).await?;

        let ids: Vec<UserId> = recent_viewers(&post)
            .filter_map(|record| record.user.clone())
            .unique()
            .collect();

        let mut users = HashMap::new();
        for id in ids {
            let account = User::find(&id, &self.database).await.context(PersistenceSnafu)?;

            match account {
                Some(account) => {
                    users.insert(id, account);
                }
                None => tracing::debug!(user = %id, "viewer account no longer exists"),
            }
        }

        Ok(viewer_listing(&post, &users))
    }

    #[instrument(skip(self))]
    pub async fn create_post(&self, author: &UserId, title: &str, status: Status, tags: &[String]) -> Result<PostSummary> {
        let title = title.trim();
        ensure!(
            !title.is_empty(),
            InvalidInputSnafu {
                reason: "a post must have a title"
            }
        );

        let post = Post::new(author.clone(), title, status, time::now()).with_tags(tags);
        let post = post.insert(&self.database).await.context(PersistenceSnafu)?;

        tracing::info!(post.id = %post.id, slug = %post.slug, "created post");
        Ok(PostSummary::from(&post))
    }

    #[instrument(skip(self))]
    pub async fn post_summary(&self, post_id: &str) -> Result<PostSummary> {
        let post = self.load(post_id).await?;
        Ok(PostSummary::from(&post))
    }

    #[instrument(skip(self))]
    pub async fn list_posts(&self, filter: PostFilter, page: Page) -> Result<PostPage> {
        let (posts, total) = Post::published(&filter, page, &self.database)
            .await
            .context(PersistenceSnafu)?;

        let posts: Vec<PostSummary> = posts.iter().map(PostSummary::from).collect();

        Ok(PostPage {
            results: posts.len(),
            posts,
            total,
            total_pages: page.count(total),
            current_page: page.number(),
        })
    }

    #[instrument(skip(self))]
    pub async fn recent_posts(&self) -> Result<Vec<PostSummary>> {
        let posts = Post::recent(RECENT_POSTS, &self.database)
            .await
            .context(PersistenceSnafu)?;

        Ok(posts.iter().map(PostSummary::from).collect())
    }

    /// Deletes the post. Its views, daily aggregates and likes live in the same document and go with it.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, post_id: &str) -> Result<PostSummary> {
        let key = parse_post_id(post_id)?;

        let post = Post::delete(&key, &self.database)
            .await
            .context(PersistenceSnafu)?
            .context(NotFoundSnafu { post_id })?;

        tracing::info!(post.id = %post.id, "deleted post");
        Ok(PostSummary::from(&post))
    }

    #[instrument(skip(self))]
    pub async fn daily_views(&self, post_id: &str) -> Result<DailyAnalytics> {
        let post = self.load(post_id).await?;

        Ok(DailyAnalytics {
            view_count: post.view_count,
            days: post.daily_views.into_iter().sorted_by_key(|day| day.date).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn totals(&self) -> Result<EngagementTotals> {
        Post::totals(&self.database).await.context(PersistenceSnafu)
    }

    async fn load(&self, post_id: &str) -> Result<Post> {
        let key = parse_post_id(post_id)?;

        Post::find(&key, &self.database)
            .await
            .context(PersistenceSnafu)?
            .context(NotFoundSnafu { post_id })
    }
}

/// Post ids are UUIDs. The canonical hyphenated form is the database key.
pub fn parse_post_id(raw: &str) -> Result<String> {
    let id = uuid::Uuid::parse_str(raw.trim())
        .ok()
        .context(InvalidIdentifierSnafu { value: raw })?;

    Ok(id.to_string())
}
