use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use super::UserId;
use crate::database::{self, Bindings, Database, MalformedQuerySnafu, NothingWrittenSnafu, Record, Sql, Table};
use crate::table;
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
}

/// A blog post together with all the engagement data collected for it.
///
/// The engagement fields are only ever changed through [Post::add_view] and [Post::toggle_like].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Post {
    pub id: Record<Post>,
    pub title: String,
    pub slug: String,
    pub author: UserId,
    #[serde(default)]
    pub status: Status,
    pub created_at: Timestamp,
    #[serde(default)]
    pub published_at: Option<Timestamp>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub view_count: u64,
    /// Recent visitors, oldest first.
    #[serde(default)]
    pub viewed_by: Vec<ViewerRecord>,
    #[serde(default)]
    pub daily_views: Vec<DailyViews>,
    #[serde(default)]
    pub likes: Vec<UserId>,
}

table!("posts" : Post = id);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewerRecord {
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub anon_token: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    pub last_seen: Timestamp,
}

/// Number of counted views on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub count: u64,
}

impl Post {
    pub fn new(author: UserId, title: impl Into<String>, status: Status, now: Timestamp) -> Self {
        let title = title.into();
        let slug = slugify(&title);

        Post {
            id: Record::uuid(),
            title,
            slug,
            author,
            status,
            created_at: now,
            published_at: (status == Status::Published).then_some(now),
            tags: Vec::new(),
            view_count: 0,
            viewed_by: Vec::new(),
            daily_views: Vec::new(),
            likes: Vec::new(),
        }
    }

    /// Replaces the tags, lowercased and trimmed. Blank and repeated tags are dropped.
    pub fn with_tags<S: AsRef<str>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .unique()
            .collect();
        self
    }
}

/// Lowercases the title and joins every run of alphanumeric characters with a single `-`.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

impl Post {
    #[tracing::instrument(skip(db))]
    pub async fn find(key: &str, db: &Database) -> database::Result<Option<Post>> {
        db.select((Post::table(), key))
            .await
            .context(MalformedQuerySnafu)
    }

    /// Writes the whole document back, replacing what is stored.
    #[tracing::instrument(skip_all, fields(post.id = %self.id))]
    pub async fn save(&self, db: &Database) -> database::Result<()> {
        let saved: Option<Post> = db
            .update(self.id.resource())
            .content(self)
            .await
            .context(MalformedQuerySnafu)?;

        saved.context(NothingWrittenSnafu)?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(post.id = %self.id))]
    pub async fn insert(&self, db: &Database) -> database::Result<Post> {
        let created: Option<Post> = db
            .create(self.id.resource())
            .content(self)
            .await
            .context(MalformedQuerySnafu)?;

        created.context(NothingWrittenSnafu)
    }

    /// Removes the post together with its engagement data. `None` when it did not exist.
    #[tracing::instrument(skip(db))]
    pub async fn delete(key: &str, db: &Database) -> database::Result<Option<Post>> {
        db.delete((Post::table(), key))
            .await
            .context(MalformedQuerySnafu)
    }

    /// One page of published posts matching `filter`, newest publication first, and the number of
    /// matching posts over all pages.
    #[tracing::instrument(skip(db))]
    pub async fn published(filter: &PostFilter, page: Page, db: &Database) -> database::Result<(Vec<Post>, u64)> {
        let condition = filter.condition();

        let posts: Vec<Post> = filter
            .bind(db.sql(&format!(
                "SELECT *, <datetime> published_at AS published FROM posts WHERE {condition} \
                 ORDER BY published DESC LIMIT $limit START $start"
            )))
            .bind(("limit", page.size()))
            .bind(("start", page.start()))
            .fetch_first()
            .await?;

        let matching: Option<Matching> = filter
            .bind(db.sql(&format!("SELECT count() AS total FROM posts WHERE {condition} GROUP ALL")))
            .fetch_first()
            .await?;

        Ok((posts, matching.map_or(0, |matching| matching.total)))
    }

    /// The `limit` most recently created posts of any status, newest first.
    pub async fn recent(limit: u64, db: &Database) -> database::Result<Vec<Post>> {
        db.sql("SELECT *, <datetime> created_at AS created FROM posts ORDER BY created DESC LIMIT $limit")
            .bind(("limit", limit))
            .fetch_first()
            .await
    }

    pub async fn totals(db: &Database) -> database::Result<EngagementTotals> {
        let counters: Vec<Counters> = db
            .sql("SELECT view_count, array::len(likes) AS likes FROM posts")
            .fetch_first()
            .await?;

        let totals = counters.iter().fold(EngagementTotals::default(), |totals, post| EngagementTotals {
            posts: totals.posts + 1,
            views: totals.views + post.view_count,
            likes: totals.likes + post.likes,
        });

        Ok(totals)
    }
}

#[derive(Debug, Deserialize)]
struct Counters {
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    likes: u64,
}

#[derive(Debug, Deserialize)]
struct Matching {
    total: u64,
}

/// Narrows the listing of published posts. Absent fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    author: Option<UserId>,
    tag: Option<String>,
    search: Option<String>,
}

impl PostFilter {
    /// Builds a filter, ignoring blank values. Tags and search terms match case-insensitively.
    pub fn new(author: Option<String>, tag: Option<String>, search: Option<String>) -> Self {
        let given = |value: Option<String>| value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        PostFilter {
            author: given(author).map(UserId::from),
            tag: given(tag).map(|tag| tag.to_lowercase()),
            search: given(search).map(|search| search.to_lowercase()),
        }
    }

    fn condition(&self) -> String {
        let mut clauses = vec!["status = 'published'"];

        if self.author.is_some() {
            clauses.push("author = $author");
        }
        if self.tag.is_some() {
            clauses.push("tags CONTAINS $tag");
        }
        if self.search.is_some() {
            clauses.push("string::contains(string::lowercase(title), $search)");
        }

        clauses.join(" AND ")
    }

    fn bind<'a>(&self, mut query: Bindings<'a>) -> Bindings<'a> {
        if let Some(author) = &self.author {
            query = query.bind(("author", author.as_str()));
        }
        if let Some(tag) = &self.tag {
            query = query.bind(("tag", tag.as_str()));
        }
        if let Some(search) = &self.search {
            query = query.bind(("search", search.as_str()));
        }
        query
    }
}

/// A page of a listing. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u64,
    size: u64,
}

impl Page {
    pub const DEFAULT_SIZE: u64 = 10;
    pub const MAX_SIZE: u64 = 50;

    /// Missing values take the defaults, out of range values are clamped.
    pub fn new(number: Option<u64>, size: Option<u64>) -> Self {
        Page {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(Self::DEFAULT_SIZE).clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn number(self) -> u64 {
        self.number
    }

    pub fn size(self) -> u64 {
        self.size
    }

    /// Number of records skipped before this page.
    pub fn start(self) -> u64 {
        (self.number - 1).saturating_mul(self.size)
    }

    pub fn count(self, total: u64) -> u64 {
        total.div_ceil(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// Engagement summed over every post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngagementTotals {
    #[serde(default)]
    pub posts: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
}
