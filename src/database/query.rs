use derive_new::new;
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use surrealdb::opt::QueryResult;

use super::{Database, DeserializeSnafu, MalformedQuerySnafu, Result};

/// An extension trait that allows you to execute raw SurrealQL. Parameters can be bound using the [Bindings::bind] method which takes any serializable data structure.
///
/// # Example
/// ```ignore
/// let published: Vec<Post> = database.sql("SELECT * FROM posts WHERE status = $status")
///     .bind(("status", "published"))
///     .fetch_first()
///     .await?;
/// ```
pub trait Sql {
    fn sql(&self, query: &str) -> Bindings<'_>;
}

impl Sql for Database {
    fn sql(&self, query: &str) -> Bindings<'_> {
        Bindings::new(self.query(query.to_owned()))
    }
}

#[derive(Debug, new)]
pub struct Bindings<'a> {
    query: surrealdb::method::Query<'a, surrealdb::engine::any::Any>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and return a [surrealdb::Response] which holds the result of every statement.
    pub async fn execute(self) -> Result<surrealdb::Response> {
        let response = self.query.await.context(MalformedQuerySnafu)?;
        tracing::debug!(?response, "executed query");
        Ok(response)
    }

    /// Execute the query and return the result of the first statement as a deserialized value.
    pub async fn fetch_first<T: DeserializeOwned>(self) -> Result<T>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        let result = statements.take::<T>(0).context(DeserializeSnafu)?;
        Ok(result)
    }
}
