use serde::Deserialize;
use snafu::{Location, ResultExt, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;
use url::Url;

/// Helper trait for executing arbitrary SurrealQL queries.
pub mod query;

/// Typed record ids.
pub mod record;

/// Macros for defining tables.
pub mod macros;

pub use query::{Bindings, Sql};
pub use record::Record;
pub use surrealdb::sql::Thing;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

const SETUP: &str = include_str!("../../schema.surrealql");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{url}` at {location}: {source}"))]
    Connection {
        url: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to apply the database schema at {location}: {source}"))]
    Setup {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to query the database at {location}: {source}"))]
    MalformedQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to deserialize the database response at {location}: {source}"))]
    Deserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("expected a record to be written at {location}, but the database returned nothing"))]
    NothingWritten {
        #[snafu(implicit)]
        location: Location,
    },
}

/// Represents a document stored in its own table.
pub trait Table {
    /// Returns the id of the record.
    fn id(&self) -> &Thing;

    /// Returns the name of the table associated with the record.
    fn table() -> &'static str;
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "surreal_url")]
    pub url: Url,
    #[serde(rename = "surreal_ns", default = "default_scope")]
    pub namespace: String,
    #[serde(rename = "surreal_db", default = "default_scope")]
    pub database: String,
    #[serde(flatten)]
    pub credentials: Option<DatabaseCredentials>,
}

fn default_scope() -> String {
    "penview".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseCredentials {
    #[serde(rename = "surreal_user")]
    username: String,
    #[serde(rename = "surreal_pass")]
    password: String,
}

impl DatabaseCredentials {
    fn auth(&self) -> auth::Root<'_> {
        auth::Root {
            username: &self.username,
            password: &self.password,
        }
    }
}

/// Handle to the document store. Cheap to clone, every clone shares the same connection.
#[derive(Clone)]
pub struct Database {
    inner: Surreal<Any>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Connects to the configured database, signs in when credentials are configured and applies the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::open(
            config.url.as_str(),
            &config.namespace,
            &config.database,
            config.credentials.as_ref(),
        )
        .await
    }

    /// Opens a fresh in-memory database with the schema applied.
    pub async fn memory() -> Result<Self> {
        let scope = default_scope();
        Self::open("mem://", &scope, &scope, None).await
    }

    #[tracing::instrument(skip(credentials))]
    async fn open(
        url: &str,
        namespace: &str,
        database: &str,
        credentials: Option<&DatabaseCredentials>,
    ) -> Result<Self> {
        let inner = surrealdb::engine::any::connect(url)
            .await
            .context(ConnectionSnafu { url })?;

        if let Some(credentials) = credentials {
            inner
                .signin(credentials.auth())
                .await
                .context(ConnectionSnafu { url })?;
        }

        inner
            .use_ns(namespace)
            .use_db(database)
            .await
            .context(ConnectionSnafu { url })?;

        inner.query(SETUP).await.context(SetupSnafu)?.check().context(SetupSnafu)?;

        tracing::info!(namespace, database, "connected to the database");

        Ok(Database { inner })
    }
}

impl std::ops::Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
