use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::database::{self, Database, MalformedQuerySnafu, Record, Table};
use crate::table;

/// The key of a registered account, as carried in bearer tokens and stored in likes and viewer records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: Record<User>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

table!("users" : User = id);

impl User {
    pub fn user_id(&self) -> UserId {
        UserId(self.id.key())
    }

    pub async fn find(id: &UserId, db: &Database) -> database::Result<Option<User>> {
        db.select((User::table(), id.as_str()))
            .await
            .context(MalformedQuerySnafu)
    }

    pub async fn insert(&self, db: &Database) -> database::Result<Option<User>> {
        db.create(self.id.resource())
            .content(self)
            .await
            .context(MalformedQuerySnafu)
    }
}
