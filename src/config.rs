use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use snafu::ResultExt;

use crate::auth::Authenticator;
use crate::database::DatabaseConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu, InvalidRetentionSnafu};
use crate::tracker::Retention;

/// Settings read from the environment. Flattening makes every value arrive as text, so numbers are parsed from it.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    pub jwt_secret: SecretString,

    /// Viewer records a post may hold before it is compacted.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_viewer_capacity")]
    pub viewer_capacity: usize,
    /// Viewer records kept by a compaction.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_viewer_retain")]
    pub viewer_retain: usize,

    #[serde(flatten)]
    pub database: DatabaseConfig,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_viewer_capacity() -> usize {
    Retention::default().capacity()
}

fn default_viewer_retain() -> usize {
    Retention::default().retain()
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub fn from_iter(vars: impl IntoIterator<Item = (String, String)>) -> Result<Config, ApplicationError> {
        envy::from_iter::<_, Config>(vars).context(ConfigLoadSnafu)
    }

    pub fn retention(&self) -> Result<Retention, ApplicationError> {
        Retention::new(self.viewer_capacity, self.viewer_retain).context(InvalidRetentionSnafu)
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.jwt_secret.clone())
    }
}
