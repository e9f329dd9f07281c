use snafu::ResultExt;

use penview::config::Config;
use penview::database::Database;
use penview::error::{ApplicationError, ConnectDatabaseSnafu};

fn config(url: &str) -> Config {
    let vars = [
        ("HOST_ADDRESS", "127.0.0.1:0"),
        ("JWT_SECRET", "startup-secret"),
        ("SURREAL_URL", url),
    ];

    Config::from_iter(vars.map(|(key, value)| (key.to_string(), value.to_string()))).unwrap()
}

#[tokio::test]
async fn unreachable_database_is_a_startup_error() {
    let config = config("unsupported://nowhere");

    let result = Database::connect(&config.database)
        .await
        .context(ConnectDatabaseSnafu);

    assert!(matches!(result, Err(ApplicationError::ConnectDatabase { .. })));
}

#[tokio::test]
async fn in_memory_database_starts() {
    let config = config("mem://");

    let database = Database::connect(&config.database).await;

    assert!(database.is_ok());
    assert!(config.retention().is_ok());
}
