use dotenvy::dotenv;
use snafu::ResultExt;

use penview::api;
use penview::config::Config;
use penview::database::Database;
use penview::error::{ApplicationError, ConnectDatabaseSnafu};
use penview::logger;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;
    let retention = config.retention()?;

    let _guard = logger::init(&config)?;

    let database = Database::connect(&config.database)
        .await
        .context(ConnectDatabaseSnafu)?;

    let app = api::create_app(database, config.authenticator(), retention);
    api::serve(config.host, app).await
}
