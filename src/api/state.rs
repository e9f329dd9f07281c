use derive_new::new;

use crate::auth::Authenticator;
use crate::database::Database;
use crate::tracker::{Engagement, Retention};

#[derive(Debug, Clone, new)]
pub struct App {
    pub engagement: Engagement,
    pub authenticator: Authenticator,
    pub database: Database,
}

pub fn create_app(database: Database, authenticator: Authenticator, retention: Retention) -> App {
    let engagement = Engagement::new(database.clone(), retention);

    App {
        engagement,
        authenticator,
        database,
    }
}
