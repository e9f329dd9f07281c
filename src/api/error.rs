use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use snafu::Snafu;

use crate::auth::AuthError;
use crate::tracker::EngagementError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(transparent)]
    Engagement { source: EngagementError },

    #[snafu(transparent)]
    Auth { source: AuthError },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engagement { source } => match source {
                EngagementError::NotFound { .. } => StatusCode::NOT_FOUND,
                EngagementError::InvalidIdentifier { .. } | EngagementError::InvalidInput { .. } => {
                    StatusCode::BAD_REQUEST
                }
                EngagementError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth { source } => match source {
                AuthError::MissingToken | AuthError::Decode { .. } | AuthError::UnknownUser { .. } => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
                AuthError::Encode { .. } | AuthError::Lookup { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine readable kind of the error, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Engagement { source } => match source {
                EngagementError::NotFound { .. } => "not_found",
                EngagementError::InvalidIdentifier { .. } => "invalid_identifier",
                EngagementError::InvalidInput { .. } => "invalid_input",
                EngagementError::Persistence { .. } => "persistence_failure",
            },
            ApiError::Auth { source } => match source {
                AuthError::MissingToken | AuthError::Decode { .. } | AuthError::UnknownUser { .. } => {
                    "unauthorized"
                }
                AuthError::Forbidden { .. } => "forbidden",
                AuthError::Encode { .. } | AuthError::Lookup { .. } => "internal",
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "something went wrong, please try again later".to_string()
        } else {
            tracing::debug!(error = %self, "request rejected");
            self.to_string()
        };

        let body = ErrorResponse {
            status: "error",
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
