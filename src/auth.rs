use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{ensure, Location, OptionExt, ResultExt, Snafu};

use crate::api::{ApiError, App};
use crate::database::{Database, DatabaseError};
use crate::model::{Role, User, UserId};

/// Claims carried by a bearer token. Only the subject is trusted, the role is read from the account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &UserId, lifetime: Duration) -> Self {
        Claims {
            sub: user.to_string(),
            exp: (Utc::now() + lifetime).timestamp(),
        }
    }
}

/// The resolved account behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: UserId,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AuthError {
    #[snafu(display("request is not authenticated"))]
    MissingToken,

    #[snafu(display("invalid token, please log in again"))]
    Decode { source: jsonwebtoken::errors::Error },

    #[snafu(display("failed to encode token"))]
    Encode { source: jsonwebtoken::errors::Error },

    #[snafu(display("the user belonging to this token no longer exists"))]
    UnknownUser { user: UserId },

    #[snafu(display("you do not have permission to perform this action"))]
    Forbidden { user: UserId },

    #[snafu(display("could not look up the account at {location}: {source}"))]
    Lookup {
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Clone)]
pub struct Authenticator {
    secret: SecretString,
    validation: Validation,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(secret: SecretString) -> Self {
        Authenticator {
            secret,
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode(token, &self.decoding_key(), &self.validation)
            .map(|data| data.claims)
            .context(DecodeSnafu)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        let header = jsonwebtoken::Header::new(Algorithm::HS256);
        jsonwebtoken::encode(&header, claims, &self.encoding_key()).context(EncodeSnafu)
    }

    /// Reads the bearer token of a request, if there is one.
    pub fn bearer(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Verifies the bearer token and resolves the account it belongs to.
    pub async fn identify(&self, headers: &HeaderMap, db: &Database) -> Result<Identity, AuthError> {
        let token = Self::bearer(headers).context(MissingTokenSnafu)?;
        let claims = self.decode(token)?;

        let user = UserId::from(claims.sub);
        ensure!(!user.as_str().trim().is_empty(), UnknownUserSnafu { user });

        let account = User::find(&user, db)
            .await
            .context(LookupSnafu)?
            .context(UnknownUserSnafu { user })?;

        Ok(Identity {
            user: account.user_id(),
            role: account.role,
        })
    }
}

/// The identity of the caller when there is a valid one. Missing, invalid or orphaned tokens
/// are treated as an anonymous caller.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Identity>);

/// A caller that must be signed in.
#[derive(Debug, Clone)]
pub struct Member(pub Identity);

/// A caller that must be signed in with an administrator account.
#[derive(Debug, Clone)]
pub struct Admin(pub Identity);

#[async_trait]
impl FromRequestParts<App> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, app: &App) -> Result<Self, Self::Rejection> {
        if Authenticator::bearer(&parts.headers).is_none() {
            return Ok(Viewer(None));
        }

        match app.authenticator.identify(&parts.headers, &app.database).await {
            Ok(identity) => Ok(Viewer(Some(identity))),
            Err(error @ AuthError::Lookup { .. }) => Err(error.into()),
            Err(error) => {
                tracing::debug!(%error, "treating caller as anonymous");
                Ok(Viewer(None))
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<App> for Member {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, app: &App) -> Result<Self, Self::Rejection> {
        let identity = app.authenticator.identify(&parts.headers, &app.database).await?;
        Ok(Member(identity))
    }
}

#[async_trait]
impl FromRequestParts<App> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, app: &App) -> Result<Self, Self::Rejection> {
        let Member(identity) = Member::from_request_parts(parts, app).await?;

        if !identity.is_admin() {
            return Err(AuthError::Forbidden { user: identity.user }.into());
        }

        Ok(Admin(identity))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(SecretString::new("test-secret".to_string()))
    }

    #[test]
    fn token_round_trip() {
        let auth = authenticator();
        let claims = Claims::new(&UserId::from("reader"), Duration::hours(1));

        let token = auth.encode(&claims).unwrap();
        assert_eq!(auth.decode(&token).unwrap(), claims);
    }

    #[test]
    fn rejects_foreign_and_expired_tokens() {
        let claims = Claims::new(&UserId::from("reader"), Duration::hours(1));
        let foreign = Authenticator::new(SecretString::new("other".to_string()))
            .encode(&claims)
            .unwrap();
        assert!(matches!(authenticator().decode(&foreign), Err(AuthError::Decode { .. })));

        let expired = Claims::new(&UserId::from("reader"), Duration::hours(-2));
        let token = authenticator().encode(&expired).unwrap();
        assert!(matches!(authenticator().decode(&token), Err(AuthError::Decode { .. })));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(Authenticator::bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(Authenticator::bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(Authenticator::bearer(&headers), Some("abc.def"));
    }
}
