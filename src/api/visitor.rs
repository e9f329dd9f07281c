use std::convert::Infallible;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;

pub const VIEWER_TOKEN_HEADER: &str = "x-viewer-token";
pub const VIEWER_TOKEN_COOKIE: &str = "viewerToken";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// The anonymous identity signals a browser sends along with a view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorSignals {
    pub anon_token: Option<String>,
    pub ip: Option<String>,
}

impl VisitorSignals {
    pub fn from_parts(parts: &Parts) -> Self {
        let anon_token = header(&parts.headers, VIEWER_TOKEN_HEADER).or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(VIEWER_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        });

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| address.ip().to_string())
            .or_else(|| {
                let forwarded = header(&parts.headers, FORWARDED_FOR_HEADER)?;
                forwarded.split(',').next().map(|ip| ip.trim().to_string())
            });

        VisitorSignals { anon_token, ip }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for VisitorSignals {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(VisitorSignals::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Request};

    use super::*;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn header_token_wins_over_cookie() {
        let request = Request::builder()
            .header(VIEWER_TOKEN_HEADER, "from-header")
            .header(header::COOKIE, "viewerToken=from-cookie")
            .body(())
            .unwrap();

        let signals = VisitorSignals::from_parts(&parts(request));
        assert_eq!(signals.anon_token.as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_token_is_used_without_header() {
        let request = Request::builder()
            .header(header::COOKIE, "theme=dark; viewerToken=from-cookie")
            .body(())
            .unwrap();

        let signals = VisitorSignals::from_parts(&parts(request));
        assert_eq!(signals.anon_token.as_deref(), Some("from-cookie"));
        assert_eq!(signals.ip, None);
    }

    #[test]
    fn peer_address_wins_over_forwarded_header() {
        let forwarded = || {
            Request::builder()
                .header(FORWARDED_FOR_HEADER, "203.0.113.7, 10.0.0.1")
                .body(())
                .unwrap()
        };

        let signals = VisitorSignals::from_parts(&parts(forwarded()));
        assert_eq!(signals.ip.as_deref(), Some("203.0.113.7"));

        let peer: SocketAddr = "198.51.100.3:4242".parse().unwrap();
        let mut request = forwarded();
        request.extensions_mut().insert(ConnectInfo(peer));

        let signals = VisitorSignals::from_parts(&parts(request));
        assert_eq!(signals.ip.as_deref(), Some("198.51.100.3"));
    }
}
