//! Bearer token to session cookie translation.
//!
//! API clients that cannot hold cookies send the session id as
//! `Authorization: Bearer <token>`. The token is signed into a synthetic
//! `keystone.sid` cookie placed ahead of any cookie the client sent, so the
//! session layer resolves both kinds of client through the same path.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::cookie::{CookieSigner, COOKIE_NAME};

const BEARER_SCHEME: &str = "Bearer";

/// Rewrite `headers` so a bearer token becomes the session cookie.
///
/// Headers without `Authorization`, or with any scheme other than `Bearer`, are
/// returned unchanged; unsupported schemes are logged and never rejected.
#[must_use]
pub fn bearer_to_cookie(mut headers: HeaderMap, signer: &CookieSigner) -> HeaderMap {
    let Some(authorization) = headers.get(AUTHORIZATION) else {
        return headers;
    };

    let Ok(authorization) = authorization.to_str() else {
        warn!("Ignoring Authorization header that is not valid UTF-8");
        return headers;
    };

    let mut parts = authorization.split(' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();

    if scheme != BEARER_SCHEME {
        warn!("Found an unsupported Authorization header type: {scheme}");
        return headers;
    }

    if token.is_empty() {
        warn!("Ignoring Bearer Authorization header without a token");
        return headers;
    }

    let mut cookie = format!("{COOKIE_NAME}={}", signer.encode_session_id(token));
    for existing in headers.get_all(COOKIE) {
        match existing.to_str() {
            Ok(value) if !value.trim().is_empty() => {
                cookie.push_str("; ");
                cookie.push_str(value.trim());
            }
            Ok(_) => {}
            Err(_) => warn!("Dropping Cookie header that is not valid UTF-8"),
        }
    }

    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.insert(COOKIE, value);
        }
        Err(err) => warn!("Failed to build session cookie from bearer token: {err}"),
    }

    headers
}

/// Middleware stage applying [`bearer_to_cookie`] to every request.
pub async fn translate(
    State(signer): State<CookieSigner>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    parts.headers = bearer_to_cookie(std::mem::take(&mut parts.headers), &signer);
    next.run(Request::from_parts(parts, body)).await
}
