//! Signed session cookies.
//!
//! Wire format: `keystone.sid=<percent-encoded "s:" + id + "." + sig>` where
//! `sig` is the unpadded standard base64 of HMAC-SHA256(secret, id). The first
//! secret signs; every configured secret is accepted when verifying so secrets
//! can be rotated without logging everybody out.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64Unpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::{fmt, time::Duration};

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "keystone.sid";

const SIGNED_PREFIX: &str = "s:";

#[derive(Clone)]
pub struct CookieSigner {
    // Keyed MAC states, first entry signs.
    keys: Vec<HmacSha256>,
}

impl CookieSigner {
    /// Build a signer from one or more secrets.
    ///
    /// # Errors
    /// Returns `Error::Config` when no secret is given or a secret is empty.
    pub fn new<I>(secrets: I) -> Result<Self>
    where
        I: IntoIterator<Item = SecretString>,
    {
        let mut keys = Vec::new();
        for secret in secrets {
            let secret = secret.expose_secret();
            if secret.is_empty() {
                return Err(Error::Config("cookie secret must not be empty".to_string()));
            }
            let key = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|err| Error::Config(format!("invalid cookie secret: {err}")))?;
            keys.push(key);
        }

        if keys.is_empty() {
            return Err(Error::Config("a cookie secret is required".to_string()));
        }

        Ok(Self { keys })
    }

    /// Append the signature of `value` using the primary secret.
    #[must_use]
    pub fn sign(&self, value: &str) -> String {
        let mut mac = self.keys[0].clone();
        mac.update(value.as_bytes());
        let signature = Base64Unpadded::encode_string(&mac.finalize().into_bytes());
        format!("{value}.{signature}")
    }

    /// Verify a `value.signature` string against every secret.
    #[must_use]
    pub fn unsign<'a>(&self, signed: &'a str) -> Option<&'a str> {
        let (value, signature) = signed.rsplit_once('.')?;
        let signature = Base64Unpadded::decode_vec(signature).ok()?;
        self.keys.iter().find_map(|key| {
            let mut mac = key.clone();
            mac.update(value.as_bytes());
            mac.verify_slice(&signature).ok().map(|()| value)
        })
    }

    /// Cookie value carrying a session id, ready to be placed after `keystone.sid=`.
    #[must_use]
    pub fn encode_session_id(&self, session_id: &str) -> String {
        let signed = format!("{SIGNED_PREFIX}{}", self.sign(session_id));
        urlencoding::encode(&signed).into_owned()
    }

    /// Recover a session id from a raw cookie value. Unsigned or tampered values yield `None`.
    #[must_use]
    pub fn decode_session_id(&self, raw: &str) -> Option<String> {
        let decoded = urlencoding::decode(raw).ok()?;
        let signed = decoded.strip_prefix(SIGNED_PREFIX)?;
        self.unsign(signed).map(str::to_string)
    }
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSigner")
            .field("secrets", &self.keys.len())
            .finish()
    }
}

/// Attributes applied to the `Set-Cookie` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookiePolicy {
    pub max_age: Option<Duration>,
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            max_age: Some(Duration::from_secs(60 * 60 * 24 * 30)),
            secure: false,
        }
    }
}

impl CookiePolicy {
    /// Build the `Set-Cookie` header for an encoded cookie value.
    ///
    /// # Errors
    /// Returns an error if the value contains bytes not allowed in a header.
    pub fn set_cookie(&self, encoded: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{COOKIE_NAME}={encoded}; Path=/; HttpOnly; SameSite=Lax");
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Find the first cookie called `name` across all `Cookie` headers.
#[must_use]
pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            if key.trim() != name {
                return None;
            }
            let val = val.trim();
            let val = val
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(val);
            Some(val.to_string())
        })
}
