//! Cookie sessions shared by browser and bearer-token clients.
//!
//! Flow Overview: [`bearer::translate`] turns a bearer token into a signed
//! cookie, [`resolve`] verifies the cookie and loads the record from the
//! injected [`SessionStore`], handlers read or mutate the [`Session`] handle, and
//! once the response is produced the session is saved only if its contents
//! changed. Empty sessions are never persisted and unchanged sessions are never
//! re-saved.

pub mod bearer;
pub mod cookie;
pub mod store;

pub use cookie::{CookiePolicy, CookieSigner, COOKIE_NAME};
pub use store::{MemoryStore, SessionData, SessionRecord, SessionStore};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use serde_json::Value;
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{Error, Result};

const SESSION_ID_BYTES: usize = 24;

/// Everything the session layer needs, shared by all requests.
#[derive(Clone)]
pub struct SessionConfig {
    store: Arc<dyn SessionStore>,
    signer: CookieSigner,
    policy: CookiePolicy,
}

impl SessionConfig {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, signer: CookieSigner, policy: CookiePolicy) -> Self {
        Self {
            store,
            signer,
            policy,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    #[must_use]
    pub fn signer(&self) -> &CookieSigner {
        &self.signer
    }

    #[must_use]
    pub fn policy(&self) -> &CookiePolicy {
        &self.policy
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("signer", &self.signer)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

struct SessionState {
    id: String,
    data: SessionData,
    // Contents as last persisted; `None` for sessions the store has never seen.
    persisted: Option<SessionData>,
}

impl SessionState {
    fn is_modified(&self) -> bool {
        match &self.persisted {
            Some(persisted) => self.data != *persisted,
            None => self.data != SessionData::default(),
        }
    }
}

/// Request-scoped handle to the current session.
///
/// Clones share state, so a handler mutating its copy is seen by the session
/// layer when the response is committed.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// A fresh session with a random id, not yet known to the store.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_state(
            store,
            SessionState {
                id: generate_session_id(),
                data: SessionData::default(),
                persisted: None,
            },
        )
    }

    /// A session loaded from the store.
    #[must_use]
    pub fn from_record(store: Arc<dyn SessionStore>, id: String, record: SessionRecord) -> Self {
        Self::with_state(
            store,
            SessionState {
                id,
                persisted: Some(record.data.clone()),
                data: record.data,
            },
        )
    }

    fn with_state(store: Arc<dyn SessionStore>, state: SessionState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            store,
        }
    }

    pub async fn id(&self) -> String {
        self.state.lock().await.id.clone()
    }

    pub async fn data(&self) -> SessionData {
        self.state.lock().await.data.clone()
    }

    pub async fn list_key(&self) -> Option<String> {
        self.state.lock().await.data.keystone_list_key.clone()
    }

    pub async fn item_id(&self) -> Option<String> {
        self.state.lock().await.data.keystone_item_id.clone()
    }

    /// Record the authenticated item. Callers should regenerate first.
    pub async fn set_identity(&self, list_key: &str, item_id: &str) {
        let mut state = self.state.lock().await;
        state.data.keystone_list_key = Some(list_key.to_string());
        state.data.keystone_item_id = Some(item_id.to_string());
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().await.data.extra.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.lock().await.data.extra.insert(key.into(), value)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.state.lock().await.data.extra.remove(key)
    }

    pub async fn is_modified(&self) -> bool {
        self.state.lock().await.is_modified()
    }

    /// Replace the session id and clear its contents, destroying the old record.
    ///
    /// # Errors
    /// Returns `Error::Store` if the old record cannot be destroyed; the session
    /// is left untouched in that case.
    pub async fn regenerate(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.store.destroy(&state.id).await?;
        debug!("Session regenerated");
        state.id = generate_session_id();
        state.data = SessionData::default();
        state.persisted = None;
        Ok(())
    }

    /// Persist a modified session and decide whether the client needs a new cookie.
    ///
    /// Returns the session id to send back, if any.
    async fn commit(&self, cookie_id: Option<&str>, policy: &CookiePolicy) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        if !state.is_modified() {
            return Ok(None);
        }

        let record = SessionRecord {
            expires_at_unix: policy.max_age.map(|max_age| {
                store::now_unix()
                    .saturating_add(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX))
            }),
            data: state.data.clone(),
        };
        self.store.set(&state.id, record).await?;
        state.persisted = Some(state.data.clone());

        let id_changed = cookie_id != Some(state.id.as_str());
        if id_changed || policy.max_age.is_some() {
            Ok(Some(state.id.clone()))
        } else {
            Ok(None)
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            error!("Session extractor used on a route without the session layer");
            (StatusCode::INTERNAL_SERVER_ERROR, "session layer missing")
        })
    }
}

/// Middleware stage resolving the signed cookie into a [`Session`].
///
/// Store faults while loading or saving turn the response into a 500.
pub async fn resolve(
    State(config): State<SessionConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_id = cookie::find_cookie(request.headers(), COOKIE_NAME)
        .and_then(|raw| config.signer.decode_session_id(&raw));

    let session = match load(&config, cookie_id.as_deref()).await {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    match session.commit(cookie_id.as_deref(), &config.policy).await {
        Ok(Some(session_id)) => {
            let encoded = config.signer.encode_session_id(&session_id);
            match config.policy.set_cookie(&encoded) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(err) => error!("Failed to build session cookie: {err}"),
            }
            response
        }
        Ok(None) => response,
        Err(err) => err.into_response(),
    }
}

async fn load(config: &SessionConfig, cookie_id: Option<&str>) -> Result<Session, Error> {
    let Some(id) = cookie_id else {
        return Ok(Session::new(config.store.clone()));
    };

    match config.store.get(id).await? {
        Some(record) => Ok(Session::from_record(config.store.clone(), id.to_string(), record)),
        None => {
            debug!("Session cookie references an unknown session");
            Ok(Session::new(config.store.clone()))
        }
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests;
