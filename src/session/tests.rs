//! Session layer tests.

use super::*;
use axum::{
    body::{to_bytes, Body},
    http::header::COOKIE,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use secrecy::SecretString;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tower::ServiceExt;

#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.inner.get(session_id).await
    }

    async fn set(&self, session_id: &str, record: SessionRecord) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(session_id, record).await
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        self.inner.destroy(session_id).await
    }
}

struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, _session_id: &str) -> Result<Option<SessionRecord>> {
        Err(Error::store("store offline"))
    }

    async fn set(&self, _session_id: &str, _record: SessionRecord) -> Result<()> {
        Err(Error::store("store offline"))
    }

    async fn destroy(&self, _session_id: &str) -> Result<()> {
        Err(Error::store("store offline"))
    }
}

fn signer() -> CookieSigner {
    match CookieSigner::new([SecretString::from("keyboard cat".to_string())]) {
        Ok(signer) => signer,
        Err(err) => panic!("signer should build: {err}"),
    }
}

fn app(store: Arc<dyn SessionStore>, policy: CookiePolicy) -> Router {
    let config = SessionConfig::new(store, signer(), policy);
    Router::new()
        .route(
            "/whoami",
            get(|session: Session| async move {
                session.list_key().await.unwrap_or_else(|| "anonymous".to_string())
            }),
        )
        .route(
            "/login",
            post(|session: Session| async move {
                session.set_identity("User", "1").await;
                session.id().await
            }),
        )
        .layer(from_fn_with_state(config, resolve))
}

fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    match builder.body(Body::empty()) {
        Ok(request) => request,
        Err(err) => panic!("request should build: {err}"),
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn set_cookie_pair(response: &Response) -> Option<String> {
    let value = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_string)
}

#[tokio::test]
async fn anonymous_reads_do_not_create_sessions() {
    let store = Arc::new(MemoryStore::new());
    let response = app(store.clone(), CookiePolicy::default())
        .oneshot(request("GET", "/whoami", None))
        .await
        .unwrap_or_else(|err| match err {});

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_text(response).await, "anonymous");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn modified_sessions_are_saved_and_resolved_on_the_next_request() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), CookiePolicy::default());

    let response = app
        .clone()
        .oneshot(request("POST", "/login", None))
        .await
        .unwrap_or_else(|err| match err {});
    let cookie = set_cookie_pair(&response);
    let session_id = body_text(response).await;

    assert_eq!(store.len().await, 1);
    let expected = format!("keystone.sid={}", signer().encode_session_id(&session_id));
    assert_eq!(cookie.as_deref(), Some(expected.as_str()));

    let response = app
        .oneshot(request("GET", "/whoami", cookie.as_deref()))
        .await
        .unwrap_or_else(|err| match err {});
    assert_eq!(body_text(response).await, "User");
}

#[tokio::test]
async fn unchanged_sessions_are_not_resaved() -> Result<()> {
    let store = Arc::new(CountingStore::default());
    let policy = CookiePolicy {
        max_age: None,
        secure: false,
    };
    store
        .inner
        .set(
            "existing",
            SessionRecord {
                expires_at_unix: None,
                data: SessionData {
                    keystone_list_key: Some("User".to_string()),
                    keystone_item_id: Some("1".to_string()),
                    ..SessionData::default()
                },
            },
        )
        .await?;

    let cookie = format!("keystone.sid={}", signer().encode_session_id("existing"));
    let response = app(store.clone(), policy)
        .oneshot(request("GET", "/whoami", Some(&cookie)))
        .await
        .unwrap_or_else(|err| match err {});

    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_text(response).await, "User");
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn tampered_cookies_start_a_fresh_session() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            "existing",
            SessionRecord {
                expires_at_unix: None,
                data: SessionData {
                    keystone_list_key: Some("User".to_string()),
                    ..SessionData::default()
                },
            },
        )
        .await?;

    let forged = format!("keystone.sid={}", urlencoding::encode("s:existing.AAAA"));
    let response = app(store, CookiePolicy::default())
        .oneshot(request("GET", "/whoami", Some(&forged)))
        .await
        .unwrap_or_else(|err| match err {});
    assert_eq!(body_text(response).await, "anonymous");
    Ok(())
}

#[tokio::test]
async fn store_faults_become_server_errors() {
    let cookie = format!("keystone.sid={}", signer().encode_session_id("existing"));
    let response = app(Arc::new(FailingStore), CookiePolicy::default())
        .oneshot(request("GET", "/whoami", Some(&cookie)))
        .await
        .unwrap_or_else(|err| match err {});
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app(Arc::new(FailingStore), CookiePolicy::default())
        .oneshot(request("POST", "/login", None))
        .await
        .unwrap_or_else(|err| match err {});
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn regenerate_replaces_the_id_and_destroys_the_old_record() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.set("old", SessionRecord::default()).await?;
    let session = Session::from_record(store.clone(), "old".to_string(), SessionRecord::default());
    session.set_identity("User", "1").await;

    session.regenerate().await?;

    assert!(session.id().await != "old");
    assert_eq!(session.data().await, SessionData::default());
    assert!(store.get("old").await?.is_none());
    assert!(!session.is_modified().await);
    Ok(())
}

#[tokio::test]
async fn regenerate_fails_when_the_store_fails() {
    let session = Session::new(Arc::new(FailingStore));
    let before = session.id().await;
    assert!(session.regenerate().await.is_err());
    assert_eq!(session.id().await, before);
}

#[tokio::test]
async fn max_age_sets_record_expiry() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let session = Session::new(store.clone());
    session.insert("theme", Value::String("dark".to_string())).await;

    let policy = CookiePolicy {
        max_age: Some(Duration::from_secs(120)),
        secure: false,
    };
    let committed = session.commit(None, &policy).await?;
    let id = session.id().await;
    assert_eq!(committed.as_deref(), Some(id.as_str()));

    let record = store.get(&id).await?;
    let expires = record.and_then(|record| record.expires_at_unix);
    assert!(expires.is_some_and(|expires| expires > store::now_unix()));

    // Nothing changed since the save, so a second commit is a no-op.
    assert_eq!(session.commit(Some(&id), &policy).await?, None);
    Ok(())
}

#[test]
fn session_ids_are_random_and_url_safe() {
    let first = generate_session_id();
    let second = generate_session_id();
    assert!(first != second);
    assert_eq!(first.len(), 32);
    assert!(first
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}
