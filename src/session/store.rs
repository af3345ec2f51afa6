//! Session persistence seam.
//!
//! The store is injected into the session layer as `Arc<dyn SessionStore>` so
//! an in-memory, file-backed or distributed implementation can be swapped in.
//! Consistency across concurrent requests is whatever the store provides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;

use crate::Result;

/// Session contents visible to handlers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Key of the list the authenticated item belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystone_list_key: Option<String>,
    /// Id of the authenticated item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystone_item_id: Option<String>,
    /// Anything else handlers chose to keep in the session.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a store persists for one session id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_unix: Option<i64>,
    #[serde(flatten)]
    pub data: SessionData,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.expires_at_unix.is_some_and(|expires| expires <= now_unix)
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, `Ok(None)` when unknown or expired.
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Create or replace a session.
    async fn set(&self, session_id: &str, record: SessionRecord) -> Result<()>;

    /// Remove a session. Removing an unknown id is not an error.
    async fn destroy(&self, session_id: &str) -> Result<()>;
}

/// Process-local store; expired records are dropped when read.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every expired record, returning how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = now_unix();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let now = now_unix();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        self.sessions.write().await.remove(session_id);
        Ok(None)
    }

    async fn set(&self, session_id: &str, record: SessionRecord) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), record);
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
