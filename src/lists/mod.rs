//! List registry and the storage adapter seam.
//!
//! A list is a named collection of items backed by an [`Adapter`]. Adapter
//! internals are owned by the data layer; the web server only ever looks items
//! up by id (session population) or by a single field (authentication).

mod memory;

pub use memory::MemoryAdapter;

use async_trait::async_trait;
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::Result;

/// A single record within a list. Items are JSON objects with a string `id`.
pub type Item = Value;

/// Storage adapter for one list.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Resolve an item by its identifier, `Ok(None)` when it does not exist.
    async fn find_by_id(&self, id: &str) -> Result<Option<Item>>;

    /// Resolve the first item whose `field` equals `value`.
    async fn find_one(&self, field: &str, value: &str) -> Result<Option<Item>>;
}

#[derive(Clone)]
pub struct List {
    key: String,
    adapter: Arc<dyn Adapter>,
    hidden_fields: Vec<String>,
}

impl List {
    #[must_use]
    pub fn new(key: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            key: key.into(),
            adapter,
            hidden_fields: Vec::new(),
        }
    }

    /// Fields stripped from items before they are attached to a request.
    #[must_use]
    pub fn with_hidden_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn hidden_fields(&self) -> &[String] {
        &self.hidden_fields
    }

    /// The item without its hidden fields.
    #[must_use]
    pub fn public_item(&self, mut item: Item) -> Item {
        if let Some(object) = item.as_object_mut() {
            for field in &self.hidden_fields {
                object.remove(field);
            }
        }
        item
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("key", &self.key)
            .field("hidden_fields", &self.hidden_fields)
            .finish_non_exhaustive()
    }
}

/// Mapping from list key to list.
#[derive(Clone, Debug, Default)]
pub struct Lists {
    lists: BTreeMap<String, List>,
}

impl Lists {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a list, replacing any list previously registered under the same key.
    pub fn register(&mut self, key: impl Into<String>, adapter: Arc<dyn Adapter>) -> &mut Self {
        self.insert(List::new(key, adapter))
    }

    pub fn insert(&mut self, list: List) -> &mut Self {
        self.lists.insert(list.key.clone(), list);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&List> {
        self.lists.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// Read the string `id` of an item.
#[must_use]
pub fn item_id(item: &Item) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}
