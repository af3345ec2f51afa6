use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{item_id, Adapter, Item};
use crate::Result;

/// In-process adapter keeping items in insertion order.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    items: RwLock<Vec<Item>>,
}

impl MemoryAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Insert an item, replacing an existing item with the same id.
    pub async fn insert(&self, item: Item) {
        let mut items = self.items.write().await;
        let position = item_id(&item)
            .and_then(|id| items.iter().position(|existing| item_id(existing) == Some(id)));
        match position {
            Some(index) => items[index] = item,
            None => items.push(item),
        }
    }

    pub async fn remove(&self, id: &str) -> Option<Item> {
        let mut items = self.items.write().await;
        let index = items.iter().position(|item| item_id(item) == Some(id))?;
        Some(items.remove(index))
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn find_by_id(&self, id: &str) -> Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item_id(item) == Some(id)).cloned())
    }

    async fn find_one(&self, field: &str, value: &str) -> Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .find(|item| item.get(field).and_then(Value::as_str) == Some(value))
            .cloned())
    }
}
