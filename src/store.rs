//! In-memory key-value store implementation with thread-safe access
//!
//! The lock covers only the map operation itself; callers do their network
//! and file I/O outside of it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait defining the interface for key-value storage operations
#[allow(async_fn_in_trait)]
pub trait Store: Send + Sync {
    /// Insert or overwrite a key-value pair
    async fn set(&self, key: String, value: String);

    /// Get the current value for a key
    async fn get(&self, key: &str) -> Option<String>;

    /// Independent copy of every entry, for persistence
    async fn snapshot(&self) -> HashMap<String, String>;

    /// Get the number of stored items
    async fn len(&self) -> usize;
}

/// Thread-safe in-memory key-value store
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store rehydrated from a loaded durable image
    pub fn from_entries(entries: HashMap<String, String>) -> Self {
        Self {
            data: Arc::new(RwLock::new(entries)),
        }
    }
}

impl Store for MemoryStore {
    async fn set(&self, key: String, value: String) {
        let mut data = self.data.write().await;
        data.insert(key, value);
    }

    async fn get(&self, key: &str) -> Option<String> {
        let data = self.data.read().await;
        data.get(key).cloned()
    }

    async fn snapshot(&self) -> HashMap<String, String> {
        let data = self.data.read().await;
        data.clone()
    }

    async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemoryStore::new();

        store.set("key1".to_string(), "value1".to_string()).await;
        assert_eq!(store.get("key1").await, Some("value1".to_string()));
        assert_eq!(store.get("nonexistent").await, None);

        store.set("key1".to_string(), "value2".to_string()).await;
        assert_eq!(store.get("key1").await, Some("value2".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let store = MemoryStore::new();
        store.set("a".to_string(), "1".to_string()).await;
        store.set("b".to_string(), "2".to_string()).await;
        store.set("a".to_string(), "3".to_string()).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a"), Some(&"3".to_string()));

        store.set("c".to_string(), "4".to_string()).await;
        store.set("a".to_string(), "5".to_string()).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a"), Some(&"3".to_string()));
    }

    #[tokio::test]
    async fn test_from_entries() {
        let mut entries = HashMap::new();
        entries.insert("k".to_string(), "v".to_string());
        let store = MemoryStore::from_entries(entries);
        assert_eq!(store.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store_clone = Arc::clone(&store);
            let handle = tokio::spawn(async move {
                for j in 0..50 {
                    let key = format!("key{}_{}", i, j);
                    let value = format!("value{}_{}", i, j);
                    store_clone.set(key.clone(), value.clone()).await;
                    assert_eq!(store_clone.get(&key).await, Some(value));
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 500);
    }
}
