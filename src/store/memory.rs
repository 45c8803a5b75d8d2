//! In-process realtime store.
//!
//! Holds the whole tree in a watch channel so every write wakes the
//! subscribers, which then forward the value at their own path if it
//! changed. Used by the tests and by `STORE_BACKEND=memory` local runs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};

use super::{tree, RealtimeStore, StoreError, Subscription};

// ---

#[derive(Debug)]
pub struct MemoryStore {
    tree: watch::Sender<Value>,
    next_key: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::with_tree(Value::Object(Map::new()))
    }

    /// Start from an existing tree, e.g. a fixture.
    pub fn with_tree(initial: Value) -> Self {
        let (tree, _rx) = watch::channel(initial);
        Self {
            tree,
            next_key: AtomicU64::new(0),
        }
    }

    /// Copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.tree.borrow().clone()
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    // ---
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        // ---
        let segments = tree::segments(path);
        let mut rx = self.tree.subscribe();
        let (tx, out) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            let mut last: Option<Value> = None;
            loop {
                let current = {
                    let root = rx.borrow_and_update();
                    tree::get(&root, &segments).cloned().unwrap_or(Value::Null)
                };
                if last.as_ref() != Some(&current) {
                    if tx.send(Ok(current.clone())).await.is_err() {
                        break;
                    }
                    last = Some(current);
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(path, out, task))
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let root = self.tree.borrow();
        Ok(tree::get(&root, &tree::segments(path)).cloned())
    }

    async fn write_once(&self, path: &str, value: Value) -> Result<(), StoreError> {
        // ---
        let segments = tree::segments(path);
        self.tree.send_modify(|root| tree::set(root, &segments, value));
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        // ---
        let n = self.next_key.fetch_add(1, Ordering::SeqCst);
        let key = format!("-M{:018}", n);
        self.write_once(&format!("{}/{}", path, key), value).await?;
        Ok(key)
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let root = self.tree.borrow();
        Ok(tree::get(&root, &tree::segments(path))
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_read() {
        // ---
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.write_once("dev/pumpCommand", json!(true)).await.unwrap();

            assert_eq!(store.read_once("dev/pumpCommand").await.unwrap(), Some(json!(true)));
            assert_eq!(store.read_once("dev/missing").await.unwrap(), None);
        });
    }

    #[test]
    fn test_push_keys_are_ordered() {
        // ---
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let first = store.push("dev/log", json!(1)).await.unwrap();
            let second = store.push("dev/log", json!(2)).await.unwrap();

            assert!(first < second);
            assert_eq!(store.child_keys("dev/log").await.unwrap(), vec![first, second]);
            assert!(store.child_keys("dev/none").await.unwrap().is_empty());
        });
    }

    #[tokio::test]
    async fn test_subscription_sees_initial_and_changed_values() {
        // ---
        let store = MemoryStore::with_tree(json!({ "dev": { "pumpStatus": false } }));
        let mut sub = store.subscribe("dev/pumpStatus").await.unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap(), json!(false));

        // Writes elsewhere do not produce a snapshot for this path.
        store.write_once("dev/other", json!(1)).await.unwrap();
        store.write_once("dev/pumpStatus", json!(true)).await.unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_subscription_to_empty_path_yields_null() {
        // ---
        let store = MemoryStore::new();
        let mut sub = store.subscribe("dev/current").await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Value::Null);
    }
}
