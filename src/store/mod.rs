//! Access to the hosted realtime JSON store.
//!
//! The rest of the service only sees [`RealtimeStore`]: subscribe to a path,
//! read it once, write it, push a child under it, or list its keys. Two
//! implementations exist: [`FirebaseStore`] for the Firebase Realtime
//! Database REST API and [`MemoryStore`] for tests and local runs.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod auth;
mod firebase;
mod memory;
mod paths;
pub mod tree;

pub use auth::AnonymousAuth;
pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use paths::DevicePaths;

// ---

/// Failures talking to the realtime store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or transport failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store rejected the request under its security rules
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Non-success status other than an auth failure
    #[error("Store error {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not what the store protocol promises
    #[error("Decode error: {0}")]
    Decode(String),

    /// Anonymous sign-in or token refresh failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The subscription ended on the server side
    #[error("Subscription closed: {0}")]
    Closed(String),
}

/// A live stream of snapshots for one path.
///
/// Each item is the full value at the path after a change (`Value::Null`
/// when the path is empty). Dropping the subscription stops its producer.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    rx: mpsc::Receiver<Result<Value, StoreError>>,
    task: JoinHandle<()>,
}

impl Subscription {
    // ---
    pub(crate) fn new(
        path: impl Into<String>,
        rx: mpsc::Receiver<Result<Value, StoreError>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            path: path.into(),
            rx,
            task,
        }
    }

    /// Next snapshot or error. `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<Result<Value, StoreError>> {
        self.rx.recv().await
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        tracing::debug!("Unsubscribing from {}", self.path);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribe/read/write interface of the hosted realtime store.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Stream snapshots of `path`, starting with its current value.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Current value at `path`, `None` if nothing is stored there.
    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value at `path`.
    async fn write_once(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Append `value` under `path` with a generated, time-ordered key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Names of the direct children of `path`.
    async fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError>;
}
