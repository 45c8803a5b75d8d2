//! Firebase Realtime Database over its REST API.
//!
//! One-shot operations map to `GET`/`PUT`/`POST` on `<base>/<path>.json`.
//! Subscriptions use the REST streaming endpoint (server-sent events): the
//! server sends a `put` with the full value on connect, then `put`/`patch`
//! events relative to the subscribed path. The adapter keeps a local copy of
//! the subtree and forwards the whole value after each change.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{tree, AnonymousAuth, RealtimeStore, StoreError, Subscription};

// ---

#[derive(Debug, Clone)]
enum Credentials {
    None,
    /// Database secret or pre-issued id token.
    Token(String),
    Anonymous(Arc<AnonymousAuth>),
}

impl Credentials {
    async fn token(&self) -> Result<Option<String>, StoreError> {
        match self {
            Credentials::None => Ok(None),
            Credentials::Token(token) => Ok(Some(token.clone())),
            Credentials::Anonymous(auth) => auth.id_token().await.map(Some),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    retry_delay: Duration,
}

impl FirebaseStore {
    // ---
    /// Unauthenticated access to the database at `base_url`
    /// (e.g. `https://my-project-default-rtdb.firebaseio.com`).
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials::None,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Authenticate every request with a fixed token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Token(token.into());
        self
    }

    /// Sign in anonymously with the project's web API key.
    pub fn with_anonymous_auth(mut self, api_key: impl Into<String>) -> Self {
        let auth = AnonymousAuth::new(self.client.clone(), api_key);
        self.credentials = Credentials::Anonymous(Arc::new(auth));
        self
    }

    /// Delay before a dropped stream is reopened.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, StoreError> {
        // ---
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url).query(query);
        if let Some(token) = self.credentials.token().await? {
            request = request.query(&[("auth", token)]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = check_status(request.send().await?).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", url, e)))
    }
}

/// Turn error statuses into [`StoreError`]s, keeping the server's message.
async fn check_status(response: Response) -> Result<Response, StoreError> {
    // ---
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(StoreError::PermissionDenied(message))
        }
        _ => Err(StoreError::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

#[async_trait]
impl RealtimeStore for FirebaseStore {
    // ---
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        // ---
        let (tx, rx) = mpsc::channel(16);
        let stream = EventStream {
            client: self.client.clone(),
            url: self.url(path),
            credentials: self.credentials.clone(),
            retry_delay: self.retry_delay,
        };
        let task = tokio::spawn(stream.run(tx));
        Ok(Subscription::new(path, rx, task))
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let value = self.request(Method::GET, path, &[], None).await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn write_once(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.request(Method::PUT, path, &[], Some(&value)).await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        // ---
        let response = self.request(Method::POST, path, &[], Some(&value)).await?;
        response
            .get("name")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                StoreError::Decode(format!("push to {} returned no key: {}", path, response))
            })
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        // ---
        let value = self
            .request(Method::GET, path, &[("shallow", "true")], None)
            .await?;
        Ok(value
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// ---

/// Why a single stream connection ended.
#[derive(Debug, PartialEq)]
enum StreamEnd {
    ReceiverGone,
    /// Server closed the body; reopen with the same credentials.
    Reconnect,
    /// Token expired or was revoked; sign in again before reopening.
    AuthRevoked,
    Cancelled(String),
}

impl StreamEnd {
    fn requires_new_token(&self) -> bool {
        matches!(self, StreamEnd::AuthRevoked)
    }
}

struct EventStream {
    client: reqwest::Client,
    url: String,
    credentials: Credentials,
    retry_delay: Duration,
}

impl EventStream {
    // ---
    async fn run(self, tx: mpsc::Sender<Result<Value, StoreError>>) {
        // ---
        loop {
            match self.connect(&tx).await {
                Ok(StreamEnd::ReceiverGone) => return,
                Ok(StreamEnd::Cancelled(reason)) => {
                    tracing::error!("Stream {} cancelled by server: {}", self.url, reason);
                    let _ = tx.send(Err(StoreError::Closed(reason))).await;
                    return;
                }
                Ok(end @ (StreamEnd::Reconnect | StreamEnd::AuthRevoked)) => {
                    tracing::debug!("Stream {} ended ({:?}), reconnecting", self.url, end);
                    if let (true, Credentials::Anonymous(auth)) =
                        (end.requires_new_token(), &self.credentials)
                    {
                        auth.invalidate().await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Stream {} failed: {}", self.url, e);
                    if tx.send(Err(e)).await.is_err() {
                        return;
                    }
                }
            }
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn connect(
        &self,
        tx: &mpsc::Sender<Result<Value, StoreError>>,
    ) -> Result<StreamEnd, StoreError> {
        // ---
        let mut request = self.client.get(&self.url).header(ACCEPT, "text/event-stream");
        if let Some(token) = self.credentials.token().await? {
            request = request.query(&[("auth", token)]);
        }

        let mut response = check_status(request.send().await?).await?;
        tracing::info!("Streaming {}", self.url);

        let mut parser = EventParser::default();
        let mut snapshot = Value::Null;

        while let Some(chunk) = response.chunk().await? {
            for event in parser.feed(&chunk) {
                match apply_event(&mut snapshot, &event)? {
                    Action::Ignore => {}
                    Action::Changed => {
                        if tx.send(Ok(snapshot.clone())).await.is_err() {
                            return Ok(StreamEnd::ReceiverGone);
                        }
                    }
                    Action::AuthRevoked => return Ok(StreamEnd::AuthRevoked),
                    Action::Cancel(reason) => return Ok(StreamEnd::Cancelled(reason)),
                }
            }
        }

        Ok(StreamEnd::Reconnect)
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Incremental `text/event-stream` parser. Chunks may split events (and
/// UTF-8 sequences) anywhere.
#[derive(Debug, Default)]
struct EventParser {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for a blank line.
    scanned: usize,
}

impl EventParser {
    // ---
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // ---
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        loop {
            // Back up one byte so a separator split across chunks is found.
            let start = self.scanned.saturating_sub(1);
            let Some(pos) = self.buffer[start..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.buffer.len();
                break;
            };

            let block: Vec<u8> = self.buffer.drain(..start + pos + 2).collect();
            self.scanned = 0;
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    // ---
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    event.map(|event| SseEvent {
        event,
        data: data.join("\n"),
    })
}

#[derive(Debug, PartialEq)]
enum Action {
    Ignore,
    Changed,
    AuthRevoked,
    Cancel(String),
}

#[derive(Debug, Deserialize)]
struct Payload {
    path: String,
    data: Value,
}

/// Apply one event to the local copy of the subscribed subtree.
fn apply_event(snapshot: &mut Value, event: &SseEvent) -> Result<Action, StoreError> {
    // ---
    match event.event.as_str() {
        "put" => {
            let payload = decode_payload(&event.data)?;
            tree::set(snapshot, &tree::segments(&payload.path), payload.data);
            Ok(Action::Changed)
        }
        "patch" => {
            let payload = decode_payload(&event.data)?;
            let base = tree::segments(&payload.path);
            let Value::Object(children) = payload.data else {
                return Err(StoreError::Decode(format!(
                    "patch data is not an object: {}",
                    event.data
                )));
            };
            for (key, value) in children {
                let mut path = base.clone();
                path.extend(tree::segments(&key));
                tree::set(snapshot, &path, value);
            }
            Ok(Action::Changed)
        }
        "keep-alive" => Ok(Action::Ignore),
        "auth_revoked" => Ok(Action::AuthRevoked),
        "cancel" => Ok(Action::Cancel(event.data.trim_matches('"').to_string())),
        other => {
            tracing::debug!("Ignoring stream event '{}'", other);
            Ok(Action::Ignore)
        }
    }
}

fn decode_payload(data: &str) -> Result<Payload, StoreError> {
    serde_json::from_str(data).map_err(|e| StoreError::Decode(format!("{}: {}", e, data)))
}
