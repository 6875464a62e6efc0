//! Transport abstraction.
//!
//! The engine only needs one thing from the network layer: hand a payload
//! to the server and eventually get the matching response back, keyed by
//! a correlation id.  Stanza framing, connection management, and retries
//! live behind this trait.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use arkiv_proto::Element;

/// Errors surfaced by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is gone and the request can not be delivered.
    #[error("transport closed")]
    Closed,

    /// Anything else the underlying stack reports.
    #[error("transport failure: {0}")]
    Failure(String),
}

/// One request/response round trip against the remote server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `payload` and resolve with the matching response, or with
    /// an error when the round trip can not complete.
    async fn round_trip(
        &self,
        request_id: Uuid,
        payload: Element,
    ) -> Result<Element, TransportError>;
}

/// Routing key of a scripted [`MockTransport`] response.
///
/// Requests are matched on the payload fields that distinguish them:
/// operation element name, namespace, peer filter, and the "after" marker
/// of a continuation.  This keeps scripted conversations deterministic
/// even when sibling pagination chains interleave.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockKey {
    pub operation: String,
    pub namespace: Option<String>,
    pub with: Option<String>,
    pub after: Option<String>,
}

impl MockKey {
    /// The key a given outbound payload routes to.
    pub fn of(payload: &Element) -> Self {
        let after = payload
            .first_child("set")
            .and_then(|set| set.first_child("after"))
            .map(|after| after.text());
        Self {
            operation: payload.name().to_string(),
            namespace: payload.attr("xmlns").map(str::to_string),
            with: payload.attr("with").map(str::to_string),
            after,
        }
    }
}

/// A scripted transport for tests.
///
/// Responses are enqueued per routing key and consumed in order; a
/// request with no scripted response fails with
/// [`TransportError::Closed`].  Every delivered payload is recorded for
/// later inspection.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<MockKey, VecDeque<Element>>>,
    sent: Mutex<Vec<Element>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next response for requests matching `key`.
    pub fn enqueue(&self, key: MockKey, response: Element) {
        self.responses
            .lock()
            .expect("mock transport poisoned")
            .entry(key)
            .or_default()
            .push_back(response);
    }

    /// All payloads delivered so far, in order.
    pub fn sent(&self) -> Vec<Element> {
        self.sent.lock().expect("mock transport poisoned").clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn round_trip(
        &self,
        _request_id: Uuid,
        payload: Element,
    ) -> Result<Element, TransportError> {
        let key = MockKey::of(&payload);
        self.sent
            .lock()
            .expect("mock transport poisoned")
            .push(payload);

        self.responses
            .lock()
            .expect("mock transport poisoned")
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .ok_or(TransportError::Closed)
    }
}
