//! Archive request state machine.
//!
//! One [`ArchiveRequest`] is one in-flight remote operation: it builds the
//! outbound payload for its operation kind, and decodes the matching
//! response into typed results plus a continuation cursor.  Requests move
//! `Built -> Sent -> {Succeeded, Failed}`; terminal states are final and
//! there are no built-in retries.

use chrono::{DateTime, Duration, Utc};

use arkiv_shared::constants::{DEFAULT_PAGE_SIZE, PROBE_PAGE_SIZE};
use arkiv_shared::{timefmt, Address, EntryKind};

use crate::cursor::PageCursor;
use crate::element::Element;
use crate::error::{ProtoError, RemoteFault, Result};

/// The closed set of remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Capability probe for one protocol namespace.
    DetectSupport,
    /// Retrieve collection summaries.
    ListCollections,
    /// Retrieve the entries of one collection.
    RetrieveCollection,
}

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Built,
    Sent,
    Succeeded,
    Failed,
}

/// Optional filters for a [`Operation::ListCollections`] request.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Only collections with this peer.
    pub peer: Option<Address>,
    /// Only collections starting at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only collections starting before this instant.
    pub until: Option<DateTime<Utc>>,
}

/// One collection summary decoded from a listing response.
///
/// The wire does not carry the owning account or a collection kind;
/// callers supply both from context when persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub contact: Address,
    pub subject: String,
    pub start: DateTime<Utc>,
}

/// Timestamp information attached to a decoded entry, when the server
/// sent any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOffset {
    /// Seconds elapsed since the collection start.
    Seconds(u64),
    /// Absolute UTC timestamp.
    Absolute(DateTime<Utc>),
}

/// One entry decoded from a retrieval response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryItem {
    pub kind: EntryKind,
    pub peer: Address,
    pub nickname: String,
    pub body: String,
    pub offset: Option<EntryOffset>,
}

impl EntryItem {
    /// Resolve this entry's timestamp against the collection start time,
    /// falling back to the start itself when the server sent nothing.
    pub fn utc(&self, collection_start: DateTime<Utc>) -> DateTime<Utc> {
        match self.offset {
            Some(EntryOffset::Absolute(utc)) => utc,
            Some(EntryOffset::Seconds(secs)) => {
                collection_start + Duration::seconds(secs as i64)
            }
            None => collection_start,
        }
    }
}

/// Operation-specific result set of a succeeded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSet {
    /// The probed namespace is supported; there is nothing to decode.
    Supported,
    Collections(Vec<CollectionSummary>),
    Entries(Vec<EntryItem>),
}

/// Operation-specific fields, fixed at construction.
#[derive(Debug, Clone)]
enum Query {
    DetectSupport,
    ListCollections(ListFilter),
    RetrieveCollection {
        peer: Address,
        start: DateTime<Utc>,
    },
}

/// One in-flight remote archive operation.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    namespace: String,
    query: Query,
    page_size: u32,
    continue_from: Option<PageCursor>,
    status: RequestStatus,
    cursor: Option<PageCursor>,
    results: Option<ResultSet>,
    failure: Option<RemoteFault>,
}

impl ArchiveRequest {
    fn new(namespace: &str, query: Query, page_size: u32) -> Self {
        Self {
            namespace: namespace.to_string(),
            query,
            page_size,
            continue_from: None,
            status: RequestStatus::Built,
            cursor: None,
            results: None,
            failure: None,
        }
    }

    /// A capability probe for `namespace`, limited to a single result.
    pub fn detect_support(namespace: &str) -> Self {
        Self::new(namespace, Query::DetectSupport, PROBE_PAGE_SIZE)
    }

    /// A collection listing request.
    pub fn list_collections(namespace: &str, filter: ListFilter) -> Self {
        Self::new(namespace, Query::ListCollections(filter), DEFAULT_PAGE_SIZE)
    }

    /// An entry retrieval request for the collection identified by `peer`
    /// and `start`.  Both are required by the protocol, so they are
    /// required here.
    pub fn retrieve_collection(namespace: &str, peer: Address, start: DateTime<Utc>) -> Self {
        Self::new(
            namespace,
            Query::RetrieveCollection { peer, start },
            DEFAULT_PAGE_SIZE,
        )
    }

    /// Turn this request into the continuation after `cursor`.
    pub fn continue_from(mut self, cursor: PageCursor) -> Self {
        self.continue_from = Some(cursor);
        self
    }

    /// Override the page-size limit.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn operation(&self) -> Operation {
        match self.query {
            Query::DetectSupport => Operation::DetectSupport,
            Query::ListCollections(_) => Operation::ListCollections,
            Query::RetrieveCollection { .. } => Operation::RetrieveCollection,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// The peer a retrieval request targets.
    pub fn peer(&self) -> Option<&Address> {
        match &self.query {
            Query::RetrieveCollection { peer, .. } => Some(peer),
            Query::ListCollections(filter) => filter.peer.as_ref(),
            Query::DetectSupport => None,
        }
    }

    /// Build the outbound payload.
    ///
    /// Validates remaining runtime preconditions and attaches the page
    /// fragment (first page, or the continuation after a prior cursor).
    pub fn payload(&self) -> Result<Element> {
        if self.namespace.is_empty() {
            return Err(ProtoError::PreconditionViolation(
                "request namespace must not be empty",
            ));
        }

        let mut element = match &self.query {
            Query::DetectSupport => {
                if self.continue_from.is_some() {
                    return Err(ProtoError::PreconditionViolation(
                        "capability probes do not paginate",
                    ));
                }
                Element::new("list")
            }
            Query::ListCollections(filter) => {
                let mut list = Element::new("list");
                if let Some(peer) = &filter.peer {
                    list.set_attr("with", peer.full());
                }
                if let Some(since) = &filter.since {
                    list.set_attr("start", timefmt::encode_utc(since, true));
                }
                if let Some(until) = &filter.until {
                    list.set_attr("end", timefmt::encode_utc(until, true));
                }
                list
            }
            Query::RetrieveCollection { peer, start } => Element::new("retrieve")
                .with_attr("with", peer.full())
                .with_attr("start", timefmt::encode_utc(start, true)),
        };
        element.set_attr("xmlns", self.namespace.as_str());

        let page = match &self.continue_from {
            Some(cursor) => cursor.next_page(self.page_size)?,
            None => PageCursor::first_page(self.page_size),
        };
        element.append_child(page);

        Ok(element)
    }

    /// Record that the payload has been handed to the transport.
    pub fn mark_sent(&mut self) {
        debug_assert_eq!(self.status, RequestStatus::Built);
        self.status = RequestStatus::Sent;
    }

    /// Decode the matching response.
    ///
    /// A non-error response transitions to `Succeeded` and makes the
    /// continuation cursor and the operation-specific results available; an
    /// error response transitions to `Failed` and surfaces the
    /// remote-supplied detail as [`ProtoError::Remote`].
    pub fn take_response(&mut self, response: &Element) -> Result<()> {
        if self.status != RequestStatus::Sent {
            return Err(ProtoError::PreconditionViolation(
                "response for a request that is not in flight",
            ));
        }

        if response.attr("type") != Some("result") {
            let fault = decode_fault(response);
            tracing::warn!(op = ?self.operation(), fault = %fault, "request failed remotely");
            self.status = RequestStatus::Failed;
            self.failure = Some(fault.clone());
            return Err(ProtoError::Remote(fault));
        }

        let decoded = self.decode_success(response);
        match decoded {
            Ok((cursor, results)) => {
                tracing::debug!(op = ?self.operation(), "request succeeded");
                self.cursor = Some(cursor);
                self.results = Some(results);
                self.status = RequestStatus::Succeeded;
                Ok(())
            }
            Err(e) => {
                self.status = RequestStatus::Failed;
                Err(e)
            }
        }
    }

    fn decode_success(&self, response: &Element) -> Result<(PageCursor, ResultSet)> {
        let cursor = PageCursor::from_response(response)?;

        let results = match &self.query {
            Query::DetectSupport => ResultSet::Supported,
            Query::ListCollections(_) => {
                let list = response.first_child("list").ok_or_else(|| {
                    ProtoError::MalformedPayload("listing response without <list>".to_string())
                })?;
                ResultSet::Collections(decode_summaries(list)?)
            }
            Query::RetrieveCollection { .. } => {
                let chat = response.first_child("chat").ok_or_else(|| {
                    ProtoError::MalformedPayload("retrieval response without <chat>".to_string())
                })?;
                ResultSet::Entries(decode_entries(chat)?)
            }
        };

        Ok((cursor, results))
    }

    /// The continuation cursor of a succeeded request.
    pub fn cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }

    /// The result set of a succeeded request.
    pub fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    /// The remote error detail of a failed request.
    pub fn failure(&self) -> Option<&RemoteFault> {
        self.failure.as_ref()
    }
}

fn decode_fault(response: &Element) -> RemoteFault {
    match response.find("error") {
        Some(error) => {
            let text = {
                let direct = error.text();
                if !direct.is_empty() {
                    direct
                } else {
                    error
                        .children()
                        .next()
                        .map(|condition| condition.name().to_string())
                        .unwrap_or_else(|| "unspecified error".to_string())
                }
            };
            RemoteFault {
                code: error.attr("code").map(str::to_string),
                text,
            }
        }
        None => RemoteFault {
            code: None,
            text: "error response without detail".to_string(),
        },
    }
}

fn decode_summaries(list: &Element) -> Result<Vec<CollectionSummary>> {
    let mut summaries = Vec::new();
    for chat in list.children().filter(|el| el.name() == "chat") {
        let with = chat.attr("with").ok_or_else(|| {
            ProtoError::MalformedPayload("<chat> without a 'with' attribute".to_string())
        })?;
        let start = chat.attr("start").ok_or_else(|| {
            ProtoError::MalformedPayload("<chat> without a 'start' attribute".to_string())
        })?;
        let (start, _) = timefmt::decode(start)?;

        summaries.push(CollectionSummary {
            contact: Address::parse(with)?,
            subject: chat.attr("subject").unwrap_or_default().to_string(),
            start,
        });
    }
    Ok(summaries)
}

fn decode_entries(chat: &Element) -> Result<Vec<EntryItem>> {
    let mut entries = Vec::new();
    for item in chat.children() {
        let kind = match item.name() {
            // The page descriptor rides along inside <chat>.
            "set" => continue,
            "to" => EntryKind::ReceivedMessage,
            "from" => EntryKind::SentMessage,
            "note" => EntryKind::Note,
            other => return Err(ProtoError::UnknownEntryKind(other.to_string())),
        };

        let peer = item.attr("jid").ok_or_else(|| {
            ProtoError::MalformedPayload(format!("<{}> without a 'jid' attribute", item.name()))
        })?;
        let body = item
            .first_child("body")
            .map(|body| body.text())
            .unwrap_or_default();

        let offset = if let Some(utc) = item.attr("utc") {
            Some(EntryOffset::Absolute(timefmt::decode(utc)?.0))
        } else if let Some(secs) = item.attr("secs") {
            let secs = secs.parse().map_err(|_| {
                ProtoError::MalformedPayload(format!("'secs' is not an integer: {secs:?}"))
            })?;
            Some(EntryOffset::Seconds(secs))
        } else {
            None
        };

        entries.push(EntryItem {
            kind,
            peer: Address::parse(peer)?,
            nickname: item.attr("name").unwrap_or_default().to_string(),
            body,
            offset,
        });
    }
    Ok(entries)
}
