//! The sync engine proper.
//!
//! One [`SyncEngine::run`] call is one pass: detect the archive namespace,
//! walk the collection listing, and pull every collection's entries.
//! Within one pagination chain pages are strictly ordered (a continuation
//! needs the previous page's cursor); sibling collections' chains run
//! concurrently and their storage writes may interleave.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use arkiv_proto::{
    ArchiveRequest, CollectionSummary, ListFilter, PageCursor, ProtoError, ResultSet,
};
use arkiv_shared::{Address, CollectionKind};
use arkiv_store::{Collection, Storage};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{SyncEvent, SyncFailure, SyncReport};
use crate::transport::Transport;

/// Orchestrates sync passes against one remote archive.
pub struct SyncEngine<T: Transport> {
    storage: Arc<Mutex<Storage>>,
    transport: Arc<T>,
    config: SyncConfig,
    events: Option<mpsc::Sender<SyncEvent>>,
}

impl<T: Transport + 'static> SyncEngine<T> {
    pub fn new(storage: Arc<Mutex<Storage>>, transport: Arc<T>, config: SyncConfig) -> Self {
        Self {
            storage,
            transport,
            config,
            events: None,
        }
    }

    /// Attach a progress-event channel.
    pub fn with_events(mut self, events: mpsc::Sender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one full sync pass for `owner`'s archive.
    ///
    /// Returns the report of what was fetched.  Individual chain failures
    /// land in the report rather than failing the pass; the pass itself
    /// only fails when no archive namespace is supported or the probe
    /// loop cannot even run.
    pub async fn run(&self, owner: &Address) -> Result<SyncReport> {
        let namespace = self.detect_namespace().await?;
        self.emit(SyncEvent::NamespaceDetected {
            namespace: namespace.clone(),
        })
        .await;

        let mut report = SyncReport {
            namespace: namespace.clone(),
            collections: 0,
            entries: 0,
            failures: Vec::new(),
        };
        let mut chains = Vec::new();
        let mut cursor: Option<PageCursor> = None;

        loop {
            let mut request = ArchiveRequest::list_collections(&namespace, ListFilter::default())
                .with_page_size(self.config.page_size);
            if let Some(prev) = cursor.take() {
                request = request.continue_from(prev);
            }

            if let Err(e) = dispatch(self.transport.as_ref(), &self.config, &mut request).await {
                tracing::warn!(error = %e, "collection listing stopped");
                report.failures.push(SyncFailure {
                    context: "listing".to_string(),
                    error: e.to_string(),
                });
                break;
            }

            let summaries = match request.results() {
                Some(ResultSet::Collections(summaries)) => summaries.clone(),
                _ => Vec::new(),
            };

            for summary in summaries {
                let collection = match self.upsert_collection(owner, &summary).await {
                    Ok(collection) => collection,
                    Err(e) => {
                        report.failures.push(SyncFailure {
                            context: summary.contact.bare().to_string(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };
                report.collections += 1;

                let storage = Arc::clone(&self.storage);
                let transport = Arc::clone(&self.transport);
                let config = self.config.clone();
                let namespace = namespace.clone();
                chains.push(tokio::spawn(async move {
                    let contact = collection.contact.clone();
                    let id = collection.id;
                    let outcome =
                        sync_collection_entries(storage, transport, config, namespace, collection)
                            .await;
                    (id, contact, outcome)
                }));
            }

            let next = request.cursor().cloned().unwrap_or_default();
            if next.is_last_page() {
                break;
            }
            if !next.has_marker() {
                // Neither terminal nor continuable; stop instead of
                // stalling the pass.
                report.failures.push(SyncFailure {
                    context: "listing".to_string(),
                    error: ProtoError::InvalidCursor.to_string(),
                });
                break;
            }
            cursor = Some(next);
        }

        for joined in join_all(chains).await {
            match joined {
                Ok((collection_id, _, Ok(new_entries))) => {
                    report.entries += new_entries;
                    self.emit(SyncEvent::CollectionSynced {
                        collection_id,
                        new_entries,
                    })
                    .await;
                }
                Ok((_, contact, Err(e))) => {
                    tracing::warn!(contact = %contact.bare(), error = %e, "entry chain stopped");
                    report.failures.push(SyncFailure {
                        context: contact.bare().to_string(),
                        error: e.to_string(),
                    });
                }
                Err(join_error) => {
                    report.failures.push(SyncFailure {
                        context: "entry chain".to_string(),
                        error: join_error.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            collections = report.collections,
            entries = report.entries,
            failures = report.failures.len(),
            "sync pass finished"
        );
        self.emit(SyncEvent::Completed {
            report: report.clone(),
        })
        .await;
        Ok(report)
    }

    /// Probe the configured namespaces in order; the first supported one
    /// wins for the rest of the session.
    async fn detect_namespace(&self) -> Result<String> {
        for namespace in &self.config.namespaces {
            let mut request = ArchiveRequest::detect_support(namespace);
            match dispatch(self.transport.as_ref(), &self.config, &mut request).await {
                Ok(()) => {
                    tracing::info!(namespace = %namespace, "archive namespace supported");
                    return Ok(namespace.clone());
                }
                Err(e) => {
                    tracing::debug!(namespace = %namespace, error = %e, "namespace probe failed");
                }
            }
        }
        Err(SyncError::NoSupportedNamespace)
    }

    /// Create the collection for a listing summary, or refresh the one
    /// already stored under the same natural key.
    async fn upsert_collection(
        &self,
        owner: &Address,
        summary: &CollectionSummary,
    ) -> Result<Collection> {
        let mut storage = self.storage.lock().await;

        if let Some(mut existing) =
            storage.find_collection(owner, &summary.contact, summary.start)?
        {
            if existing.subject != summary.subject {
                storage.set_collection_subject(existing.id, &summary.subject)?;
                existing.subject = summary.subject.clone();
            }
            return Ok(existing);
        }

        // The wire carries neither the owner nor a collection kind; the
        // owner comes from the caller and the listing protocol only
        // serves chat archives.
        let mut collection = storage.new_collection(
            CollectionKind::Chat,
            owner,
            &summary.contact,
            summary.start,
        )?;
        if !summary.subject.is_empty() {
            storage.set_collection_subject(collection.id, &summary.subject)?;
            collection.subject = summary.subject.clone();
        }
        Ok(collection)
    }

    async fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}

/// One collection's entry chain: pull pages until the last one, persisting
/// every entry not already stored.
async fn sync_collection_entries<T: Transport>(
    storage: Arc<Mutex<Storage>>,
    transport: Arc<T>,
    config: SyncConfig,
    namespace: String,
    collection: Collection,
) -> Result<usize> {
    // Entries already stored under this collection, keyed by the fields
    // the wire can reproduce; re-fetching them must not duplicate rows.
    let mut seen: HashSet<(i64, String, DateTime<Utc>, String)> = {
        let storage = storage.lock().await;
        storage
            .entries_by_collection(collection.id)?
            .into_iter()
            .map(|e| (e.kind.code(), e.peer.bare().to_string(), e.utc, e.body))
            .collect()
    };

    let mut new_entries = 0;
    let mut cursor: Option<PageCursor> = None;

    loop {
        let mut request = ArchiveRequest::retrieve_collection(
            &namespace,
            collection.contact.clone(),
            collection.start,
        )
        .with_page_size(config.page_size);
        if let Some(prev) = cursor.take() {
            request = request.continue_from(prev);
        }

        dispatch(transport.as_ref(), &config, &mut request).await?;

        let items = match request.results() {
            Some(ResultSet::Entries(items)) => items.clone(),
            _ => Vec::new(),
        };

        {
            let mut storage = storage.lock().await;
            for item in items {
                let utc = item.utc(collection.start);
                let key = (
                    item.kind.code(),
                    item.peer.bare().to_string(),
                    utc,
                    item.body.clone(),
                );
                if seen.contains(&key) {
                    continue;
                }
                storage.new_entry(
                    collection.id,
                    item.kind,
                    &item.peer,
                    &item.nickname,
                    &item.body,
                    utc,
                )?;
                seen.insert(key);
                new_entries += 1;
            }
        }

        let next = request.cursor().cloned().unwrap_or_default();
        if next.is_last_page() {
            break;
        }
        if !next.has_marker() {
            return Err(ProtoError::InvalidCursor.into());
        }
        cursor = Some(next);
    }

    tracing::debug!(
        collection_id = collection.id,
        new_entries,
        "entry chain finished"
    );
    Ok(new_entries)
}

/// Build, send, and decode one request, bounded by the configured
/// timeout.
async fn dispatch<T: Transport + ?Sized>(
    transport: &T,
    config: &SyncConfig,
    request: &mut ArchiveRequest,
) -> Result<()> {
    let payload = request.payload()?;
    request.mark_sent();

    let request_id = Uuid::new_v4();
    tracing::debug!(id = %request_id, op = ?request.operation(), "dispatching archive request");

    let response = tokio::time::timeout(
        config.request_timeout,
        transport.round_trip(request_id, payload),
    )
    .await
    .map_err(|_| SyncError::Timeout)??;

    request.take_response(&response)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use arkiv_shared::constants::{ARCHIVE_NS, ARCHIVE_NS_LEGACY, RSM_NS};
    use arkiv_proto::Element;

    use crate::transport::{MockKey, MockTransport};

    use super::*;

    fn probe_key(namespace: &str) -> MockKey {
        MockKey {
            operation: "list".to_string(),
            namespace: Some(namespace.to_string()),
            with: None,
            after: None,
        }
    }

    fn supported_response(namespace: &str) -> Element {
        Element::parse(&format!(
            r#"<iq type="result"><list xmlns="{namespace}">
                 <set xmlns="{RSM_NS}"><count>0</count></set>
               </list></iq>"#
        ))
        .unwrap()
    }

    fn error_response() -> Element {
        Element::parse(
            r#"<iq type="error"><error code="501"><feature-not-implemented/></error></iq>"#,
        )
        .unwrap()
    }

    fn engine(transport: Arc<MockTransport>) -> (tempfile::TempDir, SyncEngine<MockTransport>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("probe.db")).unwrap();
        let engine =
            SyncEngine::new(Arc::new(Mutex::new(storage)), transport, SyncConfig::default());
        (dir, engine)
    }

    #[tokio::test]
    async fn falls_back_to_the_legacy_namespace() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(probe_key(ARCHIVE_NS), error_response());
        transport.enqueue(
            probe_key(ARCHIVE_NS_LEGACY),
            supported_response(ARCHIVE_NS_LEGACY),
        );

        let (_dir, engine) = engine(Arc::clone(&transport));
        let namespace = engine.detect_namespace().await.unwrap();
        assert_eq!(namespace, ARCHIVE_NS_LEGACY);
    }

    #[tokio::test]
    async fn no_supported_namespace_is_reported() {
        let transport = Arc::new(MockTransport::new());
        transport.enqueue(probe_key(ARCHIVE_NS), error_response());
        transport.enqueue(probe_key(ARCHIVE_NS_LEGACY), error_response());

        let (_dir, engine) = engine(transport);
        assert!(matches!(
            engine.detect_namespace().await,
            Err(SyncError::NoSupportedNamespace)
        ));
    }
}
