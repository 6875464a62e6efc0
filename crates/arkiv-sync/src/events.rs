//! Progress notifications and the end-of-pass report.

use serde::Serialize;

use arkiv_shared::Id;

/// One failed step of a sync pass.
///
/// Failures are reported, not retried: the affected pagination chain
/// stops, everything persisted before the failure stays, and the next
/// pass picks up the rest.
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    /// What was being fetched ("listing", or the contact of an entry
    /// chain).
    pub context: String,
    /// Human-readable error description.
    pub error: String,
}

/// Summary of a completed sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// The namespace the session settled on.
    pub namespace: String,
    /// Collections seen in the listing (created or already present).
    pub collections: usize,
    /// Entries newly persisted by this pass.
    pub entries: usize,
    /// Chains that stopped early.
    pub failures: Vec<SyncFailure>,
}

/// Progress notification emitted while a pass runs.
#[derive(Debug, Clone, Serialize)]
pub enum SyncEvent {
    /// Capability detection settled on a namespace.
    NamespaceDetected { namespace: String },
    /// One collection's entry chain ran to its last page.
    CollectionSynced { collection_id: Id, new_entries: usize },
    /// The pass is over; the report is final.
    Completed { report: SyncReport },
}
