//! Sync engine configuration.

use std::time::Duration;

use arkiv_shared::constants::{ARCHIVE_NS, ARCHIVE_NS_LEGACY, DEFAULT_PAGE_SIZE};

/// Tunables for one sync session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of items requested per page.
    pub page_size: u32,

    /// Deadline for each outstanding request.  A request that misses it
    /// terminates its pagination chain; the rest of the pass continues.
    pub request_timeout: Duration,

    /// Archive namespaces to probe, in preference order.  The first one
    /// the server supports is used for the whole session.
    pub namespaces: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            namespaces: vec![ARCHIVE_NS.to_string(), ARCHIVE_NS_LEGACY.to_string()],
        }
    }
}
