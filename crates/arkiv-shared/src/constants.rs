/// Current message archiving protocol namespace
pub const ARCHIVE_NS: &str = "urn:xmpp:archive";

/// Legacy archiving namespace, probed when the current one is unsupported
pub const ARCHIVE_NS_LEGACY: &str = "http://www.xmpp.org/extensions/xep-0136.html#ns";

/// Result-set pagination namespace
pub const RSM_NS: &str = "http://jabber.org/protocol/rsm";

/// Default maximum number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Page size used by capability probes (the answer is discarded anyway)
pub const PROBE_PAGE_SIZE: u32 = 1;
