//! End-to-end sync passes against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use arkiv_proto::Element;
use arkiv_shared::constants::{ARCHIVE_NS, RSM_NS};
use arkiv_shared::Address;
use arkiv_store::Storage;
use arkiv_sync::{
    MockKey, MockTransport, SyncConfig, SyncEngine, SyncError, SyncEvent, Transport,
    TransportError,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2008, 8, 2, h, m, s).unwrap()
}

fn wire(t: DateTime<Utc>) -> String {
    arkiv_shared::timefmt::encode_utc(&t, true)
}

fn key(operation: &str, with: Option<&str>, after: Option<&str>) -> MockKey {
    MockKey {
        operation: operation.to_string(),
        namespace: Some(ARCHIVE_NS.to_string()),
        with: with.map(str::to_string),
        after: after.map(str::to_string),
    }
}

fn result(inner: &str) -> Element {
    Element::parse(&format!(r#"<iq type="result">{inner}</iq>"#)).unwrap()
}

fn error_response() -> Element {
    Element::parse(r#"<iq type="error"><error code="500"><internal-server-error/></error></iq>"#)
        .unwrap()
}

fn descriptor(body: &str) -> String {
    format!(r#"<set xmlns="{RSM_NS}">{body}</set>"#)
}

/// Script probe + listing + per-contact entry chains.
///
/// The capability probe and the first listing page share a routing key
/// (both are a `<list>` with no filters), so the probe response must be
/// enqueued first.
fn script_happy_path(transport: &MockTransport, alice_subject: &str, carol: &Element) {
    let list_key = key("list", None, None);

    // Probe.
    transport.enqueue(
        list_key.clone(),
        result(&format!(
            r#"<list xmlns="{ARCHIVE_NS}">{}</list>"#,
            descriptor("<count>0</count>")
        )),
    );

    // Listing page 1: alice + bob, more to come.
    transport.enqueue(
        list_key,
        result(&format!(
            r#"<list xmlns="{ARCHIVE_NS}">
                 <chat with="alice@example.org" subject="{alice_subject}" start="{}"/>
                 <chat with="bob@example.org" start="{}"/>
                 {}
               </list>"#,
            wire(ts(9, 0, 0)),
            wire(ts(10, 0, 0)),
            descriptor(r#"<first index="0">c0</first><last>c1</last><count>3</count>"#),
        )),
    );

    // Listing page 2: carol, final item.
    transport.enqueue(
        key("list", None, Some("c1")),
        result(&format!(
            r#"<list xmlns="{ARCHIVE_NS}">
                 <chat with="carol@example.org" start="{}"/>
                 {}
               </list>"#,
            wire(ts(11, 0, 0)),
            descriptor(r#"<first index="2">c2</first><last>c2</last><count>3</count>"#),
        )),
    );

    // Listing page 3: empty, count only -- the terminal page.
    transport.enqueue(
        key("list", None, Some("c2")),
        result(&format!(
            r#"<list xmlns="{ARCHIVE_NS}">{}</list>"#,
            descriptor("<count>3</count>")
        )),
    );

    // Alice: two pages of entries, then the terminal page.
    transport.enqueue(
        key("retrieve", Some("alice@example.org"), None),
        result(&format!(
            r#"<chat with="alice@example.org" start="{}">
                 <to jid="alice@example.org" name="alice" secs="0"><body>hi</body></to>
                 <from jid="owner@example.org" secs="60"><body>hello</body></from>
                 {}
               </chat>"#,
            wire(ts(9, 0, 0)),
            descriptor(r#"<first index="0">e0</first><last>e1</last><count>3</count>"#),
        )),
    );
    transport.enqueue(
        key("retrieve", Some("alice@example.org"), Some("e1")),
        result(&format!(
            r#"<chat with="alice@example.org" start="{}">
                 <note jid="owner@example.org" secs="120"><body>remember this</body></note>
                 {}
               </chat>"#,
            wire(ts(9, 0, 0)),
            descriptor(r#"<first index="2">e2</first><last>e2</last><count>3</count>"#),
        )),
    );
    transport.enqueue(
        key("retrieve", Some("alice@example.org"), Some("e2")),
        result(&format!(
            r#"<chat with="alice@example.org" start="{}">{}</chat>"#,
            wire(ts(9, 0, 0)),
            descriptor("<count>3</count>"),
        )),
    );

    // Bob: one page of entries, then the terminal page.
    transport.enqueue(
        key("retrieve", Some("bob@example.org"), None),
        result(&format!(
            r#"<chat with="bob@example.org" start="{}">
                 <to jid="bob@example.org" secs="5"><body>ping</body></to>
                 <from jid="owner@example.org" secs="10"><body>pong</body></from>
                 {}
               </chat>"#,
            wire(ts(10, 0, 0)),
            descriptor(r#"<first index="0">b0</first><last>b1</last><count>2</count>"#),
        )),
    );
    transport.enqueue(
        key("retrieve", Some("bob@example.org"), Some("b1")),
        result(&format!(
            r#"<chat with="bob@example.org" start="{}">{}</chat>"#,
            wire(ts(10, 0, 0)),
            descriptor("<count>2</count>"),
        )),
    );

    // Carol: whatever the scenario wants.
    transport.enqueue(key("retrieve", Some("carol@example.org"), None), carol.clone());
}

fn open_shared_storage(dir: &tempfile::TempDir) -> Arc<Mutex<Storage>> {
    Arc::new(Mutex::new(
        Storage::open(&dir.path().join("sync.db")).unwrap(),
    ))
}

#[tokio::test]
async fn full_pass_persists_collections_and_entries() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let storage = open_shared_storage(&dir);
    let owner = addr("owner@example.org");

    let transport = Arc::new(MockTransport::new());
    script_happy_path(&transport, "plans", &error_response());

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let engine = SyncEngine::new(
        Arc::clone(&storage),
        Arc::clone(&transport),
        SyncConfig::default(),
    )
    .with_events(events_tx);

    let report = engine.run(&owner).await.unwrap();

    assert_eq!(report.namespace, ARCHIVE_NS);
    assert_eq!(report.collections, 3);
    assert_eq!(report.entries, 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].context, "carol@example.org");

    let storage = storage.lock().await;
    let collections = storage.collections(Some(&owner), None).unwrap();
    assert_eq!(collections.len(), 3);

    let alice = storage
        .find_collection(&owner, &addr("alice@example.org"), ts(9, 0, 0))
        .unwrap()
        .expect("alice collection persisted");
    assert_eq!(alice.subject, "plans");

    let entries = storage.entries_by_collection(alice.id).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].body, "hi");
    assert_eq!(entries[0].utc, ts(9, 0, 0));
    assert_eq!(entries[1].utc, ts(9, 0, 0) + ChronoDuration::seconds(60));
    assert_eq!(entries[2].body, "remember this");

    // Carol's chain failed after her collection was created: the record
    // stays, with no entries, ready for the next pass.
    let carol = storage
        .find_collection(&owner, &addr("carol@example.org"), ts(11, 0, 0))
        .unwrap()
        .expect("carol collection persisted");
    assert!(storage.entries_by_collection(carol.id).unwrap().is_empty());
    drop(storage);

    // Events: namespace, one per synced chain, completion.
    let mut detected = 0;
    let mut synced = 0;
    let mut completed = 0;
    while let Ok(event) = events_rx.try_recv() {
        match event {
            SyncEvent::NamespaceDetected { .. } => detected += 1,
            SyncEvent::CollectionSynced { .. } => synced += 1,
            SyncEvent::Completed { .. } => completed += 1,
        }
    }
    assert_eq!((detected, synced, completed), (1, 2, 1));
}

#[tokio::test]
async fn rerunning_a_pass_is_idempotent() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let storage = open_shared_storage(&dir);
    let owner = addr("owner@example.org");

    // First pass: carol's chain fails.
    let transport = Arc::new(MockTransport::new());
    script_happy_path(&transport, "plans", &error_response());
    let engine = SyncEngine::new(
        Arc::clone(&storage),
        transport,
        SyncConfig::default(),
    );
    let first = engine.run(&owner).await.unwrap();
    assert_eq!(first.entries, 5);

    // Second pass: same data, but carol now answers and alice was
    // renamed.  Only genuinely new rows may appear.
    let carol_page = result(&format!(
        r#"<chat with="carol@example.org" start="{}">
             <to jid="carol@example.org" secs="1"><body>late reply</body></to>
             {}
           </chat>"#,
        wire(ts(11, 0, 0)),
        descriptor("<count>1</count>"),
    ));
    let transport = Arc::new(MockTransport::new());
    script_happy_path(&transport, "new plans", &carol_page);
    let engine = SyncEngine::new(
        Arc::clone(&storage),
        transport,
        SyncConfig::default(),
    );
    let second = engine.run(&owner).await.unwrap();

    assert_eq!(second.collections, 3);
    assert_eq!(second.entries, 1, "only carol's entry is new");
    assert!(second.failures.is_empty());

    let storage = storage.lock().await;
    assert_eq!(storage.collections(None, None).unwrap().len(), 3);

    let alice = storage
        .find_collection(&owner, &addr("alice@example.org"), ts(9, 0, 0))
        .unwrap()
        .unwrap();
    assert_eq!(alice.subject, "new plans", "subject refreshed by upsert");
    assert_eq!(storage.entries_by_collection(alice.id).unwrap().len(), 3);

    let carol = storage
        .find_collection(&owner, &addr("carol@example.org"), ts(11, 0, 0))
        .unwrap()
        .unwrap();
    let carol_entries = storage.entries_by_collection(carol.id).unwrap();
    assert_eq!(carol_entries.len(), 1);
    assert_eq!(carol_entries[0].body, "late reply");
}

/// A transport whose responses never arrive.
struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn round_trip(
        &self,
        _request_id: Uuid,
        _payload: Element,
    ) -> Result<Element, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn stalled_requests_time_out_instead_of_hanging() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let storage = open_shared_storage(&dir);

    let config = SyncConfig {
        request_timeout: Duration::from_millis(50),
        ..SyncConfig::default()
    };
    let engine = SyncEngine::new(storage, Arc::new(StalledTransport), config);

    // Every probe times out, so the pass reports the lack of support
    // rather than stalling forever.
    let outcome = engine.run(&addr("owner@example.org")).await;
    assert!(matches!(outcome, Err(SyncError::NoSupportedNamespace)));
}
