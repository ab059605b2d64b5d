//! End-to-end tests: dispatcher and reconciliation against in-process
//! sync servers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use usersync_core::{
    AccountRecord, AccountStore, Destination, GuardMode, MemoryAccountStore, ReentrancyGuard,
    SettingsHandle, SyncSettings, SystemClock,
};
use usersync_engine::{
    BatchCursor, ChangeDispatcher, HttpClient, HttpMethod, HttpRequest, HttpResponse,
    LoopbackClient, LoopbackServer, ReconciliationEngine,
};
use usersync_server::{InboundRequest, Method, ServerConfig, SyncServer};

const SHARED_SECRET: &str = "shared-passphrase";

type Server = SyncServer<Arc<MemoryAccountStore>>;

/// Adapts a sync server to the loopback seam.
struct SiteServer(Arc<Server>);

impl LoopbackServer for SiteServer {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Head => Method::HEAD,
        };
        let mut inbound = InboundRequest::new(method, request.path())
            .body(request.body.clone())
            .remote_addr("127.0.0.1");
        for (name, value) in &request.headers {
            inbound = inbound.header(name, value.as_str());
        }
        let response = self.0.handle(&inbound);
        let body = serde_json::to_vec(&response.body).unwrap_or_default();
        HttpResponse::new(response.status, body)
    }
}

/// Routes requests to sites by host; unknown hosts are unreachable.
#[derive(Default)]
struct Network {
    sites: RwLock<HashMap<String, SiteServer>>,
}

impl Network {
    fn attach(&self, host: &str, server: Arc<Server>) {
        self.sites.write().insert(host.to_string(), SiteServer(server));
    }
}

impl HttpClient for Network {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let host = request
            .url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
            .to_string();
        let sites = self.sites.read();
        match sites.get(&host) {
            Some(site) => Ok(site.handle(&request)),
            None => Err(format!("could not connect to {}", host)),
        }
    }
}

struct Site {
    store: Arc<MemoryAccountStore>,
    settings: SettingsHandle,
    dispatcher: Arc<ChangeDispatcher<Arc<Network>>>,
    server: Arc<Server>,
}

fn site(network: &Arc<Network>, host: &str, api_key: &str) -> Site {
    let settings = SettingsHandle::new(SyncSettings {
        api_key: api_key.to_string(),
        encryption_key: SHARED_SECRET.to_string(),
        verify_signature: true,
        enabled: true,
        ..SyncSettings::default()
    });
    let store = Arc::new(MemoryAccountStore::new());
    let guard = Arc::new(ReentrancyGuard::new(GuardMode::PerThread));

    let dispatcher = Arc::new(ChangeDispatcher::new(
        settings.clone(),
        network.clone(),
        guard.clone(),
    ));
    store.subscribe(dispatcher.clone());

    let server = Arc::new(SyncServer::with_parts(
        ServerConfig::default(),
        settings.clone(),
        store.clone(),
        guard,
        Arc::new(SystemClock),
    ));
    network.attach(host, server.clone());

    Site {
        store,
        settings,
        dispatcher,
        server,
    }
}

fn link(from: &Site, host: &str, api_key: &str) {
    from.dispatcher
        .registry()
        .add(Destination::new(format!("https://{}", host), api_key));
}

fn alice() -> AccountRecord {
    AccountRecord::new("alice", "alice@example.com")
        .with_name("Alice", "Liddell")
        .with_role("editor")
        .with_meta("nickname", serde_json::json!("al"))
}

#[test]
fn create_update_delete_propagate() {
    let network = Arc::new(Network::default());
    let origin = site(&network, "origin.example", "origin-key");
    let peer = site(&network, "peer.example", "peer-key");
    link(&origin, "peer.example", "peer-key");

    let id = origin.store.create(alice()).unwrap();
    let copy = peer.store.find_by_login("alice").unwrap().unwrap();
    assert_eq!(copy.email, "alice@example.com");
    assert_eq!(copy.first_name, "Alice");
    assert_eq!(copy.roles, vec!["editor".to_string()]);
    assert_eq!(copy.metadata.get("nickname"), Some(&serde_json::json!("al")));

    let mut changed = origin.store.get(id).unwrap().unwrap();
    changed.email = "alice@wonderland.example".into();
    changed.display_name = "Alice L.".into();
    origin.store.update(&changed).unwrap();
    let copy = peer.store.find_by_login("alice").unwrap().unwrap();
    assert_eq!(copy.email, "alice@wonderland.example");
    assert_eq!(copy.display_name, "Alice L.");

    origin.store.delete(id).unwrap();
    assert!(peer.store.find_by_login("alice").unwrap().is_none());
}

#[test]
fn bidirectional_link_does_not_echo() {
    let network = Arc::new(Network::default());
    let a = site(&network, "a.example", "key-a");
    let b = site(&network, "b.example", "key-b");
    link(&a, "b.example", "key-b");
    link(&b, "a.example", "key-a");

    a.store.create(alice()).unwrap();

    // One apply on each side; an echo would hit a's uniqueness check or
    // re-create the account.
    assert_eq!(a.store.count().unwrap(), 1);
    assert_eq!(b.store.count().unwrap(), 1);
    assert!(!a.server.guard().is_engaged());
    assert!(!b.server.guard().is_engaged());

    let id = b.store.find_by_login("alice").unwrap().unwrap().id;
    let mut renamed = b.store.get(id).unwrap().unwrap();
    renamed.last_name = "Pleasance".into();
    b.store.update(&renamed).unwrap();
    let original = a.store.find_by_login("alice").unwrap().unwrap();
    assert_eq!(original.last_name, "Pleasance");
}

#[test]
fn unreachable_destination_does_not_block_others() {
    let network = Arc::new(Network::default());
    let origin = site(&network, "origin.example", "origin-key");
    let peer = site(&network, "peer.example", "peer-key");
    link(&origin, "down.example", "whatever");
    link(&origin, "peer.example", "peer-key");

    origin.store.create(alice()).unwrap();
    assert!(peer.store.find_by_login("alice").unwrap().is_some());
}

#[test]
fn mismatched_secret_is_rejected() {
    let network = Arc::new(Network::default());
    let origin = site(&network, "origin.example", "origin-key");
    let peer = site(&network, "peer.example", "peer-key");
    link(&origin, "peer.example", "peer-key");
    peer.settings
        .update(|s| s.encryption_key = "another-passphrase".into());

    let event = origin
        .dispatcher
        .reconcile_event(&alice(), &origin.settings.snapshot());
    let report = origin.dispatcher.dispatch(&event);
    assert!(!report.accepted());
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.status, Some(400));
    assert_eq!(peer.store.count().unwrap(), 0);
}

#[test]
fn reconciliation_pages_through_all_accounts() {
    let network = Arc::new(Network::default());
    let origin = site(&network, "origin.example", "origin-key");
    let peer = site(&network, "peer.example", "peer-key");

    // Seed before linking so nothing is dispatched yet.
    for i in 0..25 {
        origin
            .store
            .create(AccountRecord::new(
                format!("user{i}"),
                format!("user{i}@example.com"),
            ))
            .unwrap();
    }
    link(&origin, "peer.example", "peer-key");

    let engine = ReconciliationEngine::new(origin.dispatcher.clone(), origin.store.clone());
    let mut cursor = BatchCursor::start(10);
    let mut pages = Vec::new();
    loop {
        let report = engine.run_batch(cursor).unwrap();
        pages.push((cursor.offset, report.completed, report.total_processed));
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        if report.completed {
            break;
        }
        cursor = cursor.advance(report.batch_size_actual);
    }

    assert_eq!(pages, vec![(0, false, 10), (10, false, 20), (20, true, 25)]);
    assert_eq!(peer.store.count().unwrap(), 25);
}

#[test]
fn reconciliation_updates_existing_peer_accounts() {
    let network = Arc::new(Network::default());
    let origin = site(&network, "origin.example", "origin-key");
    let peer = site(&network, "peer.example", "peer-key");
    peer.store
        .create(AccountRecord::new("alice", "old@example.com"))
        .unwrap();
    origin.store.create(alice()).unwrap();
    link(&origin, "peer.example", "peer-key");

    let engine = ReconciliationEngine::new(origin.dispatcher.clone(), origin.store.clone());
    let summary = engine.sync_all(10).unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.success, 1);

    let copy = peer.store.find_by_login("alice").unwrap().unwrap();
    assert_eq!(copy.email, "alice@example.com");
    assert_eq!(peer.store.count().unwrap(), 1);
}

#[test]
fn connection_test_over_loopback() {
    let network = Arc::new(Network::default());
    let peer = site(&network, "peer.example", "peer-key");

    let settings = SettingsHandle::new(SyncSettings {
        remote_sites: vec![
            Destination::new("https://peer.example", "peer-key"),
            Destination::new("https://peer.example", "wrong-key"),
            Destination::new("", "orphan"),
        ],
        verify_signature: true,
        ..SyncSettings::default()
    });
    let client = LoopbackClient::new(SiteServer(peer.server.clone()));
    let dispatcher = ChangeDispatcher::new(settings, client, Arc::new(ReentrancyGuard::default()));

    let reports = dispatcher.test_connections().unwrap();
    assert_eq!(reports.len(), 3);
    assert!(reports[0].success);
    assert_eq!(
        reports[0].message,
        format!("Connected (v{})", usersync_core::VERSION)
    );
    assert!(!reports[1].success);
    assert_eq!(reports[1].message, "HTTP 403: Invalid API key");
    assert_eq!(reports[2].url, "Unknown");
    assert_eq!(reports[2].message, "Missing URL or API key");
}
