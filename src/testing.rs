//! In-memory collaborators for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::discovery::{DiscoveryNotifier, ObserverContext};
use crate::models::{AttendantEvent, HubMetadata, InfoPatch, PeerInfo, RpcError};
use crate::peer::{
    AttendantStream, ConnectHandler, ConnectionEvent, HubRpc, InboundTunnel, Network, PeerSet,
    TunnelStream,
};

/// Install a fmt subscriber once per test binary; `RUST_LOG` controls output
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn ignore_inbound() -> ConnectHandler {
    Arc::new(|_: InboundTunnel| {})
}

pub fn collect_inbound() -> (ConnectHandler, Arc<Mutex<Vec<InboundTunnel>>>) {
    let inbound = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&inbound);
    let handler: ConnectHandler = Arc::new(move |tunnel: InboundTunnel| sink.lock().push(tunnel));
    (handler, inbound)
}

pub fn observer_context(local_pubkey: &str) -> (ObserverContext, Arc<MemoryNetwork>) {
    init_tracing();
    let network = MemoryNetwork::new();
    let context = ObserverContext {
        local_pubkey: local_pubkey.to_string(),
        network: network.clone(),
        notifier: Arc::new(DiscoveryNotifier::new()),
    };
    (context, network)
}

// ============================================================================
// Hub RPC
// ============================================================================

type AttendantSender = mpsc::UnboundedSender<Result<AttendantEvent, RpcError>>;
type AttendantReceiver = mpsc::UnboundedReceiver<Result<AttendantEvent, RpcError>>;

/// Scripted remote peer
pub struct MockHub {
    metadata: Result<HubMetadata, RpcError>,
    metadata_calls: AtomicUsize,
    events: Mutex<Option<AttendantSender>>,
    subscription: Mutex<Option<AttendantReceiver>>,
    tunnels: Mutex<HashMap<String, DuplexStream>>,
    refuse_tunnels: AtomicBool,
    closed: AtomicBool,
}

impl MockHub {
    /// A hub with empty metadata
    pub fn new() -> Arc<Self> {
        Self::with_metadata(Ok(HubMetadata::default()))
    }

    pub fn with_metadata(metadata: Result<HubMetadata, RpcError>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            metadata,
            metadata_calls: AtomicUsize::new(0),
            events: Mutex::new(Some(tx)),
            subscription: Mutex::new(Some(rx)),
            tunnels: Mutex::new(HashMap::new()),
            refuse_tunnels: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Deliver an attendant event on the `hub.attendants` stream
    pub fn push(&self, event: AttendantEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(Ok(event));
        }
    }

    /// Fail the `hub.attendants` stream with `error`, then end it
    pub fn fail(&self, error: RpcError) {
        if let Some(tx) = self.events.lock().take() {
            let _ = tx.send(Err(error));
        }
    }

    pub fn refuse_tunnels(&self) {
        self.refuse_tunnels.store(true, Ordering::SeqCst);
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Far end of the tunnel opened towards `target`
    pub fn take_tunnel(&self, target: &str) -> Option<DuplexStream> {
        self.tunnels.lock().remove(target)
    }
}

#[async_trait]
impl HubRpc for MockHub {
    async fn metadata(&self) -> Result<HubMetadata, RpcError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.clone()
    }

    fn attendants(&self) -> AttendantStream {
        match self.subscription.lock().take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn create_tunnel(&self, target: &str) -> Result<TunnelStream, RpcError> {
        if self.refuse_tunnels.load(Ordering::SeqCst) {
            return Err(RpcError::new(format!("could not reach {}", target)));
        }
        let (near, far) = tokio::io::duplex(1024);
        self.tunnels.lock().insert(target.to_string(), far);
        Ok(Box::new(near))
    }

    async fn close(&self) -> Result<(), RpcError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Network
// ============================================================================

/// A call the code under test made on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCall {
    Connect(String),
    Disconnect(String),
    Forget(String),
    UpdateInfo(String),
}

pub struct MemoryNetwork {
    events: mpsc::UnboundedSender<ConnectionEvent>,
    listener: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
    calls: Mutex<Vec<NetCall>>,
    infos: Mutex<HashMap<String, InfoPatch>>,
    peers: Mutex<Vec<(String, PeerInfo)>>,
    fail_connects: AtomicBool,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            events: tx,
            listener: Mutex::new(Some(rx)),
            calls: Mutex::new(Vec::new()),
            infos: Mutex::new(HashMap::new()),
            peers: Mutex::new(Vec::new()),
            fail_connects: AtomicBool::new(false),
        })
    }

    /// Deliver a connection lifecycle event to the listener
    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    pub fn has_call(&self, call: &NetCall) -> bool {
        self.calls.lock().contains(call)
    }

    pub fn count_calls(&self, call: &NetCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Everything merged into the record for `multiaddr` so far
    pub fn info(&self, multiaddr: &str) -> Option<InfoPatch> {
        self.infos.lock().get(multiaddr).cloned()
    }

    pub fn set_peers(&self, peers: Vec<(String, PeerInfo)>) {
        *self.peers.lock() = peers;
    }

    pub fn fail_connects(&self) {
        self.fail_connects.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: NetCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    fn listen(&self) -> BoxStream<'static, ConnectionEvent> {
        match self.listener.lock().take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn connect(&self, multiaddr: &str) -> anyhow::Result<Arc<dyn HubRpc>> {
        self.record(NetCall::Connect(multiaddr.to_string()));
        if self.fail_connects.load(Ordering::SeqCst) {
            anyhow::bail!("connection to {} refused", multiaddr);
        }
        let rpc: Arc<dyn HubRpc> = MockHub::new();
        Ok(rpc)
    }

    async fn disconnect(&self, multiaddr: &str) -> anyhow::Result<()> {
        self.record(NetCall::Disconnect(multiaddr.to_string()));
        Ok(())
    }

    fn forget(&self, multiaddr: &str) {
        self.record(NetCall::Forget(multiaddr.to_string()));
    }

    fn update_info(&self, multiaddr: &str, patch: InfoPatch) {
        self.record(NetCall::UpdateInfo(multiaddr.to_string()));
        self.infos
            .lock()
            .entry(multiaddr.to_string())
            .or_default()
            .merge(&patch);
    }

    async fn peers(&self) -> anyhow::Result<Vec<(String, PeerInfo)>> {
        Ok(self.peers.lock().clone())
    }
}

// ============================================================================
// Peer set
// ============================================================================

/// Append-only peer set that does not deduplicate
#[derive(Default)]
pub struct MemoryPeerSet {
    values: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryPeerSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, subdomain: &str, value: &str) {
        self.values
            .lock()
            .entry(subdomain.to_string())
            .or_default()
            .push(value.to_string());
    }
}

#[async_trait]
impl PeerSet for MemoryPeerSet {
    async fn add(&self, subdomain: &str, value: &str) -> anyhow::Result<bool> {
        self.insert(subdomain, value);
        Ok(true)
    }

    fn values(&self, subdomain: &str) -> Vec<String> {
        self.values
            .lock()
            .get(subdomain)
            .cloned()
            .unwrap_or_default()
    }
}
