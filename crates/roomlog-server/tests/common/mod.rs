// Shared helpers for server integration tests
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use roomlog_common::Message;
use roomlog_core::{
    Aggregator, AggregatorConfig, Configuration, GrpcPeerClient, MessageLog, PeerAddress,
    StaticPeerDiscovery,
};
use roomlog_server::{
    model::AppState,
    startup::{ExportServerHandle, ShutdownSignal, start_export_server},
};

/// A node's export side running on an ephemeral port
pub struct TestNode {
    pub log: Arc<MessageLog>,
    pub server: ExportServerHandle,
    pub shutdown: ShutdownSignal,
}

impl TestNode {
    pub async fn start(messages: &[Message]) -> Self {
        Self::start_with_log(Arc::new(MessageLog::new()), messages).await
    }

    pub async fn start_with_log(log: Arc<MessageLog>, messages: &[Message]) -> Self {
        for message in messages {
            log.append(message.clone()).unwrap();
        }
        let shutdown = ShutdownSignal::new();
        let server = start_export_server(log.clone(), 4, "127.0.0.1", 0, shutdown.cancelled())
            .await
            .unwrap();
        Self {
            log,
            server,
            shutdown,
        }
    }

    pub fn address(&self) -> PeerAddress {
        PeerAddress::from(self.server.local_addr)
    }
}

/// An address nobody listens on
pub fn closed_port() -> PeerAddress {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    PeerAddress::from(addr)
}

/// Accepts TCP connections and never answers
pub async fn silent_peer() -> PeerAddress {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    PeerAddress::from(addr)
}

/// TCP relay in front of a node, counting the connections made through it
pub struct CountingRelay {
    pub address: PeerAddress,
    accepted: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

impl CountingRelay {
    pub async fn start(target: PeerAddress) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let open = Arc::new(AtomicUsize::new(0));

        let (accepted_count, open_count) = (accepted.clone(), open.clone());
        let target = target.to_string();
        tokio::spawn(async move {
            while let Ok((mut inbound, _)) = listener.accept().await {
                accepted_count.fetch_add(1, Ordering::SeqCst);
                open_count.fetch_add(1, Ordering::SeqCst);
                let open_count = open_count.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    if let Ok(mut outbound) = tokio::net::TcpStream::connect(&target).await {
                        let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                    }
                    open_count.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            address: PeerAddress::from(addr),
            accepted,
            open,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Poll `condition` for up to two seconds
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

pub fn test_config() -> AggregatorConfig {
    AggregatorConfig {
        peer_timeout: Duration::from_secs(5),
        deadline: Duration::from_secs(10),
        cancel_grace: Duration::from_millis(300),
    }
}

pub fn aggregator(peers: Vec<PeerAddress>, config: AggregatorConfig) -> Aggregator {
    Aggregator::new(
        Arc::new(StaticPeerDiscovery::new(peers)),
        Arc::new(GrpcPeerClient::new(Duration::from_millis(500))),
        config,
    )
}

pub fn app_state(
    log: Arc<MessageLog>,
    peers: Vec<PeerAddress>,
    config: AggregatorConfig,
    shutdown: ShutdownSignal,
) -> AppState {
    AppState::new(
        Configuration::default(),
        log,
        Arc::new(aggregator(peers, config)),
        shutdown,
    )
}

pub fn msg(room: &str, client_name: &str, text: &str) -> Message {
    Message::new(room, client_name, text)
}
