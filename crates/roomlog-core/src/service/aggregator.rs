//! Fan-out aggregation across all discovered peers
//!
//! One collection round:
//! 1. Resolve peers (an empty set is a valid, empty result)
//! 2. Spawn one worker per peer; each connects, drains its export stream into
//!    a private buffer and reports back
//! 3. Concatenate buffers in discovery order
//!
//! A peer's contribution is all or nothing while it is running on its own:
//! connection failures, mid-stream errors and the per-peer timeout discard
//! whatever it buffered. Cancellation from above (caller cancel or the
//! overall deadline) is different: in-flight workers hand back what they have
//! so far and the round returns a partial result.

use std::{future::Future, sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{
    sync::watch,
    task::JoinSet,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use roomlog_common::{Message, RoomlogError};

use super::discovery::{PeerAddress, PeerDiscovery};
use super::peer_client::PeerClient;
use crate::model::Configuration;

/// Timeouts for a collection round
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Bound on one peer's connect + full drain
    pub peer_timeout: Duration,
    /// Bound on the whole round
    pub deadline: Duration,
    /// How long cancelled workers get to hand back partial buffers
    pub cancel_grace: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(10),
            cancel_grace: Duration::from_millis(500),
        }
    }
}

impl AggregatorConfig {
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            peer_timeout: Duration::from_millis(config.aggregator_peer_timeout_ms()),
            deadline: Duration::from_millis(config.aggregator_deadline_ms()),
            cancel_grace: Duration::from_millis(config.aggregator_cancel_grace_ms()),
        }
    }
}

/// Collection state of one peer within a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl PeerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PeerState::Completed | PeerState::Failed | PeerState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerState::Idle => "idle",
            PeerState::Connecting => "connecting",
            PeerState::Streaming => "streaming",
            PeerState::Completed => "completed",
            PeerState::Failed => "failed",
            PeerState::Cancelled => "cancelled",
        }
    }
}

/// Terminal status of a whole round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregationStatus {
    /// Every peer reached Completed or Failed on its own
    Completed,
    /// The overall deadline fired first
    TimedOut,
    /// The caller cancelled the round
    Cancelled,
}

impl AggregationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStatus::Completed => "completed",
            AggregationStatus::TimedOut => "timed-out",
            AggregationStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one peer within a round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerReport {
    pub peer: PeerAddress,
    pub state: PeerState,
    /// Messages this peer contributed to the result
    pub messages: usize,
    pub error: Option<String>,
}

/// Merged result of a round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregationResult {
    /// Per-peer buffers concatenated in discovery order
    pub messages: Vec<Message>,
    /// One report per discovered peer, in discovery order
    pub peers: Vec<PeerReport>,
    pub status: AggregationStatus,
}

impl AggregationResult {
    pub fn empty() -> Self {
        Self {
            messages: vec![],
            peers: vec![],
            status: AggregationStatus::Completed,
        }
    }

    /// Number of peers that contributed a complete log
    pub fn completed_peers(&self) -> usize {
        self.peers
            .iter()
            .filter(|p| p.state == PeerState::Completed)
            .count()
    }
}

/// What a worker hands back
#[derive(Debug)]
struct PeerCollection {
    state: PeerState,
    messages: Vec<Message>,
    error: Option<String>,
}

/// Tracks one peer through Idle -> Connecting -> Streaming -> terminal
struct PeerAttempt {
    peer: PeerAddress,
    state: PeerState,
    buffer: Vec<Message>,
}

impl PeerAttempt {
    fn new(peer: PeerAddress) -> Self {
        Self {
            peer,
            state: PeerState::Idle,
            buffer: Vec::new(),
        }
    }

    fn transition(&mut self, next: PeerState) {
        debug_assert!(!self.state.is_terminal(), "peer already finished");
        debug!(
            peer = %self.peer,
            from = self.state.as_str(),
            to = next.as_str(),
            "Peer state change"
        );
        self.state = next;
    }

    fn complete(mut self) -> PeerCollection {
        self.transition(PeerState::Completed);
        PeerCollection {
            state: self.state,
            messages: self.buffer,
            error: None,
        }
    }

    /// Failed peers contribute nothing, even if part of the log arrived
    fn fail(mut self, error: String) -> PeerCollection {
        let discarded = self.buffer.len();
        self.transition(PeerState::Failed);
        warn!(peer = %self.peer, discarded, error = %error, "Peer collection failed");
        metrics::counter!("roomlog_peer_failures_total").increment(1);
        PeerCollection {
            state: self.state,
            messages: Vec::new(),
            error: Some(error),
        }
    }

    /// Cancelled peers contribute whatever they buffered
    fn cancel(mut self) -> PeerCollection {
        self.transition(PeerState::Cancelled);
        info!(peer = %self.peer, buffered = self.buffer.len(), "Peer collection cancelled");
        PeerCollection {
            state: self.state,
            messages: self.buffer,
            error: Some(RoomlogError::Cancelled.to_string()),
        }
    }
}

enum DrainEnd {
    Exhausted,
    Cancelled,
}

/// Resolves when the round is cancelled. Never resolves if the round was dropped.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn drain(
    client: &dyn PeerClient,
    attempt: &mut PeerAttempt,
    cancel: &mut watch::Receiver<bool>,
) -> Result<DrainEnd, RoomlogError> {
    attempt.transition(PeerState::Connecting);
    let mut stream = tokio::select! {
        opened = client.open_export(&attempt.peer) => opened?,
        _ = cancelled(cancel) => return Ok(DrainEnd::Cancelled),
    };

    attempt.transition(PeerState::Streaming);
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(message)) => attempt.buffer.push(message),
                Some(Err(e)) => return Err(e),
                None => return Ok(DrainEnd::Exhausted),
            },
            _ = cancelled(cancel) => return Ok(DrainEnd::Cancelled),
        }
    }
}

/// Worker body for one peer. The stream and its connection are dropped on return.
async fn collect_peer(
    client: Arc<dyn PeerClient>,
    peer: PeerAddress,
    peer_timeout: Duration,
    mut cancel: watch::Receiver<bool>,
) -> PeerCollection {
    let mut attempt = PeerAttempt::new(peer);

    let outcome =
        tokio::time::timeout(peer_timeout, drain(client.as_ref(), &mut attempt, &mut cancel))
            .await;

    match outcome {
        Ok(Ok(DrainEnd::Exhausted)) => attempt.complete(),
        Ok(Ok(DrainEnd::Cancelled)) => attempt.cancel(),
        Ok(Err(e)) => attempt.fail(e.to_string()),
        Err(_) => attempt.fail(format!("peer timed out after {:?}", peer_timeout)),
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Merges the logs of all discovered peers
pub struct Aggregator {
    discovery: Arc<dyn PeerDiscovery>,
    client: Arc<dyn PeerClient>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        discovery: Arc<dyn PeerDiscovery>,
        client: Arc<dyn PeerClient>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            discovery,
            client,
            config,
        }
    }

    pub fn discovery(&self) -> &Arc<dyn PeerDiscovery> {
        &self.discovery
    }

    /// Collect from every peer, bounded only by the configured deadline
    pub async fn collect_all(&self) -> AggregationResult {
        self.collect_all_until(std::future::pending::<()>()).await
    }

    /// Collect from every peer until done, the deadline fires or `cancel` resolves.
    ///
    /// Never fails: unreachable or broken peers show up as `Failed` reports and
    /// contribute nothing. After cancellation the call returns within the
    /// configured grace period with whatever was buffered.
    pub async fn collect_all_until<F>(&self, cancel: F) -> AggregationResult
    where
        F: Future<Output = ()> + Send,
    {
        metrics::counter!("roomlog_aggregations_total").increment(1);

        let peers = self.discovery.resolve().await;
        if peers.is_empty() {
            info!("No peers discovered, returning empty aggregation");
            return AggregationResult::empty();
        }

        info!(peers = peers.len(), "Collecting messages from peers");

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        for (index, peer) in peers.iter().cloned().enumerate() {
            let client = self.client.clone();
            let cancel = cancel_rx.clone();
            let peer_timeout = self.config.peer_timeout;
            workers.spawn(async move {
                (
                    index,
                    collect_peer(client, peer, peer_timeout, cancel).await,
                )
            });
        }

        let mut slots: Vec<Option<PeerCollection>> = peers.iter().map(|_| None).collect();
        let deadline = Instant::now() + self.config.deadline;
        let mut status = AggregationStatus::Completed;
        let mut grace_deadline: Option<Instant> = None;

        tokio::pin!(cancel);

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok((index, collection))) => slots[index] = Some(collection),
                    Some(Err(e)) => warn!(error = %e, "Peer worker ended abnormally"),
                    None => break,
                },
                _ = sleep_until(deadline), if grace_deadline.is_none() => {
                    warn!(deadline = ?self.config.deadline, "Aggregation deadline reached, cancelling peers");
                    status = AggregationStatus::TimedOut;
                    grace_deadline = Some(Instant::now() + self.config.cancel_grace);
                    let _ = cancel_tx.send(true);
                },
                _ = &mut cancel, if grace_deadline.is_none() => {
                    info!("Aggregation cancelled by caller");
                    status = AggregationStatus::Cancelled;
                    grace_deadline = Some(Instant::now() + self.config.cancel_grace);
                    let _ = cancel_tx.send(true);
                },
                _ = sleep_until_opt(grace_deadline) => {
                    warn!(pending = workers.len(), "Peers did not stop within grace period, aborting");
                    workers.abort_all();
                    break;
                },
            }
        }

        let result = merge(peers, slots, status);
        info!(
            status = result.status.as_str(),
            messages = result.messages.len(),
            completed = result.completed_peers(),
            peers = result.peers.len(),
            "Aggregation finished"
        );
        result
    }
}

fn merge(
    peers: Vec<PeerAddress>,
    slots: Vec<Option<PeerCollection>>,
    status: AggregationStatus,
) -> AggregationResult {
    let mut messages = Vec::new();
    let mut reports = Vec::with_capacity(peers.len());

    for (peer, slot) in peers.into_iter().zip(slots) {
        let collection = slot.unwrap_or_else(|| match status {
            // Worker panicked
            AggregationStatus::Completed => PeerCollection {
                state: PeerState::Failed,
                messages: Vec::new(),
                error: Some("peer worker aborted".to_string()),
            },
            // Worker was aborted after the grace period
            _ => PeerCollection {
                state: PeerState::Cancelled,
                messages: Vec::new(),
                error: Some(RoomlogError::Cancelled.to_string()),
            },
        });

        reports.push(PeerReport {
            peer,
            state: collection.state,
            messages: collection.messages.len(),
            error: collection.error,
        });
        messages.extend(collection.messages);
    }

    AggregationResult {
        messages,
        peers: reports,
        status,
    }
}
