//! Application state shared across HTTP handlers and the export server

use std::{sync::Arc, time::Duration};

use roomlog_common::RoomlogError;
use roomlog_core::{
    Aggregator, AggregatorConfig, Configuration, DiscoveryConfig, GrpcPeerClient, MessageLog,
    create_peer_discovery,
};

use crate::startup::ShutdownSignal;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub configuration: Configuration,
    pub message_log: Arc<MessageLog>,
    pub aggregator: Arc<Aggregator>,
    /// Fires on process shutdown; in-flight reads are cancelled with it
    pub shutdown: ShutdownSignal,
    /// Startup time in epoch milliseconds
    pub started_at: i64,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("configuration", &self.configuration)
            .field("local_messages", &self.message_log.len())
            .field("discovery", &self.aggregator.discovery().describe())
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl AppState {
    pub fn new(
        configuration: Configuration,
        message_log: Arc<MessageLog>,
        aggregator: Arc<Aggregator>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            configuration,
            message_log,
            aggregator,
            shutdown,
            started_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Wire the node from its configuration: local log, discovery and the aggregator
    pub fn from_configuration(
        configuration: Configuration,
        shutdown: ShutdownSignal,
    ) -> Result<Self, RoomlogError> {
        let message_log = Arc::new(MessageLog::with_capacity_limit(
            configuration.log_max_messages(),
        ));

        let discovery = create_peer_discovery(&DiscoveryConfig::from_configuration(&configuration)?)?;
        let client = Arc::new(GrpcPeerClient::new(Duration::from_millis(
            configuration.aggregator_connect_timeout_ms(),
        )));
        let aggregator = Arc::new(Aggregator::new(
            discovery,
            client,
            AggregatorConfig::from_configuration(&configuration),
        ));

        Ok(Self::new(configuration, message_log, aggregator, shutdown))
    }
}
