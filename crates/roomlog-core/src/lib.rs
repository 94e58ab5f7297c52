//! Roomlog Core - the distributed log and its fan-out read path
//!
//! This crate provides:
//! - `MessageLog`: the per-node append-only log
//! - `LogExportService`: the gRPC endpoint streaming a log snapshot to peers
//! - `PeerDiscovery`: static or DNS-based resolution of export endpoints
//! - `Aggregator`: parallel per-peer drains merged into one result
//! - `Configuration`: typed access to the layered application config

pub mod model;
pub mod service;

pub use model::Configuration;
pub use service::aggregator::{
    AggregationResult, AggregationStatus, Aggregator, AggregatorConfig, PeerReport, PeerState,
};
pub use service::discovery::{
    DiscoveryConfig, DiscoveryMode, DnsPeerDiscovery, PeerAddress, PeerDiscovery,
    StaticPeerDiscovery, create_peer_discovery,
};
pub use service::export::LogExportService;
pub use service::message_log::MessageLog;
pub use service::peer_client::{GrpcPeerClient, LogStream, PeerClient};
