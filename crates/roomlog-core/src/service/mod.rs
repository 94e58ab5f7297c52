pub mod aggregator;
pub mod discovery;
pub mod export;
pub mod message_log;
pub mod peer_client;
