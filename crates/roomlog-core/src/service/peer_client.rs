// Export client used by the aggregator to drain one peer
// Connections are opened per call and released with the returned stream

use std::{pin::Pin, time::Duration};

use futures::{Stream, StreamExt};
use tonic::transport::Endpoint;
use tracing::debug;

use roomlog_api::grpc::{ExportRequest, log_export_client::LogExportClient};
use roomlog_common::{Message, RoomlogError};

use super::discovery::PeerAddress;

/// Stream of messages exported by one peer, ending on clean end-of-stream
pub type LogStream = Pin<Box<dyn Stream<Item = Result<Message, RoomlogError>> + Send>>;

/// Opens export streams to peers
#[tonic::async_trait]
pub trait PeerClient: Send + Sync {
    /// Establish a connection and start the export.
    ///
    /// Fails with [`RoomlogError::Unavailable`] when no stream could be
    /// established. Errors after that surface as
    /// [`RoomlogError::StreamInterrupted`] items on the stream.
    async fn open_export(&self, peer: &PeerAddress) -> Result<LogStream, RoomlogError>;
}

/// gRPC export client, one fresh channel per call
#[derive(Clone, Debug)]
pub struct GrpcPeerClient {
    connect_timeout: Duration,
}

impl Default for GrpcPeerClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl GrpcPeerClient {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[tonic::async_trait]
impl PeerClient for GrpcPeerClient {
    async fn open_export(&self, peer: &PeerAddress) -> Result<LogStream, RoomlogError> {
        let unavailable = |reason: String| RoomlogError::Unavailable {
            peer: peer.to_string(),
            reason,
        };

        let endpoint = Endpoint::from_shared(peer.endpoint())
            .map_err(|e| unavailable(e.to_string()))?
            .connect_timeout(self.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        debug!(peer = %peer, "Connected to peer export endpoint");

        let mut client = LogExportClient::new(channel);
        let response = client
            .export(ExportRequest {})
            .await
            .map_err(|status| unavailable(status.message().to_string()))?;

        let peer_name = peer.to_string();
        let stream = response.into_inner().map(move |item| {
            item.map(Message::from)
                .map_err(|status| RoomlogError::StreamInterrupted {
                    peer: peer_name.clone(),
                    reason: status.message().to_string(),
                })
        });

        Ok(Box::pin(stream))
    }
}
