//! Log export gRPC service
//!
//! Each `Export` call copies the local log once and streams that copy, so
//! appends made while the stream is open are not included. The copy is fed to
//! the response through a bounded channel; when the caller goes away the
//! channel closes and the unsent remainder is dropped.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use roomlog_api::grpc::{
    ExportRequest, LogRecord,
    log_export_server::{LogExport, LogExportServer},
};

use roomlog_common::Message;

use super::message_log::MessageLog;

type ExportResponseStream = Pin<Box<dyn Stream<Item = Result<LogRecord, Status>> + Send + 'static>>;

/// Send `snapshot` in order until done or the receiver is gone. Returns the number sent.
async fn send_snapshot(
    snapshot: Vec<Message>,
    tx: mpsc::Sender<Result<LogRecord, Status>>,
    remote: String,
) -> usize {
    let total = snapshot.len();
    let mut sent = 0usize;
    for message in snapshot {
        if tx.send(Ok(LogRecord::from(message))).await.is_err() {
            debug!(
                remote = %remote,
                sent,
                total,
                "Export receiver dropped, discarding unsent records"
            );
            break;
        }
        sent += 1;
    }
    metrics::counter!("roomlog_export_messages_sent_total").increment(sent as u64);
    debug!(remote = %remote, sent, total, "Export stream finished");
    sent
}

/// Serves the local [`MessageLog`] to peers
#[derive(Clone)]
pub struct LogExportService {
    log: Arc<MessageLog>,
    channel_capacity: usize,
}

impl LogExportService {
    pub fn new(log: Arc<MessageLog>, channel_capacity: usize) -> Self {
        Self {
            log,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Wrap the service into a tonic server ready to be added to a router
    pub fn into_server(self) -> LogExportServer<Self> {
        LogExportServer::new(self)
    }
}

#[tonic::async_trait]
impl LogExport for LogExportService {
    type ExportStream = ExportResponseStream;

    async fn export(
        &self,
        request: Request<ExportRequest>,
    ) -> Result<Response<Self::ExportStream>, Status> {
        let remote = request
            .remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        // Lock is released before anything is sent
        let snapshot = self.log.snapshot();
        let total = snapshot.len();
        info!(remote = %remote, total, "Exporting log snapshot");

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        tokio::spawn(send_snapshot(snapshot, tx, remote));

        let output_stream = ReceiverStream::new(rx);

        Ok(Response::new(Box::pin(output_stream) as Self::ExportStream))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use tokio_stream::StreamExt;

    fn service_with(messages: &[Message], capacity: usize) -> (Arc<MessageLog>, LogExportService) {
        let log = Arc::new(MessageLog::new());
        for m in messages {
            log.append(m.clone()).unwrap();
        }
        (log.clone(), LogExportService::new(log, capacity))
    }

    #[tokio::test]
    async fn test_export_sends_exactly_the_snapshot() {
        let messages = vec![
            Message::new("x", "alice", "hi"),
            Message::new("x", "bob", "hey"),
            Message::new("y", "carol", "yo"),
        ];
        let (_, service) = service_with(&messages, 1);

        let stream = service
            .export(Request::new(ExportRequest {}))
            .await
            .unwrap()
            .into_inner();
        let received: Vec<Message> = stream.map(|r| Message::from(r.unwrap())).collect().await;

        assert_eq!(received, messages);
    }

    #[tokio::test]
    async fn test_export_of_empty_log_ends_immediately() {
        let (_, service) = service_with(&[], 4);
        let mut stream = service
            .export(Request::new(ExportRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_appends_during_export_are_not_included() {
        let (log, service) = service_with(&[Message::new("x", "alice", "1")], 1);

        let mut stream = service
            .export(Request::new(ExportRequest {}))
            .await
            .unwrap()
            .into_inner();
        log.append(Message::new("x", "alice", "2")).unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.message, "1");
        assert!(stream.next().await.is_none());
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_reader_stops_sender() {
        let total = 1000;
        let snapshot: Vec<Message> = (0..total)
            .map(|i| Message::new("r", "c", i.to_string()))
            .collect();
        let (tx, rx) = mpsc::channel(1);
        let sender = tokio::spawn(send_snapshot(snapshot, tx, "test".to_string()));

        let mut stream = ReceiverStream::new(rx);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.message, "0");
        drop(stream);

        let sent = tokio::time::timeout(Duration::from_secs(2), sender)
            .await
            .expect("sender kept running after the reader went away")
            .unwrap();
        assert!(sent >= 1);
        assert!(sent < total, "sent {} of {}", sent, total);
    }

    #[tokio::test]
    async fn test_undropped_reader_gets_everything() {
        let snapshot: Vec<Message> = (0..100)
            .map(|i| Message::new("r", "c", i.to_string()))
            .collect();
        let (tx, rx) = mpsc::channel(1);
        let sender = tokio::spawn(send_snapshot(snapshot.clone(), tx, "test".to_string()));

        let received: Vec<Message> = ReceiverStream::new(rx)
            .map(|r| Message::from(r.unwrap()))
            .collect()
            .await;

        assert_eq!(sender.await.unwrap(), 100);
        assert_eq!(received, snapshot);
    }

    #[tokio::test]
    async fn test_slow_reader_does_not_block_writers() {
        let messages: Vec<Message> = (0..64)
            .map(|i| Message::new("r", "c", i.to_string()))
            .collect();
        let (log, service) = service_with(&messages, 1);

        let _stream = service
            .export(Request::new(ExportRequest {}))
            .await
            .unwrap()
            .into_inner();

        // Stream is never polled; appends still go through right away
        for i in 0..100 {
            log.append(Message::new("r", "c", format!("late-{}", i))).unwrap();
        }
        assert_eq!(log.len(), 164);
    }
}
