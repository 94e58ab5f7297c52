//! gRPC export server setup.

use std::{future::Future, net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, task::JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{error, info};

use roomlog_core::{LogExportService, MessageLog};

/// Running export server
pub struct ExportServerHandle {
    /// Address actually bound, useful when port 0 was requested
    pub local_addr: SocketAddr,
    task: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl ExportServerHandle {
    /// Wait until the server has stopped
    pub async fn wait(self) -> anyhow::Result<()> {
        self.task.await??;
        Ok(())
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Bind the export listener and serve the local log until `shutdown` resolves.
///
/// Binding happens before this returns, so a port conflict is reported to the
/// caller instead of inside the server task.
pub async fn start_export_server<S>(
    message_log: Arc<MessageLog>,
    channel_capacity: usize,
    address: &str,
    port: u16,
    shutdown: S,
) -> anyhow::Result<ExportServerHandle>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind((address, port)).await?;
    let local_addr = listener.local_addr()?;
    info!("Starting export gRPC server on {}", local_addr);

    let service = LogExportService::new(message_log, channel_capacity).into_server();

    let task = tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await;
        match &result {
            Ok(()) => info!("Export gRPC server on {} stopped", local_addr),
            Err(e) => error!("Export gRPC server error: {}", e),
        }
        result
    });

    Ok(ExportServerHandle { local_addr, task })
}
