//! Application startup utilities module.

mod grpc;
mod http;
mod logging;
mod shutdown;

pub use grpc::{ExportServerHandle, start_export_server};
pub use http::main_server;
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
