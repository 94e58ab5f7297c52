// Application configuration wrapper
// Typed getters over the layered config sources, each with its default

use roomlog_common::RoomlogError;

pub const SERVER_ADDRESS: &str = "server.address";
pub const SERVER_HTTP_PORT: &str = "server.http.port";
pub const SERVER_GRPC_PORT: &str = "server.grpc.port";
pub const LOG_MAX_MESSAGES: &str = "log.max_messages";
pub const EXPORT_CHANNEL_CAPACITY: &str = "export.channel_capacity";
pub const DISCOVERY_MODE: &str = "discovery.mode";
pub const DISCOVERY_PEERS: &str = "discovery.peers";
pub const DISCOVERY_SERVICE_NAME: &str = "discovery.service_name";
pub const DISCOVERY_NAMESPACE: &str = "discovery.namespace";
pub const DISCOVERY_CLUSTER_DOMAIN: &str = "discovery.cluster_domain";
pub const DISCOVERY_EXPORT_PORT: &str = "discovery.export_port";
pub const AGGREGATOR_CONNECT_TIMEOUT: &str = "aggregator.connect_timeout";
pub const AGGREGATOR_PEER_TIMEOUT: &str = "aggregator.peer_timeout";
pub const AGGREGATOR_DEADLINE: &str = "aggregator.deadline";
pub const AGGREGATOR_CANCEL_GRACE: &str = "aggregator.cancel_grace";
pub const SHUTDOWN_TIMEOUT: &str = "shutdown.timeout";
pub const LOGS_PATH: &str = "logs.path";
pub const LOGS_CONSOLE: &str = "logs.console";
pub const LOGS_FILE: &str = "logs.file";
pub const LOGS_LEVEL: &str = "logs.level";
pub const LOGS_ROTATION: &str = "logs.rotation";

pub const DEFAULT_HTTP_PORT: u16 = 8081;
pub const DEFAULT_GRPC_PORT: u16 = 9091;
pub const DEFAULT_STATIC_PEERS: &str = "127.0.0.1:9091,127.0.0.1:9092";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Application configuration wrapper
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: config::Config,
}

impl Configuration {
    /// Create a new configuration from a Config instance
    pub fn from_config(config: config::Config) -> Self {
        Self { config }
    }

    fn port(&self, key: &str, default: u16) -> Result<u16, RoomlogError> {
        match self.config.get_int(key) {
            Ok(value) => u16::try_from(value)
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| {
                    RoomlogError::ConfigError(format!("{} must be in 1..=65535, got {}", key, value))
                }),
            Err(_) => Ok(default),
        }
    }

    fn millis(&self, key: &str, default: u64) -> u64 {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    // ===================== Server =====================

    /// Bind address shared by the HTTP and gRPC listeners
    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS)
            .unwrap_or_else(|_| "0.0.0.0".to_string())
    }

    pub fn http_port(&self) -> Result<u16, RoomlogError> {
        self.port(SERVER_HTTP_PORT, DEFAULT_HTTP_PORT)
    }

    pub fn grpc_port(&self) -> Result<u16, RoomlogError> {
        self.port(SERVER_GRPC_PORT, DEFAULT_GRPC_PORT)
    }

    /// Local log capacity; 0 means unbounded
    pub fn log_max_messages(&self) -> usize {
        self.config
            .get_int(LOG_MAX_MESSAGES)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(0)
    }

    /// Records buffered between the snapshot and the network send (default: 128)
    pub fn export_channel_capacity(&self) -> usize {
        self.config
            .get_int(EXPORT_CHANNEL_CAPACITY)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(128)
    }

    // ===================== Discovery =====================

    pub fn discovery_mode(&self) -> String {
        self.config
            .get_string(DISCOVERY_MODE)
            .unwrap_or_else(|_| "static".to_string())
    }

    /// Static peers, from a comma separated string or a list
    pub fn discovery_peers(&self) -> Vec<String> {
        let raw = match self.config.get_string(DISCOVERY_PEERS) {
            Ok(list) => list.split(',').map(|s| s.to_string()).collect(),
            Err(_) => self
                .config
                .get::<Vec<String>>(DISCOVERY_PEERS)
                .unwrap_or_else(|_| {
                    DEFAULT_STATIC_PEERS
                        .split(',')
                        .map(|s| s.to_string())
                        .collect()
                }),
        };

        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn discovery_service_name(&self) -> String {
        self.config
            .get_string(DISCOVERY_SERVICE_NAME)
            .unwrap_or_default()
    }

    pub fn discovery_namespace(&self) -> String {
        self.config
            .get_string(DISCOVERY_NAMESPACE)
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string())
    }

    pub fn discovery_cluster_domain(&self) -> String {
        self.config
            .get_string(DISCOVERY_CLUSTER_DOMAIN)
            .unwrap_or_else(|_| DEFAULT_CLUSTER_DOMAIN.to_string())
    }

    pub fn discovery_export_port(&self) -> Result<u16, RoomlogError> {
        self.port(DISCOVERY_EXPORT_PORT, DEFAULT_GRPC_PORT)
    }

    // ===================== Aggregator =====================

    /// Per-peer connect timeout in milliseconds (default: 2000ms)
    pub fn aggregator_connect_timeout_ms(&self) -> u64 {
        self.millis(AGGREGATOR_CONNECT_TIMEOUT, 2000)
    }

    /// Per-peer drain timeout in milliseconds (default: 5000ms)
    pub fn aggregator_peer_timeout_ms(&self) -> u64 {
        self.millis(AGGREGATOR_PEER_TIMEOUT, 5000)
    }

    /// Overall collection deadline in milliseconds (default: 10000ms)
    pub fn aggregator_deadline_ms(&self) -> u64 {
        self.millis(AGGREGATOR_DEADLINE, 10000)
    }

    /// Time allowed for in-flight peers to hand back partial buffers after cancel (default: 500ms)
    pub fn aggregator_cancel_grace_ms(&self) -> u64 {
        self.millis(AGGREGATOR_CANCEL_GRACE, 500)
    }

    // ===================== Process =====================

    pub fn shutdown_timeout_ms(&self) -> u64 {
        self.millis(SHUTDOWN_TIMEOUT, 5000)
    }

    pub fn logs_path(&self) -> Option<String> {
        self.config.get_string(LOGS_PATH).ok()
    }

    pub fn logs_console(&self) -> bool {
        self.config.get_bool(LOGS_CONSOLE).unwrap_or(true)
    }

    pub fn logs_file(&self) -> bool {
        self.config.get_bool(LOGS_FILE).unwrap_or(false)
    }

    pub fn logs_level(&self) -> String {
        self.config
            .get_string(LOGS_LEVEL)
            .unwrap_or_else(|_| "info".to_string())
    }

    /// Log file rotation: daily, hourly or never (default: daily)
    pub fn logs_rotation(&self) -> String {
        self.config
            .get_string(LOGS_ROTATION)
            .unwrap_or_else(|_| "daily".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration(pairs: &[(&str, &str)]) -> Configuration {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        Configuration::from_config(builder.build().unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.server_address(), "0.0.0.0");
        assert_eq!(config.http_port().unwrap(), 8081);
        assert_eq!(config.grpc_port().unwrap(), 9091);
        assert_eq!(config.log_max_messages(), 0);
        assert_eq!(config.export_channel_capacity(), 128);
        assert_eq!(config.discovery_mode(), "static");
        assert_eq!(
            config.discovery_peers(),
            vec!["127.0.0.1:9091".to_string(), "127.0.0.1:9092".to_string()]
        );
        assert_eq!(config.discovery_cluster_domain(), "cluster.local");
        assert_eq!(config.aggregator_deadline_ms(), 10000);
        assert_eq!(config.logs_rotation(), "daily");
    }

    #[test]
    fn test_peer_list_is_trimmed() {
        let config = configuration(&[(DISCOVERY_PEERS, " a:1 , ,b:2")]);
        assert_eq!(
            config.discovery_peers(),
            vec!["a:1".to_string(), "b:2".to_string()]
        );
    }

    #[test]
    fn test_empty_peer_list_is_allowed() {
        let config = configuration(&[(DISCOVERY_PEERS, "")]);
        assert!(config.discovery_peers().is_empty());
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let config = configuration(&[(SERVER_GRPC_PORT, "0")]);
        assert!(matches!(
            config.grpc_port(),
            Err(RoomlogError::ConfigError(_))
        ));
    }

    #[test]
    fn test_out_of_range_port_is_rejected() {
        let config = configuration(&[(SERVER_HTTP_PORT, "70000")]);
        assert!(config.http_port().is_err());
    }
}
