// Peer discovery for the fan-out read path
// Resolves the current set of export endpoints, either from a fixed list or
// from DNS under the `<service>.<namespace>.svc.<cluster-domain>` convention

use std::{
    fmt::{Display, Formatter},
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use tracing::{debug, info, warn};

use roomlog_common::RoomlogError;

use crate::model::Configuration;

/// Export endpoint of one node. Produced fresh on every resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URI used to open a gRPC channel to this peer
    pub fn endpoint(&self) -> String {
        format!("http://{}", self)
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Dot separated labels of ASCII letters, digits, `-` and `_`; one trailing dot allowed
fn is_valid_host(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

impl FromStr for PeerAddress {
    type Err = RoomlogError;

    /// Parse `host:port` or `[v6]:port`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }

        let invalid = || RoomlogError::ConfigError(format!("invalid peer address '{}'", s));

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        if !is_valid_host(host) {
            return Err(invalid());
        }
        let port = port
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(invalid)?;

        Ok(Self::new(host, port))
    }
}

/// Discovery strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Fixed, configured peer list
    #[default]
    Static,
    /// Name resolution of an orchestrator-managed service
    Orchestrated,
}

impl FromStr for DiscoveryMode {
    type Err = RoomlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(DiscoveryMode::Static),
            "orchestrated" | "k8s" | "kubernetes" => Ok(DiscoveryMode::Orchestrated),
            other => Err(RoomlogError::ConfigError(format!(
                "unknown discovery mode '{}'",
                other
            ))),
        }
    }
}

/// Discovery settings, read once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub mode: DiscoveryMode,
    pub peers: Vec<String>,
    pub service_name: String,
    pub namespace: String,
    pub cluster_domain: String,
    pub export_port: u16,
}

impl DiscoveryConfig {
    pub fn from_configuration(config: &Configuration) -> Result<Self, RoomlogError> {
        Ok(Self {
            mode: config.discovery_mode().parse()?,
            peers: config.discovery_peers(),
            service_name: config.discovery_service_name(),
            namespace: config.discovery_namespace(),
            cluster_domain: config.discovery_cluster_domain(),
            export_port: config.discovery_export_port()?,
        })
    }

    /// Check the settings without building a strategy
    pub fn validate(&self) -> Result<(), RoomlogError> {
        match self.mode {
            DiscoveryMode::Static => {
                for entry in &self.peers {
                    entry.parse::<PeerAddress>()?;
                }
            }
            DiscoveryMode::Orchestrated => {
                if self.service_name.trim().is_empty() {
                    return Err(RoomlogError::ConfigError(
                        "orchestrated discovery requires a service name".to_string(),
                    ));
                }
                if self.namespace.trim().is_empty() {
                    return Err(RoomlogError::ConfigError(
                        "orchestrated discovery requires a namespace".to_string(),
                    ));
                }
                let fqdn = self.service_fqdn();
                if !is_valid_host(&fqdn) {
                    return Err(RoomlogError::ConfigError(format!(
                        "invalid service name '{}'",
                        fqdn
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fully qualified service name resolved in orchestrated mode
    pub fn service_fqdn(&self) -> String {
        format!(
            "{}.{}.svc.{}",
            self.service_name, self.namespace, self.cluster_domain
        )
    }
}

/// Source of the current peer set
#[tonic::async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// Resolve the current peers. Failures yield an empty set.
    async fn resolve(&self) -> Vec<PeerAddress>;

    /// Human readable description for logs and health output
    fn describe(&self) -> String;
}

/// Fixed peer list
pub struct StaticPeerDiscovery {
    peers: Vec<PeerAddress>,
}

impl StaticPeerDiscovery {
    pub fn new(peers: Vec<PeerAddress>) -> Self {
        Self { peers }
    }

    /// Parse a configured list, failing on the first malformed entry
    pub fn from_list<S: AsRef<str>>(entries: &[S]) -> Result<Self, RoomlogError> {
        let peers = entries
            .iter()
            .map(|e| e.as_ref().parse::<PeerAddress>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(peers))
    }
}

#[tonic::async_trait]
impl PeerDiscovery for StaticPeerDiscovery {
    async fn resolve(&self) -> Vec<PeerAddress> {
        self.peers.clone()
    }

    fn describe(&self) -> String {
        let peers: Vec<String> = self.peers.iter().map(|p| p.to_string()).collect();
        format!("static[{}]", peers.join(","))
    }
}

/// Host name lookup
#[tonic::async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, RoomlogError>;
}

/// System resolver backed by `tokio::net::lookup_host`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

#[tonic::async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, RoomlogError> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| RoomlogError::DiscoveryFailed(format!("{}: {}", host, e)))?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// DNS based discovery for orchestrated deployments.
/// Every resolved address is paired with the fixed export port; nothing is cached.
pub struct DnsPeerDiscovery {
    service_fqdn: String,
    export_port: u16,
    resolver: Arc<dyn HostResolver>,
}

impl DnsPeerDiscovery {
    pub fn new(service_fqdn: String, export_port: u16) -> Self {
        Self::with_resolver(service_fqdn, export_port, Arc::new(SystemResolver))
    }

    pub fn with_resolver(
        service_fqdn: String,
        export_port: u16,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self {
            service_fqdn,
            export_port,
            resolver,
        }
    }

    pub fn service_fqdn(&self) -> &str {
        &self.service_fqdn
    }
}

#[tonic::async_trait]
impl PeerDiscovery for DnsPeerDiscovery {
    async fn resolve(&self) -> Vec<PeerAddress> {
        let ips = match self.resolver.lookup(&self.service_fqdn).await {
            Ok(ips) => ips,
            Err(e) => {
                warn!(
                    service = %self.service_fqdn,
                    error = %e,
                    "Error resolving peers, continuing with none"
                );
                return vec![];
            }
        };

        let mut peers: Vec<PeerAddress> = Vec::with_capacity(ips.len());
        for ip in ips {
            let peer = PeerAddress::new(ip.to_string(), self.export_port);
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }

        debug!(service = %self.service_fqdn, count = peers.len(), "Resolved peers");
        peers
    }

    fn describe(&self) -> String {
        format!("dns[{}:{}]", self.service_fqdn, self.export_port)
    }
}

/// Create the discovery strategy selected by configuration.
///
/// Misconfiguration (malformed static peer, missing service name) fails here,
/// at startup, rather than on the read path.
pub fn create_peer_discovery(
    config: &DiscoveryConfig,
) -> Result<Arc<dyn PeerDiscovery>, RoomlogError> {
    config.validate()?;
    match config.mode {
        DiscoveryMode::Static => {
            let discovery = StaticPeerDiscovery::from_list(&config.peers)?;
            info!("Using static peer discovery: {}", discovery.describe());
            Ok(Arc::new(discovery))
        }
        DiscoveryMode::Orchestrated => {
            let discovery = DnsPeerDiscovery::new(config.service_fqdn(), config.export_port);
            info!("Using DNS peer discovery: {}", discovery.describe());
            Ok(Arc::new(discovery))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedResolver {
        result: Result<Vec<IpAddr>, RoomlogError>,
        calls: AtomicUsize,
    }

    #[tonic::async_trait]
    impl HostResolver for ScriptedResolver {
        async fn lookup(&self, _host: &str) -> Result<Vec<IpAddr>, RoomlogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn orchestrated(service_name: &str) -> DiscoveryConfig {
        DiscoveryConfig {
            mode: DiscoveryMode::Orchestrated,
            peers: vec![],
            service_name: service_name.to_string(),
            namespace: "chat".to_string(),
            cluster_domain: "cluster.local".to_string(),
            export_port: 9091,
        }
    }

    #[test]
    fn test_parse_peer_address() {
        assert_eq!(
            "10.0.0.1:9091".parse::<PeerAddress>().unwrap(),
            PeerAddress::new("10.0.0.1", 9091)
        );
        assert_eq!(
            "node-a.local:9092".parse::<PeerAddress>().unwrap(),
            PeerAddress::new("node-a.local", 9092)
        );
        let v6 = "[::1]:9091".parse::<PeerAddress>().unwrap();
        assert_eq!(v6, PeerAddress::new("::1", 9091));
        assert_eq!(v6.to_string(), "[::1]:9091");
        assert_eq!(v6.endpoint(), "http://[::1]:9091");
    }

    #[test]
    fn test_parse_invalid_peer_address() {
        for bad in ["", "host", "host:", ":9091", "host:0", "host:99999", "http://h:1"] {
            assert!(bad.parse::<PeerAddress>().is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_host_names() {
        for bad in [
            "bad host:9091",
            "a..b:9091",
            ".a:9091",
            "a\tb:9091",
            "host!:9091",
            "a/b:9091",
        ] {
            assert!(bad.parse::<PeerAddress>().is_err(), "{} should fail", bad);
        }
        assert_eq!(
            " roomlog-0.chat_svc.local.:9091 ".parse::<PeerAddress>().unwrap(),
            PeerAddress::new("roomlog-0.chat_svc.local.", 9091)
        );
    }

    #[test]
    fn test_discovery_mode_from_str() {
        assert_eq!("static".parse::<DiscoveryMode>().unwrap(), DiscoveryMode::Static);
        assert_eq!(
            "Orchestrated".parse::<DiscoveryMode>().unwrap(),
            DiscoveryMode::Orchestrated
        );
        assert_eq!("k8s".parse::<DiscoveryMode>().unwrap(), DiscoveryMode::Orchestrated);
        assert!("gossip".parse::<DiscoveryMode>().is_err());
    }

    #[test]
    fn test_service_fqdn_convention() {
        assert_eq!(
            orchestrated("roomlog").service_fqdn(),
            "roomlog.chat.svc.cluster.local"
        );
    }

    #[tokio::test]
    async fn test_static_discovery_keeps_order() {
        let discovery =
            StaticPeerDiscovery::from_list(&["127.0.0.1:9091", "127.0.0.1:9092"]).unwrap();
        assert_eq!(
            discovery.resolve().await,
            vec![
                PeerAddress::new("127.0.0.1", 9091),
                PeerAddress::new("127.0.0.1", 9092)
            ]
        );
    }

    #[test]
    fn test_static_discovery_rejects_malformed_entry() {
        let result = StaticPeerDiscovery::from_list(&["127.0.0.1:9091", "not-an-address"]);
        assert!(matches!(result, Err(RoomlogError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_dns_discovery_pairs_export_port() {
        let resolver = Arc::new(ScriptedResolver {
            result: Ok(vec![
                IpAddr::V4(Ipv4Addr::new(10, 1, 0, 4)),
                IpAddr::V4(Ipv4Addr::new(10, 1, 0, 5)),
                IpAddr::V4(Ipv4Addr::new(10, 1, 0, 4)),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ]),
            calls: AtomicUsize::new(0),
        });
        let discovery = DnsPeerDiscovery::with_resolver(
            "roomlog.chat.svc.cluster.local".to_string(),
            9091,
            resolver,
        );

        assert_eq!(
            discovery.resolve().await,
            vec![
                PeerAddress::new("10.1.0.4", 9091),
                PeerAddress::new("10.1.0.5", 9091),
                PeerAddress::new("::1", 9091),
            ]
        );
    }

    #[tokio::test]
    async fn test_dns_failure_yields_empty_set() {
        let discovery = DnsPeerDiscovery::with_resolver(
            "missing.chat.svc.cluster.local".to_string(),
            9091,
            Arc::new(ScriptedResolver {
                result: Err(RoomlogError::DiscoveryFailed("nxdomain".to_string())),
                calls: AtomicUsize::new(0),
            }),
        );
        assert!(discovery.resolve().await.is_empty());
    }

    #[tokio::test]
    async fn test_dns_discovery_re_resolves_every_call() {
        let resolver = Arc::new(ScriptedResolver {
            result: Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]),
            calls: AtomicUsize::new(0),
        });
        let discovery =
            DnsPeerDiscovery::with_resolver("svc".to_string(), 9091, resolver.clone());

        discovery.resolve().await;
        discovery.resolve().await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_create_orchestrated_requires_service_name() {
        assert!(create_peer_discovery(&orchestrated("")).is_err());
        assert!(create_peer_discovery(&orchestrated("roomlog")).is_ok());
    }

    #[test]
    fn test_validate_checks_each_mode() {
        let mut config = orchestrated("roomlog");
        assert!(config.validate().is_ok());
        config.namespace = " ".to_string();
        assert!(config.validate().is_err());
        assert!(orchestrated("bad name").validate().is_err());

        let static_config = DiscoveryConfig {
            mode: DiscoveryMode::Static,
            peers: vec!["127.0.0.1:9091".to_string(), "bad host:9091".to_string()],
            service_name: String::new(),
            namespace: String::new(),
            cluster_domain: String::new(),
            export_port: 9091,
        };
        assert!(matches!(
            static_config.validate(),
            Err(RoomlogError::ConfigError(_))
        ));
    }

    #[test]
    fn test_create_static_fails_fast() {
        let config = DiscoveryConfig {
            mode: DiscoveryMode::Static,
            peers: vec!["bad peer".to_string()],
            service_name: String::new(),
            namespace: String::new(),
            cluster_domain: String::new(),
            export_port: 9091,
        };
        assert!(create_peer_discovery(&config).is_err());
    }

    #[test]
    fn test_discovery_config_from_configuration() {
        let config = Configuration::from_config(
            config::Config::builder()
                .set_override("discovery.mode", "orchestrated")
                .unwrap()
                .set_override("discovery.service_name", "roomlog")
                .unwrap()
                .set_override("discovery.export_port", "9191")
                .unwrap()
                .build()
                .unwrap(),
        );
        let discovery = DiscoveryConfig::from_configuration(&config).unwrap();
        assert_eq!(discovery.mode, DiscoveryMode::Orchestrated);
        assert_eq!(discovery.export_port, 9191);
        assert_eq!(discovery.service_fqdn(), "roomlog.default.svc.cluster.local");
    }
}
