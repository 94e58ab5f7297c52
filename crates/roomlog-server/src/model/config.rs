//! Configuration loading for the Roomlog server
//!
//! Sources in increasing precedence: the YAML file, `ROOMLOG_` environment
//! variables, the legacy orchestrator variables and finally CLI flags.

use clap::Parser;
use config::{Config, Environment};

use roomlog_common::RoomlogError;
use roomlog_core::{
    Configuration, DiscoveryConfig,
    model::{
        AGGREGATOR_CANCEL_GRACE, AGGREGATOR_CONNECT_TIMEOUT, AGGREGATOR_DEADLINE,
        AGGREGATOR_PEER_TIMEOUT, DISCOVERY_CLUSTER_DOMAIN, DISCOVERY_MODE, DISCOVERY_NAMESPACE,
        DISCOVERY_PEERS, DISCOVERY_SERVICE_NAME, SERVER_GRPC_PORT, SERVER_HTTP_PORT,
        SHUTDOWN_TIMEOUT,
    },
};

use crate::startup::LogRotation;

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "roomlog-server", version, about)]
pub struct Cli {
    /// Path of the YAML configuration file
    #[arg(
        short = 'c',
        long = "config",
        env = "ROOMLOG_CONFIG",
        default_value = "conf/application.yml"
    )]
    pub config: String,
    #[arg(long = "http-port")]
    pub http_port: Option<u16>,
    #[arg(long = "grpc-port")]
    pub grpc_port: Option<u16>,
    /// Comma separated static peer list
    #[arg(long = "peers")]
    pub peers: Option<String>,
    #[arg(long = "discovery-mode")]
    pub discovery_mode: Option<String>,
}

fn config_error(e: config::ConfigError) -> RoomlogError {
    RoomlogError::ConfigError(e.to_string())
}

/// Overrides derived from the variables older deployments set on each pod.
///
/// Only honoured when `IS_K8S` is `true`; `CLUSTER` names the cluster and
/// becomes the `<CLUSTER>.local` domain.
pub fn legacy_overrides<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let is_k8s = lookup("IS_K8S")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);
    if !is_k8s {
        return vec![];
    }

    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let mut overrides = vec![(DISCOVERY_MODE, "orchestrated".to_string())];
    if let Some(v) = present("SVCNAME") {
        overrides.push((DISCOVERY_SERVICE_NAME, v));
    }
    if let Some(v) = present("NAMESPACE") {
        overrides.push((DISCOVERY_NAMESPACE, v));
    }
    if let Some(v) = present("CLUSTER") {
        overrides.push((DISCOVERY_CLUSTER_DOMAIN, format!("{}.local", v)));
    }
    overrides
}

/// Build the layered configuration and validate it.
///
/// Any invalid setting is reported here so the process fails before a
/// listener binds.
pub fn load_configuration<F>(cli: &Cli, env_lookup: F) -> Result<Configuration, RoomlogError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder()
        .add_source(config::File::with_name(&cli.config).required(false))
        .add_source(
            Environment::with_prefix("ROOMLOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    for (key, value) in legacy_overrides(env_lookup) {
        builder = builder.set_override(key, value).map_err(config_error)?;
    }

    if let Some(port) = cli.http_port {
        builder = builder
            .set_override(SERVER_HTTP_PORT, i64::from(port))
            .map_err(config_error)?;
    }
    if let Some(port) = cli.grpc_port {
        builder = builder
            .set_override(SERVER_GRPC_PORT, i64::from(port))
            .map_err(config_error)?;
    }
    if let Some(peers) = &cli.peers {
        builder = builder
            .set_override(DISCOVERY_PEERS, peers.clone())
            .map_err(config_error)?;
    }
    if let Some(mode) = &cli.discovery_mode {
        builder = builder
            .set_override(DISCOVERY_MODE, mode.clone())
            .map_err(config_error)?;
    }

    let configuration = Configuration::from_config(builder.build().map_err(config_error)?);
    validate(&configuration)?;
    Ok(configuration)
}

/// Check every setting that could otherwise only fail later at bind or read time
pub fn validate(configuration: &Configuration) -> Result<(), RoomlogError> {
    configuration.http_port()?;
    configuration.grpc_port()?;

    let durations = [
        (
            AGGREGATOR_CONNECT_TIMEOUT,
            configuration.aggregator_connect_timeout_ms(),
        ),
        (AGGREGATOR_PEER_TIMEOUT, configuration.aggregator_peer_timeout_ms()),
        (AGGREGATOR_DEADLINE, configuration.aggregator_deadline_ms()),
        (AGGREGATOR_CANCEL_GRACE, configuration.aggregator_cancel_grace_ms()),
        (SHUTDOWN_TIMEOUT, configuration.shutdown_timeout_ms()),
    ];
    if let Some((key, _)) = durations.iter().find(|(_, millis)| *millis == 0) {
        return Err(RoomlogError::ConfigError(format!(
            "{} must be greater than 0ms",
            key
        )));
    }

    configuration.logs_rotation().parse::<LogRotation>()?;
    DiscoveryConfig::from_configuration(configuration)?.validate()?;
    Ok(())
}
