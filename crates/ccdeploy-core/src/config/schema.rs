//! Configuration schema for ccdeploy.toml
//!
//! Everything the coordinator needs to talk to its local peer, the ordering
//! service and the coordinators of other organizations.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure for ccdeploy.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CoordinatorConfig {
    /// MSP identifier of the local organization
    #[serde(default)]
    pub msp_id: String,

    /// Root of the local identity store (holds `keystore/` and `signcerts/`)
    #[serde(default)]
    pub msp_config_path: PathBuf,

    /// Local peer connection
    #[serde(default)]
    pub peer: PeerConfig,

    /// Ordering service connection
    #[serde(default)]
    pub orderer: OrdererConfig,

    /// Naming and ports of the other organizations' services
    #[serde(default)]
    pub network: NetworkConfig,

    /// Chaincode definition parameters
    #[serde(default)]
    pub chaincode: ChaincodeConfig,

    /// External CLI binaries
    #[serde(default)]
    pub cli: CliConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PeerConfig {
    /// Address of the local peer (host:port)
    #[serde(default)]
    pub address: String,

    /// TLS root certificate of the local peer
    #[serde(default)]
    pub tls_root_cert: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OrdererConfig {
    /// Address of the ordering service (host:port)
    #[serde(default)]
    pub address: String,

    /// TLS CA certificate of the ordering service
    #[serde(default)]
    pub tls_ca: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Service prefix of an organization's peer (`<service>.<host>`)
    #[serde(default = "default_peer_service")]
    pub peer_service: String,

    #[serde(default = "default_peer_port")]
    pub peer_port: u16,

    /// Service prefix of an organization's coordinator; empty to use the host as is
    #[serde(default = "default_coordinator_service")]
    pub coordinator_service: String,

    #[serde(default = "default_coordinator_port")]
    pub coordinator_port: u16,

    #[serde(default = "default_coordinator_scheme")]
    pub coordinator_scheme: String,

    /// Upper bound for a single delegated call
    #[serde(default = "default_delegate_timeout_secs")]
    pub delegate_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peer_service: default_peer_service(),
            peer_port: default_peer_port(),
            coordinator_service: default_coordinator_service(),
            coordinator_port: default_coordinator_port(),
            coordinator_scheme: default_coordinator_scheme(),
            delegate_timeout_secs: default_delegate_timeout_secs(),
        }
    }
}

fn default_peer_service() -> String {
    "peer".to_string()
}

fn default_peer_port() -> u16 {
    7051
}

fn default_coordinator_service() -> String {
    "lifecycle".to_string()
}

fn default_coordinator_port() -> u16 {
    8090
}

fn default_coordinator_scheme() -> String {
    "http".to_string()
}

fn default_delegate_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChaincodeConfig {
    /// Version label used for approve and commit
    #[serde(default = "default_chaincode_version")]
    pub version: String,

    /// Port the external chaincode service listens on
    #[serde(default = "default_chaincode_port")]
    pub port: u16,

    /// Dial timeout written into connection.json
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout: String,
}

impl Default for ChaincodeConfig {
    fn default() -> Self {
        Self {
            version: default_chaincode_version(),
            port: default_chaincode_port(),
            dial_timeout: default_dial_timeout(),
        }
    }
}

fn default_chaincode_version() -> String {
    "1.0".to_string()
}

fn default_chaincode_port() -> u16 {
    7052
}

fn default_dial_timeout() -> String {
    "10s".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliConfig {
    #[serde(default = "default_peer_bin")]
    pub peer_bin: String,

    #[serde(default = "default_discover_bin")]
    pub discover_bin: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            peer_bin: default_peer_bin(),
            discover_bin: default_discover_bin(),
        }
    }
}

fn default_peer_bin() -> String {
    "peer".to_string()
}

fn default_discover_bin() -> String {
    "discover".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8090))
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that every required connection parameter is present.
    pub fn validate(&self) -> anyhow::Result<()> {
        let missing: Vec<&str> = [
            ("msp_id", self.msp_id.trim().is_empty()),
            ("msp_config_path", self.msp_config_path.as_os_str().is_empty()),
            ("peer.address", self.peer.address.trim().is_empty()),
            (
                "peer.tls_root_cert",
                self.peer.tls_root_cert.as_os_str().is_empty(),
            ),
            ("orderer.address", self.orderer.address.trim().is_empty()),
            ("orderer.tls_ca", self.orderer.tls_ca.as_os_str().is_empty()),
        ]
        .into_iter()
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required configuration: {}",
                missing.join(", ")
            );
        }
        if self.network.delegate_timeout_secs == 0 {
            anyhow::bail!("network.delegate_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
