//! Node directory: who participates in a channel.
//!
//! Two discovery queries are combined: the peer list (MSP id and endpoint
//! of every peer joined to the channel) and the channel configuration (TLS
//! root certificates per MSP). The peer CLI only accepts trust anchors as
//! files, so each decoded anchor is written below a request-scoped directory.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::config::CoordinatorConfig;
use crate::error::DiscoveryError;
use crate::exec::{CommandRunner, CommandSpec};
use crate::identity::{Identity, IdentityStore};

/// One participating organization's peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// MSP identifier of the organization
    pub msp_id: String,
    /// Host suffix shared by the organization's services
    pub host: String,
    /// Endpoint as reported by discovery
    pub endpoint: String,
    /// Decoded TLS root certificate, if it could be resolved
    pub root_ca: Option<PathBuf>,
}

impl Node {
    pub fn new(msp_id: impl Into<String>, endpoint: &str) -> Result<Self, DiscoveryError> {
        Ok(Self {
            msp_id: msp_id.into(),
            host: host_from_endpoint(endpoint)?,
            endpoint: endpoint.to_string(),
            root_ca: None,
        })
    }
}

/// Host part of a `<slot>.<service>.<host>[:port]` endpoint.
///
/// `peer-0.peer.org1.example.com:7051` yields `org1.example.com`.
pub fn host_from_endpoint(endpoint: &str) -> Result<String, DiscoveryError> {
    let without_port = endpoint.split(':').next().unwrap_or_default();
    let labels: Vec<&str> = without_port.split('.').collect();

    if labels.len() < 3 || labels.iter().any(|label| label.is_empty()) {
        return Err(DiscoveryError::MalformedEndpoint(endpoint.to_string()));
    }
    Ok(labels[2..].join("."))
}

/// Entry of the `discover peers` response
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredPeer {
    #[serde(rename = "MSPID", default)]
    pub mspid: String,
    #[serde(rename = "Endpoint", default)]
    pub endpoint: String,
}

/// The `discover config` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub msps: HashMap<String, MspConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MspConfig {
    /// Base64-encoded PEM certificates
    #[serde(default)]
    pub tls_root_certs: Vec<String>,
}

impl ChannelConfig {
    /// Decoded first TLS root certificate of `msp_id`.
    fn tls_root(&self, msp_id: &str) -> Result<Vec<u8>, String> {
        let encoded = self
            .msps
            .get(msp_id)
            .ok_or_else(|| "MSP is not part of the channel configuration".to_string())?
            .tls_root_certs
            .first()
            .ok_or_else(|| "MSP has no TLS root certificate".to_string())?;

        STANDARD
            .decode(encoded.trim())
            .map_err(|e| format!("invalid base64 certificate: {}", e))
    }
}

/// Resolves channel participants through the discovery CLI.
pub struct NodeDirectory<'a> {
    config: &'a CoordinatorConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> NodeDirectory<'a> {
    pub fn new(config: &'a CoordinatorConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Participants of `channel`, in discovery order.
    ///
    /// Trust anchors are written into `anchor_dir`; the caller owns its
    /// lifetime. A participant whose anchor cannot be resolved is still
    /// returned, without `root_ca`.
    pub async fn discover(
        &self,
        channel: &str,
        anchor_dir: &Path,
    ) -> Result<Vec<Node>, DiscoveryError> {
        let identity = IdentityStore::new(&self.config.msp_config_path).locate()?;

        let peers: Vec<DiscoveredPeer> = self.query("peers", channel, &identity).await?;
        let channel_config: ChannelConfig = self.query("config", channel, &identity).await?;

        let mut nodes = Vec::with_capacity(peers.len());
        for peer in peers {
            if peer.mspid.trim().is_empty() {
                tracing::warn!(endpoint = %peer.endpoint, "Skipping peer without MSP id");
                continue;
            }

            let mut node = Node::new(peer.mspid, &peer.endpoint)?;
            match channel_config.tls_root(&node.msp_id) {
                Ok(pem) => {
                    node.root_ca = Some(write_anchor(anchor_dir, &node.msp_id, &pem)?);
                }
                Err(reason) => {
                    tracing::error!(msp = %node.msp_id, "Trust anchor unavailable: {}", reason);
                }
            }
            nodes.push(node);
        }

        Ok(nodes)
    }

    async fn query<T>(
        &self,
        query: &'static str,
        channel: &str,
        identity: &Identity,
    ) -> Result<T, DiscoveryError>
    where
        T: serde::de::DeserializeOwned,
    {
        let spec = CommandSpec::new(&self.config.cli.discover_bin)
            .arg(query)
            .flag("--channel", channel)
            .flag("--server", &self.config.peer.address)
            .flag("--peerTLSCA", path_arg(&self.config.peer.tls_root_cert))
            .flag("--userKey", path_arg(&identity.key))
            .flag("--userCert", path_arg(&identity.cert))
            .flag("--MSP", &self.config.msp_id);

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|source| DiscoveryError::Query { query, source })?;

        serde_json::from_str(&output.stdout)
            .map_err(|source| DiscoveryError::Malformed { query, source })
    }
}

fn write_anchor(dir: &Path, msp_id: &str, pem: &[u8]) -> Result<PathBuf, DiscoveryError> {
    let anchor_err = |source| DiscoveryError::Anchor {
        msp_id: msp_id.to_string(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-", msp_id))
        .suffix(".pem")
        .tempfile_in(dir)
        .map_err(anchor_err)?;
    file.write_all(pem).map_err(anchor_err)?;
    let (_, path) = file.keep().map_err(|e| anchor_err(e.error))?;
    Ok(path)
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
