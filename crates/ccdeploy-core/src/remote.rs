//! Delegation of lifecycle steps to other organizations' coordinators.
//!
//! Only the organization that owns a signing identity can install or approve
//! with it, so for every other participant the step is requested from that
//! organization's coordinator. The result is pass/fail: outputs such as the
//! package id stay with the organization that produced them.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::NetworkConfig;
use crate::discovery::Node;
use crate::error::RemoteError;
use crate::lifecycle::ApproveRequest;

/// Requests lifecycle steps from a remote organization.
#[async_trait]
pub trait PeerCoordinator: Send + Sync {
    /// Ask `node`'s organization to install `chaincode` on its peer.
    async fn install(&self, node: &Node, chaincode: &str) -> Result<(), RemoteError>;

    /// Ask `node`'s organization to approve a definition.
    async fn approve(&self, node: &Node, request: &ApproveRequest) -> Result<(), RemoteError>;
}

/// `PeerCoordinator` speaking to the HTTP API of remote ccdeploy instances.
#[derive(Debug, Clone)]
pub struct HttpPeerCoordinator {
    client: reqwest::Client,
    network: NetworkConfig,
}

impl HttpPeerCoordinator {
    pub fn new(network: NetworkConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ccdeploy/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(network.delegate_timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client, network })
    }

    /// Base URL of the coordinator serving `node`'s organization.
    pub fn base_url(&self, node: &Node) -> Result<Url, RemoteError> {
        let host = if self.network.coordinator_service.is_empty() {
            node.host.clone()
        } else {
            format!("{}.{}", self.network.coordinator_service, node.host)
        };
        let raw = format!(
            "{}://{}:{}/",
            self.network.coordinator_scheme, host, self.network.coordinator_port
        );
        Url::parse(&raw).map_err(|source| RemoteError::Url {
            organization: node.msp_id.clone(),
            source,
        })
    }

    /// Coordinator URL for `segments`, each percent-encoded.
    pub fn endpoint(&self, node: &Node, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url(node)?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Url {
                organization: node.msp_id.clone(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .clear()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, node: &Node, url: Url) -> Result<(), RemoteError> {
        tracing::debug!(msp = %node.msp_id, %url, "Delegating lifecycle step");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                organization: node.msp_id.clone(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(msp = %node.msp_id, %status, "Delegated step failed: {}", body.trim());
            return Err(RemoteError::Status {
                organization: node.msp_id.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PeerCoordinator for HttpPeerCoordinator {
    async fn install(&self, node: &Node, chaincode: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(node, &["install", chaincode])?;
        self.get(node, url).await
    }

    async fn approve(&self, node: &Node, request: &ApproveRequest) -> Result<(), RemoteError> {
        let sequence = request.sequence.to_string();
        let url = self.endpoint(
            node,
            &[
                request.channel.as_str(),
                "approve",
                request.chaincode.as_str(),
                sequence.as_str(),
                request.package_id.as_str(),
            ],
        )?;
        self.get(node, url).await
    }
}
