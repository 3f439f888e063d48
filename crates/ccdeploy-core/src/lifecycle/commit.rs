//! Commit step.

use std::collections::HashSet;

use super::LocalSteps;
use crate::discovery::{Node, path_arg};
use crate::error::StepError;

impl LocalSteps<'_> {
    /// Commit the definition, collecting endorsements from every node.
    ///
    /// Peers of one organization share an endorsing address, so each
    /// `(msp_id, host)` pair is listed once.
    pub async fn commit(
        &self,
        channel: &str,
        chaincode: &str,
        sequence: u64,
        nodes: &[Node],
    ) -> Result<(), StepError> {
        let mut spec = self.with_orderer(
            self.lifecycle("commit")
                .flag("--channelID", channel)
                .flag("--name", chaincode)
                .flag("--version", &self.config.chaincode.version)
                .flag("--sequence", sequence.to_string()),
        );

        let mut endorsers = HashSet::new();
        for node in nodes {
            if !endorsers.insert((node.msp_id.as_str(), node.host.as_str())) {
                continue;
            }
            let anchor = node
                .root_ca
                .as_deref()
                .ok_or_else(|| StepError::MissingTrustAnchor {
                    msp_id: node.msp_id.clone(),
                })?;
            spec = spec
                .flag("--peerAddresses", self.peer_address(node))
                .flag("--tlsRootCertFiles", path_arg(anchor));
        }

        self.exec("commit", &spec).await?;
        Ok(())
    }

    /// Endorsing peer address of a node, e.g. `peer.org1.example.com:7051`.
    pub fn peer_address(&self, node: &Node) -> String {
        format!(
            "{}.{}:{}",
            self.config.network.peer_service, node.host, self.config.network.peer_port
        )
    }
}
