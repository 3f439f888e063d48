//! Approve step with commit-readiness guard.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{ApproveOutcome, ApproveRequest, LocalSteps, decode};
use crate::error::StepError;

/// The `checkcommitreadiness -O json` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitReadiness {
    #[serde(default)]
    pub approvals: BTreeMap<String, bool>,
}

impl CommitReadiness {
    pub fn is_approved_by(&self, msp_id: &str) -> bool {
        self.approvals.get(msp_id).copied().unwrap_or(false)
    }
}

impl LocalSteps<'_> {
    /// Approve the definition for the local organization.
    ///
    /// The readiness check makes re-runs after a partial failure safe: an
    /// approval already recorded on the ledger is not submitted again. The
    /// check is a plain read, not a lock.
    pub async fn approve(&self, request: &ApproveRequest) -> Result<ApproveOutcome, StepError> {
        if self.already_approved(request).await {
            tracing::warn!(
                chaincode = %request.chaincode,
                sequence = request.sequence,
                channel = %request.channel,
                msp = %self.config.msp_id,
                "Definition has already been approved"
            );
            return Ok(ApproveOutcome::AlreadyApproved);
        }

        let spec = self.with_orderer(
            self.lifecycle("approveformyorg")
                .flag("--channelID", &request.channel)
                .flag("--name", &request.chaincode)
                .flag("--version", &self.config.chaincode.version)
                .flag("--package-id", &request.package_id)
                .flag("--sequence", request.sequence.to_string()),
        );

        self.exec("approveformyorg", &spec).await?;
        Ok(ApproveOutcome::Approved)
    }

    /// Approval state of every organization for a definition.
    pub async fn commit_readiness(
        &self,
        channel: &str,
        chaincode: &str,
        sequence: u64,
    ) -> Result<CommitReadiness, StepError> {
        let spec = self.with_orderer(
            self.lifecycle("checkcommitreadiness")
                .flag("--channelID", channel)
                .flag("--name", chaincode)
                .flag("--version", &self.config.chaincode.version)
                .flag("--sequence", sequence.to_string()),
        )
        .flag("-O", "json");

        let output = self.exec("checkcommitreadiness", &spec).await?;
        decode("checkcommitreadiness", &output)
    }

    async fn already_approved(&self, request: &ApproveRequest) -> bool {
        match self
            .commit_readiness(&request.channel, &request.chaincode, request.sequence)
            .await
        {
            Ok(readiness) => readiness.is_approved_by(&self.config.msp_id),
            Err(err) => {
                // Unknown state: submit the approval and let the ledger decide
                tracing::error!("Commit readiness check failed: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_defaults_to_not_approved() {
        let readiness: CommitReadiness =
            serde_json::from_str(r#"{"approvals": {"Org1MSP": true, "Org2MSP": false}}"#).unwrap();

        assert!(readiness.is_approved_by("Org1MSP"));
        assert!(!readiness.is_approved_by("Org2MSP"));
        assert!(!readiness.is_approved_by("Org3MSP"));

        let empty: CommitReadiness = serde_json::from_str("{}").unwrap();
        assert!(!empty.is_approved_by("Org1MSP"));
    }
}
