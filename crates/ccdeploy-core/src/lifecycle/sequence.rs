//! Sequence negotiation from the committed definition.

use serde::Deserialize;

use super::{LocalSteps, decode};
use crate::error::{ExecError, StepError};

/// Diagnostics of a `querycommitted` for a chaincode that was never committed
const NOT_COMMITTED_MARKERS: &[&str] = &["is not defined", "status: 404"];

/// The `querycommitted --name <cc> -O json` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommittedDefinition {
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
}

impl LocalSteps<'_> {
    /// Sequence of the committed definition, or `None` if nothing is committed.
    pub async fn committed_sequence(
        &self,
        channel: &str,
        chaincode: &str,
    ) -> Result<Option<u64>, StepError> {
        let spec = self
            .with_local_peer(
                self.with_orderer(
                    self.lifecycle("querycommitted")
                        .flag("--channelID", channel)
                        .flag("--name", chaincode),
                ),
            )
            .flag("-O", "json");

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(err) if is_not_committed(&err) => return Ok(None),
            Err(source) => {
                return Err(StepError::Exec {
                    operation: "querycommitted",
                    source,
                });
            }
        };

        let committed: CommittedDefinition = decode("querycommitted", &output)?;
        Ok(committed.sequence)
    }

    /// Next usable sequence: committed + 1, or 1 for a first deployment.
    pub async fn next_sequence(&self, channel: &str, chaincode: &str) -> Result<u64, StepError> {
        match self.committed_sequence(channel, chaincode).await? {
            None => Ok(1),
            Some(committed) => {
                committed
                    .checked_add(1)
                    .ok_or_else(|| StepError::SequenceOverflow {
                        chaincode: chaincode.to_string(),
                        committed,
                    })
            }
        }
    }
}

fn is_not_committed(err: &ExecError) -> bool {
    err.output().is_some_and(|output| {
        NOT_COMMITTED_MARKERS
            .iter()
            .any(|marker| output.stderr.contains(marker))
    })
}
