//! Local lifecycle steps executed through the peer CLI.
//!
//! Each step builds a complete `peer lifecycle chaincode` invocation from the
//! coordinator configuration, runs it and extracts what the workflow needs
//! from the captured output:
//!
//! | Step             | Sub-command             | Result                         |
//! |------------------|-------------------------|--------------------------------|
//! | install          | `install`               | package id from stderr         |
//! | approve          | `checkcommitreadiness`, `approveformyorg` | `ApproveOutcome` |
//! | commit           | `commit`                | -                              |
//! | query installed  | `queryinstalled`        | package id or none             |
//! | next sequence    | `querycommitted`        | committed sequence + 1, or 1   |

mod approve;
mod commit;
mod install;
mod installed;
pub mod package;
mod sequence;

use serde::{Deserialize, Serialize};

use crate::config::CoordinatorConfig;
use crate::discovery::path_arg;
use crate::error::StepError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

pub use approve::CommitReadiness;
pub use installed::{InstalledChaincode, InstalledChaincodes};
pub use sequence::CommittedDefinition;

/// Parameters of an approval for the local organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub channel: String,
    pub chaincode: String,
    pub sequence: u64,
    pub package_id: String,
}

/// Result of a local approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproveOutcome {
    /// The approval transaction was submitted
    Approved,
    /// The organization had already approved this sequence
    AlreadyApproved,
}

/// Executes lifecycle steps for the local organization.
pub struct LocalSteps<'a> {
    config: &'a CoordinatorConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> LocalSteps<'a> {
    pub fn new(config: &'a CoordinatorConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// `peer lifecycle chaincode <sub>` with the local peer identity.
    fn lifecycle(&self, sub: &str) -> CommandSpec {
        CommandSpec::new(&self.config.cli.peer_bin)
            .arg("lifecycle")
            .arg("chaincode")
            .arg(sub)
            .env("CORE_PEER_LOCALMSPID", &self.config.msp_id)
            .env("CORE_PEER_ADDRESS", &self.config.peer.address)
            .env("CORE_PEER_TLS_ENABLED", "true")
            .env(
                "CORE_PEER_TLS_ROOTCERT_FILE",
                path_arg(&self.config.peer.tls_root_cert),
            )
            .env(
                "CORE_PEER_MSPCONFIGPATH",
                path_arg(&self.config.msp_config_path),
            )
    }

    /// Add ordering service connection flags.
    fn with_orderer(&self, spec: CommandSpec) -> CommandSpec {
        spec.flag("-o", &self.config.orderer.address)
            .flag("--tls", "true")
            .flag("--cafile", path_arg(&self.config.orderer.tls_ca))
    }

    /// Add the local peer as the only target.
    fn with_local_peer(&self, spec: CommandSpec) -> CommandSpec {
        spec.flag("--peerAddresses", &self.config.peer.address)
            .flag(
                "--tlsRootCertFiles",
                path_arg(&self.config.peer.tls_root_cert),
            )
    }

    async fn exec(
        &self,
        operation: &'static str,
        spec: &CommandSpec,
    ) -> Result<CommandOutput, StepError> {
        self.runner
            .run(spec)
            .await
            .map_err(|source| StepError::Exec { operation, source })
    }
}

fn decode<T>(operation: &'static str, output: &CommandOutput) -> Result<T, StepError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(&output.stdout).map_err(|source| StepError::Decode { operation, source })
}
