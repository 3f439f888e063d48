//! Install step.

use regex::Regex;

use super::{LocalSteps, package};
use crate::discovery::path_arg;
use crate::error::{ExecError, StepError};
use crate::exec::CommandOutput;

/// Diagnostic emitted by the peer when the package is already installed
const ALREADY_INSTALLED: &str = "chaincode already successfully installed";

impl LocalSteps<'_> {
    /// Package and install `chaincode` on the local peer.
    ///
    /// Returns the package id found in the peer's diagnostics, or `None` if
    /// the peer did not report one. A package that is already installed is
    /// treated as installed.
    pub async fn install(&self, chaincode: &str) -> Result<Option<String>, StepError> {
        let package_err = |source| StepError::Package {
            chaincode: chaincode.to_string(),
            source,
        };

        let workdir = tempfile::Builder::new()
            .prefix("ccdeploy-install-")
            .tempdir()
            .map_err(package_err)?;
        let package = package::write_package(workdir.path(), chaincode, &self.config.chaincode)
            .map_err(package_err)?;

        let spec = self.with_local_peer(self.lifecycle("install").arg(path_arg(&package)));

        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(err) if is_already_installed(&err) => {
                tracing::warn!(chaincode, "Chaincode package is already installed");
                err.output().cloned().unwrap_or_default()
            }
            Err(source) => {
                return Err(StepError::Exec {
                    operation: "install",
                    source,
                });
            }
        };

        let package_id = find_package_id(chaincode, &output);
        if package_id.is_none() {
            tracing::warn!(chaincode, "Install did not report a package id");
        }
        Ok(package_id)
    }
}

fn is_already_installed(err: &ExecError) -> bool {
    err.output()
        .is_some_and(|output| output.stderr.contains(ALREADY_INSTALLED))
}

/// Package id (`<label>:<hash>`) reported in the diagnostic stream.
pub(crate) fn find_package_id(chaincode: &str, output: &CommandOutput) -> Option<String> {
    let pattern = Regex::new(&format!(r"{}:\w+", regex::escape(chaincode))).ok()?;
    output.find_in_diagnostics(&pattern)
}
