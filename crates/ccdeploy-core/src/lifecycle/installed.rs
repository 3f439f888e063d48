//! Lookup of installed packages.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{LocalSteps, decode};
use crate::error::StepError;

/// The `queryinstalled -O json` response
///
/// The peer omits `installed_chaincodes` entirely when nothing is installed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstalledChaincodes {
    #[serde(default)]
    pub installed_chaincodes: Vec<InstalledChaincode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstalledChaincode {
    #[serde(default)]
    pub package_id: String,
    #[serde(default)]
    pub label: String,
    /// Channels whose approved definitions reference this package
    #[serde(default)]
    pub references: BTreeMap<String, serde_json::Value>,
}

impl InstalledChaincodes {
    /// First package labelled `chaincode` that is referenced on `channel`.
    pub fn find(&self, channel: &str, chaincode: &str) -> Option<&InstalledChaincode> {
        self.installed_chaincodes.iter().find(|installed| {
            installed.label == chaincode
                && installed.references.contains_key(channel)
                && !installed.package_id.is_empty()
        })
    }
}

impl LocalSteps<'_> {
    /// Package id of `chaincode` as used on `channel`, if installed.
    pub async fn query_installed(
        &self,
        channel: &str,
        chaincode: &str,
    ) -> Result<Option<String>, StepError> {
        let spec = self
            .with_local_peer(self.lifecycle("queryinstalled"))
            .flag("-O", "json");

        let output = self.exec("queryinstalled", &spec).await?;
        let installed: InstalledChaincodes = decode("queryinstalled", &output)?;

        Ok(installed
            .find(channel, chaincode)
            .map(|found| found.package_id.clone()))
    }
}
