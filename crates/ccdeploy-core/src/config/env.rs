//! Environment overlay for the conventional peer CLI variables.
//!
//! Deployments usually already export the variables the peer CLI reads.
//! They are folded into the configuration once at startup; nothing reads the
//! process environment after that.

use std::path::PathBuf;

use super::CoordinatorConfig;

pub const LOCAL_MSP_ID: &str = "CORE_PEER_LOCALMSPID";
pub const MSP_CONFIG_PATH: &str = "CORE_PEER_MSPCONFIGPATH";
pub const PEER_ADDRESS: &str = "CORE_PEER_ADDRESS";
pub const PEER_TLS_ROOT_CERT: &str = "CORE_PEER_TLS_ROOTCERT_FILE";
pub const ORDERER_ADDRESS: &str = "ORDERER_ADDRESS";
pub const ORDERER_CA: &str = "ORDERER_CA";

/// Override configuration values with non-empty variables from `lookup`.
pub fn apply_env<F>(config: &mut CoordinatorConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = get(LOCAL_MSP_ID) {
        config.msp_id = value;
    }
    if let Some(value) = get(MSP_CONFIG_PATH) {
        config.msp_config_path = PathBuf::from(value);
    }
    if let Some(value) = get(PEER_ADDRESS) {
        config.peer.address = value;
    }
    if let Some(value) = get(PEER_TLS_ROOT_CERT) {
        config.peer.tls_root_cert = PathBuf::from(value);
    }
    if let Some(value) = get(ORDERER_ADDRESS) {
        config.orderer.address = value;
    }
    if let Some(value) = get(ORDERER_CA) {
        config.orderer.tls_ca = PathBuf::from(value);
    }
}
