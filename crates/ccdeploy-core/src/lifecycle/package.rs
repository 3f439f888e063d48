//! Chaincode-as-a-service package assembly.
//!
//! The package does not contain code. It tells the peer where the running
//! chaincode service is (`connection.json`, wrapped in `code.tar.gz`) and
//! which builder handles it (`metadata.json`). Entries are written with fixed
//! metadata so the same chaincode always yields byte-identical archives.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;

use crate::config::ChaincodeConfig;

const CONNECTION_FILE: &str = "connection.json";
const METADATA_FILE: &str = "metadata.json";
const CODE_ARCHIVE: &str = "code.tar.gz";
const PACKAGE_TYPE: &str = "external";

/// Contents of connection.json
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionDescriptor {
    pub address: String,
    pub dial_timeout: String,
    pub tls_required: bool,
    pub client_auth_required: bool,
    pub client_key: String,
    pub client_cert: String,
    pub root_cert: String,
}

impl ConnectionDescriptor {
    pub fn plaintext(chaincode: &str, config: &ChaincodeConfig) -> Self {
        Self {
            address: format!("{}:{}", chaincode, config.port),
            dial_timeout: config.dial_timeout.clone(),
            tls_required: false,
            client_auth_required: false,
            client_key: String::new(),
            client_cert: String::new(),
            root_cert: String::new(),
        }
    }
}

/// Contents of metadata.json
#[derive(Debug, Clone, Serialize)]
pub struct PackageMetadata {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
}

impl PackageMetadata {
    pub fn external(chaincode: &str) -> Self {
        Self {
            path: String::new(),
            kind: PACKAGE_TYPE.to_string(),
            label: chaincode.to_string(),
        }
    }
}

/// Build the `<chaincode>.tgz` package in memory.
pub fn build_package(chaincode: &str, config: &ChaincodeConfig) -> std::io::Result<Vec<u8>> {
    let connection = serde_json::to_vec(&ConnectionDescriptor::plaintext(chaincode, config))?;
    let metadata = serde_json::to_vec(&PackageMetadata::external(chaincode))?;

    let code = tar_gz(&[(CONNECTION_FILE, connection.as_slice())])?;
    tar_gz(&[
        (CODE_ARCHIVE, code.as_slice()),
        (METADATA_FILE, metadata.as_slice()),
    ])
}

/// Write the package to `<dir>/<chaincode>.tgz` and return its path.
pub fn write_package(
    dir: &Path,
    chaincode: &str,
    config: &ChaincodeConfig,
) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{}.tgz", chaincode));
    std::fs::write(&path, build_package(chaincode, config)?)?;
    Ok(path)
}

fn tar_gz(entries: &[(&str, &[u8])]) -> std::io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_path(name)?;
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_cksum();
        builder.append(&header, *data)?;
    }

    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()
}
