//! Local identity material used to authenticate discovery queries.

use std::path::{Path, PathBuf};

use crate::error::DiscoveryError;

const KEYSTORE_DIR: &str = "keystore";
const SIGNCERTS_DIR: &str = "signcerts";

/// Private key and certificate of the local signing identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key: PathBuf,
    pub cert: PathBuf,
}

/// An MSP directory laid out as `keystore/<key>` and `signcerts/<cert>`.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    root: PathBuf,
}

impl IdentityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the key and certificate.
    ///
    /// File names are generated by the CA tooling, so each directory must
    /// contain exactly one regular file. Symlinks count when they resolve to
    /// a file, as with mounted secrets.
    pub fn locate(&self) -> Result<Identity, DiscoveryError> {
        Ok(Identity {
            key: single_file(&self.root.join(KEYSTORE_DIR))?,
            cert: single_file(&self.root.join(SIGNCERTS_DIR))?,
        })
    }
}

fn single_file(dir: &Path) -> Result<PathBuf, DiscoveryError> {
    let io_err = |source| DiscoveryError::IdentityIo {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Skipping dangling link");
            }
            Err(err) => return Err(io_err(err)),
        }
    }

    match files.len() {
        1 => Ok(files.remove(0)),
        found => Err(DiscoveryError::Identity {
            dir: dir.to_path_buf(),
            found,
        }),
    }
}
