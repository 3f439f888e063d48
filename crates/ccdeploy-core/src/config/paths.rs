//! Config path resolution helpers.

use std::path::PathBuf;

const CONFIG_DIR: &str = "ccdeploy";
const CONFIG_FILE: &str = "ccdeploy.toml";

/// Per-user config file location, e.g. `~/.config/ccdeploy/ccdeploy.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
