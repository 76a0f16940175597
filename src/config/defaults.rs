//! Built-in publish defaults (layer 1)
//!
//! Hardcoded defaults for every setting that has one.

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Chip family label (default: "ESP32")
    pub chip_family: String,

    /// Static-hosting directory (default: "docs/ota")
    pub site_dir: String,

    /// Git remote to push to (default: "origin")
    pub git_remote: String,

    /// Git branch to push (default: "main")
    pub git_branch: String,

    /// How ESPHome is run (default: "native")
    pub runner: String,

    /// Container image for the container runner
    pub esphome_image: String,

    /// Checksum implementation (default: "builtin")
    pub checksum: String,

    /// Commit published files (default: true)
    pub vcs_enabled: bool,

    /// Push after committing (default: true)
    pub push: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            chip_family: "ESP32".to_string(),
            site_dir: "docs/ota".to_string(),
            git_remote: "origin".to_string(),
            git_branch: "main".to_string(),
            runner: "native".to_string(),
            esphome_image: "ghcr.io/esphome/esphome:stable".to_string(),
            checksum: "builtin".to_string(),
            vcs_enabled: true,
            push: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "chip_family": self.chip_family,
            "site_dir": self.site_dir,
            "git": {
                "remote": self.git_remote,
                "branch": self.git_branch,
                "enabled": self.vcs_enabled,
                "push": self.push
            },
            "runner": self.runner,
            "esphome_image": self.esphome_image,
            "checksum": self.checksum
        })
    }
}
