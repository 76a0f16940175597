//! Resolved publish configuration
//!
//! `PublishConfig` is built once at startup from the merged layers and passed
//! explicitly to the pipeline. Nothing below this point reads the
//! environment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Environment variables recognised as overrides, with their config key path
pub const ENV_OVERRIDES: &[(&str, &[&str])] = &[
    ("OTA_VERSION", &["version"]),
    ("OTA_SITE_DIR", &["site_dir"]),
    ("OTA_BUILD_DIR", &["build_dir"]),
    ("OTA_BASE_URL", &["base_url"]),
    ("OTA_GIT_REMOTE", &["git", "remote"]),
    ("OTA_GIT_BRANCH", &["git", "branch"]),
    ("OTA_RUNNER", &["runner"]),
    ("ESPHOME_IMAGE", &["esphome_image"]),
    ("OTA_CHECKSUM", &["checksum"]),
];

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the ESPHome compiler is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runner {
    /// `esphome` on PATH
    Native,
    /// `docker run` with the configured image
    Container,
}

impl Runner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runner::Native => "native",
            Runner::Container => "container",
        }
    }
}

impl std::str::FromStr for Runner {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Runner::Native),
            "container" | "docker" => Ok(Runner::Container),
            other => Err(ConfigError::Invalid(format!(
                "unknown runner '{}' (expected native or container)",
                other
            ))),
        }
    }
}

/// Which checksum implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumTool {
    /// In-process MD5
    Builtin,
    /// External `md5sum` / `md5 -q`
    Command,
}

/// Git settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSettings {
    pub remote: String,
    pub branch: String,
    /// Stage and commit published files
    pub enabled: bool,
    /// Push after committing
    pub push: bool,
}

/// Fully resolved configuration for one publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Explicit build version; the timestamp policy applies when unset
    #[serde(default)]
    pub version: Option<String>,

    pub chip_family: String,

    /// Static-hosting root; each device gets `<site_dir>/<name>/`
    pub site_dir: PathBuf,

    /// ESPHome build tree; defaults to `.esphome/build` next to the device config
    #[serde(default)]
    pub build_dir: Option<PathBuf>,

    /// Public base URL; enables the manifest homepage field
    #[serde(default)]
    pub base_url: Option<String>,

    pub git: GitSettings,

    pub runner: Runner,

    pub esphome_image: String,

    pub checksum: ChecksumTool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            version: None,
            chip_family: defaults.chip_family,
            site_dir: PathBuf::from(defaults.site_dir),
            build_dir: None,
            base_url: None,
            git: GitSettings {
                remote: defaults.git_remote,
                branch: defaults.git_branch,
                enabled: defaults.vcs_enabled,
                push: defaults.push,
            },
            runner: defaults.runner.parse().unwrap_or(Runner::Native),
            esphome_image: defaults.esphome_image,
            checksum: ChecksumTool::Builtin,
        }
    }
}

impl PublishConfig {
    /// Merge layers (lowest precedence first) and deserialize
    pub fn from_layers(layers: Vec<Value>) -> Result<Self, ConfigError> {
        let merged = merge_layers(layers);
        serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Resolve defaults → settings file → environment → CLI
    pub fn resolve<F>(
        settings_file: Option<&Path>,
        env: F,
        cli: Value,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        if let Some(path) = settings_file {
            layers.push(file_layer(path)?);
        }
        layers.push(env_layer(env));
        layers.push(cli);

        let config = Self::from_layers(layers)?;
        config.validate()?;
        Ok(config)
    }

    /// Build directory for a device config file
    pub fn build_dir_for(&self, device_config: &Path) -> PathBuf {
        match &self.build_dir {
            Some(dir) => dir.clone(),
            None => device_config
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(".esphome")
                .join("build"),
        }
    }

    /// Directory holding one device's manifest and binary
    pub fn device_dir(&self, name: &str) -> PathBuf {
        self.site_dir.join(name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chip_family.trim().is_empty() {
            return Err(ConfigError::Invalid("chip_family must not be empty".to_string()));
        }
        if self.site_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("site_dir must not be empty".to_string()));
        }
        if self.git.enabled {
            if self.git.remote.trim().is_empty() {
                return Err(ConfigError::Invalid("git remote must not be empty".to_string()));
            }
            if self.git.branch.trim().is_empty() {
                return Err(ConfigError::Invalid("git branch must not be empty".to_string()));
            }
        }
        if self.runner == Runner::Container && self.esphome_image.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "esphome_image is required for the container runner".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load the `[publish]` table of a TOML settings file as a layer
pub fn file_layer(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_layer(&content)
}

/// Parse TOML settings content into a layer
pub fn parse_file_layer(content: &str) -> Result<Value, ConfigError> {
    let doc: toml::Table = toml::from_str(content)?;
    match doc.get("publish") {
        Some(table) => {
            serde_json::to_value(table).map_err(|e| ConfigError::Invalid(e.to_string()))
        }
        None => Ok(Value::Object(Map::new())),
    }
}

/// Build a layer from environment overrides
///
/// Blank values are ignored. `OTA_RUNNER` accepts the same aliases as the
/// CLI flag.
pub fn env_layer<F>(lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut layer = Value::Object(Map::new());

    for (var, key_path) in ENV_OVERRIDES {
        let Some(raw) = lookup(*var) else { continue };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let value = match *var {
            "OTA_RUNNER" => match raw.parse::<Runner>() {
                Ok(runner) => runner.as_str().to_string(),
                Err(_) => raw.to_string(),
            },
            _ => raw.to_string(),
        };
        set_path(&mut layer, *key_path, Value::String(value));
    }

    layer
}

/// Set a nested key, creating intermediate objects
pub fn set_path(root: &mut Value, key_path: &[&str], value: Value) {
    let Some((last, parents)) = key_path.split_last() else {
        return;
    };

    let mut cursor = root;
    for key in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        cursor = match cursor {
            Value::Object(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if let Value::Object(map) = cursor {
        map.insert(last.to_string(), value);
    }
}
