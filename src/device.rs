//! Device identity from an ESPHome config file
//!
//! The device name is taken from the `name:` key of the top-level `esphome:`
//! block. Values that use substitutions (`${name}`, `$name`) cannot be
//! resolved here, so the config file stem is used instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ota_manifest::{validate_name, ManifestError};
use regex_lite::Regex;

/// Errors from resolving a device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("failed to read device config: {0}")]
    Io(#[from] io::Error),

    #[error("cannot derive a device name from {}", .0.display())]
    NoName(PathBuf),

    #[error(transparent)]
    InvalidName(#[from] ManifestError),
}

/// Extract `esphome: name:` from YAML text
///
/// Only a direct child of the block counts; nested keys such as
/// `project: name:` are skipped.
pub fn name_from_yaml(content: &str) -> Option<String> {
    // Pattern: "  name: value", value optionally quoted, trailing comment allowed
    let name_re = Regex::new(r#"^\s+name:\s*(?:"([^"]*)"|'([^']*)'|([^\s#]+))"#).unwrap();
    let mut in_block = false;
    let mut child_indent: Option<usize> = None;

    for line in content.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }

        let indent = trimmed.len() - trimmed.trim_start().len();
        if indent == 0 {
            in_block = trimmed == "esphome:";
            child_indent = None;
            continue;
        }

        if !in_block {
            continue;
        }

        // The first child line fixes the block's key depth
        let depth = *child_indent.get_or_insert(indent);
        if indent != depth {
            continue;
        }

        if let Some(caps) = name_re.captures(trimmed) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim())?;
            if value.is_empty() || value.contains('$') {
                return None;
            }
            return Some(value.to_string());
        }
    }

    None
}

/// Device name for a config file: the `esphome.name` field, else the file stem
pub fn device_name(config_path: &Path) -> Result<String, DeviceError> {
    if !config_path.is_file() {
        return Err(DeviceError::ConfigNotFound(config_path.to_path_buf()));
    }

    let content = fs::read_to_string(config_path)?;
    let raw = match name_from_yaml(&content) {
        Some(name) => name,
        None => config_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| DeviceError::NoName(config_path.to_path_buf()))?,
    };

    Ok(validate_name(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_name_from_esphome_block() {
        let yaml = "\
substitutions:
  name: ignored

esphome:
  friendly_name: Meteo Sonda
  name: meteo_sonda

esp32:
  board: esp32-c3-devkitm-1
";
        assert_eq!(name_from_yaml(yaml).as_deref(), Some("meteo_sonda"));
    }

    #[test]
    fn test_quoted_name() {
        let yaml = "esphome:\n  name: \"garage-door\"  # front\n";
        assert_eq!(name_from_yaml(yaml).as_deref(), Some("garage-door"));

        let yaml = "esphome:\n    name: 'porch'\n";
        assert_eq!(name_from_yaml(yaml).as_deref(), Some("porch"));
    }

    #[test]
    fn test_substitution_is_not_resolved() {
        let yaml = "esphome:\n  name: ${name}\n";
        assert_eq!(name_from_yaml(yaml), None);
    }

    #[test]
    fn test_name_outside_esphome_block_ignored() {
        let yaml = "wifi:\n  name: nope\nesphome:\n  platform: ESP32\n";
        assert_eq!(name_from_yaml(yaml), None);
    }

    #[test]
    fn test_nested_name_key_ignored() {
        let yaml = "\
esphome:
  project:
    name: \"acme.weather\"
    version: \"1.0\"
  name: meteo_sonda
";
        assert_eq!(name_from_yaml(yaml).as_deref(), Some("meteo_sonda"));
    }

    #[test]
    fn test_nested_name_only() {
        let yaml = "esphome:\n  project:\n    name: acme.weather\nwifi:\n  ssid: x\n";
        assert_eq!(name_from_yaml(yaml), None);
    }

    #[test]
    fn test_device_name_falls_back_to_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kitchen_sensor.yaml");
        fs::write(&path, "esphome:\n  name: ${devicename}\n").unwrap();

        assert_eq!(device_name(&path).unwrap(), "kitchen_sensor");
    }

    #[test]
    fn test_device_name_rejects_unsafe_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.yaml");
        fs::write(&path, "esphome:\n  name: \"bad name\"\n").unwrap();

        assert!(matches!(
            device_name(&path),
            Err(DeviceError::InvalidName(ManifestError::InvalidName { .. }))
        ));
    }

    #[test]
    fn test_device_name_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            device_name(&dir.path().join("missing.yaml")),
            Err(DeviceError::ConfigNotFound(_))
        ));
    }
}
