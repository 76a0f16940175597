//! Input validation for manifest fields
//!
//! The device name doubles as a directory name on the static site and as a
//! URL path segment, so it is restricted to a conservative character set.

use std::path::{Component, Path};

use crate::error::ManifestError;

/// Trim a required field, rejecting empty results
pub(crate) fn require(field: &'static str, value: &str) -> Result<String, ManifestError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ManifestError::EmptyField { field });
    }
    Ok(trimmed.to_string())
}

/// Validate a device name (ASCII alphanumerics, `-`, `_`, `.`)
pub fn validate_name(name: &str) -> Result<String, ManifestError> {
    let name = require("name", name)?;

    if name == "." || name == ".." {
        return Err(ManifestError::InvalidName {
            name,
            reason: "relative directory reference".to_string(),
        });
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ManifestError::InvalidName {
            reason: format!("character {:?} is not allowed", bad),
            name,
        });
    }

    Ok(name)
}

/// Validate an MD5 hex digest, normalising to lowercase
pub fn validate_md5(md5: &str) -> Result<String, ManifestError> {
    let md5 = require("md5", md5)?;
    if md5.len() != 32 || !md5.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ManifestError::InvalidMd5(md5));
    }
    Ok(md5.to_ascii_lowercase())
}

/// Validate the OTA path: relative, no parent traversal
pub fn validate_ota_path(path: &str) -> Result<String, ManifestError> {
    let path = require("ota path", path)?;

    if path.starts_with('/') || path.starts_with('\\') {
        return Err(ManifestError::InvalidOtaPath {
            path,
            reason: "must be relative to the manifest directory".to_string(),
        });
    }

    for component in Path::new(&path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(ManifestError::InvalidOtaPath {
                    path,
                    reason: "must not escape the manifest directory".to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ManifestError::InvalidOtaPath {
                    path,
                    reason: "must be relative to the manifest directory".to_string(),
                })
            }
        }
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(validate_name("meteo_sonda").unwrap(), "meteo_sonda");
        assert_eq!(validate_name("  garage-door.v2 ").unwrap(), "garage-door.v2");
    }

    #[test]
    fn test_name_rejects_separators_and_unsafe_chars() {
        for bad in ["a/b", "a\\b", "has space", "q?x", "ü", "x#y"] {
            assert!(
                matches!(validate_name(bad), Err(ManifestError::InvalidName { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_name_rejects_dot_references() {
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
    }

    #[test]
    fn test_name_rejects_blank() {
        assert!(matches!(
            validate_name("   "),
            Err(ManifestError::EmptyField { field: "name" })
        ));
    }

    #[test]
    fn test_md5_normalises_case() {
        assert_eq!(
            validate_md5("D41D8CD98F00B204E9800998ECF8427E").unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_md5_rejects_wrong_length_and_non_hex() {
        assert!(matches!(validate_md5("abc"), Err(ManifestError::InvalidMd5(_))));
        assert!(matches!(
            validate_md5("z41d8cd98f00b204e9800998ecf8427e"),
            Err(ManifestError::InvalidMd5(_))
        ));
        assert!(matches!(
            validate_md5("d41d8cd98f00b204e9800998ecf8427e00"),
            Err(ManifestError::InvalidMd5(_))
        ));
    }

    #[test]
    fn test_ota_path_rules() {
        assert_eq!(validate_ota_path("firmware.ota.bin").unwrap(), "firmware.ota.bin");
        assert_eq!(validate_ota_path("bin/firmware.bin").unwrap(), "bin/firmware.bin");
        assert!(validate_ota_path("/etc/firmware.bin").is_err());
        assert!(validate_ota_path("../other/firmware.bin").is_err());
        assert!(validate_ota_path("").is_err());
    }
}
