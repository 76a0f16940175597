//! OTA manifest (manifest.json)
//!
//! The document read by the device update client. Field names are fixed by
//! the client and must not change:
//!
//! ```json
//! {
//!   "name": "meteo_sonda",
//!   "version": "2026.02.13-1700",
//!   "builds": [
//!     { "chipFamily": "ESP32-C3",
//!       "ota": { "path": "firmware.ota.bin", "md5": "...", "summary": "..." } }
//!   ],
//!   "homepage": "https://x.example/fw/meteo_sonda/"
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::digest::md5_file;
use crate::error::ManifestError;
use crate::validate::{require, validate_md5, validate_name, validate_ota_path};

/// OTA image descriptor inside a build entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaImage {
    /// Binary path relative to the manifest's directory
    pub path: String,

    /// Lowercase hex MD5 of the binary
    pub md5: String,

    /// Human-readable release note
    pub summary: String,
}

/// A single build target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Microcontroller family (opaque, e.g. "ESP32-C3")
    #[serde(rename = "chipFamily")]
    pub chip_family: String,

    pub ota: OtaImage,
}

/// OTA manifest. Key order on the wire follows field order here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    pub version: String,

    /// Always exactly one entry when built by this crate
    pub builds: Vec<BuildTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

/// Facts needed to build a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInput {
    pub name: String,
    pub version: String,
    pub chip_family: String,
    pub md5: String,
    pub ota_path: String,
    pub base_url: Option<String>,
}

impl ManifestInput {
    /// Input with the fixed OTA path and no base URL
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chip_family: impl Into<String>,
        md5: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chip_family: chip_family.into(),
            md5: md5.into(),
            ota_path: crate::OTA_BINARY_FILE.to_string(),
            base_url: None,
        }
    }

    /// Binary location relative to the manifest directory
    pub fn with_ota_path(mut self, ota_path: impl Into<String>) -> Self {
        self.ota_path = ota_path.into();
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }
}

/// Release note text for a version
pub fn summary_for(version: &str) -> String {
    format!("Auto-published build {}", version)
}

/// Homepage for a device: `{base}/{name}/`, or None for a blank base
///
/// Trailing slashes on the base are collapsed so exactly one separates the
/// base from the name.
pub fn homepage_url(base_url: Option<&str>, name: &str) -> Option<String> {
    let base = base_url?.trim();
    if base.is_empty() {
        return None;
    }
    Some(format!("{}/{}/", base.trim_end_matches('/'), name))
}

impl Manifest {
    /// Validate the input and build the manifest
    pub fn build(input: &ManifestInput) -> Result<Self, ManifestError> {
        let name = validate_name(&input.name)?;
        let version = require("version", &input.version)?;
        let chip_family = require("chipFamily", &input.chip_family)?;
        let md5 = validate_md5(&input.md5)?;
        let path = validate_ota_path(&input.ota_path)?;
        let homepage = homepage_url(input.base_url.as_deref(), &name);

        Ok(Self {
            builds: vec![BuildTarget {
                chip_family,
                ota: OtaImage {
                    path,
                    md5,
                    summary: summary_for(&version),
                },
            }],
            name,
            version,
            homepage,
        })
    }

    /// Serialize to indented JSON with a trailing newline
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write to file, replacing any previous manifest
    ///
    /// Parent directories are created. Content goes to a temp sibling first
    /// and is renamed into place so readers never see a partial document.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ManifestError> {
        let json = self.to_json()?;
        atomic_write(path, json.as_bytes())?;
        Ok(())
    }

    /// The single OTA image, if present
    pub fn ota(&self) -> Option<&OtaImage> {
        self.builds.first().map(|b| &b.ota)
    }

    /// Check every build's binary against its recorded digest
    ///
    /// `manifest_dir` is the directory holding manifest.json; OTA paths are
    /// resolved against it.
    pub fn verify_binaries(&self, manifest_dir: &Path) -> Result<Vec<IntegrityError>, ManifestError> {
        let mut errors = Vec::new();

        for build in &self.builds {
            let full_path = manifest_dir.join(&build.ota.path);

            if !full_path.is_file() {
                errors.push(IntegrityError::MissingFile {
                    path: build.ota.path.clone(),
                });
                continue;
            }

            let actual = md5_file(&full_path)?;
            if !actual.eq_ignore_ascii_case(&build.ota.md5) {
                errors.push(IntegrityError::HashMismatch {
                    path: build.ota.path.clone(),
                    expected: build.ota.md5.clone(),
                    actual,
                });
            }
        }

        Ok(errors)
    }
}

/// Write bytes to `path` via a temp sibling and rename
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let temp_path = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Integrity verification error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityError {
    MissingFile { path: String },
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityError::MissingFile { path } => write!(f, "{}: missing", path),
            IntegrityError::HashMismatch {
                path,
                expected,
                actual,
            } => write!(f, "{}: md5 {} does not match manifest {}", path, actual, expected),
        }
    }
}
