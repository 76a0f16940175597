//! Publish pipeline
//!
//! Sequences one publish:
//! - Resolve the device name and build version
//! - Compile and locate the firmware binary
//! - Checksum it and build the manifest
//! - Stage the binary, re-hash it, rename it into place, write the manifest
//! - Commit and push both files
//!
//! The binary and the manifest are each replaced atomically. A staged binary
//! that fails its re-hash never replaces the served one, and the manifest is
//! written last: a present manifest always describes the binary beside it.
//! A failure after placement but before the VCS step leaves both files
//! written but uncommitted; re-running the publish repairs that.

mod report;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ota_manifest::{
    md5_file, resolve_version, IntegrityError, Manifest, ManifestError, ManifestInput,
    MANIFEST_FILE, OTA_BINARY_FILE,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::{ArtifactError, Checksum, ChecksumError};
use crate::config::{ConfigError, PublishConfig};
use crate::device::{device_name, DeviceError};
use crate::toolchain::{Compiler, ToolchainError, ESPHOME_PROGRAM};
use crate::vcs::{commit_message, VcsError, VcsRequest, VersionControl};

pub use report::PublishReport;

/// Publish errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("version control error: {0}")]
    Vcs(#[from] VcsError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("integrity check failed: {}", format_integrity(.0))]
    Integrity(Vec<IntegrityError>),
}

fn format_integrity(errors: &[IntegrityError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PublishError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PublishError::Config(_) => 2,
            PublishError::Device(DeviceError::Io(_)) => 1,
            PublishError::Device(_) => 2,
            PublishError::Toolchain(e) => match e {
                ToolchainError::ToolNotFound(_) => 3,
                ToolchainError::CompileFailed { .. } => 7,
                ToolchainError::Spawn { .. } => 3,
                ToolchainError::Artifact(a) => artifact_exit_code(a),
                ToolchainError::Io(_) => 1,
            },
            PublishError::Checksum(ChecksumError::UtilityNotFound) => 6,
            PublishError::Checksum(_) => 1,
            PublishError::Manifest(e) if e.is_validation() => 2,
            PublishError::Manifest(_) => 1,
            PublishError::Vcs(VcsError::ToolNotFound(_)) => 3,
            PublishError::Vcs(_) => 8,
            PublishError::Io(_) => 1,
            PublishError::BinaryNotFound(_) => 5,
            PublishError::Integrity(_) => 9,
        }
    }
}

fn artifact_exit_code(error: &ArtifactError) -> i32 {
    match error {
        ArtifactError::BuildOutputMissing(_) => 4,
        ArtifactError::ArtifactMissing(_) => 5,
        ArtifactError::Walk(_) | ArtifactError::Io(_) => 1,
    }
}

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Temp sibling used while placing `dest`
fn staging_path(dest: &Path) -> PathBuf {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| OTA_BINARY_FILE.to_string());
    dir.join(format!(".{}.tmp", file_name))
}

/// Copy `source` next to `dest` under its staging name
pub fn stage_binary(source: &Path, dest: &Path) -> io::Result<PathBuf> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let staged = staging_path(dest);
    fs::copy(source, &staged)?;
    Ok(staged)
}

/// Check a device directory's manifest against the binary beside it
pub fn verify_device(device_dir: &Path) -> PublishResult<Manifest> {
    let manifest = Manifest::from_file(&device_dir.join(MANIFEST_FILE))?;
    let errors = manifest.verify_binaries(device_dir)?;
    if !errors.is_empty() {
        return Err(PublishError::Integrity(errors));
    }
    Ok(manifest)
}

/// Publish pipeline for one configuration
pub struct Publisher<'a> {
    config: &'a PublishConfig,
    checksum: &'a dyn Checksum,
    compiler: Option<&'a dyn Compiler>,
    vcs: Option<&'a dyn VersionControl>,
    dry_run: bool,
}

impl<'a> Publisher<'a> {
    /// Create a publisher that places files but compiles and commits nothing
    pub fn new(config: &'a PublishConfig, checksum: &'a dyn Checksum) -> Self {
        Self {
            config,
            checksum,
            compiler: None,
            vcs: None,
            dry_run: false,
        }
    }

    /// Compiler used by `publish`
    pub fn compiler(mut self, compiler: &'a dyn Compiler) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Record published files in version control
    pub fn vcs(mut self, vcs: &'a dyn VersionControl) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Build and report the manifest without writing or committing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the full pipeline for a device config file
    pub fn publish(&self, device_config: &Path) -> PublishResult<PublishReport> {
        let name = device_name(device_config)?;
        let version = resolve_version(self.config.version.as_deref());
        info!(device = %name, version = %version, "publishing");

        let compiler = self
            .compiler
            .ok_or_else(|| ToolchainError::ToolNotFound(ESPHOME_PROGRAM.to_string()))?;
        let artifact = compiler.compile(device_config, &name)?;
        info!(artifact = %artifact.display(), "firmware built");

        self.release(&name, &version, &artifact)
    }

    /// Publish an already-built binary under `name`
    pub fn publish_binary(&self, name: &str, binary: &Path) -> PublishResult<PublishReport> {
        if !binary.is_file() {
            return Err(PublishError::BinaryNotFound(binary.to_path_buf()));
        }
        let version = resolve_version(self.config.version.as_deref());
        self.release(name, &version, binary)
    }

    fn release(&self, name: &str, version: &str, artifact: &Path) -> PublishResult<PublishReport> {
        let md5 = self.checksum.digest(artifact)?;
        let manifest = Manifest::build(
            &ManifestInput::new(name, version, &self.config.chip_family, md5)
                .with_base_url(self.config.base_url.clone()),
        )?;

        let device_dir = self.config.device_dir(&manifest.name);
        let mut report = PublishReport::new(
            manifest,
            device_dir.join(MANIFEST_FILE),
            device_dir.join(OTA_BINARY_FILE),
        );

        if self.dry_run {
            info!("dry run, nothing written");
            return Ok(report);
        }

        // The served binary is only replaced once the staged copy hashes
        // to the digest the manifest will advertise
        let staged = stage_binary(artifact, &report.binary_path)?;
        let staged_md5 = match md5_file(&staged) {
            Ok(md5) => md5,
            Err(e) => {
                let _ = fs::remove_file(&staged);
                return Err(e.into());
            }
        };
        if staged_md5 != report.md5() {
            let _ = fs::remove_file(&staged);
            return Err(PublishError::Integrity(vec![IntegrityError::HashMismatch {
                path: OTA_BINARY_FILE.to_string(),
                expected: report.md5().to_string(),
                actual: staged_md5,
            }]));
        }

        fs::rename(&staged, &report.binary_path)?;
        info!(path = %report.binary_path.display(), "binary placed");

        report.manifest.write_to_file(&report.manifest_path)?;
        report.written = true;
        info!(path = %report.manifest_path.display(), "manifest written");

        if let Some(vcs) = self.vcs {
            let request = VcsRequest {
                paths: vec![report.binary_path.clone(), report.manifest_path.clone()],
                message: commit_message(&report.manifest.name, &report.manifest.version),
                push: self.config.git.push,
            };
            match vcs.publish(&request) {
                Ok(outcome) => {
                    report.committed = outcome.committed;
                    report.pushed = outcome.pushed;
                }
                Err(e) => {
                    warn!("files written but not recorded in version control; re-run to retry");
                    return Err(e.into());
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exit_codes() {
        let cases: Vec<(PublishError, i32)> = vec![
            (ConfigError::Invalid("x".into()).into(), 2),
            (DeviceError::ConfigNotFound(PathBuf::from("a.yaml")).into(), 2),
            (ToolchainError::ToolNotFound("esphome".into()).into(), 3),
            (
                ToolchainError::Artifact(ArtifactError::BuildOutputMissing(PathBuf::new())).into(),
                4,
            ),
            (
                ToolchainError::Artifact(ArtifactError::ArtifactMissing(PathBuf::new())).into(),
                5,
            ),
            (ChecksumError::UtilityNotFound.into(), 6),
            (VcsError::ToolNotFound("git".into()).into(), 3),
            (
                VcsError::CommandFailed {
                    command: "git push".into(),
                    status: "exit status: 1".into(),
                    stderr: String::new(),
                }
                .into(),
                8,
            ),
            (ManifestError::InvalidMd5("x".into()).into(), 2),
            (PublishError::BinaryNotFound(PathBuf::new()), 5),
            (PublishError::Integrity(Vec::new()), 9),
        ];

        for (error, code) in cases {
            assert_eq!(error.exit_code(), code, "{error}");
        }
    }

    #[test]
    fn test_stage_binary_writes_hidden_sibling() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("build/firmware.ota.bin");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"new image").unwrap();

        let dest = dir.path().join("site/dev/firmware.ota.bin");
        let staged = stage_binary(&source, &dest).unwrap();

        assert_eq!(staged, dir.path().join("site/dev/.firmware.ota.bin.tmp"));
        assert_eq!(fs::read(&staged).unwrap(), b"new image");
        assert!(!dest.exists());
    }

    #[test]
    fn test_verify_device_reports_mismatch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(OTA_BINARY_FILE), b"image").unwrap();
        Manifest::build(&ManifestInput::new(
            "dev",
            "1",
            "ESP32",
            "d41d8cd98f00b204e9800998ecf8427e",
        ))
        .unwrap()
        .write_to_file(&dir.path().join(MANIFEST_FILE))
        .unwrap();

        let err = verify_device(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 9);
    }
}
