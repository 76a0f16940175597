//! Firmware checksums
//!
//! The manifest needs the MD5 of the binary. `Md5Checksum` computes it in
//! process; `CommandChecksum` shells out to `md5sum` (GNU) or `md5 -q` (BSD)
//! for parity with hosts that pin an external tool.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use ota_manifest::{md5_file, validate_md5};
use tracing::debug;

use crate::config::ChecksumTool;
use crate::toolchain::{describe, find_program};

/// Computes a file's MD5 as 32 lowercase hex characters
pub trait Checksum {
    fn digest(&self, path: &Path) -> Result<String, ChecksumError>;
}

/// Checksum errors
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("no checksum utility found (tried md5sum, md5)")]
    UtilityNotFound,

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{command} produced unexpected output: {output}")]
    BadOutput { command: String, output: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// In-process MD5
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Checksum;

impl Checksum for Md5Checksum {
    fn digest(&self, path: &Path) -> Result<String, ChecksumError> {
        Ok(md5_file(path)?)
    }
}

/// External checksum program
#[derive(Debug, Clone)]
pub struct CommandChecksum {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandChecksum {
    /// Find `md5sum`, then `md5 -q`, on PATH
    pub fn detect() -> Result<Self, ChecksumError> {
        if let Some(program) = find_program("md5sum") {
            return Ok(Self::new(program, Vec::new()));
        }
        if let Some(program) = find_program("md5") {
            return Ok(Self::new(program, vec!["-q".to_string()]));
        }
        Err(ChecksumError::UtilityNotFound)
    }

    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl Checksum for CommandChecksum {
    fn digest(&self, path: &Path) -> Result<String, ChecksumError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(path);
        let rendered = describe(&command);
        debug!(command = %rendered, "computing checksum");

        let output = command.output()?;
        if !output.status.success() {
            return Err(ChecksumError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // md5sum prints "<digest>  <path>", md5 -q prints "<digest>"
        let stdout = String::from_utf8_lossy(&output.stdout);
        let token = stdout.split_whitespace().next().unwrap_or_default();
        validate_md5(token).map_err(|_| ChecksumError::BadOutput {
            command: rendered,
            output: stdout.trim().to_string(),
        })
    }
}

/// Checksum implementation for a configured tool
pub fn checksum_for(tool: ChecksumTool) -> Result<Box<dyn Checksum>, ChecksumError> {
    Ok(match tool {
        ChecksumTool::Builtin => Box::new(Md5Checksum),
        ChecksumTool::Command => Box::new(CommandChecksum::detect()?),
    })
}
