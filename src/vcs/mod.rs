//! Version control for published files
//!
//! `VersionControl::publish` stages the given paths, commits them with a
//! message, and optionally pushes. `GitClient` does this with the `git` CLI.
//! Only the named paths are committed; anything else the operator has staged
//! is left alone.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

use crate::config::GitSettings;
use crate::toolchain::{describe, find_program};

/// Git program name
pub const GIT_PROGRAM: &str = "git";

/// What to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsRequest {
    pub paths: Vec<PathBuf>,
    pub message: String,
    pub push: bool,
}

/// What was recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VcsOutcome {
    pub committed: bool,
    pub pushed: bool,
}

/// Stage, commit, push
pub trait VersionControl {
    fn publish(&self, request: &VcsRequest) -> Result<VcsOutcome, VcsError>;
}

/// VCS errors
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("required tool '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("{command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Commit message for a publish
pub fn commit_message(name: &str, version: &str) -> String {
    format!("OTA: publish {} {}", name, version)
}

/// Closest existing directory at or above `path` (the site dir may not exist yet)
pub fn nearest_existing_dir(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `git` CLI client
#[derive(Debug, Clone)]
pub struct GitClient {
    program: PathBuf,
    work_dir: PathBuf,
    remote: String,
    branch: String,
}

impl GitClient {
    /// Resolve `git` on PATH; commands run in `work_dir`
    pub fn new(settings: &GitSettings, work_dir: &Path) -> Result<Self, VcsError> {
        let program =
            find_program(GIT_PROGRAM).ok_or_else(|| VcsError::ToolNotFound(GIT_PROGRAM.to_string()))?;
        Ok(Self::with_program(program, settings, work_dir))
    }

    pub fn with_program(program: PathBuf, settings: &GitSettings, work_dir: &Path) -> Self {
        Self {
            program,
            work_dir: work_dir.to_path_buf(),
            remote: settings.remote.clone(),
            branch: settings.branch.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.current_dir(&self.work_dir);
        command
    }

    fn run(&self, mut command: Command) -> Result<Output, VcsError> {
        let rendered = describe(&command);
        debug!(command = %rendered, "running git");

        let output = command.output()?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command: rendered,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// True when the index differs from HEAD for the given paths
    fn has_staged_changes(&self, paths: &[PathBuf]) -> Result<bool, VcsError> {
        let mut command = self.command();
        command
            .arg("diff")
            .arg("--cached")
            .arg("--quiet")
            .arg("--")
            .args(paths);
        let rendered = describe(&command);

        let status = command.status()?;
        match status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(VcsError::CommandFailed {
                command: rendered,
                status: status.to_string(),
                stderr: String::new(),
            }),
        }
    }
}

impl VersionControl for GitClient {
    fn publish(&self, request: &VcsRequest) -> Result<VcsOutcome, VcsError> {
        // Commands run in work_dir, so relative paths must not leak through
        let paths = request
            .paths
            .iter()
            .map(|p| p.canonicalize())
            .collect::<Result<Vec<_>, _>>()?;

        let mut add = self.command();
        add.arg("add").arg("--").args(&paths);
        self.run(add)?;

        if !self.has_staged_changes(&paths)? {
            info!("published files unchanged, nothing to commit");
            return Ok(VcsOutcome::default());
        }

        let mut commit = self.command();
        commit
            .arg("commit")
            .arg("-m")
            .arg(&request.message)
            .arg("--")
            .args(&paths);
        self.run(commit)?;
        info!(message = %request.message, "committed");

        if !request.push {
            return Ok(VcsOutcome {
                committed: true,
                pushed: false,
            });
        }

        let mut push = self.command();
        push.arg("push").arg(&self.remote).arg(&self.branch);
        self.run(push)?;
        info!(remote = %self.remote, branch = %self.branch, "pushed");

        Ok(VcsOutcome {
            committed: true,
            pushed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message("meteo_sonda", "2026.02.13-1700"),
            "OTA: publish meteo_sonda 2026.02.13-1700"
        );
    }

    #[test]
    fn test_nearest_existing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let site = dir.path().join("docs/ota");

        assert_eq!(nearest_existing_dir(&site), dir.path());
        std::fs::create_dir_all(&site).unwrap();
        assert_eq!(nearest_existing_dir(&site), site);
        assert_eq!(nearest_existing_dir(Path::new("no/such/dir")), PathBuf::from("."));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_git_command_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.json"), "{}").unwrap();
        let settings = GitSettings {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            enabled: true,
            push: true,
        };
        let client = GitClient::with_program(PathBuf::from("false"), &settings, dir.path());

        let err = client
            .publish(&VcsRequest {
                paths: vec![dir.path().join("manifest.json")],
                message: commit_message("dev", "1"),
                push: true,
            })
            .unwrap_err();
        assert!(matches!(err, VcsError::CommandFailed { command, .. } if command.contains("add")));
    }

    /// Temp repository with one empty commit; None when git is not installed
    #[cfg(unix)]
    fn temp_repo() -> Option<(tempfile::TempDir, PathBuf)> {
        let git = find_program(GIT_PROGRAM)?;
        let dir = tempfile::TempDir::new().unwrap();
        let steps: [&[&str]; 5] = [
            &["init", "-q"],
            &["config", "user.email", "ota@example.com"],
            &["config", "user.name", "OTA"],
            &["config", "commit.gpgsign", "false"],
            &["commit", "-q", "--allow-empty", "-m", "init"],
        ];
        for args in steps {
            let status = Command::new(&git)
                .args(args)
                .current_dir(dir.path())
                .status()
                .unwrap();
            assert!(status.success(), "git {:?}", args);
        }
        Some((dir, git))
    }

    #[cfg(unix)]
    fn git_stdout(git: &Path, dir: &Path, args: &[&str]) -> String {
        let output = Command::new(git).args(args).current_dir(dir).output().unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_commits_only_published_paths() {
        let Some((dir, git)) = temp_repo() else {
            return;
        };
        let device_dir = dir.path().join("docs/ota/dev");
        std::fs::create_dir_all(&device_dir).unwrap();
        std::fs::write(device_dir.join("firmware.ota.bin"), b"image").unwrap();
        std::fs::write(device_dir.join("manifest.json"), "{}").unwrap();

        // Staged by the operator, must stay out of the publish commit
        std::fs::write(dir.path().join("notes.txt"), "wip").unwrap();
        git_stdout(&git, dir.path(), &["add", "notes.txt"]);

        let settings = GitSettings {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            enabled: true,
            push: false,
        };
        let client = GitClient::with_program(git.clone(), &settings, dir.path());
        let request = VcsRequest {
            paths: vec![
                device_dir.join("firmware.ota.bin"),
                device_dir.join("manifest.json"),
            ],
            message: commit_message("dev", "2026.02.13-1700"),
            push: false,
        };

        let outcome = client.publish(&request).unwrap();
        assert_eq!(
            outcome,
            VcsOutcome {
                committed: true,
                pushed: false
            }
        );
        assert_eq!(
            git_stdout(&git, dir.path(), &["log", "-1", "--format=%s"]),
            "OTA: publish dev 2026.02.13-1700"
        );
        assert_eq!(
            git_stdout(&git, dir.path(), &["show", "--name-only", "--format=", "HEAD"]),
            "docs/ota/dev/firmware.ota.bin\ndocs/ota/dev/manifest.json"
        );
        assert_eq!(
            git_stdout(&git, dir.path(), &["diff", "--cached", "--name-only"]),
            "notes.txt"
        );

        // Same bytes again: nothing to commit, not an error
        let outcome = client.publish(&request).unwrap();
        assert_eq!(outcome, VcsOutcome::default());
        assert_eq!(
            git_stdout(&git, dir.path(), &["rev-list", "--count", "HEAD"]),
            "2"
        );
    }
}
