//! ESPHome compiler invocation
//!
//! The pipeline only sees the `Compiler` trait: give it a device config,
//! get back the path of the firmware binary it produced. `EsphomeCompiler`
//! runs ESPHome natively or inside a container image, then locates the
//! artifact in the build tree.

use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::{debug, info};

use crate::artifact::{discover_artifact, ArtifactError};
use crate::config::{PublishConfig, Runner};

/// ESPHome CLI program name
pub const ESPHOME_PROGRAM: &str = "esphome";

/// Container runtime program name
pub const CONTAINER_PROGRAM: &str = "docker";

/// Mount point of the config directory inside the container
pub const CONTAINER_CONFIG_DIR: &str = "/config";

/// Builds firmware for a device config
pub trait Compiler {
    /// Compile `config_path` and return the produced firmware binary
    fn compile(&self, config_path: &Path, device_name: &str) -> Result<PathBuf, ToolchainError>;
}

/// Toolchain errors
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("required tool '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("compile failed: {command} exited with {status}")]
    CompileFailed { command: String, status: ExitStatus },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Search PATH for an executable
pub fn find_program(program: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    find_program_in(program, &path_var)
}

/// Search a PATH-style list for an executable
pub fn find_program_in(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Render a command for logs and errors
pub fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().to_string()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

/// ESPHome compiler, native or containerised
#[derive(Debug, Clone)]
pub struct EsphomeCompiler {
    program: PathBuf,
    config: PublishConfig,
}

impl EsphomeCompiler {
    /// Resolve the runner's program on PATH
    pub fn new(config: &PublishConfig) -> Result<Self, ToolchainError> {
        let name = match config.runner {
            Runner::Native => ESPHOME_PROGRAM,
            Runner::Container => CONTAINER_PROGRAM,
        };
        let program =
            find_program(name).ok_or_else(|| ToolchainError::ToolNotFound(name.to_string()))?;

        Ok(Self::with_program(config, program))
    }

    /// Use an explicit program path
    pub fn with_program(config: &PublishConfig, program: PathBuf) -> Self {
        Self {
            program,
            config: config.clone(),
        }
    }

    /// Build the compile command for a config file
    pub fn command(&self, config_path: &Path) -> Result<Command, ToolchainError> {
        let mut command = Command::new(&self.program);

        match self.config.runner {
            Runner::Native => {
                command.arg("compile").arg(config_path);
            }
            Runner::Container => {
                let absolute = config_path.canonicalize()?;
                let config_dir = absolute.parent().unwrap_or_else(|| Path::new("/"));
                let file_name = absolute.file_name().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("not a config file: {}", config_path.display()),
                    )
                })?;

                command
                    .arg("run")
                    .arg("--rm")
                    .arg("-v")
                    .arg(format!("{}:{}", config_dir.display(), CONTAINER_CONFIG_DIR))
                    .arg(&self.config.esphome_image)
                    .arg("compile")
                    .arg(format!(
                        "{}/{}",
                        CONTAINER_CONFIG_DIR,
                        file_name.to_string_lossy()
                    ));
            }
        }

        Ok(command)
    }
}

impl Compiler for EsphomeCompiler {
    fn compile(&self, config_path: &Path, device_name: &str) -> Result<PathBuf, ToolchainError> {
        let mut command = self.command(config_path)?;
        let rendered = describe(&command);

        info!(runner = self.config.runner.as_str(), device = device_name, "compiling firmware");
        debug!(command = %rendered, "spawning compiler");

        let status = command.status().map_err(|source| ToolchainError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        if !status.success() {
            return Err(ToolchainError::CompileFailed {
                command: rendered,
                status,
            });
        }

        let build_dir = self.config.build_dir_for(config_path);
        Ok(discover_artifact(&build_dir, device_name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_native_command() {
        let config = PublishConfig::default();
        let compiler = EsphomeCompiler::with_program(&config, PathBuf::from("/usr/bin/esphome"));

        let command = compiler.command(Path::new("devices/meteo.yaml")).unwrap();
        assert_eq!(command.get_program(), "/usr/bin/esphome");
        assert_eq!(args(&command), vec!["compile", "devices/meteo.yaml"]);
    }

    #[test]
    fn test_container_command_mounts_config_dir() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("meteo.yaml");
        fs::write(&yaml, "esphome:\n  name: meteo\n").unwrap();

        let mut config = PublishConfig::default();
        config.runner = Runner::Container;
        config.esphome_image = "esphome/esphome:2025.1".to_string();
        let compiler = EsphomeCompiler::with_program(&config, PathBuf::from("docker"));

        let command = compiler.command(&yaml).unwrap();
        let args = args(&command);
        let mount = format!("{}:/config", dir.path().canonicalize().unwrap().display());

        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "-v",
                mount.as_str(),
                "esphome/esphome:2025.1",
                "compile",
                "/config/meteo.yaml"
            ]
        );
    }

    #[test]
    fn test_describe() {
        let mut command = Command::new("esphome");
        command.arg("compile").arg("a.yaml");
        assert_eq!(describe(&command), "esphome compile a.yaml");
    }

    #[cfg(unix)]
    #[test]
    fn test_find_program_in() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("esphome");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(dir.path().join("docker"), "not executable").unwrap();

        let path_var = env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_program_in("esphome", &path_var), Some(tool));
        assert_eq!(find_program_in("docker", &path_var), None);
        assert_eq!(find_program_in("git", &path_var), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_compile_failure_reports_status() {
        let config = PublishConfig::default();
        let compiler = EsphomeCompiler::with_program(&config, PathBuf::from("false"));

        let err = compiler
            .compile(Path::new("meteo.yaml"), "meteo")
            .unwrap_err();
        assert!(matches!(err, ToolchainError::CompileFailed { .. }));
    }
}
