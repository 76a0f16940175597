//! OTA Publish CLI
//!
//! Entry point for the `ota-publish` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use ota_manifest::default_version;
use ota_publish::artifact::checksum_for;
use ota_publish::config::{set_path, PublishConfig};
use ota_publish::publish::verify_device;
use ota_publish::vcs::nearest_existing_dir;
use ota_publish::{logging, EsphomeCompiler, GitClient, PublishReport, PublishResult, Publisher};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "ota-publish")]
#[command(about = "Publish ESPHome firmware builds as OTA manifests", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a device, place its binary and manifest, commit and push
    Publish {
        /// ESPHome device config (YAML)
        config: PathBuf,

        /// Chip family label written to the manifest (default: ESP32)
        chip_family: Option<String>,

        #[command(flatten)]
        common: CommonArgs,

        /// ESPHome build tree (default: .esphome/build next to the config)
        #[arg(long)]
        build_dir: Option<PathBuf>,

        /// How to run ESPHome: native or container
        #[arg(long)]
        runner: Option<String>,

        /// Container image for the container runner
        #[arg(long)]
        image: Option<String>,

        /// Git remote to push to
        #[arg(long)]
        remote: Option<String>,

        /// Git branch to push
        #[arg(long)]
        branch: Option<String>,

        /// Commit but do not push
        #[arg(long)]
        no_push: bool,

        /// Write files but do not commit
        #[arg(long)]
        no_vcs: bool,

        /// Compile and print the manifest without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Place a prebuilt binary and write its manifest (no compile, no git)
    Manifest {
        /// Device name (directory and manifest name)
        #[arg(long)]
        name: String,

        /// Firmware binary to publish
        #[arg(long)]
        binary: PathBuf,

        /// Chip family label (default: ESP32)
        #[arg(long)]
        chip_family: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Check a device directory's manifest against its binary
    Verify {
        /// Directory holding manifest.json and the binary
        device_dir: PathBuf,
    },

    /// Print the default version token for the current time
    Version,
}

#[derive(Args)]
struct CommonArgs {
    /// TOML settings file with a [publish] table
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,

    /// Build version (default: local time as YYYY.MM.DD-HHMM)
    #[arg(long = "build-version")]
    build_version: Option<String>,

    /// Static-hosting directory
    #[arg(long, alias = "out-dir")]
    site_dir: Option<PathBuf>,

    /// Public base URL; adds a homepage to the manifest
    #[arg(long)]
    base_url: Option<String>,

    /// Checksum implementation: builtin or command
    #[arg(long)]
    checksum: Option<String>,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,
}

impl CommonArgs {
    /// CLI layer for the config merge; unset flags are left out
    fn layer(&self) -> Value {
        let mut layer = json!({});
        if let Some(v) = &self.build_version {
            set_path(&mut layer, &["version"], json!(v));
        }
        if let Some(v) = &self.site_dir {
            set_path(&mut layer, &["site_dir"], json!(v));
        }
        if let Some(v) = &self.base_url {
            set_path(&mut layer, &["base_url"], json!(v));
        }
        if let Some(v) = &self.checksum {
            set_path(&mut layer, &["checksum"], json!(v));
        }
        layer
    }

    fn resolve(&self, layer: Value) -> PublishResult<PublishConfig> {
        Ok(PublishConfig::resolve(
            self.settings.as_deref(),
            |key| std::env::var(key).ok(),
            layer,
        )?)
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let code = match cli.command {
        Commands::Publish {
            config,
            chip_family,
            common,
            build_dir,
            runner,
            image,
            remote,
            branch,
            no_push,
            no_vcs,
            dry_run,
        } => {
            let mut layer = common.layer();
            if let Some(v) = chip_family {
                set_path(&mut layer, &["chip_family"], json!(v));
            }
            if let Some(v) = build_dir {
                set_path(&mut layer, &["build_dir"], json!(v));
            }
            if let Some(v) = runner {
                let runner = v.parse::<ota_publish::Runner>().map(|r| r.as_str().to_string());
                set_path(&mut layer, &["runner"], json!(runner.unwrap_or(v)));
            }
            if let Some(v) = image {
                set_path(&mut layer, &["esphome_image"], json!(v));
            }
            if let Some(v) = remote {
                set_path(&mut layer, &["git", "remote"], json!(v));
            }
            if let Some(v) = branch {
                set_path(&mut layer, &["git", "branch"], json!(v));
            }
            if no_push {
                set_path(&mut layer, &["git", "push"], json!(false));
            }
            if no_vcs {
                set_path(&mut layer, &["git", "enabled"], json!(false));
            }

            let result = common
                .resolve(layer)
                .and_then(|settings| run_publish(&settings, &config, dry_run));
            report_outcome(result, common.json)
        }

        Commands::Manifest {
            name,
            binary,
            chip_family,
            common,
        } => {
            let mut layer = common.layer();
            if let Some(v) = chip_family {
                set_path(&mut layer, &["chip_family"], json!(v));
            }

            let result = common
                .resolve(layer)
                .and_then(|settings| run_manifest(&settings, &name, &binary));
            report_outcome(result, common.json)
        }

        Commands::Verify { device_dir } => match verify_device(&device_dir) {
            Ok(manifest) => {
                println!(
                    "OK: {} {} matches {}",
                    manifest.name,
                    manifest.version,
                    device_dir.display()
                );
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                e.exit_code()
            }
        },

        Commands::Version => {
            println!("{}", default_version());
            0
        }
    };

    process::exit(code);
}

fn run_publish(
    settings: &PublishConfig,
    device_config: &Path,
    dry_run: bool,
) -> PublishResult<PublishReport> {
    // Preconditions first: fail before a long compile if a tool is missing
    let checksum = checksum_for(settings.checksum)?;
    let compiler = EsphomeCompiler::new(settings)?;
    let git = if settings.git.enabled && !dry_run {
        Some(GitClient::new(
            &settings.git,
            &nearest_existing_dir(&settings.site_dir),
        )?)
    } else {
        None
    };

    let mut publisher = Publisher::new(settings, checksum.as_ref())
        .compiler(&compiler)
        .dry_run(dry_run);
    if let Some(git) = &git {
        publisher = publisher.vcs(git);
    }

    publisher.publish(device_config)
}

fn run_manifest(settings: &PublishConfig, name: &str, binary: &Path) -> PublishResult<PublishReport> {
    let checksum = checksum_for(settings.checksum)?;
    Publisher::new(settings, checksum.as_ref()).publish_binary(name, binary)
}

fn report_outcome(result: PublishResult<PublishReport>, json_output: bool) -> i32 {
    match result {
        Ok(report) => {
            if json_output {
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing output: {}", e);
                        return 1;
                    }
                }
            } else {
                println!("{}", report.to_human());
                if !report.written {
                    match report.manifest.to_json() {
                        Ok(json) => print!("{}", json),
                        Err(e) => {
                            eprintln!("Error serializing manifest: {}", e);
                            return 1;
                        }
                    }
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}
