//! OTA Publish - ESPHome firmware publishing
//!
//! Compiles an ESPHome device, places the firmware binary in a static-hosting
//! directory next to an OTA `manifest.json`, and records both in git.

pub mod artifact;
pub mod config;
pub mod device;
pub mod logging;
pub mod publish;
pub mod toolchain;
pub mod vcs;

pub use artifact::{Checksum, Md5Checksum};
pub use config::{PublishConfig, Runner};
pub use publish::{PublishError, PublishReport, PublishResult, Publisher};
pub use toolchain::{Compiler, EsphomeCompiler};
pub use vcs::{GitClient, VersionControl};
