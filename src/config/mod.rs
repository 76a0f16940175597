//! Configuration layering
//!
//! Publish settings are merged from four layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Settings file (`[publish]` table of a TOML file)
//! 3. Environment overrides (`OTA_*`, `ESPHOME_IMAGE`)
//! 4. CLI flags

mod defaults;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    env_layer, file_layer, parse_file_layer, set_path, ChecksumTool, ConfigError, GitSettings,
    PublishConfig, Runner, ENV_OVERRIDES,
};
