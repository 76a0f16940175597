//! OTA Manifest Types
//!
//! Defines the `manifest.json` document consumed by the device update client,
//! the input validation rules for building one, and the default build-version
//! policy.

pub mod digest;
pub mod error;
pub mod manifest;
pub mod validate;
pub mod version;

pub use digest::{md5_file, md5_hex};
pub use error::ManifestError;
pub use manifest::{
    atomic_write, homepage_url, summary_for, BuildTarget, IntegrityError, Manifest,
    ManifestInput, OtaImage,
};
pub use validate::{validate_md5, validate_name, validate_ota_path};
pub use version::{default_version, resolve_version, version_at, VERSION_FORMAT};

/// File name of the manifest inside a device directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Fixed relative path of the published binary, next to the manifest.
pub const OTA_BINARY_FILE: &str = "firmware.ota.bin";
