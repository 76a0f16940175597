//! Firmware artifact handling
//!
//! Locates the binary ESPHome produced and computes its checksum.

mod checksum;
mod discover;

pub use checksum::{checksum_for, Checksum, ChecksumError, CommandChecksum, Md5Checksum};
pub use discover::{
    discover_artifact, ArtifactError, FALLBACK_ARTIFACT_NAME, OTA_ARTIFACT_NAME,
};
