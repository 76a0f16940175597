//! Build-output discovery
//!
//! ESPHome writes into `<build_dir>/<device>/`, with the PlatformIO
//! environment nested below (`.pioenvs/<device>/firmware.ota.bin` on current
//! releases). The OTA image is preferred; a plain `firmware.bin` is accepted
//! when no OTA image exists. When several candidates match, the most recently
//! modified wins.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Preferred artifact file name
pub const OTA_ARTIFACT_NAME: &str = "firmware.ota.bin";

/// Accepted when no OTA image was produced
pub const FALLBACK_ARTIFACT_NAME: &str = "firmware.bin";

/// Errors locating a build artifact
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("build output directory not found: {}", .0.display())]
    BuildOutputMissing(PathBuf),

    #[error("no firmware.ota.bin or firmware.bin under {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Find the firmware binary for a device under an ESPHome build directory
pub fn discover_artifact(build_dir: &Path, device_name: &str) -> Result<PathBuf, ArtifactError> {
    let device_dir = build_dir.join(device_name);
    if !device_dir.is_dir() {
        return Err(ArtifactError::BuildOutputMissing(device_dir));
    }

    let mut ota = Vec::new();
    let mut fallback = Vec::new();

    for entry in WalkDir::new(&device_dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        if entry.file_name() == OTA_ARTIFACT_NAME {
            ota.push(entry.into_path());
        } else if entry.file_name() == FALLBACK_ARTIFACT_NAME {
            fallback.push(entry.into_path());
        }
    }

    let candidates = if ota.is_empty() { fallback } else { ota };
    if candidates.len() > 1 {
        warn!(
            count = candidates.len(),
            dir = %device_dir.display(),
            "several firmware candidates found, using the newest"
        );
    }

    let chosen = newest(candidates)?.ok_or(ArtifactError::ArtifactMissing(device_dir))?;
    debug!(artifact = %chosen.display(), "discovered firmware artifact");
    Ok(chosen)
}

fn newest(candidates: Vec<PathBuf>) -> Result<Option<PathBuf>, ArtifactError> {
    let mut best: Option<(SystemTime, PathBuf)> = None;

    for path in candidates {
        let modified = path.metadata()?.modified()?;
        let replace = match &best {
            Some((time, current)) => modified > *time || (modified == *time && path > *current),
            None => true,
        };
        if replace {
            best = Some((modified, path));
        }
    }

    Ok(best.map(|(_, path)| path))
}
