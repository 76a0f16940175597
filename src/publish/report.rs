//! Publish report
//!
//! What a publish produced, printed for the operator as text or JSON.

use std::path::PathBuf;

use ota_manifest::Manifest;
use serde::Serialize;

/// Result of one publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    /// The manifest as built (and written unless this was a dry run)
    pub manifest: Manifest,

    /// Final manifest location
    pub manifest_path: PathBuf,

    /// Final binary location
    pub binary_path: PathBuf,

    /// Files were placed on disk
    pub written: bool,

    /// A commit was created
    pub committed: bool,

    /// The commit was pushed
    pub pushed: bool,
}

impl PublishReport {
    pub fn new(manifest: Manifest, manifest_path: PathBuf, binary_path: PathBuf) -> Self {
        Self {
            manifest,
            manifest_path,
            binary_path,
            written: false,
            committed: false,
            pushed: false,
        }
    }

    /// MD5 recorded in the manifest
    pub fn md5(&self) -> &str {
        self.manifest.ota().map(|ota| ota.md5.as_str()).unwrap_or_default()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary
    pub fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Device:   {}", self.manifest.name),
            format!("Version:  {}", self.manifest.version),
            format!("MD5:      {}", self.md5()),
            format!("Manifest: {}", self.manifest_path.display()),
            format!("Binary:   {}", self.binary_path.display()),
        ];
        if let Some(homepage) = &self.manifest.homepage {
            lines.push(format!("Homepage: {}", homepage));
        }

        let state = match (self.written, self.committed, self.pushed) {
            (false, _, _) => "dry run (nothing written)",
            (true, false, _) => "written (not committed)",
            (true, true, false) => "committed (not pushed)",
            (true, true, true) => "committed and pushed",
        };
        lines.push(format!("Status:   {}", state));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ota_manifest::ManifestInput;

    fn report() -> PublishReport {
        let manifest = Manifest::build(
            &ManifestInput::new(
                "meteo_sonda",
                "2026.02.13-1700",
                "ESP32-C3",
                "d41d8cd98f00b204e9800998ecf8427e",
            )
            .with_base_url(Some("https://x.example/fw".to_string())),
        )
        .unwrap();
        PublishReport::new(
            manifest,
            PathBuf::from("docs/ota/meteo_sonda/manifest.json"),
            PathBuf::from("docs/ota/meteo_sonda/firmware.ota.bin"),
        )
    }

    #[test]
    fn test_human_output() {
        let mut report = report();
        assert!(report.to_human().contains("dry run"));

        report.written = true;
        report.committed = true;
        report.pushed = true;
        let text = report.to_human();
        assert!(text.contains("Device:   meteo_sonda"));
        assert!(text.contains("Homepage: https://x.example/fw/meteo_sonda/"));
        assert!(text.contains("committed and pushed"));
    }

    #[test]
    fn test_json_output() {
        let json = report().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["manifest"]["builds"][0]["chipFamily"], "ESP32-C3");
        assert_eq!(value["written"], false);
    }
}
