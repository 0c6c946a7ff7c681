use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FabricInstallerVersion {
    pub url: String,
    #[serde(default)]
    pub maven: Option<String>,
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// Installer listing from the fabric meta service, newest first.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FabricInstallerList(pub Vec<FabricInstallerVersion>);

impl FabricInstallerList {
    pub async fn load(client: &reqwest::Client, url: &str) -> Result<Self, ManifestError> {
        super::get_json(client, url).await
    }

    /// Newest stable installer, falling back to the newest one listed.
    pub fn latest(&self) -> Option<&FabricInstallerVersion> {
        self.0.iter().find(|v| v.stable).or_else(|| self.0.first())
    }

    pub fn latest_url(&self, source: &str) -> Result<String, ManifestError> {
        self.latest()
            .map(|v| v.url.clone())
            .ok_or_else(|| ManifestError::NoInstaller(source.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_newest_stable_installer() {
        let json = r#"[
            { "url": "https://example.invalid/1.1.0.jar", "maven": "net.fabricmc:fabric-installer:1.1.0", "version": "1.1.0", "stable": false },
            { "url": "https://example.invalid/1.0.1.jar", "maven": "net.fabricmc:fabric-installer:1.0.1", "version": "1.0.1", "stable": true },
            { "url": "https://example.invalid/1.0.0.jar", "maven": "net.fabricmc:fabric-installer:1.0.0", "version": "1.0.0", "stable": true }
        ]"#;
        let list: FabricInstallerList = serde_json::from_str(json).unwrap();
        assert_eq!(list.latest().unwrap().version, "1.0.1");
    }

    #[test]
    fn empty_listing_has_no_installer() {
        let list: FabricInstallerList = serde_json::from_str("[]").unwrap();
        assert!(matches!(
            list.latest_url("meta"),
            Err(ManifestError::NoInstaller(_))
        ));
    }
}
