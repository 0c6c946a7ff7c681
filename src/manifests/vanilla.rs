use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// `version_manifest_v2.json`: every published version and where its
/// per-version manifest lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VanillaManifestV2 {
    pub latest: VanillaLatest,
    pub versions: Vec<VanillaManifestV2Version>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VanillaLatest {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VanillaManifestV2Version {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VanillaManifestV2 {
    pub async fn load(client: &reqwest::Client, url: &str) -> Result<Self, ManifestError> {
        super::get_json(client, url).await
    }

    pub fn find(&self, id: &str) -> Option<&VanillaManifestV2Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Per-version manifest URL for `id`; this is what the download pipeline
    /// resolves into the server jar and its hash.
    pub fn release_url(&self, id: &str) -> Result<String, ManifestError> {
        self.find(id)
            .map(|v| v.url.clone())
            .ok_or_else(|| ManifestError::UnknownVersion(id.to_string()))
    }

    pub fn latest_release(&self) -> Option<&VanillaManifestV2Version> {
        self.find(&self.latest.release)
    }
}

/// Per-version manifest. Only the server download is of interest here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VanillaReleaseManifest {
    #[serde(default)]
    pub id: Option<String>,
    pub downloads: ReleaseDownloads,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseDownloads {
    #[serde(default)]
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DownloadArtifact {
    pub url: String,
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl VanillaReleaseManifest {
    pub fn server(&self) -> Option<&DownloadArtifact> {
        self.downloads.server.as_ref()
    }
}
