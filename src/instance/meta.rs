use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;

use crate::{
    config::{DEFAULT_MAX_MEMORY, LoaderType},
    error::MetadataError,
};

pub const META_FILE: &str = "meta.json";
const META_TMP_FILE: &str = "meta.json.tmp";

fn default_max_memory() -> String {
    DEFAULT_MAX_MEMORY.to_string()
}

/// Durable description of one instance, stored as `<instance>/meta.json`.
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMeta {
    pub name: String,
    pub version: String,
    #[serde(alias = "type")]
    pub loader_type: LoaderType,
    pub server_jar: PathBuf,
    #[serde(default = "default_max_memory")]
    pub max_memory: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub initialized: bool,
    pub created_at: DateTime<Utc>,
}

impl InstanceMeta {
    /// Record for a freshly downloaded, not yet bootstrapped instance.
    pub fn downloaded(
        name: impl Into<String>,
        version: impl Into<String>,
        loader_type: LoaderType,
        max_memory: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            loader_type,
            server_jar: PathBuf::from(loader_type.download_file_name()),
            max_memory: max_memory.into(),
            source_url: source_url.into(),
            downloaded: true,
            initialized: false,
            created_at: Utc::now(),
        }
    }

    pub fn server_jar_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.server_jar)
    }
}

/// Reads and writes `meta.json` for one instance directory. Writes go through
/// a temporary file and a rename, so readers see either the old or the new
/// record and never a torn one.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(self.path()).await.unwrap_or(false)
    }

    pub async fn read(&self) -> Result<InstanceMeta, MetadataError> {
        let path = self.path();
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MetadataError::Missing(path));
            }
            Err(source) => return Err(MetadataError::Io { path, source }),
        };

        serde_json::from_slice(&data).map_err(|source| MetadataError::Corrupt { path, source })
    }

    pub async fn write(&self, meta: &InstanceMeta) -> Result<(), MetadataError> {
        let mut json = serde_json::to_vec_pretty(meta).map_err(MetadataError::Serialize)?;
        json.push(b'\n');

        let tmp = self.dir.join(META_TMP_FILE);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| MetadataError::Io { path, source }
        };

        let mut out = File::create(&tmp).await.map_err(io_err(&tmp))?;
        out.write_all(&json).await.map_err(io_err(&tmp))?;
        out.sync_all().await.map_err(io_err(&tmp))?;
        drop(out);

        let path = self.path();
        fs::rename(&tmp, &path).await.map_err(io_err(&path))?;

        debug!(instance = %meta.name, initialized = meta.initialized, "metadata written");
        Ok(())
    }

    /// Read-modify-write of the record.
    pub async fn update<F>(&self, apply: F) -> Result<InstanceMeta, MetadataError>
    where
        F: FnOnce(&mut InstanceMeta),
    {
        let mut meta = self.read().await?;
        apply(&mut meta);
        self.write(&meta).await?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn sample() -> InstanceMeta {
        InstanceMeta::downloaded(
            "survival",
            "1.20.4",
            LoaderType::Fabric,
            "4G",
            "https://example.invalid/fabric-installer.jar",
        )
    }

    #[test]
    fn serializes_with_camel_case_keys_in_stable_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        let keys = [
            "\"name\"",
            "\"version\"",
            "\"loaderType\"",
            "\"serverJar\"",
            "\"maxMemory\"",
            "\"sourceUrl\"",
            "\"downloaded\"",
            "\"initialized\"",
            "\"createdAt\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(json.contains("\"serverJar\":\"fabric-installer.jar\""));
    }

    #[test]
    fn reads_legacy_records() {
        let json = r#"{
            "name": "old",
            "version": "1.19.2",
            "type": "vanilla",
            "serverJar": "server.jar",
            "downloaded": true,
            "createdAt": "2024-01-01T00:00:00.000Z"
        }"#;
        let meta: InstanceMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.loader_type, LoaderType::Vanilla);
        assert_eq!(meta.max_memory, EngineConfig::default().default_max_memory);
        assert!(!meta.initialized);
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        assert!(!store.exists().await);

        let meta = sample();
        store.write(&meta).await.unwrap();
        assert!(store.exists().await);
        assert_eq!(store.read().await.unwrap(), meta);
        assert!(!dir.path().join(META_TMP_FILE).exists());
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        assert!(matches!(store.read().await, Err(MetadataError::Missing(_))));

        tokio::fs::write(store.path(), b"{\"name\":").await.unwrap();
        assert!(matches!(
            store.read().await,
            Err(MetadataError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn interrupted_write_leaves_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.write(&sample()).await.unwrap();

        // A crash between writing the temp file and the rename.
        tokio::fs::write(
            dir.path().join(META_TMP_FILE),
            br#"{"name":"survival","initialized":tr"#,
        )
        .await
        .unwrap();

        let meta = store.read().await.unwrap();
        assert!(!meta.initialized);
        assert_eq!(meta.server_jar, PathBuf::from("fabric-installer.jar"));
    }

    #[tokio::test]
    async fn update_persists_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.write(&sample()).await.unwrap();

        let updated = store
            .update(|m| {
                m.server_jar = PathBuf::from("fabric-server-launch.jar");
                m.initialized = true;
            })
            .await
            .unwrap();

        assert_eq!(store.read().await.unwrap(), updated);
        assert!(updated.initialized);
    }
}
