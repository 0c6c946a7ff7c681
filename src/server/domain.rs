use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use reqwest::Client;
use tokio::{
    fs::{self, read_dir},
    sync::{Mutex, RwLock, watch},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    bootstrap::Bootstrapper,
    config::{
        EngineConfig, LoaderType, MinecraftVersion, is_valid_memory,
        stream::{InstanceEvent, StreamSource},
    },
    download::DownloadManager,
    error::{InstanceError, MetadataError, ServerError},
    http::build_http_client,
    instance::{
        ActionOutcome, ConsoleAction, InstanceHandle, InstanceMeta, InstanceStatus, JavaRuntime,
        MetadataStore, wait_for_ready,
    },
    manifests::{fabric::FabricInstallerList, vanilla::VanillaManifestV2},
};

use super::registry::{InstanceLease, LockRegistry};

/// Directory created next to the server jar for mod loaders.
pub const MODS_DIR: &str = "mods";

/// Parameters of an instance to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    pub name: String,
    pub version: String,
    pub loader: LoaderType,
    /// Falls back to the configured default.
    pub max_memory: Option<String>,
    /// Manifest or binary URL. Required for forge, looked up otherwise.
    pub source_url: Option<String>,
}

impl NewInstance {
    pub fn new(name: impl Into<String>, version: impl Into<String>, loader: LoaderType) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            loader,
            max_memory: None,
            source_url: None,
        }
    }

    pub fn with_max_memory(mut self, max_memory: impl Into<String>) -> Self {
        self.max_memory = Some(max_memory.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// Owns the instances root directory and hands out [`InstanceServer`]s.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    root: PathBuf,
    config: Arc<EngineConfig>,
    client: Client,
    locks: LockRegistry,
}

impl InstanceManager {
    pub fn new<P: Into<PathBuf>>(root: P, config: EngineConfig) -> Result<Self, InstanceError> {
        let client = build_http_client(&config.user_agent).map_err(InstanceError::Client)?;
        Ok(Self::with_client(root, config, client))
    }

    pub fn with_client<P: Into<PathBuf>>(root: P, config: EngineConfig, client: Client) -> Self {
        Self {
            root: root.into(),
            config: Arc::new(config),
            client,
            locks: LockRegistry::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Metadata of every instance under the root, sorted by name.
    /// Directories without a readable `meta.json` are skipped.
    pub async fn list(&self) -> Result<Vec<InstanceMeta>, InstanceError> {
        let mut entries = match read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(InstanceError::Io {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut instances = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| InstanceError::Io {
                path: self.root.clone(),
                source,
            })?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            match MetadataStore::new(&path).read().await {
                Ok(meta) => instances.push(meta),
                Err(MetadataError::Missing(_)) => {}
                Err(e) => warn!(dir = %path.display(), error = %e, "skipping unreadable instance"),
            }
        }

        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    /// Downloads a new instance and opens it. On failure the instance
    /// directory is removed again, so the request can simply be retried.
    pub async fn create<F>(
        &self,
        request: NewInstance,
        progress: F,
    ) -> Result<InstanceServer, InstanceError>
    where
        F: FnMut(u64, u64),
    {
        validate_name(&request.name)?;
        let max_memory = request
            .max_memory
            .clone()
            .unwrap_or_else(|| self.config.default_max_memory.clone());
        if !is_valid_memory(&max_memory) {
            return Err(InstanceError::InvalidMemory(max_memory));
        }
        if request.loader != LoaderType::Forge {
            request.version.parse::<MinecraftVersion>()?;
        }

        let lease = self.lease(&request.name)?;
        let dir = self.instance_dir(&request.name);
        if fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(InstanceError::AlreadyExists(request.name));
        }

        let source = self.resolve_source(&request).await?;

        let mods = dir.join(MODS_DIR);
        fs::create_dir_all(&mods)
            .await
            .map_err(|source| InstanceError::Io { path: mods, source })?;

        if let Err(e) = self
            .populate(&dir, &request, &source, max_memory, progress)
            .await
        {
            if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %cleanup, "failed to remove incomplete instance");
            }
            return Err(e);
        }

        info!(instance = %request.name, loader = %request.loader, version = %request.version, "instance created");
        self.open_leased(lease).await
    }

    async fn populate<F>(
        &self,
        dir: &Path,
        request: &NewInstance,
        source: &str,
        max_memory: String,
        progress: F,
    ) -> Result<(), InstanceError>
    where
        F: FnMut(u64, u64),
    {
        let destination = dir.join(request.loader.download_file_name());

        let report = DownloadManager::from_config(self.client.clone(), &self.config)
            .fetch(source, &destination, progress)
            .await?;

        let meta = InstanceMeta::downloaded(
            request.name.as_str(),
            request.version.as_str(),
            request.loader,
            max_memory,
            report.source_url,
        );
        MetadataStore::new(dir).write(&meta).await?;
        Ok(())
    }

    async fn resolve_source(&self, request: &NewInstance) -> Result<String, InstanceError> {
        if let Some(url) = &request.source_url {
            return Ok(url.clone());
        }

        let url = match request.loader {
            LoaderType::Vanilla => {
                VanillaManifestV2::load(&self.client, &self.config.vanilla_manifest_url)
                    .await?
                    .release_url(&request.version)?
            }
            LoaderType::Fabric => {
                FabricInstallerList::load(&self.client, &self.config.fabric_installer_url)
                    .await?
                    .latest_url(&self.config.fabric_installer_url)?
            }
            LoaderType::Forge => return Err(InstanceError::MissingSource(request.loader.to_string())),
        };
        debug!(loader = %request.loader, %url, "resolved download source");
        Ok(url)
    }

    /// Opens an existing instance. Fails with `Busy` while another
    /// [`InstanceServer`] for the same name is alive.
    pub async fn open(&self, name: &str) -> Result<InstanceServer, InstanceError> {
        validate_name(name)?;
        let lease = self.lease(name)?;
        self.open_leased(lease).await
    }

    fn lease(&self, name: &str) -> Result<InstanceLease, InstanceError> {
        self.locks
            .try_acquire(name)
            .ok_or_else(|| InstanceError::Busy(name.to_string()))
    }

    async fn open_leased(&self, lease: InstanceLease) -> Result<InstanceServer, InstanceError> {
        let name = lease.name().to_string();
        let dir = self.instance_dir(&name);
        let store = MetadataStore::new(&dir);

        let meta = match store.read().await {
            Ok(meta) => meta,
            Err(MetadataError::Missing(_)) => return Err(InstanceError::NotFound(name)),
            Err(e) => return Err(e.into()),
        };

        let handle =
            InstanceHandle::new_with_meta(dir.clone(), &meta, JavaRuntime::from_config(&self.config))?;

        Ok(InstanceServer {
            name,
            dir,
            config: self.config.clone(),
            store,
            meta: RwLock::new(meta),
            handle: RwLock::new(handle),
            start_guard: Mutex::new(()),
            _lease: lease,
        })
    }
}

fn validate_name(name: &str) -> Result<(), InstanceError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(InstanceError::InvalidName(name.to_string()))
    }
}

/// One opened instance. Holds the instance lock until dropped.
///
/// Locks are taken in the order `start_guard`, `meta`, `handle`. The handle
/// lock is only held for short operations, so status queries, subscriptions
/// and commands stay responsive while a start is bootstrapping.
#[derive(Debug)]
pub struct InstanceServer {
    name: String,
    dir: PathBuf,
    config: Arc<EngineConfig>,
    store: MetadataStore,
    meta: RwLock<InstanceMeta>,
    handle: RwLock<InstanceHandle>,
    start_guard: Mutex<()>,
    _lease: InstanceLease,
}

impl InstanceServer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn meta(&self) -> InstanceMeta {
        self.meta.read().await.clone()
    }

    /// Re-reads `meta.json`, e.g. after an external edit of `maxMemory`.
    pub async fn reload_meta(&self) -> Result<InstanceMeta, InstanceError> {
        let meta = self.store.read().await?;
        let mut current = self.meta.write().await;
        self.handle
            .write()
            .await
            .retarget(meta.server_jar.clone(), meta.max_memory.clone())?;
        *current = meta.clone();
        Ok(meta)
    }

    pub async fn status(&self) -> InstanceStatus {
        self.handle.read().await.status()
    }

    pub async fn watch_status(&self) -> watch::Receiver<InstanceStatus> {
        self.handle.read().await.watch_status()
    }

    /// Bootstraps the instance if needed, launches it and waits until it is
    /// ready. A server that misses the configured ready timeout is killed.
    pub async fn start(&self) -> Result<(), InstanceError> {
        let starting = self.start_guard.lock().await;
        if self.handle.read().await.is_running() {
            return Err(ServerError::AlreadyRunning.into());
        }

        self.ensure_initialized().await?;
        let ready = {
            let mut handle = self.handle.write().await;
            handle.start().await?;
            handle.ready_watch()?
        };
        drop(starting);

        match wait_for_ready(ready, self.config.ready_timeout()).await {
            Ok(()) => {
                info!(instance = %self.name, "instance ready");
                Ok(())
            }
            Err(e @ ServerError::Timeout(_)) => {
                warn!(instance = %self.name, error = %e, "killing server that never became ready");
                _ = self.handle.write().await.kill().await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_initialized(&self) -> Result<(), InstanceError> {
        let mut meta = self.meta.write().await;
        if meta.initialized {
            return Ok(());
        }

        let updated = Bootstrapper::new(self.config.clone()).run(&self.store).await?;
        self.handle
            .write()
            .await
            .retarget(updated.server_jar.clone(), updated.max_memory.clone())?;
        *meta = updated;
        Ok(())
    }

    /// Kills a live server and starts it again. Never re-runs bootstrap.
    pub async fn restart(&self) -> Result<(), InstanceError> {
        match self.kill().await {
            Ok(code) => debug!(instance = %self.name, ?code, "killed for restart"),
            Err(InstanceError::Server(ServerError::NotRunning)) => {}
            Err(e) => return Err(e),
        }
        self.start().await
    }

    pub async fn kill(&self) -> Result<Option<i32>, InstanceError> {
        Ok(self.handle.write().await.kill().await?)
    }

    /// Graceful shutdown; see [`InstanceHandle::stop`].
    pub async fn stop(&self, grace: Option<Duration>) -> Result<Option<i32>, InstanceError> {
        Ok(self.handle.write().await.stop(grace).await?)
    }

    pub async fn send_command<S: Into<String>>(&self, cmd: S) -> Result<(), InstanceError> {
        Ok(self.handle.read().await.send_command(cmd).await?)
    }

    pub async fn apply_action(&self, action: ConsoleAction) -> Result<ActionOutcome, InstanceError> {
        Ok(self.handle.read().await.apply_action(action).await?)
    }

    pub async fn subscribe(&self, stream: StreamSource) -> BroadcastStream<InstanceEvent> {
        self.handle.read().await.subscribe(stream)
    }
}
