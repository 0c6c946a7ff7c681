//! One-time preparation of a downloaded instance: loader install, license
//! acceptance and a priming launch that lets the server generate its world.

pub mod eula;
pub mod loader;

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    error::{BootstrapError, ServerError},
    instance::{InstanceHandle, InstanceMeta, JavaRuntime, MetadataStore},
};

pub use loader::{FABRIC_LAUNCH_JAR, InstallContext, Installer, LoaderInstaller};

/// Runs `fut` under `limit` when one is set.
pub(crate) async fn bounded<F, T>(
    limit: Option<Duration>,
    step: &'static str,
    fut: F,
) -> Result<T, BootstrapError>
where
    F: Future<Output = T>,
{
    match limit {
        Some(after) => timeout(after, fut)
            .await
            .map_err(|_| BootstrapError::Timeout { step, after }),
        None => Ok(fut.await),
    }
}

#[derive(Debug, Clone)]
pub struct Bootstrapper {
    config: Arc<EngineConfig>,
    java: JavaRuntime,
}

impl Bootstrapper {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let java = JavaRuntime::from_config(&config);
        Self { config, java }
    }

    /// Takes the instance in `store` from downloaded to initialized and
    /// returns the final record. Any failure leaves `initialized=false`.
    pub async fn run(&self, store: &MetadataStore) -> Result<InstanceMeta, BootstrapError> {
        let meta = store.read().await?;
        if meta.initialized {
            return Err(BootstrapError::AlreadyInitialized(meta.name));
        }

        let dir = store.dir();
        info!(instance = %meta.name, loader = %meta.loader_type, "bootstrapping instance");

        let ctx = InstallContext {
            dir,
            meta: &meta,
            java: &self.java,
            timeout: self.config.bootstrap_timeout(),
        };
        let launch_jar = Installer::new(meta.loader_type).install(ctx).await?;
        debug!(jar = %launch_jar.display(), "install step done");

        self.generate_license(dir, &meta, &launch_jar).await?;
        eula::accept(dir).await?;
        info!(instance = %meta.name, "license accepted");

        self.prime(dir, &meta, &launch_jar).await?;

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            debug!(?settle, "waiting for server files to settle");
            sleep(settle).await;
        }

        let produced = dir.join(&launch_jar);
        if !produced.is_file() {
            return Err(BootstrapError::MissingArtifact(produced));
        }

        let meta = store
            .update(|m| {
                m.server_jar = launch_jar;
                m.initialized = true;
            })
            .await?;
        info!(instance = %meta.name, jar = %meta.server_jar.display(), "instance initialized");

        Ok(meta)
    }

    /// First run: the server writes its license file and exits. The exit
    /// code is not meaningful here; a missing license is caught afterwards.
    async fn generate_license(
        &self,
        dir: &Path,
        meta: &InstanceMeta,
        launch_jar: &Path,
    ) -> Result<(), BootstrapError> {
        debug!("running server once to generate license file");

        let mut command = self
            .java
            .oneshot_server_command(dir, launch_jar, &meta.max_memory);
        let output = bounded(self.config.bootstrap_timeout(), "license", command.output())
            .await?
            .map_err(|source| BootstrapError::Spawn {
                step: "license",
                source,
            })?;

        debug!(code = ?output.status.code(), "license run finished");
        Ok(())
    }

    /// Second run: wait for the server to come up once, then stop it.
    async fn prime(
        &self,
        dir: &Path,
        meta: &InstanceMeta,
        launch_jar: &Path,
    ) -> Result<(), BootstrapError> {
        let limit = self.config.bootstrap_timeout();
        let mut handle = InstanceHandle::new_with_params(
            dir.to_path_buf(),
            launch_jar.to_path_buf(),
            meta.loader_type,
            meta.max_memory.clone(),
            self.java.clone(),
        )
        .map_err(ServerError::from)?;

        info!(instance = %meta.name, "priming launch");
        handle.start().await?;

        match handle.wait_ready(limit).await {
            Ok(()) => {
                let code = handle.stop(limit).await?;
                debug!(?code, "priming launch stopped");
                Ok(())
            }
            Err(ServerError::StartupFailed) => {
                _ = handle.kill().await;
                Err(BootstrapError::PrimingFailed)
            }
            Err(ServerError::EarlyExit(_)) => {
                let code = handle.kill().await.unwrap_or(None);
                Err(BootstrapError::PrimingExited(code))
            }
            Err(ServerError::Timeout(after)) => {
                warn!(?after, "priming launch never became ready, killing it");
                _ = handle.kill().await;
                Err(BootstrapError::Timeout {
                    step: "priming",
                    after,
                })
            }
            Err(e) => {
                _ = handle.kill().await;
                Err(e.into())
            }
        }
    }
}
