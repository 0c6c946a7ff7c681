use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    config::LoaderType,
    error::BootstrapError,
    instance::{InstanceMeta, JavaRuntime},
};

use super::bounded;

/// Launch jar the fabric installer lays down next to the vanilla server.
pub const FABRIC_LAUNCH_JAR: &str = "fabric-server-launch.jar";

/// Everything an install step needs to know about the instance.
#[derive(Debug, Clone, Copy)]
pub struct InstallContext<'a> {
    pub dir: &'a Path,
    pub meta: &'a InstanceMeta,
    pub java: &'a JavaRuntime,
    pub timeout: Option<Duration>,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Prepares the instance directory and returns the jar to launch,
    /// relative to the instance directory.
    async fn install(&self, ctx: InstallContext<'_>) -> Result<PathBuf, BootstrapError>;
}

/// The downloaded server jar is already runnable.
#[derive(Debug, Default)]
pub struct VanillaInstaller;

#[async_trait]
impl LoaderInstaller for VanillaInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> Result<PathBuf, BootstrapError> {
        debug!(version = %ctx.meta.version, "vanilla needs no install step");
        Ok(ctx.meta.server_jar.clone())
    }
}

/// Forge installers are launched directly; the first run does the install.
#[derive(Debug, Default)]
pub struct ForgeInstaller;

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> Result<PathBuf, BootstrapError> {
        debug!(version = %ctx.meta.version, "forge jar is launched as downloaded");
        Ok(ctx.meta.server_jar.clone())
    }
}

#[derive(Debug, Default)]
pub struct FabricInstaller;

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> Result<PathBuf, BootstrapError> {
        info!(version = %ctx.meta.version, "running fabric installer");

        let mut command =
            ctx.java
                .fabric_installer_command(ctx.dir, &ctx.meta.server_jar, &ctx.meta.version);
        let output = bounded(ctx.timeout, "fabric install", command.output())
            .await?
            .map_err(|source| BootstrapError::Spawn {
                step: "fabric install",
                source,
            })?;

        if !output.status.success() {
            warn!(
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "fabric installer failed"
            );
            return Err(BootstrapError::InstallerFailed(output.status.code()));
        }

        let launch_jar = PathBuf::from(FABRIC_LAUNCH_JAR);
        let produced = ctx.dir.join(&launch_jar);
        if !produced.is_file() {
            return Err(BootstrapError::MissingArtifact(produced));
        }

        Ok(launch_jar)
    }
}

/// Static dispatch over the per-loader install steps.
#[derive(Debug)]
pub enum Installer {
    Vanilla(VanillaInstaller),
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
}

impl Installer {
    pub fn new(loader: LoaderType) -> Self {
        match loader {
            LoaderType::Vanilla => Self::Vanilla(VanillaInstaller),
            LoaderType::Fabric => Self::Fabric(FabricInstaller),
            LoaderType::Forge => Self::Forge(ForgeInstaller),
        }
    }

    pub async fn install(&self, ctx: InstallContext<'_>) -> Result<PathBuf, BootstrapError> {
        match self {
            Installer::Vanilla(i) => i.install(ctx).await,
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
        }
    }
}
