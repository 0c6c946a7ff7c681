use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::config::EngineConfig;

pub const FABRIC_LOADER_VERSION: &str = "latest";

/// The java executable plus any extra JVM arguments, shared by every process
/// the engine starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaRuntime {
    pub program: PathBuf,
    pub jvm_args: Vec<String>,
}

impl JavaRuntime {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            jvm_args: Vec::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            program: config.java_path.clone(),
            jvm_args: config.jvm_args.clone(),
        }
    }

    fn base_command(&self, dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.jvm_args)
            .current_dir(dir)
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        command
    }

    /// `java -Xmx<mem> -jar <jar> nogui` with all three pipes attached.
    pub fn server_command(&self, dir: &Path, jar: &Path, max_memory: &str) -> Command {
        let mut command = self.base_command(dir);
        command
            .arg(format!("-Xmx{max_memory}"))
            .arg("-jar")
            .arg(jar)
            .arg("nogui")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::piped());
        command
    }

    /// Same invocation with stdin closed, for runs that are expected to exit
    /// on their own.
    pub fn oneshot_server_command(&self, dir: &Path, jar: &Path, max_memory: &str) -> Command {
        let mut command = self.server_command(dir, jar, max_memory);
        command.stdin(Stdio::null());
        command
    }

    /// Headless fabric installer run that lays a server out in `dir`.
    pub fn fabric_installer_command(&self, dir: &Path, installer: &Path, version: &str) -> Command {
        let mut command = self.base_command(dir);
        command
            .arg("-jar")
            .arg(installer)
            .arg("server")
            .arg("-mcversion")
            .arg(version)
            .arg("-loader")
            .arg(FABRIC_LOADER_VERSION)
            .arg("-downloadMinecraft")
            .arg("-dir")
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}
