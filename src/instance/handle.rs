use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter},
    process::{Child, ChildStderr, ChildStdin, ChildStdout},
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{
        LoaderType,
        stream::{InstanceEvent, StreamSource},
    },
    error::{HandleError, ServerError},
    parser::{self, Classification},
};

use super::{ActionOutcome, ConsoleAction, InstanceData, InstanceMeta, InstanceStatus, JavaRuntime};

/// How long to keep reading output after the process is gone.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Status cell plus the event bus its transitions are announced on.
#[derive(Debug, Clone)]
struct Lifecycle {
    status: Arc<watch::Sender<InstanceStatus>>,
    events_tx: broadcast::Sender<InstanceEvent>,
}

impl Lifecycle {
    fn new() -> Self {
        let (status, _) = watch::channel(InstanceStatus::Idle);
        Self {
            status: Arc::new(status),
            events_tx: broadcast::Sender::new(2048),
        }
    }

    fn current(&self) -> InstanceStatus {
        *self.status.borrow()
    }

    /// Moves to `new` when `allowed` accepts the current state. Check and
    /// write happen under the watch lock, so concurrent callers cannot both
    /// win the same transition.
    fn transition_if<F>(&self, new: InstanceStatus, allowed: F) -> bool
    where
        F: FnOnce(&InstanceStatus) -> bool,
    {
        let mut old = None;
        self.status.send_if_modified(|current| {
            if *current == new || !allowed(current) {
                return false;
            }
            old = Some(*current);
            *current = new;
            true
        });

        match old {
            Some(old) => {
                debug!(%old, %new, "instance status changed");
                self.emit(InstanceEvent::state_change(old, new));
                true
            }
            None => false,
        }
    }

    fn emit(&self, event: InstanceEvent) {
        _ = self.events_tx.send(event);
    }
}

/// Plumbing of one spawned process.
#[derive(Debug)]
struct ProcessRun {
    stdin_tx: mpsc::Sender<String>,
    kill: CancellationToken,
    failed: Arc<AtomicBool>,
    exit: JoinHandle<Option<i32>>,
}

/// What [`wait_for_ready`] needs to judge one run: the status feed and
/// whether that run reported a startup failure.
#[derive(Debug, Clone)]
pub struct ReadyWatch {
    status: watch::Receiver<InstanceStatus>,
    failed: Arc<AtomicBool>,
}

/// Supervises the server process of one instance.
///
/// Output lines are broadcast on the stdout/stderr streams and classified;
/// lifecycle changes, startup failures and exits go to the event stream.
/// At most one process is alive per handle.
#[derive(Debug)]
pub struct InstanceHandle {
    pub data: InstanceData,
    java: JavaRuntime,
    lifecycle: Lifecycle,
    stdout_tx: broadcast::Sender<InstanceEvent>,
    stderr_tx: broadcast::Sender<InstanceEvent>,
    run: Option<ProcessRun>,
}

impl InstanceHandle {
    pub fn new_with_meta(
        root_dir: PathBuf,
        meta: &InstanceMeta,
        java: JavaRuntime,
    ) -> Result<Self, HandleError> {
        InstanceHandle::new_with_params(
            root_dir,
            meta.server_jar.clone(),
            meta.loader_type,
            meta.max_memory.clone(),
            java,
        )
    }

    pub fn new_with_params(
        root_dir: PathBuf,
        jar_path: PathBuf,
        loader: LoaderType,
        max_memory: String,
        java: JavaRuntime,
    ) -> Result<Self, HandleError> {
        if !root_dir.is_dir() {
            return Err(HandleError::InvalidDirectory(
                root_dir.display().to_string(),
            ));
        }
        validate_jar(&root_dir, &jar_path)?;

        let data = InstanceData {
            root_dir,
            jar_path,
            loader,
            max_memory,
        };

        Ok(Self {
            data,
            java,
            lifecycle: Lifecycle::new(),
            stdout_tx: broadcast::Sender::new(2048),
            stderr_tx: broadcast::Sender::new(2048),
            run: None,
        })
    }

    /// Points the handle at a different jar, e.g. after bootstrap replaced an
    /// installer with the launch jar.
    pub fn retarget(&mut self, jar_path: PathBuf, max_memory: String) -> Result<(), HandleError> {
        validate_jar(&self.data.root_dir, &jar_path)?;
        self.data.jar_path = jar_path;
        self.data.max_memory = max_memory;
        Ok(())
    }

    pub fn status(&self) -> InstanceStatus {
        self.lifecycle.current()
    }

    pub fn watch_status(&self) -> watch::Receiver<InstanceStatus> {
        self.lifecycle.status.subscribe()
    }

    /// True while a spawned process has not been reaped.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.exit.is_finished())
    }

    pub async fn send_command<S: Into<String>>(&self, cmd: S) -> Result<(), ServerError> {
        let run = self.run.as_ref().ok_or(ServerError::NotRunning)?;

        let mut command = cmd.into();
        if !command.ends_with('\n') {
            command.push('\n');
        }

        run.stdin_tx
            .send(command)
            .await
            .map_err(|_| ServerError::StdinWriteFailed)?;

        Ok(())
    }

    /// Sends immediate actions; returns the input-line text for the others.
    pub async fn apply_action(&self, action: ConsoleAction) -> Result<ActionOutcome, ServerError> {
        if action.is_immediate() {
            self.send_command(action.command()).await?;
            Ok(ActionOutcome::Submitted)
        } else {
            Ok(ActionOutcome::Prefill(action.prefill()))
        }
    }

    /// Spawns the server and returns once its pipes are wired; the status is
    /// `Launching` until the output says otherwise.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        self.validate_start_parameters()?;

        let command = self.java.server_command(
            &self.data.root_dir,
            &self.data.jar_path,
            &self.data.max_memory,
        );
        let mut child = command_spawn(command)?;

        let (stdout, stderr, stdin) =
            match (child.stdout.take(), child.stderr.take(), child.stdin.take()) {
                (Some(stdout), Some(stderr), Some(stdin)) => (stdout, stderr, stdin),
                (stdout, stderr, _) => {
                    _ = child.start_kill();
                    return Err(if stdout.is_none() {
                        ServerError::NoStdoutPipe
                    } else if stderr.is_none() {
                        ServerError::NoStderrPipe
                    } else {
                        ServerError::NoStdinPipe
                    });
                }
            };

        info!(
            dir = %self.data.root_dir.display(),
            jar = %self.data.jar_path.display(),
            pid = ?child.id(),
            "server process spawned"
        );
        self.lifecycle
            .transition_if(InstanceStatus::Launching, |_| true);

        self.setup_stream_pumps(child, stdout, stderr, stdin);
        Ok(())
    }

    fn validate_start_parameters(&mut self) -> Result<(), ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }
        self.run = None;
        validate_jar(&self.data.root_dir, &self.data.jar_path)?;
        Ok(())
    }

    fn setup_stream_pumps(
        &mut self,
        child: Child,
        stdout: ChildStdout,
        stderr: ChildStderr,
        stdin: ChildStdin,
    ) {
        let kill = CancellationToken::new();
        let exited = CancellationToken::new();
        let failed = Arc::new(AtomicBool::new(false));
        let (stdin_tx, stdin_rx) = mpsc::channel(1024);

        let stdout_task = tokio::spawn(pump_output(
            stdout,
            StreamSource::Stdout,
            self.stdout_tx.clone(),
            self.lifecycle.clone(),
            self.data.loader,
            kill.clone(),
            failed.clone(),
        ));
        let stderr_task = tokio::spawn(pump_output(
            stderr,
            StreamSource::Stderr,
            self.stderr_tx.clone(),
            self.lifecycle.clone(),
            self.data.loader,
            kill.clone(),
            failed.clone(),
        ));

        tokio::spawn(pump_stdin(stdin, stdin_rx, exited.clone()));

        let exit = tokio::spawn(watch_exit(
            child,
            kill.clone(),
            exited,
            [stdout_task, stderr_task],
            self.lifecycle.clone(),
            failed.clone(),
        ));

        self.run = Some(ProcessRun {
            stdin_tx,
            kill,
            failed,
            exit,
        });
    }

    /// Readiness feed of the current run, usable without holding the handle.
    pub fn ready_watch(&self) -> Result<ReadyWatch, ServerError> {
        let run = self.run.as_ref().ok_or(ServerError::NotRunning)?;
        Ok(ReadyWatch {
            status: self.watch_status(),
            failed: run.failed.clone(),
        })
    }

    /// Resolves once the server is `Ready`; see [`wait_for_ready`].
    pub async fn wait_ready(&self, limit: Option<Duration>) -> Result<(), ServerError> {
        wait_for_ready(self.ready_watch()?, limit).await
    }

    /// Forcibly terminates the process and clears the handle. Returns the
    /// exit code when the OS reported one.
    pub async fn kill(&mut self) -> Result<Option<i32>, ServerError> {
        let run = self.run.take().ok_or(ServerError::NotRunning)?;
        run.kill.cancel();
        run.exit
            .await
            .map_err(|e| ServerError::KillFailed(e.to_string()))
    }

    /// Sends `stop` and waits for the process to exit. With a `grace` limit
    /// the process is killed once it elapses.
    pub async fn stop(&mut self, grace: Option<Duration>) -> Result<Option<i32>, ServerError> {
        let mut run = self.run.take().ok_or(ServerError::NotRunning)?;

        if run.stdin_tx.send("stop\n".to_string()).await.is_err() {
            debug!("stdin already closed, waiting for exit");
        }

        let waited = match grace {
            Some(limit) => timeout(limit, &mut run.exit).await.ok(),
            None => Some((&mut run.exit).await),
        };

        let joined = match waited {
            Some(joined) => joined,
            None => {
                warn!(?grace, "server ignored stop, killing it");
                run.kill.cancel();
                run.exit.await
            }
        };

        joined.map_err(|e| ServerError::KillFailed(e.to_string()))
    }

    pub fn subscribe(&self, stream: StreamSource) -> BroadcastStream<InstanceEvent> {
        let rx = match stream {
            StreamSource::Stdout => self.stdout_tx.subscribe(),
            StreamSource::Stderr => self.stderr_tx.subscribe(),
            StreamSource::Event => self.lifecycle.events_tx.subscribe(),
        };
        BroadcastStream::new(rx)
    }
}

impl Drop for InstanceHandle {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.kill.cancel();
        }
    }
}

/// Waits until the run leaves `Launching`: `Ready` is success. A run that
/// reported a startup failure goes `Idle` and then `Terminated` once reaped;
/// either state is `StartupFailed` for it, and `Terminated` without a failure
/// means the process exited early.
pub async fn wait_for_ready(
    ready: ReadyWatch,
    limit: Option<Duration>,
) -> Result<(), ServerError> {
    let ReadyWatch { mut status, failed } = ready;
    let wait = async move {
        let changed = status
            .wait_for(|s| *s != InstanceStatus::Launching)
            .await
            .map(|s| *s);
        let Ok(settled) = changed else {
            return Err(ServerError::NotRunning);
        };

        match settled {
            InstanceStatus::Ready => Ok(()),
            InstanceStatus::Idle => Err(ServerError::StartupFailed),
            _ if failed.load(Ordering::Acquire) => Err(ServerError::StartupFailed),
            InstanceStatus::Terminated | InstanceStatus::Launching => {
                Err(ServerError::EarlyExit(None))
            }
        }
    };

    match limit {
        Some(limit) => timeout(limit, wait)
            .await
            .map_err(|_| ServerError::Timeout(limit))?,
        None => wait.await,
    }
}

fn validate_jar(root_dir: &Path, jar_path: &Path) -> Result<(), HandleError> {
    if !jar_path.is_relative() || !root_dir.join(jar_path).is_file() {
        return Err(HandleError::InvalidPathJAR(jar_path.display().to_string()));
    }
    Ok(())
}

fn command_spawn(mut command: tokio::process::Command) -> Result<Child, ServerError> {
    command
        .spawn()
        .map_err(|e| ServerError::SpawnFailed(e.to_string()))
}

async fn pump_output<R>(
    reader: R,
    source: StreamSource,
    tx: broadcast::Sender<InstanceEvent>,
    lifecycle: Lifecycle,
    loader: LoaderType,
    kill: CancellationToken,
    failed: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');

    loop {
        let raw = match segments.next_segment().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                debug!(?source, error = %e, "output stream closed");
                break;
            }
        };

        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches('\r')
            .to_string();

        _ = tx.send(InstanceEvent::line(line.clone(), source));

        match parser::classify(&line, loader) {
            Classification::Ready => {
                if lifecycle.transition_if(InstanceStatus::Ready, |s| {
                    *s == InstanceStatus::Launching
                }) {
                    info!("server reported ready");
                }
            }
            Classification::Failed => {
                if lifecycle.transition_if(InstanceStatus::Idle, InstanceStatus::is_live) {
                    warn!(line = %line, "server reported startup failure, killing it");
                    failed.store(true, Ordering::Release);
                    kill.cancel();
                    lifecycle.emit(InstanceEvent::startup_failed(line));
                }
            }
            Classification::Unclassified => {}
        }
    }
}

async fn pump_stdin(stdin: ChildStdin, mut rx: mpsc::Receiver<String>, exited: CancellationToken) {
    let mut writer = BufWriter::new(stdin);

    loop {
        tokio::select! {
            _ = exited.cancelled() => {
                break;
            }
            maybe_cmd = rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    break;
                };
                if writer.write_all(cmd.as_bytes()).await.is_err()
                    || writer.flush().await.is_err()
                {
                    warn!("failed to write to server stdin");
                    break;
                }
            }
        }
    }
}

/// Owns the child: waits for it to exit (or kills it on request), lets the
/// output pumps drain, then records the exit. Every run ends `Terminated`,
/// including one already sent `Idle` by its own startup failure.
async fn watch_exit(
    mut child: Child,
    kill: CancellationToken,
    exited: CancellationToken,
    pumps: [JoinHandle<()>; 2],
    lifecycle: Lifecycle,
    failed: Arc<AtomicBool>,
) -> Option<i32> {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill server process");
            }
            child.wait().await
        }
    };

    let drained = timeout(PIPE_DRAIN_TIMEOUT, async {
        for pump in pumps {
            _ = pump.await;
        }
    })
    .await;
    if drained.is_err() {
        debug!("output pumps still open after exit");
    }
    exited.cancel();

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "failed to wait for server process");
            None
        }
    };

    let failed = failed.load(Ordering::Acquire);
    lifecycle.transition_if(InstanceStatus::Terminated, |s| {
        s.is_live() || (failed && *s == InstanceStatus::Idle)
    });
    lifecycle.emit(InstanceEvent::exited(code));
    info!(?code, "server process exited");

    code
}
