//! Mail-sync worker control surface

use crate::error::{Error, Result};
use crate::persist;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What the supervisor needs from a mail-sync worker.
///
/// The worker runs on its own once started. The supervisor only polls
/// [`Worker::healthy`] and, on shutdown, raises [`Worker::exit_signal`].
pub trait Worker {
    /// Begin background execution and return immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the background execution cannot be started.
    fn start(&mut self) -> Result<()>;

    /// Whether the background execution is still alive.
    ///
    /// Must not block and must not have side effects.
    fn healthy(&self) -> bool;

    /// Cooperative cancellation: once cancelled the worker should stop
    /// at its next safe point.
    fn exit_signal(&self) -> &CancellationToken;
}

/// Program (and leading arguments) used to run the worker.
///
/// The config file path is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl WorkerCommand {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }
}

/// A worker running as a child process.
///
/// Raising the exit signal sends the child SIGTERM and leaves the rest
/// to it. The child is killed outright only if the runtime that owns it
/// shuts down first.
pub struct ProcessWorker {
    command: WorkerCommand,
    config_path: PathBuf,
    exit: CancellationToken,
    alive: Arc<AtomicBool>,
    started: bool,
}

impl ProcessWorker {
    /// Prepare a worker for the config file at `config_path`.
    ///
    /// The file is parsed here so that a broken config is reported
    /// before anything is spawned. Nothing is started until
    /// [`Worker::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn new(config_path: impl Into<PathBuf>, command: WorkerCommand) -> Result<Self> {
        let config_path = config_path.into();
        persist::load(&config_path)?;

        Ok(Self {
            command,
            config_path,
            exit: CancellationToken::new(),
            alive: Arc::new(AtomicBool::new(false)),
            started: false,
        })
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl Worker for ProcessWorker {
    fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::Worker("worker already started".into()));
        }

        let program = self.command.program.to_string_lossy().into_owned();
        debug!("Spawning worker {} {}", program, self.config_path.display());

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(&self.config_path)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Worker(format!("Failed to spawn {program}: {e}")))?;

        self.started = true;
        self.alive.store(true, Ordering::SeqCst);

        let alive = Arc::clone(&self.alive);
        let exit = self.exit.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => warn!("Worker {} exited: {}", program, status),
                    Err(e) => error!("Failed to wait for worker {}: {}", program, e),
                },
                () = exit.cancelled() => {
                    info!("Stopping worker {}", program);
                    if let Err(e) = request_stop(&mut child) {
                        warn!("Failed to stop worker {}: {}", program, e);
                    }
                    match child.wait().await {
                        Ok(status) => info!("Worker {} stopped: {}", program, status),
                        Err(e) => error!("Failed to wait for worker {}: {}", program, e),
                    }
                }
            }
            alive.store(false, Ordering::SeqCst);
        });

        Ok(())
    }

    fn healthy(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn exit_signal(&self) -> &CancellationToken {
        &self.exit
    }
}

/// Ask the child to shut down on its own terms.
///
/// On Unix this is SIGTERM; the child keeps running until it decides
/// to exit. Elsewhere there is no polite request, so it is killed.
#[cfg(unix)]
fn request_stop(child: &Child) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // No id means the child has already been reaped.
    let Some(id) = child.id() else {
        return Ok(());
    };
    let pid = Pid::from_raw(i32::try_from(id).map_err(std::io::Error::other)?);
    kill(pid, Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}
