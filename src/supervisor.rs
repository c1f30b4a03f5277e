//! Startup sequence and health loop

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::persist::{self, DEFAULT_CONFIG_PATH};
use crate::signals::Signal;
use crate::worker::Worker;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Time between two health checks unless told otherwise.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(60);

/// Owns the worker for the life of the process.
///
/// [`Supervisor::launch`] runs the fixed startup chain (persist the
/// config, construct the worker, start it) and then blocks in the
/// health loop until a termination signal arrives or the worker stops
/// being healthy.
#[derive(Debug, Clone)]
pub struct Supervisor {
    config_path: PathBuf,
    health_interval: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl Supervisor {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }

    /// Set the time between health checks.
    #[must_use]
    pub fn with_health_interval(mut self, health_interval: Duration) -> Self {
        // tokio intervals reject a zero period
        self.health_interval = health_interval.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub const fn health_interval(&self) -> Duration {
        self.health_interval
    }

    /// Write the worker's config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn generate(&self, config: &SyncConfig) -> Result<()> {
        persist::persist(config, &self.config_path)?;
        info!(
            "Config generated from environment variables at {}",
            self.config_path.display()
        );
        info!(
            "Source: {} -> Destination: {}",
            config.src_imap.host, config.dest_imap.host
        );
        Ok(())
    }

    /// Persist `config`, build the worker with `make_worker`, start it
    /// and supervise it until `shutdown` resolves or a health check
    /// fails.
    ///
    /// `make_worker` receives the path of the freshly written config
    /// file. `shutdown` should already be listening (see
    /// [`crate::SignalBridge`]) so that no signal is missed while the
    /// worker starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be written, the worker
    /// cannot be built or started, or [`Error::WorkerUnhealthy`] once
    /// the worker fails a health check.
    pub async fn launch<W, F, S>(
        &self,
        config: &SyncConfig,
        make_worker: F,
        shutdown: S,
    ) -> Result<Signal>
    where
        W: Worker,
        F: FnOnce(&Path) -> Result<W>,
        S: Future<Output = Signal>,
    {
        self.generate(config)?;

        let mut worker = make_worker(&self.config_path)?;
        worker.start()?;
        info!("Worker started");

        self.monitor(&worker, shutdown).await
    }

    /// Poll `worker` every health interval, starting immediately.
    ///
    /// A pending signal always wins over a due health check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnhealthy`] the first time the worker
    /// reports itself unhealthy.
    pub async fn monitor<W, S>(&self, worker: &W, shutdown: S) -> Result<Signal>
    where
        W: Worker,
        S: Future<Output = Signal>,
    {
        tokio::pin!(shutdown);

        let mut ticker = interval(self.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                signal = &mut shutdown => {
                    return Ok(signal.relay(worker.exit_signal()));
                }
                _ = ticker.tick() => {
                    if !worker.healthy() {
                        error!("Worker is not healthy, exiting...");
                        return Err(Error::WorkerUnhealthy);
                    }
                    debug!("Worker is healthy");
                }
            }
        }
    }
}
