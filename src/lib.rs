//! Mail-sync worker supervisor
//!
//! Turns a deployment platform's environment variables into the YAML
//! configuration file a mail-synchronization worker expects, starts
//! the worker and keeps an eye on it for the life of the process:
//! a failed health check ends the process with code 1, SIGINT or
//! SIGTERM cancel the worker and end it with code 0.
//!
//! The worker itself is opaque. It is driven through the [`Worker`]
//! trait; [`ProcessWorker`] implements it by running an external
//! program against the generated config file.

mod config;
mod error;
mod persist;
mod signals;
mod supervisor;
mod worker;

pub use config::{Common, DestMailbox, OnSuccess, SourceMailbox, SyncConfig};
pub use error::{Error, Result};
pub use persist::{DEFAULT_CONFIG_PATH, load, persist};
pub use signals::{Signal, SignalBridge};
pub use supervisor::{DEFAULT_HEALTH_INTERVAL, Supervisor};
pub use worker::{ProcessWorker, Worker, WorkerCommand};
