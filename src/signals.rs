//! Termination signal handling
//!
//! [`SignalBridge`] listens for the host's termination requests. On
//! Unix these are SIGINT and SIGTERM; elsewhere only Ctrl-C is
//! available. Listeners are registered when the bridge is installed,
//! so a signal that arrives before anyone awaits [`SignalBridge::recv`]
//! is not lost.

use std::fmt;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A termination request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT, or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl Signal {
    /// The conventional Unix signal number.
    #[must_use]
    pub const fn number(self) -> i32 {
        match self {
            Self::Interrupt => 2,
            Self::Terminate => 15,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }

    /// Log the signal and raise `exit`.
    ///
    /// The caller is expected to shut down right after; nothing waits
    /// for the worker to acknowledge the cancellation.
    pub fn relay(self, exit: &CancellationToken) -> Self {
        info!("Signal {} ({}) received, exiting...", self.number(), self);
        exit.cancel();
        self
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Installed termination signal listeners.
#[cfg(unix)]
pub struct SignalBridge {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalBridge {
    /// Register listeners for SIGINT and SIGTERM.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler cannot be registered.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.interrupt.recv() => Signal::Interrupt,
            _ = self.terminate.recv() => Signal::Terminate,
        }
    }
}

/// Installed termination signal listeners.
#[cfg(not(unix))]
pub struct SignalBridge {
    _private: (),
}

#[cfg(not(unix))]
impl SignalBridge {
    /// Nothing needs registering up front for Ctrl-C.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the Unix implementation.
    pub const fn install() -> io::Result<Self> {
        Ok(Self { _private: () })
    }

    /// Wait for Ctrl-C.
    pub async fn recv(&mut self) -> Signal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        Signal::Interrupt
    }
}
