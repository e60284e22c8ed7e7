//! Process shutdown signals.
//!
//! Service managers (systemd, `docker stop`) send SIGTERM; an interactive
//! terminal sends SIGINT. Either one triggers an orderly stop so the
//! address book gets flushed.

use std::io;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered shutdown handlers. Handlers are installed by
/// [`ShutdownSignal::install`], so a signal delivered between install and
/// [`ShutdownSignal::recv`] is not lost.
#[cfg(unix)]
pub struct ShutdownSignal {
    interrupt: Signal,
    terminate: Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    /// Replace the default SIGINT and SIGTERM dispositions.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the first signal. Returns its name.
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
