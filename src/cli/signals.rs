//! Interrupt handling for long-running commands

use std::io;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::CancellationToken;

/// Cancels a token when the process receives SIGINT or SIGTERM.
///
/// The listener stops when the handler is dropped.
pub struct InterruptHandler {
    task: JoinHandle<()>,
}

impl InterruptHandler {
    /// Start listening. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install(cancel: CancellationToken) -> Result<Self, io::Error> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => debug!("received SIGINT"),
                _ = sigterm.recv() => debug!("received SIGTERM"),
            }
            cancel.cancel();
        });

        Ok(Self { task })
    }

    /// Start listening. Must be called from within a tokio runtime.
    #[cfg(not(unix))]
    pub fn install(cancel: CancellationToken) -> Result<Self, io::Error> {
        let task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("received Ctrl-C");
                cancel.cancel();
            }
        });

        Ok(Self { task })
    }
}

impl Drop for InterruptHandler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
