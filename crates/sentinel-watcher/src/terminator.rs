use error_stack::Report;
use error_stack::ResultExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::k8s::ShutdownHandle;

#[derive(Debug, Error)]
pub enum TerminatorError {
    #[error("Failed to install {signal} handler")]
    SignalHandler { signal: &'static str },
}

/// Turns termination signals into a stop request.
#[derive(Debug, Clone)]
pub struct Terminator {
    stopping: CancellationToken,
    watch: ShutdownHandle,
}

impl Terminator {
    pub fn new(stopping: CancellationToken, watch: ShutdownHandle) -> Self {
        Self { stopping, watch }
    }

    /// Sets the stopping flag and shuts the watch stream down.
    ///
    /// Only the first call has an effect; later calls just log.
    pub fn terminate(&self, signal: &str) {
        info!(signal, "Received signal {signal}, shutting down.");
        if self.stopping.is_cancelled() {
            return;
        }
        self.stopping.cancel();
        self.watch.shutdown();
    }

    /// Installs SIGTERM and SIGINT handlers and serves them until the process exits.
    ///
    /// Handlers are registered before the returned future is first polled
    /// so no signal is missed between spawn and first poll.
    #[cfg(unix)]
    pub fn install(
        self,
    ) -> Result<impl std::future::Future<Output = ()> + Send, Report<TerminatorError>> {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate())
            .change_context(TerminatorError::SignalHandler { signal: "SIGTERM" })?;
        let mut sigint = signal(SignalKind::interrupt())
            .change_context(TerminatorError::SignalHandler { signal: "SIGINT" })?;

        Ok(async move {
            loop {
                tokio::select! {
                    Some(()) = sigterm.recv() => self.terminate("SIGTERM"),
                    Some(()) = sigint.recv() => self.terminate("SIGINT"),
                    else => break,
                }
            }
        })
    }

    #[cfg(not(unix))]
    pub fn install(
        self,
    ) -> Result<impl std::future::Future<Output = ()> + Send, Report<TerminatorError>> {
        Ok(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                self.terminate("ctrl-c");
            }
        })
    }
}
