use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::k8s::LabelMatcher;
use crate::k8s::SentinelDirectory;
use crate::mailbox::PendingEvent;
use crate::reset::CycleReport;
use crate::reset::ResetCommand;
use crate::reset::ResetExecutor;

/// Lifecycle of the coordinator loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Waiting,
    Processing,
    Draining,
    Terminated,
}

/// What happened to a drained notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The notification fired but the slot had already been drained.
    Empty,
    /// The deleted pod is outside the monitored group.
    Ignored,
    Reset(CycleReport),
}

/// Drains the pending deletion, re-validates it and runs reset cycles, one
/// at a time.
pub struct Coordinator<D, C> {
    mailbox: Arc<PendingEvent>,
    matcher: LabelMatcher,
    executor: ResetExecutor<D, C>,
    stopping: CancellationToken,
    wait_timeout: Duration,
    state: CoordinatorState,
}

impl<D, C> Coordinator<D, C>
where
    D: SentinelDirectory,
    C: ResetCommand,
{
    pub fn new(
        mailbox: Arc<PendingEvent>,
        matcher: LabelMatcher,
        executor: ResetExecutor<D, C>,
        stopping: CancellationToken,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            mailbox,
            matcher,
            executor,
            stopping,
            wait_timeout,
            state: CoordinatorState::Waiting,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CoordinatorState {
        self.state
    }

    fn transition(&mut self, next: CoordinatorState) {
        debug!(from = ?self.state, to = ?next, "coordinator state change");
        self.state = next;
    }

    /// Runs until the stopping flag is set, then waits for the watch task.
    pub async fn run(&mut self, watch_task: JoinHandle<()>) -> CoordinatorState {
        while !self.stopping.is_cancelled() {
            let notified = select! {
                biased;
                _ = self.stopping.cancelled() => false,
                result = tokio::time::timeout(self.wait_timeout, self.mailbox.notified()) => result.is_ok(),
            };
            if notified {
                self.process_pending().await;
            }
        }

        self.transition(CoordinatorState::Draining);
        if let Err(e) = watch_task.await {
            error!(exception = %e, "pod watch task failed during shutdown");
        }
        self.transition(CoordinatorState::Terminated);
        info!("Exiting...");
        self.state
    }

    /// Takes the pending pod and, if it still belongs to the monitored group,
    /// runs a full reset cycle.
    pub async fn process_pending(&mut self) -> Outcome {
        let Some(pod) = self.mailbox.take() else {
            return Outcome::Empty;
        };
        info!(deleted_pod_name = %pod.name, "pod delete event");

        if !self.matcher.matches(&pod) {
            debug!(pod_name = %pod.name, labels = ?pod.labels, "ignoring non-matching delete event");
            return Outcome::Ignored;
        }

        self.transition(CoordinatorState::Processing);
        let report = self.executor.reset_all().await;
        self.transition(CoordinatorState::Waiting);
        Outcome::Reset(report)
    }
}
