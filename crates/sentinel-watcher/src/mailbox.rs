//! Single-slot hand-off between the watch stream and the coordinator.

use std::sync::Mutex;
use std::sync::PoisonError;

use tokio::sync::Notify;

use crate::k8s::PodRecord;

/// Holds the most recent qualifying pod deletion.
///
/// Writes are last-write-wins: a deletion that has not been taken yet is
/// replaced by the next one. The notification is a single stored permit, so
/// raising it several times before the reader wakes up still wakes it once.
#[derive(Debug, Default)]
pub struct PendingEvent {
    slot: Mutex<Option<PodRecord>>,
    signal: Notify,
}

impl PendingEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the slot and raises the notification.
    pub fn publish(&self, pod: PodRecord) {
        let replaced = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(pod);
        if let Some(previous) = replaced {
            tracing::debug!(pod_name = %previous.name, "unread pod delete event superseded");
        }
        self.signal.notify_one();
    }

    /// Resolves once the notification has been raised, clearing it.
    pub async fn notified(&self) {
        self.signal.notified().await;
    }

    /// Reads and removes the pending pod, if any.
    pub fn take(&self) -> Option<PodRecord> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Returns a copy of the pending pod without removing it.
    #[cfg(test)]
    pub(crate) fn peek(&self) -> Option<PodRecord> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
