use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use futures::stream::BoxStream;
use futures::AsyncBufReadExt;
use futures::StreamExt;
use futures::TryStreamExt;
use kube::api::WatchParams;
use kube::core::Request;
use kube::Client;
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::k8s::types::ChangeType;
use crate::k8s::types::WatchError;
use crate::k8s::types::WatchEvent;
use crate::mailbox::PendingEvent;

/// Raw newline-delimited records of one watch subscription.
pub type RecordStream = BoxStream<'static, Result<String, Report<WatchError>>>;

/// Opens pod watch subscriptions.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens a fresh subscription. Dropping the returned stream closes it.
    async fn subscribe(&self) -> Result<RecordStream, Report<WatchError>>;
}

/// Streams pod watch records straight from the API server.
pub struct KubeEventSource {
    client: Client,
    namespace: String,
    label_selector: String,
}

impl KubeEventSource {
    pub fn new(client: Client, namespace: String, label_selector: String) -> Self {
        Self {
            client,
            namespace,
            label_selector,
        }
    }
}

#[async_trait]
impl EventSource for KubeEventSource {
    async fn subscribe(&self) -> Result<RecordStream, Report<WatchError>> {
        let url = format!("/api/v1/namespaces/{}/pods", self.namespace);
        let params = WatchParams::default().labels(&self.label_selector);
        let request = Request::new(url).watch(&params, "0").change_context(
            WatchError::SubscribeFailed {
                message: "Failed to build watch request".to_string(),
            },
        )?;

        let reader = self.client.request_stream(request).await.change_context(
            WatchError::SubscribeFailed {
                message: format!("Watch request to namespace {} failed", self.namespace),
            },
        )?;

        let records = reader
            .lines()
            .map_err(|e| {
                Report::new(WatchError::StreamFailed {
                    message: e.to_string(),
                })
            })
            .boxed();
        Ok(records)
    }
}

/// Cloneable handle that stops a running [`WatchStream`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Closes the active subscription and stops the reconnect loop.
    ///
    /// Idempotent; safe to call from any task.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

/// Keeps a pod deletion subscription alive and forwards qualifying deletions
/// into the [`PendingEvent`] mailbox.
pub struct WatchStream<S> {
    source: S,
    mailbox: Arc<PendingEvent>,
    stop: CancellationToken,
    backoff: Duration,
}

impl<S: EventSource> WatchStream<S> {
    pub fn new(
        source: S,
        mailbox: Arc<PendingEvent>,
        stop: CancellationToken,
        backoff: Duration,
    ) -> Self {
        Self {
            source,
            mailbox,
            stop,
            backoff,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.stop.clone(),
        }
    }

    pub fn shutdown(&self) {
        self.stop.cancel();
    }

    /// Runs until shutdown is requested.
    ///
    /// I/O failures, and streams that end within the backoff window, are
    /// logged and followed by a fixed backoff before resubscribing. A stream
    /// closed by the server-side watch timeout is resubscribed at once. The
    /// loop never gives up on its own.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) {
        info!("watching pod stream");

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            let subscribed_at = Instant::now();
            select! {
                biased;
                _ = self.stop.cancelled() => break,
                result = self.pump() => match result {
                    Ok(()) if subscribed_at.elapsed() >= self.backoff => {
                        debug!("pod watch stream expired, resubscribing");
                        continue;
                    }
                    Ok(()) => warn!("pod watch stream ended, reconnecting"),
                    Err(e) => error!(exception = %format!("{e:?}"), "watch failed"),
                },
            }

            select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }

        info!("pod watch stopped");
    }

    /// Consumes one subscription until it ends or fails.
    async fn pump(&self) -> Result<(), Report<WatchError>> {
        let mut records = self.source.subscribe().await?;
        debug!("pod watch subscribed");

        while let Some(record) = records.next().await {
            self.process_record(&record?);
        }

        Ok(())
    }

    /// Handles a single record. Malformed records are logged and skipped.
    pub(crate) fn process_record(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let event = match WatchEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(exception = %format!("{e:?}"), record = line, "skipping malformed watch record");
                return;
            }
        };

        if event.change_type == ChangeType::Error {
            warn!(kind = %event.kind, "watch error event from API server");
            return;
        }

        if !event.is_pod_deletion() {
            return;
        }

        debug!(pod_name = %event.object.name, "pod deletion observed");
        self.mailbox.publish(event.object);
    }
}
