//! Test doubles for the watch source, sentinel directory and reset command.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use futures::future;
use futures::stream;
use futures::StreamExt;
use tokio::time::Instant;

use crate::k8s::pod_watcher::RecordStream;
use crate::k8s::DirectoryError;
use crate::k8s::EventSource;
use crate::k8s::SentinelDirectory;
use crate::k8s::SentinelEndpoint;
use crate::k8s::WatchError;
use crate::reset::reset_args;
use crate::reset::ResetCommand;
use crate::reset::ResetError;

/// What one call to [`ScriptedSource::subscribe`] produces.
pub(crate) enum Subscription {
    /// The subscription cannot be opened.
    Refused,
    /// Yields the lines, then either ends or blocks forever.
    Records { lines: Vec<String>, then_hang: bool },
    /// Yields the lines, then fails with an I/O error.
    Broken { lines: Vec<String> },
    /// Yields the lines, then ends once `after` has elapsed.
    Expires { lines: Vec<String>, after: Duration },
}

/// Replays a fixed sequence of subscriptions; once exhausted every new
/// subscription blocks forever.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<Subscription>>,
    subscriptions: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(script: Vec<Subscription>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn subscribe(&self) -> Result<RecordStream, Report<WatchError>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();

        let ok_lines = |lines: Vec<String>| stream::iter(lines.into_iter().map(Ok));
        match next {
            Some(Subscription::Refused) => Err(Report::new(WatchError::SubscribeFailed {
                message: "connection refused".to_string(),
            })),
            Some(Subscription::Records { lines, then_hang }) => {
                if then_hang {
                    Ok(ok_lines(lines).chain(stream::pending()).boxed())
                } else {
                    Ok(ok_lines(lines).boxed())
                }
            }
            Some(Subscription::Broken { lines }) => Ok(ok_lines(lines)
                .chain(stream::once(async {
                    Err(Report::new(WatchError::StreamFailed {
                        message: "connection reset by peer".to_string(),
                    }))
                }))
                .boxed()),
            Some(Subscription::Expires { lines, after }) => Ok(ok_lines(lines)
                .chain(
                    stream::once(tokio::time::sleep(after))
                        .filter_map(|()| future::ready(None::<Result<String, Report<WatchError>>>)),
                )
                .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}

#[async_trait]
impl<S: EventSource> EventSource for Arc<S> {
    async fn subscribe(&self) -> Result<RecordStream, Report<WatchError>> {
        self.as_ref().subscribe().await
    }
}

/// Returns a fixed sentinel list, or fails every lookup.
pub(crate) struct StaticDirectory {
    sentinels: Option<Vec<SentinelEndpoint>>,
    lookups: AtomicUsize,
}

impl StaticDirectory {
    pub(crate) fn new(sentinels: Vec<SentinelEndpoint>) -> Self {
        Self {
            sentinels: Some(sentinels),
            lookups: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            sentinels: None,
            lookups: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentinelDirectory for StaticDirectory {
    async fn list_sentinels(&self) -> Result<Vec<SentinelEndpoint>, Report<DirectoryError>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.sentinels.clone().ok_or_else(|| {
            Report::new(DirectoryError::LookupFailed {
                service: "redis-sentinel".to_string(),
            })
        })
    }
}

#[async_trait]
impl<D: SentinelDirectory> SentinelDirectory for Arc<D> {
    async fn list_sentinels(&self) -> Result<Vec<SentinelEndpoint>, Report<DirectoryError>> {
        self.as_ref().list_sentinels().await
    }
}

/// One recorded reset invocation.
#[derive(Debug, Clone)]
pub(crate) struct ResetCall {
    pub(crate) args: Vec<String>,
    pub(crate) started: Instant,
    pub(crate) finished: Instant,
}

/// Records every reset, optionally taking time or failing for chosen addresses.
#[derive(Clone, Default)]
pub(crate) struct RecordingCommand {
    calls: Arc<Mutex<Vec<ResetCall>>>,
    failing: Arc<HashSet<String>>,
    latency: Duration,
}

impl RecordingCommand {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub(crate) fn failing_for<'a>(addresses: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing: Arc::new(addresses.into_iter().map(str::to_string).collect()),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<ResetCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ResetCommand for RecordingCommand {
    async fn reset(
        &self,
        endpoint: &SentinelEndpoint,
        master_name: &str,
    ) -> Result<String, Report<ResetError>> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().expect("calls lock").push(ResetCall {
            args: reset_args(endpoint, master_name),
            started,
            finished: Instant::now(),
        });

        if self.failing.contains(&endpoint.address) {
            return Err(Report::new(ResetError::NonZeroExit {
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: "Could not connect to Redis".to_string(),
            }));
        }
        Ok("1".to_string())
    }
}
