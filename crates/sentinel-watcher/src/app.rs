//! Startup and shutdown sequencing.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::config::Timings;
use crate::config::WatcherArgs;
use crate::coordinator::Coordinator;
use crate::k8s::EventSource;
use crate::k8s::KubeEventSource;
use crate::k8s::KubeSentinelDirectory;
use crate::k8s::SentinelDirectory;
use crate::k8s::WatchStream;
use crate::kube_client;
use crate::mailbox::PendingEvent;
use crate::reset::RedisCliReset;
use crate::reset::ResetCommand;
use crate::reset::ResetExecutor;
use crate::terminator::Terminator;

/// Runs the watcher until a termination signal has been handled and every
/// task has drained.
pub async fn run(args: WatcherArgs, timings: Timings) -> Result<()> {
    args.validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e:?}"))?;

    let client = kube_client::init_kube_client(
        args.k8s_base.as_deref(),
        args.kubeconfig.clone(),
        &args.namespace,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to initialize Kubernetes client: {e:?}"))?;

    let source = KubeEventSource::new(
        client.clone(),
        args.namespace.clone(),
        args.label_matcher().label_selector(),
    );
    let directory = KubeSentinelDirectory::new(
        client,
        &args.namespace,
        args.sentinel_service.clone(),
        args.sentinel_port,
    );
    let command = RedisCliReset::new(args.reset_command.clone());

    run_with(
        args,
        timings,
        CancellationToken::new(),
        source,
        directory,
        command,
    )
    .await
}

/// Wires the watch stream, terminator and coordinator around the given
/// collaborators and runs them to completion.
///
/// Cancelling `stopping` has the same effect as a termination signal.
pub async fn run_with<S, D, C>(
    args: WatcherArgs,
    timings: Timings,
    stopping: CancellationToken,
    source: S,
    directory: D,
    command: C,
) -> Result<()>
where
    S: EventSource + 'static,
    D: SentinelDirectory,
    C: ResetCommand,
{
    let mailbox = Arc::new(PendingEvent::new());
    let matcher = args.label_matcher();

    let watch = Arc::new(WatchStream::new(
        source,
        mailbox.clone(),
        stopping.child_token(),
        timings.watch_backoff,
    ));

    let signals = Terminator::new(stopping.clone(), watch.shutdown_handle())
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install signal handlers: {e:?}"))?;
    let terminator_task = tokio::spawn(signals);

    // deletions during the startup delay are not observed
    tokio::select! {
        _ = stopping.cancelled() => {}
        _ = tokio::time::sleep(timings.startup_delay) => {}
    }

    tracing::info!(
        namespace = %args.namespace,
        label_selector = %matcher.label_selector(),
        "starting redis-sentinel-watcher"
    );

    let watch_task = {
        let watch = watch.clone();
        tokio::spawn(async move { watch.run().await })
    };

    let executor = ResetExecutor::new(
        directory,
        command,
        args.master_name.clone(),
        timings.reset_pacing,
    );
    let mut coordinator = Coordinator::new(
        mailbox,
        matcher,
        executor,
        stopping,
        timings.event_wait_timeout,
    );

    coordinator.run(watch_task).await;
    terminator_task.abort();

    Ok(())
}
