//! Serialized, paced sentinel resets.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use thiserror::Error;
use tokio::process::Command;
use tracing::error;
use tracing::info;

use crate::k8s::SentinelDirectory;
use crate::k8s::SentinelEndpoint;

/// Errors raised by a single reset invocation.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("Failed to run reset command {command}")]
    SpawnFailed { command: String },
    #[error("Reset command exited with {status}: stdout={stdout:?} stderr={stderr:?}")]
    NonZeroExit {
        status: String,
        stdout: String,
        stderr: String,
    },
}

/// Runs the reset against one sentinel.
#[async_trait]
pub trait ResetCommand: Send + Sync {
    /// Returns the command's standard output on success.
    async fn reset(
        &self,
        endpoint: &SentinelEndpoint,
        master_name: &str,
    ) -> Result<String, Report<ResetError>>;
}

/// Arguments passed to `redis-cli` for one reset.
pub fn reset_args(endpoint: &SentinelEndpoint, master_name: &str) -> Vec<String> {
    vec![
        "-h".to_string(),
        endpoint.address.clone(),
        "-p".to_string(),
        endpoint.port.to_string(),
        "--raw".to_string(),
        "sentinel".to_string(),
        "reset".to_string(),
        master_name.to_string(),
    ]
}

/// Resets a sentinel by shelling out to `redis-cli`.
#[derive(Debug, Clone)]
pub struct RedisCliReset {
    program: PathBuf,
}

impl RedisCliReset {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl ResetCommand for RedisCliReset {
    async fn reset(
        &self,
        endpoint: &SentinelEndpoint,
        master_name: &str,
    ) -> Result<String, Report<ResetError>> {
        let args = reset_args(endpoint, master_name);
        info!(cmd = %self.program.display(), args = ?args, "resetting sentinel");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .change_context_lazy(|| ResetError::SpawnFailed {
                command: self.program.display().to_string(),
            })?;

        if !output.status.success() {
            return Err(Report::new(ResetError::NonZeroExit {
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Outcome of one reset cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// The sentinel list could not be obtained; nothing was invoked.
    Aborted,
    Completed { succeeded: usize, failed: usize },
}

/// Resets every sentinel, one at a time, with a fixed pause between them.
pub struct ResetExecutor<D, C> {
    directory: D,
    command: C,
    master_name: String,
    pacing: Duration,
}

impl<D, C> ResetExecutor<D, C>
where
    D: SentinelDirectory,
    C: ResetCommand,
{
    pub fn new(directory: D, command: C, master_name: String, pacing: Duration) -> Self {
        Self {
            directory,
            command,
            master_name,
            pacing,
        }
    }

    /// Looks up the current sentinels and resets each of them in order.
    ///
    /// A failing sentinel is logged and skipped. `pacing` separates the end
    /// of one invocation from the start of the next. The cycle is not
    /// cancellable once started.
    pub async fn reset_all(&self) -> CycleReport {
        info!("resetting sentinels!");

        let sentinels = match self.directory.list_sentinels().await {
            Ok(sentinels) => sentinels,
            Err(e) => {
                error!(exception = %format!("{e:?}"), "unable to reset sentinels");
                return CycleReport::Aborted;
            }
        };
        info!(
            sentinel_count = sentinels.len(),
            sentinels = %sentinels.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            "sentinels listed"
        );

        let mut succeeded = 0;
        let mut failed = 0;
        for (index, sentinel) in sentinels.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            match self.command.reset(sentinel, &self.master_name).await {
                Ok(result) => {
                    succeeded += 1;
                    info!(sentinel = %sentinel, result = %result, "done resetting sentinel.");
                }
                Err(e) => {
                    failed += 1;
                    error!(sentinel = %sentinel, exception = %format!("{e:?}"), "reset command failed");
                }
            }
        }

        info!(succeeded, failed, "done resetting all sentinels.");
        CycleReport::Completed { succeeded, failed }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;
    use tokio::time::Instant;

    use super::*;
    use crate::mock::RecordingCommand;
    use crate::mock::StaticDirectory;

    const PACING: Duration = Duration::from_secs(30);

    fn scenario_a() -> Vec<SentinelEndpoint> {
        vec![
            SentinelEndpoint::new("10.0.0.1", 26379),
            SentinelEndpoint::new("10.0.0.2", 26379),
            SentinelEndpoint::new("10.0.0.3", 26379),
        ]
    }

    #[test]
    fn reset_arguments() {
        assert_eq!(
            reset_args(&SentinelEndpoint::new("10.0.0.1", 26379), "mymaster").join(" "),
            "-h 10.0.0.1 -p 26379 --raw sentinel reset mymaster"
        );
    }

    #[test(tokio::test(start_paused = true))]
    async fn resets_in_order_with_pacing() {
        let command = RecordingCommand::default();
        let executor = ResetExecutor::new(
            StaticDirectory::new(scenario_a()),
            command.clone(),
            "mymaster".to_string(),
            PACING,
        );
        let started = Instant::now();

        let report = executor.reset_all().await;

        assert_eq!(report, CycleReport::Completed { succeeded: 3, failed: 0 });
        let calls = command.calls();
        assert_eq!(
            calls.iter().map(|call| call.args.join(" ")).collect::<Vec<_>>(),
            vec![
                "-h 10.0.0.1 -p 26379 --raw sentinel reset mymaster",
                "-h 10.0.0.2 -p 26379 --raw sentinel reset mymaster",
                "-h 10.0.0.3 -p 26379 --raw sentinel reset mymaster",
            ]
        );
        assert_eq!(calls[0].started - started, Duration::ZERO);
        assert_eq!(calls[1].started - calls[0].finished, PACING);
        assert_eq!(calls[2].started - calls[1].finished, PACING);
        assert_eq!(started.elapsed(), PACING * 2);
    }

    #[test(tokio::test(start_paused = true))]
    async fn pacing_is_measured_from_completion() {
        let command = RecordingCommand::with_latency(Duration::from_secs(7));
        let executor = ResetExecutor::new(
            StaticDirectory::new(scenario_a()),
            command.clone(),
            "mymaster".to_string(),
            PACING,
        );
        let started = Instant::now();

        executor.reset_all().await;

        let calls = command.calls();
        assert_eq!(calls[1].started - calls[0].finished, PACING);
        assert_eq!(calls[2].started - calls[1].finished, PACING);
        assert_eq!(started.elapsed(), Duration::from_secs(7) * 3 + PACING * 2);
    }

    #[test(tokio::test(start_paused = true))]
    async fn failing_sentinel_does_not_stop_the_cycle() {
        let command = RecordingCommand::failing_for(["10.0.0.2"]);
        let executor = ResetExecutor::new(
            StaticDirectory::new(scenario_a()),
            command.clone(),
            "mymaster".to_string(),
            PACING,
        );

        let report = executor.reset_all().await;

        assert_eq!(report, CycleReport::Completed { succeeded: 2, failed: 1 });
        assert_eq!(command.calls().len(), 3);
    }

    #[test(tokio::test(start_paused = true))]
    async fn directory_failure_aborts_before_any_reset() {
        let command = RecordingCommand::default();
        let executor = ResetExecutor::new(
            StaticDirectory::failing(),
            command.clone(),
            "mymaster".to_string(),
            PACING,
        );
        let started = Instant::now();

        let report = executor.reset_all().await;

        assert_eq!(report, CycleReport::Aborted);
        assert!(command.calls().is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test(tokio::test(start_paused = true))]
    async fn single_sentinel_has_no_delay() {
        let command = RecordingCommand::default();
        let executor = ResetExecutor::new(
            StaticDirectory::new(vec![SentinelEndpoint::new("10.0.0.1", 26379)]),
            command.clone(),
            "mymaster".to_string(),
            PACING,
        );
        let started = Instant::now();

        executor.reset_all().await;

        assert_eq!(command.calls().len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test(tokio::test)]
    async fn redis_cli_reports_spawn_failure() {
        let command = RedisCliReset::new(PathBuf::from("/nonexistent/redis-cli"));
        let err = command
            .reset(&SentinelEndpoint::new("127.0.0.1", 26379), "mymaster")
            .await
            .expect_err("missing binary");
        assert!(matches!(
            err.current_context(),
            ResetError::SpawnFailed { .. }
        ));
    }

    #[cfg(unix)]
    #[test(tokio::test)]
    async fn redis_cli_reports_non_zero_exit() {
        let command = RedisCliReset::new(PathBuf::from("false"));
        let err = command
            .reset(&SentinelEndpoint::new("127.0.0.1", 26379), "mymaster")
            .await
            .expect_err("false exits non-zero");
        assert!(matches!(
            err.current_context(),
            ResetError::NonZeroExit { .. }
        ));
    }

    #[cfg(unix)]
    #[test(tokio::test)]
    async fn non_zero_exit_keeps_stdout() {
        let script = std::env::temp_dir().join(format!("redis-cli-err-{}", std::process::id()));
        std::fs::write(&script, "#!/bin/sh\necho \"ERR No such master with that name\"\nexit 1\n")
            .expect("write script");
        std::fs::set_permissions(&script, std::os::unix::fs::PermissionsExt::from_mode(0o755))
            .expect("make script executable");

        let command = RedisCliReset::new(script.clone());
        let err = command
            .reset(&SentinelEndpoint::new("127.0.0.1", 26379), "mymaster")
            .await
            .expect_err("script exits non-zero");
        let _ = std::fs::remove_file(&script);

        let ResetError::NonZeroExit { stdout, .. } = err.current_context() else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(stdout.as_str(), "ERR No such master with that name");
    }

    #[cfg(unix)]
    #[test(tokio::test)]
    async fn redis_cli_captures_stdout() {
        let command = RedisCliReset::new(PathBuf::from("echo"));
        let output = command
            .reset(&SentinelEndpoint::new("10.0.0.1", 26379), "mymaster")
            .await
            .expect("echo succeeds");
        assert_eq!(output, "-h 10.0.0.1 -p 26379 --raw sentinel reset mymaster");
    }
}
