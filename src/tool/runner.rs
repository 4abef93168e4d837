use crate::config::Config;
use crate::error::{DailyFlowError, Result};
use crate::tool::command::ToolCommand;
use crate::ui::GracefulShutdown;
use std::time::{Duration, Instant};

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Runs tool invocations as child processes with a per-invocation time limit.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let started = Instant::now();
        log::debug!("Running {} (cwd {})", command, command.cwd.display());

        let child = command
            .to_command()
            .spawn()
            .map_err(|source| DailyFlowError::ToolSpawn {
                command: command.to_string(),
                source,
            })?;

        // Dropping the pending future drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(DailyFlowError::Timeout {
                    command: command.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(DailyFlowError::ToolFailed {
                command: command.to_string(),
                code: output.status.code(),
                stderr: tail_lines(&stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            duration: started.elapsed(),
        })
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded retries with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry.retries, config.retry_delay_duration())
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(300))
    }
}

#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub attempts: u32,
    pub output: ToolOutput,
}

/// Runs `command` until it succeeds or the policy is exhausted.
///
/// Cancellation is never retried; the last failure is returned as-is.
pub async fn run_with_retry(
    runner: &ToolRunner,
    command: &ToolCommand,
    policy: RetryPolicy,
    shutdown: &GracefulShutdown,
) -> Result<AttemptReport> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        shutdown.check_shutdown()?;

        match runner.run(command).await {
            Ok(output) => {
                return Ok(AttemptReport {
                    attempts: attempt,
                    output,
                })
            }
            Err(e) if attempt < policy.max_attempts() => {
                log::warn!(
                    "Attempt {}/{} of {} failed: {}; retrying in {}s",
                    attempt,
                    policy.max_attempts(),
                    command,
                    e,
                    policy.delay.as_secs()
                );
                interruptible_sleep(policy.delay, shutdown).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn interruptible_sleep(duration: Duration, shutdown: &GracefulShutdown) -> Result<()> {
    const SLICE: Duration = Duration::from_millis(250);

    let deadline = Instant::now() + duration;
    loop {
        shutdown.check_shutdown()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        tokio::time::sleep((deadline - now).min(SLICE)).await;
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines() {
        let text = (1..=30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 3);
        assert_eq!(tail, "28\n29\n30");
        assert_eq!(tail_lines("", 3), "");
        assert_eq!(tail_lines("one\n", 3), "one");
    }

    #[test]
    fn test_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay, Duration::from_secs(300));
        assert_eq!(RetryPolicy::new(u32::MAX, Duration::ZERO).max_attempts(), u32::MAX);
    }

    #[test]
    fn test_timeout_configuration() {
        let timeout = Duration::from_secs(600);
        let runner = ToolRunner::new().with_timeout(timeout);
        assert_eq!(runner.timeout, timeout);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let runner = ToolRunner::new();
        let cmd = ToolCommand::new("dailyflow-no-such-program-xyz", ".");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, DailyFlowError::ToolSpawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_captures_output() {
        let runner = ToolRunner::new();
        let cmd = ToolCommand::new("sh", ".").args(["-c", "echo hello; echo warn >&2"]);
        let output = runner.run(&cmd).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "warn");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let runner = ToolRunner::new();
        let cmd = ToolCommand::new("sh", ".").args(["-c", "echo boom >&2; exit 3"]);
        match runner.run(&cmd).await.unwrap_err() {
            DailyFlowError::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_the_child() {
        let runner = ToolRunner::new().with_timeout(Duration::from_millis(100));
        let cmd = ToolCommand::new("sleep", ".").arg("5");
        let started = Instant::now();
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, DailyFlowError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_retries_until_exhausted() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let counter = temp_dir.path().join("attempts");
        let script = format!("echo x >> '{}'; exit 1", counter.display());
        let cmd = ToolCommand::new("sh", temp_dir.path()).args(["-c", script.as_str()]);

        let policy = RetryPolicy::new(2, Duration::ZERO);
        let shutdown = GracefulShutdown::new_for_test();
        let err = run_with_retry(&ToolRunner::new(), &cmd, policy, &shutdown)
            .await
            .unwrap_err();

        assert!(matches!(err, DailyFlowError::ToolFailed { .. }));
        let attempts = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(attempts.lines().count(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_retry_recovers_on_later_attempt() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("seen");
        // Fails the first time, succeeds once the marker exists.
        let script = format!(
            "if [ -e '{0}' ]; then exit 0; else touch '{0}'; exit 1; fi",
            marker.display()
        );
        let cmd = ToolCommand::new("sh", temp_dir.path()).args(["-c", script.as_str()]);

        let report = run_with_retry(
            &ToolRunner::new(),
            &cmd,
            RetryPolicy::new(2, Duration::ZERO),
            &GracefulShutdown::new_for_test(),
        )
        .await
        .unwrap();
        assert_eq!(report.attempts, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_before_start() {
        let shutdown = GracefulShutdown::new_for_test();
        shutdown.request_shutdown();
        let cmd = ToolCommand::new("true", ".");
        let err = run_with_retry(&ToolRunner::new(), &cmd, RetryPolicy::default(), &shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, DailyFlowError::Cancelled));
    }
}
