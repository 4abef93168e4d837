use crate::config::Config;
use crate::error::{DailyFlowError, Result};
use crate::layout::ManifestWriter;
use crate::pipeline::plan::{PipelinePlan, SourceBranch, Step};
use crate::pipeline::report::{BranchReport, StepReport};
use crate::tool::{run_with_retry, RetryPolicy, ToolRunner};
use crate::ui::progress::{finish_progress_with_summary, format_duration};
use crate::ui::{GracefulShutdown, ProgressManager};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub branches: Vec<BranchReport>,
    pub manifest_path: PathBuf,
    pub manifest_entries: usize,
    pub closing: Vec<StepReport>,
}

/// Runs a plan in its fixed order: branches, manifest, closing steps.
pub struct PipelineExecutor {
    runner: ToolRunner,
    retry: RetryPolicy,
    max_parallel: usize,
    shutdown: GracefulShutdown,
}

impl PipelineExecutor {
    pub fn new(
        runner: ToolRunner,
        retry: RetryPolicy,
        max_parallel: usize,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            runner,
            retry,
            max_parallel: max_parallel.max(1),
            shutdown,
        }
    }

    pub fn from_config(config: &Config, shutdown: GracefulShutdown) -> Self {
        Self::new(
            ToolRunner::new().with_timeout(config.tool_timeout_duration()),
            RetryPolicy::from_config(config),
            config.execution.max_parallel,
            shutdown,
        )
    }

    pub async fn execute(
        &self,
        plan: &PipelinePlan,
        progress: &ProgressManager,
    ) -> Result<ExecutionOutcome> {
        let branches = self.run_branches(plan, progress).await?;
        let (manifest_path, manifest_entries) = self.write_manifest(plan).await?;
        let closing = self.run_closing(plan, progress).await?;

        Ok(ExecutionOutcome {
            branches,
            manifest_path,
            manifest_entries,
            closing,
        })
    }

    /// Runs every source branch, at most `max_parallel` at a time.
    ///
    /// A failing branch does not stop the others. The call fails if any
    /// branch failed, after all of them have finished.
    pub async fn run_branches(
        &self,
        plan: &PipelinePlan,
        progress: &ProgressManager,
    ) -> Result<Vec<BranchReport>> {
        self.shutdown.check_shutdown()?;

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();

        for (index, branch) in plan.branches.iter().enumerate() {
            let branch = branch.clone();
            let semaphore = Arc::clone(&semaphore);
            let runner = self.runner.clone();
            let retry = self.retry;
            let shutdown = self.shutdown.clone();
            let spinner = progress.create_branch_spinner(&branch.source.id());

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_branch(&runner, &branch, retry, &shutdown, &spinner).await,
                    Err(_) => Err(DailyFlowError::Cancelled),
                };
                (index, branch.source.id(), result)
            });
        }

        let mut reports = Vec::with_capacity(plan.branches.len());
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(report))) => reports.push((index, report)),
                Ok((_, source, Err(DailyFlowError::Cancelled))) => failed.push(source),
                Ok((_, source, Err(e))) => {
                    log::error!("Branch {} failed: {}", source, e);
                    failed.push(source);
                }
                Err(e) => {
                    log::error!("Branch task ended abnormally: {}", e);
                    failed.push("<aborted branch>".to_string());
                }
            }
        }

        self.shutdown.check_shutdown()?;
        if !failed.is_empty() {
            failed.sort();
            return Err(DailyFlowError::BranchesFailed { failed });
        }

        reports.sort_by_key(|(index, _)| *index);
        Ok(reports.into_iter().map(|(_, report)| report).collect())
    }

    /// Writes the plan's manifest; only called once every branch succeeded.
    pub async fn write_manifest(&self, plan: &PipelinePlan) -> Result<(PathBuf, usize)> {
        self.shutdown.check_shutdown()?;

        let writer = ManifestWriter::new(plan.manifest_path.clone());
        let entries = plan.manifest_entries();
        let count = entries.len();

        let path = tokio::task::spawn_blocking(move || {
            writer.write(&entries).map(|path| path.to_path_buf())
        })
        .await
        .map_err(|e| DailyFlowError::Io(std::io::Error::other(e)))??;

        Ok((path, count))
    }

    /// Runs the consolidation steps in order. The manifest must exist and
    /// parse.
    pub async fn run_closing(
        &self,
        plan: &PipelinePlan,
        progress: &ProgressManager,
    ) -> Result<Vec<StepReport>> {
        let writer = ManifestWriter::new(plan.manifest_path.clone());
        let entries = tokio::task::spawn_blocking(move || writer.load())
            .await
            .map_err(|e| DailyFlowError::Io(std::io::Error::other(e)))??;
        log::info!(
            "Consolidating {} manifest entr{} from {}",
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            plan.manifest_path.display()
        );

        let spinner = progress.create_branch_spinner("consolidation");
        let started = Instant::now();
        let result =
            run_steps(&self.runner, &plan.closing, self.retry, &self.shutdown, &spinner).await;
        finish_spinner(&spinner, "consolidated load", &result, started);
        result
    }
}

async fn run_branch(
    runner: &ToolRunner,
    branch: &SourceBranch,
    retry: RetryPolicy,
    shutdown: &GracefulShutdown,
    spinner: &ProgressBar,
) -> Result<BranchReport> {
    let started = Instant::now();
    let result = run_steps(runner, &branch.steps, retry, shutdown, spinner).await;
    finish_spinner(spinner, "extracted", &result, started);

    Ok(BranchReport {
        source: branch.source.id(),
        entity: branch.source.entity().to_string(),
        steps: result?,
    })
}

async fn run_steps(
    runner: &ToolRunner,
    steps: &[Step],
    retry: RetryPolicy,
    shutdown: &GracefulShutdown,
    spinner: &ProgressBar,
) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(steps.len());
    for step in steps {
        spinner.set_message(step.id.clone());
        let started = Instant::now();
        let attempt = run_with_retry(runner, &step.command, retry, shutdown).await?;
        for line in attempt.output.stdout.lines() {
            log::trace!("[{}] {}", step.id, line);
        }
        for line in attempt.output.stderr.lines() {
            log::debug!("[{}] {}", step.id, line);
        }
        log::info!(
            "{} finished after {} attempt(s), last one took {}",
            step.id,
            attempt.attempts,
            format_duration(attempt.output.duration)
        );
        reports.push(StepReport::new(step, attempt.attempts, started.elapsed()));
    }
    Ok(reports)
}

fn finish_spinner<T>(spinner: &ProgressBar, done: &str, result: &Result<T>, started: Instant) {
    match result {
        Ok(_) => finish_progress_with_summary(spinner, done, started.elapsed()),
        Err(e) => spinner.abandon_with_message(format!("failed: {}", e)),
    }
}
