use crate::layout::ProvisionedDirectory;
use crate::pipeline::plan::Step;
use crate::run_date::RunDate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Provision, enumerate, extract, write the manifest, consolidate.
    Full,
    /// Everything except tool invocations.
    SkipTools,
    /// Provision and enumerate only.
    ProvisionOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub id: String,
    pub command: String,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl StepReport {
    pub(crate) fn new(step: &Step, attempts: u32, duration: Duration) -> Self {
        Self {
            id: step.id.clone(),
            command: step.command.to_string(),
            attempts,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub source: String,
    pub entity: String,
    pub steps: Vec<StepReport>,
}

impl BranchReport {
    pub fn retried(&self) -> bool {
        self.steps.iter().any(|s| s.attempts > 1)
    }
}

/// Everything a finished run did, in a form fit for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub date: RunDate,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub provisioned: Vec<ProvisionedDirectory>,
    pub sources: Vec<String>,
    pub branches: Vec<BranchReport>,
    pub manifest_path: Option<PathBuf>,
    pub manifest_entries: usize,
    pub closing: Vec<StepReport>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn new(date: RunDate, mode: RunMode) -> Self {
        let now = Utc::now();
        Self {
            date,
            mode,
            started_at: now,
            finished_at: now,
            provisioned: Vec::new(),
            sources: Vec::new(),
            branches: Vec::new(),
            manifest_path: None,
            manifest_entries: 0,
            closing: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }

    pub fn directories_created(&self) -> usize {
        self.provisioned.iter().filter(|d| d.created).count()
    }

    pub fn tool_invocations(&self) -> usize {
        self.branches
            .iter()
            .flat_map(|b| b.steps.iter())
            .chain(self.closing.iter())
            .map(|s| s.attempts as usize)
            .sum()
    }
}
