use crate::config::Config;
use crate::error::{DailyFlowError, Result};
use crate::run_date::RunDate;
use crate::scanner::source_scanner::list_entries;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum DirectoryTarget {
    Csv,
    Table(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedDirectory {
    pub target: DirectoryTarget,
    pub path: PathBuf,
    /// False when the directory was already there.
    pub created: bool,
}

impl ProvisionedDirectory {
    pub fn describe(&self) -> String {
        let state = if self.created { "created" } else { "already present" };
        match &self.target {
            DirectoryTarget::Csv => {
                format!("CSV directory {} at: {}", state, self.path.display())
            }
            DirectoryTarget::Table(table) => format!(
                "Directory for table {} {} at: {}",
                table,
                state,
                self.path.display()
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub date: RunDate,
    pub directories: Vec<ProvisionedDirectory>,
}

impl ProvisionReport {
    pub fn created_count(&self) -> usize {
        self.directories.iter().filter(|d| d.created).count()
    }
}

pub struct DirectoryProvisioner<'a> {
    config: &'a Config,
}

impl<'a> DirectoryProvisioner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// The directories a run for `date` needs, without touching anything.
    ///
    /// Tables are read from the table source directory, so it must exist.
    pub fn planned_directories(&self, date: &RunDate) -> Result<Vec<(DirectoryTarget, PathBuf)>> {
        let root = self.config.root()?;
        fs::metadata(root).map_err(|e| DailyFlowError::filesystem(root, e))?;

        let table_root = self.config.table_source_path()?;
        let tables = list_entries(&table_root)?;

        let mut planned = Vec::with_capacity(tables.len() + 1);
        planned.push((
            DirectoryTarget::Csv,
            self.config.csv_target_path()?.join(date.as_str()),
        ));
        for table in tables {
            // Join the raw name; the lossy form is only for reporting.
            let path = table_root.join(&table).join(date.as_str());
            let label = table.to_string_lossy().into_owned();
            planned.push((DirectoryTarget::Table(label), path));
        }

        Ok(planned)
    }

    /// Creates every directory for `date`. Existing directories are left
    /// alone; the first filesystem error aborts the run.
    pub fn provision(&self, date: &RunDate) -> Result<ProvisionReport> {
        let mut directories = Vec::new();

        for (target, path) in self.planned_directories(date)? {
            let created = !path.is_dir();
            fs::create_dir_all(&path).map_err(|e| DailyFlowError::filesystem(&path, e))?;

            let directory = ProvisionedDirectory {
                target,
                path,
                created,
            };
            log::info!("{}", directory.describe());
            directories.push(directory);
        }

        Ok(ProvisionReport {
            date: date.clone(),
            directories,
        })
    }
}

/// Ensure the dated output directories exist for `date`.
pub fn provision_directories(config: &Config, date: &RunDate) -> Result<ProvisionReport> {
    DirectoryProvisioner::new(config).provision(date)
}
