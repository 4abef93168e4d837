pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod run_date;
pub mod scanner;
pub mod tool;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, ExecutionConfig, PathsConfig, RetryConfig, ToolConfig};
pub use error::{DailyFlowError, Result, UserFriendlyError};
pub use run_date::RunDate;

// Core functionality re-exports
pub use layout::{
    provision_directories, write_manifest, DirectoryProvisioner, ManifestEntry, ManifestWriter,
    ProvisionReport,
};
pub use pipeline::{PipelineExecutor, PipelinePlan, RunMode, RunReport};
pub use scanner::{enumerate_sources, Source, SourceScanner};
pub use tool::{CommandFactory, RetryPolicy, ToolCommand, ToolRunner};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::{Path, PathBuf};
use tokio::task;

/// Main library interface: one daily cycle for one run date.
pub struct DailyFlow {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl DailyFlow {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// Create a DailyFlow instance for testing (no signal handler conflicts)
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = OutputMode::from(&cli_args.output_format);

        Self::new(config, output_mode, cli_args.verbosity_level(), cli_args.quiet)
    }

    /// Runs the cycle for `date` up to the point `mode` allows.
    pub async fn run(&self, date: &RunDate, mode: RunMode) -> Result<RunReport> {
        self.config.root()?;
        self.shutdown.check_shutdown()?;

        let mut report = RunReport::new(date.clone(), mode);

        // Step 1: dated directories
        self.output_formatter
            .start_operation(&format!("Provisioning directories for {}", date));
        let provisioned = self.blocking({
            let config = self.config.clone();
            let date = date.clone();
            move || provision_directories(&config, &date)
        })
        .await?;
        self.output_formatter.print_provision_report(&provisioned);
        report.provisioned = provisioned.directories;
        self.shutdown.check_shutdown()?;

        // Step 2: sources
        self.output_formatter.start_operation("Listing data sources");
        let sources = self.blocking({
            let config = self.config.clone();
            move || enumerate_sources(&config)
        })
        .await?;
        report.sources = sources.iter().map(Source::id).collect();
        self.output_formatter.print_sources(&report.sources);

        if mode == RunMode::ProvisionOnly {
            return Ok(report.finish());
        }

        let plan = PipelinePlan::build(&self.config, date, sources)?;
        for warning in &plan.warnings {
            self.output_formatter.warning(warning);
        }
        report.warnings = plan.warnings.clone();

        let executor = PipelineExecutor::from_config(&self.config, self.shutdown.clone());

        if mode == RunMode::SkipTools {
            self.output_formatter.start_operation("Writing manifest");
            let (path, count) = executor.write_manifest(&plan).await?;
            self.output_formatter
                .success("Manifest file created successfully");
            report.manifest_path = Some(path);
            report.manifest_entries = count;
            return Ok(report.finish());
        }

        // Step 3-5: branches, manifest, consolidation
        self.output_formatter.start_operation(&format!(
            "Extracting {} source(s), up to {} at a time, then loading consolidated data",
            plan.branches.len(),
            self.config.execution.max_parallel
        ));
        let outcome = executor.execute(&plan, &self.progress_manager).await;
        self.progress_manager.clear();
        let outcome = outcome?;

        self.output_formatter
            .success("Manifest file created successfully");
        self.output_formatter
            .debug(&format!("Manifest at {}", outcome.manifest_path.display()));
        self.output_formatter.success("Consolidated load finished");

        report.branches = outcome.branches;
        report.manifest_path = Some(outcome.manifest_path);
        report.manifest_entries = outcome.manifest_entries;
        report.closing = outcome.closing;

        Ok(report.finish())
    }

    /// The plan for `date` plus the directories it would create; read-only.
    pub fn plan(&self, date: &RunDate) -> Result<(PipelinePlan, Vec<PathBuf>)> {
        let directories = DirectoryProvisioner::new(&self.config)
            .planned_directories(date)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        let sources = enumerate_sources(&self.config)?;
        let plan = PipelinePlan::build(&self.config, date, sources)?;
        Ok((plan, directories))
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        task::spawn_blocking(f)
            .await
            .map_err(|e| DailyFlowError::Io(std::io::Error::other(e)))?
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &DailyFlowError) {
        self.progress_manager.clear();
        self.output_formatter.print_user_friendly_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_tree() -> (TempDir, Config) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("data/postgres-northwind/categories")).unwrap();
        fs::create_dir_all(root.join("data/postgres-northwind/orders")).unwrap();
        fs::create_dir_all(root.join("data/csv/order_details")).unwrap();
        fs::create_dir_all(root.join("indicium-challenge")).unwrap();

        let mut config = Config::default();
        config.paths.root = Some(root.to_path_buf());
        config.tool.program = "true".to_string();
        config.retry.delay = 0;
        (temp_dir, config)
    }

    fn date() -> RunDate {
        RunDate::parse("2024-06-01").unwrap()
    }

    #[tokio::test]
    async fn test_missing_root_fails_before_anything() {
        let flow = DailyFlow::new_for_test(Config::default(), OutputMode::Plain, 0, true);
        let err = flow.run(&date(), RunMode::Full).await.unwrap_err();
        assert!(matches!(err, DailyFlowError::MissingRoot));
    }

    #[tokio::test]
    async fn test_provision_only() {
        let (temp_dir, config) = setup_tree();
        let flow = DailyFlow::new_for_test(config, OutputMode::Plain, 0, true);

        let report = flow.run(&date(), RunMode::ProvisionOnly).await.unwrap();

        assert_eq!(report.provisioned.len(), 3);
        assert_eq!(
            report.sources,
            vec![
                "csv/order_details",
                "postgres-northwind/categories",
                "postgres-northwind/orders"
            ]
        );
        assert!(report.manifest_path.is_none());
        assert!(!temp_dir.path().join("indicium-challenge/config.json").exists());
    }

    #[tokio::test]
    async fn test_skip_tools_is_idempotent() {
        let (temp_dir, config) = setup_tree();
        let flow = DailyFlow::new_for_test(config, OutputMode::Plain, 0, true);
        let manifest = temp_dir.path().join("indicium-challenge/config.json");

        let first = flow.run(&date(), RunMode::SkipTools).await.unwrap();
        let first_manifest = fs::read(&manifest).unwrap();
        let second = flow.run(&date(), RunMode::SkipTools).await.unwrap();

        assert_eq!(first.directories_created(), 3);
        assert_eq!(second.directories_created(), 0);
        assert_eq!(fs::read(&manifest).unwrap(), first_manifest);
        assert_eq!(second.manifest_entries, 3);
        assert_eq!(second.tool_invocations(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_run() {
        let (temp_dir, config) = setup_tree();
        let flow = DailyFlow::new_for_test(config, OutputMode::Plain, 0, true);

        let report = flow.run(&date(), RunMode::Full).await.unwrap();

        assert_eq!(report.branches.len(), 3);
        assert_eq!(report.closing.len(), 2);
        assert_eq!(report.tool_invocations(), 8);
        let entries = ManifestWriter::new(temp_dir.path().join("indicium-challenge/config.json"))
            .load()
            .unwrap();
        assert_eq!(entries[0], ManifestEntry::new("order_details", "../data/csv/order_details/2024-06-01"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_run_consolidates_after_manifest() {
        let (temp_dir, mut config) = setup_tree();
        let log_path = temp_dir.path().join("calls.log");
        // Records each call; the consolidated load fails unless the manifest
        // is already in the project directory.
        config.tool.program = "sh".to_string();
        config.tool.extra_args = vec![
            "-c".to_string(),
            format!(
                "echo \"$*\" >> '{}'; [ \"$*\" != 'run tap-destinos target-postgres' ] || [ -f config.json ]",
                log_path.display()
            ),
            "tool".to_string(),
        ];
        config.retry.retries = 0;
        let flow = DailyFlow::new_for_test(config, OutputMode::Plain, 0, true);

        let report = flow.run(&date(), RunMode::Full).await.unwrap();

        let calls = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = calls.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(
            &lines[6..],
            &[
                "config tap-destinos set csv_files_definition config.json",
                "run tap-destinos target-postgres",
            ]
        );
        assert_eq!(report.manifest_entries, 3);
        assert_eq!(report.closing.len(), 2);
    }

    #[test]
    fn test_plan_has_no_side_effects() {
        let (temp_dir, config) = setup_tree();
        let flow = DailyFlow::new_for_test(config, OutputMode::Plain, 0, true);

        let (plan, directories) = flow.plan(&date()).unwrap();

        assert_eq!(directories.len(), 3);
        assert_eq!(plan.branches.len(), 3);
        assert!(!temp_dir.path().join("data/csv/order_details/2024-06-01").exists());
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        DailyFlow::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[tool]"));
        assert!(Config::load_from_file(&config_path).is_ok());
    }

    #[test]
    fn test_shutdown_handling() {
        let flow = DailyFlow::new_for_test(Config::default(), OutputMode::Human, 0, true);
        assert!(flow.is_running());

        flow.request_shutdown();
        assert!(!flow.is_running());
    }
}
