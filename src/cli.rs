use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::pipeline::RunMode;
use crate::run_date::RunDate;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dailyflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the daily ETL cycle for one date")]
#[command(
    long_about = "dailyflow creates the dated output directories, extracts every data source \
                  with the ETL tool, writes the consolidation manifest and loads the result \
                  into the relational database."
)]
#[command(after_help = "EXAMPLES:\n  \
    dailyflow --root /srv/etl\n  \
    dailyflow --root /srv/etl --date 2024-06-01 --verbose\n  \
    dailyflow --config dailyflow.toml --dry-run\n  \
    dailyflow --root /srv/etl --skip-tools")]
pub struct Cli {
    /// Run date used as the directory name (defaults to today, YYYY-MM-DD)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Root directory holding data/ and the tool project
    #[arg(short, long, env = "DAILYFLOW_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// ETL tool executable
    #[arg(long, help = "ETL tool executable (default: meltano)")]
    pub program: Option<String>,

    /// Retries per tool invocation
    #[arg(long, help = "Retries per failed tool invocation")]
    pub retries: Option<u32>,

    /// Seconds between retries
    #[arg(long, help = "Seconds to wait between retries")]
    pub retry_delay: Option<u64>,

    /// Maximum number of source branches running at once
    #[arg(long, help = "Maximum number of sources extracted concurrently")]
    pub max_parallel: Option<usize>,

    /// Per-invocation timeout in seconds
    #[arg(long, help = "Timeout for each tool invocation (seconds)")]
    pub timeout: Option<u64>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Stop after provisioning directories and listing sources
    #[arg(long, conflicts_with_all = ["skip_tools", "dry_run"])]
    pub provision_only: bool,

    /// Provision, list sources and write the manifest without running the tool
    #[arg(long, conflicts_with = "dry_run")]
    pub skip_tools: bool,

    /// Show what would be done without executing
    #[arg(long, help = "Print the directories, sources and commands without running them")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<&OutputFormat> for OutputMode {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_root(self.root.clone())
            .with_program(self.program.clone())
            .with_retries(self.retries)
            .with_retry_delay(self.retry_delay)
            .with_max_parallel(self.max_parallel)
            .with_timeout(self.timeout)
    }

    pub fn run_date(&self) -> Result<RunDate> {
        match self.date {
            Some(ref date) => RunDate::parse(date),
            None => Ok(RunDate::today()),
        }
    }

    pub fn run_mode(&self) -> RunMode {
        if self.provision_only {
            RunMode::ProvisionOnly
        } else if self.skip_tools {
            RunMode::SkipTools
        } else {
            RunMode::Full
        }
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Default `env_logger` filter when RUST_LOG is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "dailyflow=error";
        }
        match self.verbose {
            0 => "dailyflow=warn",
            1 => "dailyflow=info",
            2 => "dailyflow=debug",
            _ => "dailyflow=trace",
        }
    }
}
