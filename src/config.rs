use crate::error::{DailyFlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub tool: ToolConfig,
    pub retry: RetryConfig,
    pub execution: ExecutionConfig,
}

/// Directory layout under the run root.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: Option<PathBuf>,
    pub data_dir: String,
    pub csv_target: String,
    pub table_source: String,
    pub project_dir: String,
    pub manifest_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    pub extra_args: Vec<String>,
    pub tap_prefix: String,
    pub target_prefix: String,
    pub destination_key: String,
    pub consolidation_tap: String,
    pub consolidation_target: String,
    pub manifest_key: String,
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub delay: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_parallel: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: None,
            data_dir: "data".to_string(),
            csv_target: "csv/order_details".to_string(),
            table_source: "postgres-northwind".to_string(),
            project_dir: "indicium-challenge".to_string(),
            manifest_file: "config.json".to_string(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "meltano".to_string(),
            extra_args: Vec::new(),
            tap_prefix: "tap-".to_string(),
            target_prefix: "target-".to_string(),
            destination_key: "destination_path".to_string(),
            consolidation_tap: "tap-destinos".to_string(),
            consolidation_target: "target-postgres".to_string(),
            manifest_key: "csv_files_definition".to_string(),
            timeout: 3600, // 1 hour per invocation
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: 300, // 5 minutes
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_parallel: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DailyFlowError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DailyFlowError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| DailyFlowError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["dailyflow.toml", "dailyflow.config.toml", ".dailyflow.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref root) = cli_args.root {
            self.paths.root = Some(root.clone());
        }

        if let Some(ref program) = cli_args.program {
            self.tool.program = program.clone();
        }

        if let Some(retries) = cli_args.retries {
            self.retry.retries = retries;
        }

        if let Some(delay) = cli_args.retry_delay {
            self.retry.delay = delay;
        }

        if let Some(max_parallel) = cli_args.max_parallel {
            self.execution.max_parallel = max_parallel;
        }

        if let Some(timeout) = cli_args.timeout {
            self.tool.timeout = timeout;
        }
    }

    /// Checks the settings that do not depend on the filesystem.
    ///
    /// A missing root is reported separately by [`Config::root`] so that
    /// `--generate-config` and `--dry-run` can still inspect everything else.
    pub fn validate(&self) -> Result<()> {
        if self.tool.program.trim().is_empty() {
            return Err(DailyFlowError::Config {
                message: "Tool program must not be empty".to_string(),
            });
        }

        if self.tool.timeout == 0 {
            return Err(DailyFlowError::Config {
                message: "Tool timeout must be greater than 0".to_string(),
            });
        }

        if self.execution.max_parallel == 0 {
            return Err(DailyFlowError::Config {
                message: "max_parallel must be greater than 0".to_string(),
            });
        }

        for (name, value) in [
            ("data_dir", &self.paths.data_dir),
            ("csv_target", &self.paths.csv_target),
            ("table_source", &self.paths.table_source),
            ("project_dir", &self.paths.project_dir),
            ("manifest_file", &self.paths.manifest_file),
        ] {
            if value.trim().is_empty() {
                return Err(DailyFlowError::Config {
                    message: format!("paths.{} must not be empty", name),
                });
            }
        }

        Ok(())
    }

    /// The resolved root directory; absence is fatal for the whole run.
    pub fn root(&self) -> Result<&Path> {
        self.paths
            .root
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(DailyFlowError::MissingRoot)
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        Ok(self.root()?.join(&self.paths.data_dir))
    }

    pub fn csv_target_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(&self.paths.csv_target))
    }

    pub fn table_source_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(&self.paths.table_source))
    }

    pub fn project_path(&self) -> Result<PathBuf> {
        Ok(self.root()?.join(&self.paths.project_dir))
    }

    pub fn manifest_path(&self) -> Result<PathBuf> {
        Ok(self.project_path()?.join(&self.paths.manifest_file))
    }

    pub fn tool_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.tool.timeout)
    }

    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_secs(self.retry.delay)
    }

    pub fn create_sample_config() -> String {
        let mut sample_config = Self::default();
        sample_config.paths.root = Some(PathBuf::from("/srv/etl"));
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub root: Option<PathBuf>,
    pub program: Option<String>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub max_parallel: Option<usize>,
    pub timeout: Option<u64>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    pub fn with_program(mut self, program: Option<String>) -> Self {
        self.program = program;
        self
    }

    pub fn with_retries(mut self, retries: Option<u32>) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Option<u64>) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.paths.root.is_none());
        assert_eq!(config.tool.program, "meltano");
        assert_eq!(config.retry.retries, 2);
        assert_eq!(config.retry.delay, 300);
        assert!(config.execution.max_parallel > 0);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(matches!(config.root(), Err(DailyFlowError::MissingRoot)));
        assert!(matches!(config.manifest_path(), Err(DailyFlowError::MissingRoot)));
    }

    #[test]
    fn test_derived_paths() {
        let mut config = Config::default();
        config.paths.root = Some(PathBuf::from("/srv/etl"));

        assert_eq!(
            config.csv_target_path().unwrap(),
            PathBuf::from("/srv/etl/data/csv/order_details")
        );
        assert_eq!(
            config.table_source_path().unwrap(),
            PathBuf::from("/srv/etl/data/postgres-northwind")
        );
        assert_eq!(
            config.manifest_path().unwrap(),
            PathBuf::from("/srv/etl/indicium-challenge/config.json")
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.tool.timeout = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.execution.max_parallel = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.paths.data_dir = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.paths.root = Some(PathBuf::from("/srv/etl"));
        config.retry.retries = 5;
        let temp_file = NamedTempFile::new().unwrap();

        std::fs::write(temp_file.path(), toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.retry.retries, 5);
        assert_eq!(loaded_config.paths.root, Some(PathBuf::from("/srv/etl")));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "[paths]\nroot = \"/data/etl\"\n\n[retry]\nretries = 0\n",
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.paths.root, Some(PathBuf::from("/data/etl")));
        assert_eq!(config.paths.table_source, "postgres-northwind");
        assert_eq!(config.retry.retries, 0);
        assert_eq!(config.retry.delay, 300);
        assert_eq!(config.tool.consolidation_target, "target-postgres");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_root(Some(PathBuf::from("/tmp/run")))
            .with_retries(Some(0))
            .with_timeout(Some(60));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.root().unwrap(), Path::new("/tmp/run"));
        assert_eq!(config.retry.retries, 0);
        assert_eq!(config.tool.timeout, 60);
        assert_eq!(config.tool.program, "meltano");
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[paths]"));
        assert!(sample.contains("[tool]"));
        assert!(sample.contains("[retry]"));
        assert!(sample.contains("[execution]"));
    }
}
