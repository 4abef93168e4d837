use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DailyFlowError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filesystem operation failed on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Root directory is not configured")]
    MissingRoot,

    #[error("Invalid run date '{value}': {reason}")]
    InvalidRunDate { value: String, reason: String },

    #[error("Failed to write manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start `{command}`: {source}")]
    ToolSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}", describe_exit(*.code))]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    #[error("{} source branch(es) failed: {}", .failed.len(), .failed.join(", "))]
    BranchesFailed { failed: Vec<String> },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

impl DailyFlowError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DailyFlowError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            DailyFlowError::Cancelled => 130,
            DailyFlowError::InvalidRunDate { .. } | DailyFlowError::Config { .. } => 2,
            DailyFlowError::MissingRoot => 3,
            DailyFlowError::Io(_)
            | DailyFlowError::Filesystem { .. }
            | DailyFlowError::Manifest { .. } => 4,
            DailyFlowError::ToolSpawn { .. }
            | DailyFlowError::ToolFailed { .. }
            | DailyFlowError::BranchesFailed { .. } => 5,
            DailyFlowError::Timeout { .. } => 9,
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for DailyFlowError {
    fn user_message(&self) -> String {
        match self {
            DailyFlowError::Filesystem { path, source } => {
                format!("Filesystem error at {}: {}", path.display(), source)
            }
            DailyFlowError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            DailyFlowError::MissingRoot => {
                "No root directory configured for this run".to_string()
            }
            DailyFlowError::InvalidRunDate { value, reason } => {
                format!("Run date '{}' cannot be used: {}", value, reason)
            }
            DailyFlowError::Manifest { path, source } => {
                format!("Could not write manifest {}: {}", path.display(), source)
            }
            DailyFlowError::ToolSpawn { command, source } => {
                format!("Could not start {}: {}", command, source)
            }
            DailyFlowError::ToolFailed {
                command,
                code,
                stderr,
            } => {
                let mut message = format!("{} exited with {}", command, describe_exit(*code));
                if !stderr.is_empty() {
                    message.push('\n');
                    message.push_str(stderr);
                }
                message
            }
            DailyFlowError::BranchesFailed { failed } => {
                format!("Extraction failed for: {}", failed.join(", "))
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            DailyFlowError::MissingRoot => Some(
                "Pass --root, set DAILYFLOW_ROOT, or add `root` under [paths] in dailyflow.toml."
                    .to_string(),
            ),
            DailyFlowError::InvalidRunDate { .. } => Some(
                "Use a single path segment such as 2024-06-01 for --date.".to_string(),
            ),
            DailyFlowError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present."
                    .to_string(),
            ),
            DailyFlowError::Filesystem { .. } | DailyFlowError::Manifest { .. } => Some(
                "Check that the root directory layout exists and is writable.".to_string(),
            ),
            DailyFlowError::ToolSpawn { .. } => Some(
                "Make sure the ETL tool is installed and on PATH, or set --program.".to_string(),
            ),
            DailyFlowError::ToolFailed { .. } | DailyFlowError::BranchesFailed { .. } => Some(
                "Inspect the tool output above; rerun the same date once the cause is fixed."
                    .to_string(),
            ),
            DailyFlowError::Timeout { .. } => Some(
                "Increase the per-invocation limit with --timeout.".to_string(),
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for DailyFlowError {
    fn from(error: toml::de::Error) -> Self {
        DailyFlowError::Config {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for DailyFlowError {
    fn from(error: serde_json::Error) -> Self {
        DailyFlowError::Io(error.into())
    }
}

pub type Result<T> = std::result::Result<T, DailyFlowError>;

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = DailyFlowError::MissingRoot;
        assert!(error.user_message().contains("root directory"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_tool_failure_message_includes_stderr() {
        let error = DailyFlowError::ToolFailed {
            command: "meltano run tap-orders target-orders".to_string(),
            code: Some(1),
            stderr: "plugin not found".to_string(),
        };
        let message = error.user_message();
        assert!(message.contains("status 1"));
        assert!(message.contains("plugin not found"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DailyFlowError::Cancelled.exit_code(), 130);
        assert_eq!(DailyFlowError::MissingRoot.exit_code(), 3);
        let fs = DailyFlowError::filesystem(
            "/nope",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(fs.exit_code(), 4);
        let failed = DailyFlowError::BranchesFailed {
            failed: vec!["csv/order_details".to_string()],
        };
        assert_eq!(failed.exit_code(), 5);
        assert!(failed.to_string().contains("1 source branch(es)"));
    }

    #[test]
    fn test_signal_exit_description() {
        assert_eq!(describe_exit(None), "no status (terminated by signal)");
        assert_eq!(describe_exit(Some(2)), "status 2");
    }
}
