use crate::config::{Config, ToolConfig};
use crate::error::Result;
use crate::run_date::RunDate;
use crate::scanner::Source;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// One invocation of the external ETL tool.
///
/// Arguments are handed to the process as-is, never through a shell, so
/// source names and dates with spaces or quotes stay single arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ToolCommand {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(program: S, cwd: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for ToolCommand {
    /// Shell-quoted preview, for logs and dry runs only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Builds the four kinds of tool invocation a run needs.
pub struct CommandFactory {
    tool: ToolConfig,
    data_dir: String,
    manifest_file: String,
    project_path: PathBuf,
}

impl CommandFactory {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            tool: config.tool.clone(),
            data_dir: config.paths.data_dir.clone(),
            manifest_file: config.paths.manifest_file.clone(),
            project_path: config.project_path()?,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Where a source's output lands, relative to the tool project directory.
    pub fn destination(&self, source: &Source, date: &RunDate) -> String {
        format!("../{}/{}/{}", self.data_dir, source.id(), date)
    }

    pub fn configure_destination(&self, source: &Source, date: &RunDate) -> ToolCommand {
        self.base()
            .arg("config")
            .arg(format!("{}{}", self.tool.target_prefix, source.entity()))
            .arg("set")
            .arg(&self.tool.destination_key)
            .arg(self.destination(source, date))
    }

    pub fn extract_load(&self, source: &Source) -> ToolCommand {
        self.base()
            .arg("run")
            .arg(format!("{}{}", self.tool.tap_prefix, source.entity()))
            .arg(format!("{}{}", self.tool.target_prefix, source.entity()))
    }

    pub fn configure_manifest(&self) -> ToolCommand {
        self.base()
            .arg("config")
            .arg(&self.tool.consolidation_tap)
            .arg("set")
            .arg(&self.tool.manifest_key)
            .arg(&self.manifest_file)
    }

    pub fn consolidate(&self) -> ToolCommand {
        self.base()
            .arg("run")
            .arg(&self.tool.consolidation_tap)
            .arg(&self.tool.consolidation_target)
    }

    fn base(&self) -> ToolCommand {
        ToolCommand::new(&self.tool.program, &self.project_path).args(self.tool.extra_args.clone())
    }
}
