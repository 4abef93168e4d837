pub mod command;
pub mod runner;

pub use command::{CommandFactory, ToolCommand};
pub use runner::{run_with_retry, AttemptReport, RetryPolicy, ToolOutput, ToolRunner};
