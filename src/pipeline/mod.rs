pub mod executor;
pub mod plan;
pub mod report;

pub use executor::{ExecutionOutcome, PipelineExecutor};
pub use plan::{PipelinePlan, SourceBranch, Step};
pub use report::{BranchReport, RunMode, RunReport, StepReport};
