//! Tool execution pipeline
//!
//! Every invocation goes through VALIDATE, an optional CONFIRM, EXECUTE and
//! POSTPROCESS. Failures at any stage become a failed
//! [`ToolExecutionResult`] instead of an error, so the loop can hand them back
//! to the model.

mod context;
mod executor;
mod history;
mod result;
mod stats;


pub use context::ExecutionContext;
pub use executor::{SharedToolPipeline, ToolExecutionPipeline, truncate_output};
pub use history::ExecutionHistory;
pub use result::{FailureKind, ToolExecutionResult};
pub use stats::PipelineStats;
