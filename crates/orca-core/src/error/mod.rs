//! Error types for the Orca orchestration core
//!
//! Every error implements [`UnifiedError`], which gives callers a stable
//! error code and a retryability flag regardless of which component failed.
//!
//! Failures that belong to a single tool call (validation, denial, runtime
//! failure) never escape the pipeline as `Err`; they are folded into a failed
//! `ToolExecutionResult`. The variants here cover everything else.

mod constructors;
mod types;
mod unified_error;

pub use types::{OrcaError, OrcaResult, UnifiedError};
