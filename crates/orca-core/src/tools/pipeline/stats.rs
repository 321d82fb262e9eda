//! Pipeline statistics

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::result::{FailureKind, ToolExecutionResult};

/// Execution counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub validation_failures: u64,
    pub permission_denials: u64,
    pub timeouts: u64,
    pub cancellations: u64,
    pub total_execution_time: Duration,
}

impl PipelineStats {
    pub(crate) fn record(&mut self, result: &ToolExecutionResult) {
        self.total_executions += 1;
        self.total_execution_time += result.duration;
        if result.success {
            self.successful_executions += 1;
            return;
        }
        self.failed_executions += 1;
        match result.failure {
            Some(FailureKind::Validation) => self.validation_failures += 1,
            Some(
                FailureKind::PermissionDenied
                | FailureKind::ConfirmationRefused
                | FailureKind::ModeRestricted,
            ) => self.permission_denials += 1,
            Some(FailureKind::Timeout) => self.timeouts += 1,
            Some(FailureKind::Cancelled) => self.cancellations += 1,
            _ => {}
        }
    }

    /// Fraction of executions that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.successful_executions as f64 / self.total_executions as f64
    }

    /// Mean execution time
    pub fn average_execution_time(&self) -> Duration {
        if self.total_executions == 0 {
            return Duration::ZERO;
        }
        self.total_execution_time / self.total_executions as u32
    }
}
