//! Bounded execution history

use parking_lot::Mutex;
use std::collections::VecDeque;

use super::result::ToolExecutionResult;

/// Ring buffer of recent executions; the oldest entry is evicted first
#[derive(Debug)]
pub struct ExecutionHistory {
    capacity: usize,
    entries: Mutex<VecDeque<ToolExecutionResult>>,
}

impl ExecutionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn record(&self, result: ToolExecutionResult) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    /// Oldest-first copy of the buffer
    pub fn snapshot(&self) -> Vec<ToolExecutionResult> {
        self.entries.lock().iter().cloned().collect()
    }

    /// The `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<ToolExecutionResult> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
