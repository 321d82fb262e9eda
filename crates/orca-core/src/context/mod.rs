//! Conversation compaction
//!
//! The summarisation algorithm lives behind the [`Compactor`] collaborator.
//! This module owns the trigger check and the naive truncation fallback the
//! loop uses when the collaborator fails.

mod compactor;
mod truncation;

pub use compactor::{
    CompactionOutcome, CompactionTrigger, Compactor, SUMMARY_PREFIX, SharedCompactor,
    needs_compaction,
};
pub use truncation::{TRUNCATION_NOTICE, truncate_naive};

#[cfg(test)]
pub(crate) use compactor::MockCompactor;
