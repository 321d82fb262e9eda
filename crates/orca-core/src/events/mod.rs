//! Lifecycle events for presentation layers
//!
//! The core publishes typed events on a broadcast channel and never depends on
//! who listens. Publishing with no subscribers is not an error.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::TerminationReason;
use crate::session::AgentStatus;

/// Lifecycle events emitted by the loop, the pipeline and the background manager
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// A loop turn is about to call the model
    TurnStarted { loop_id: String, turn: u32 },

    /// A tool execution passed validation and permission checks
    ToolStarted {
        execution_id: String,
        call_id: String,
        tool_name: String,
    },

    /// A tool execution succeeded
    ToolCompleted {
        execution_id: String,
        call_id: String,
        tool_name: String,
        duration_ms: u64,
    },

    /// A tool execution failed at any stage
    ToolFailed {
        execution_id: String,
        call_id: String,
        tool_name: String,
        error: String,
        retryable: bool,
    },

    /// The pipeline is waiting on the confirmation collaborator
    ConfirmationRequested {
        call_id: String,
        tool_name: String,
        signature: String,
    },

    /// The conversation was compacted before a model call
    Compacted {
        loop_id: String,
        pre_tokens: usize,
        post_tokens: usize,
        truncated: bool,
    },

    /// The loop reached a terminal state
    LoopTerminated {
        loop_id: String,
        reason: TerminationReason,
    },

    /// A background agent was launched
    BackgroundAgentStarted { agent_id: String, description: String },

    /// A background agent settled into a terminal status
    BackgroundAgentSettled { agent_id: String, status: AgentStatus },
}

impl LifecycleEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolCompleted { .. } => "tool_completed",
            Self::ToolFailed { .. } => "tool_failed",
            Self::ConfirmationRequested { .. } => "confirmation_requested",
            Self::Compacted { .. } => "compacted",
            Self::LoopTerminated { .. } => "loop_terminated",
            Self::BackgroundAgentStarted { .. } => "background_agent_started",
            Self::BackgroundAgentSettled { .. } => "background_agent_settled",
        }
    }
}

/// Event bus for lifecycle event distribution
///
/// Each subscriber receives a copy of every event published after it subscribed.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event, returning the number of subscribers that received it
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        tracing::trace!(event_type = event.event_type(), "publishing lifecycle event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    /// Create a default event bus with capacity of 256 events
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared handle to an event bus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new(16);
        let mut subscriber = bus.subscribe();

        let sent = bus.publish(LifecycleEvent::TurnStarted {
            loop_id: "l1".into(),
            turn: 1,
        });
        assert_eq!(sent, 1);

        match subscriber.recv().await.unwrap() {
            LifecycleEvent::TurnStarted { turn, .. } => assert_eq!(turn, 1),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::default();
        let sent = bus.publish(LifecycleEvent::LoopTerminated {
            loop_id: "l1".into(),
            reason: TerminationReason::Success,
        });
        assert_eq!(sent, 0);
        assert_eq!(bus.capacity(), 256);
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let bus = EventBus::new(8);
        let clone = bus.clone();
        let mut rx = bus.subscribe();
        clone.publish(LifecycleEvent::BackgroundAgentStarted {
            agent_id: "a".into(),
            description: "d".into(),
        });
        assert_eq!(rx.recv().await.unwrap().event_type(), "background_agent_started");
    }
}
