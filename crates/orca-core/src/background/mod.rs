//! Background agents
//!
//! A background agent is a full loop run detached from the interactive turn.
//! Its session is persisted through the session store; its live handle sits in
//! an in-memory running table until the run settles.

mod handle;
mod manager;


pub use handle::{BackgroundAgentOptions, BackgroundTaskHandle};
pub use manager::BackgroundAgentManager;
