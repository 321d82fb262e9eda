//! Background agent sessions and their persistence

mod file_store;
mod store;
mod types;

pub use file_store::JsonFileSessionStore;
pub use store::{InMemorySessionStore, SessionStore, SharedSessionStore};
pub use types::{AgentSession, AgentStatus, SessionPatch};
