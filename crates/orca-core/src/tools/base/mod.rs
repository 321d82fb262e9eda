//! Base tool capability interface

mod category;
mod error;
mod tool_trait;

pub use category::ToolCategory;
pub use error::ToolError;
pub use tool_trait::{SharedTool, Tool};
