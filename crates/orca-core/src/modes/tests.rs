use super::*;
use crate::tools::base::ToolError;
use crate::tools::types::{ToolCall, ToolResult, ToolSchema};
use async_trait::async_trait;

struct StubTool {
    name: &'static str,
    read_only: bool,
    category: ToolCategory,
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name, "stub", vec![])
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::success(&call.id, self.name, "ok"))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn category(&self) -> ToolCategory {
        self.category
    }
}

fn stub(name: &'static str, read_only: bool, category: ToolCategory) -> StubTool {
    StubTool {
        name,
        read_only,
        category,
    }
}

#[test]
fn test_plan_mode_only_read_only() {
    let read = stub("Read", true, ToolCategory::FileRead);
    let edit = stub("Edit", false, ToolCategory::FileEdit);
    assert!(PermissionMode::Plan.allows_tool(&read));
    assert!(!PermissionMode::Plan.allows_tool(&edit));
    assert!(PermissionMode::Default.allows_tool(&edit));
}

#[test]
fn test_spec_mode_adds_workflow_tools() {
    let update = stub("UpdateSpec", false, ToolCategory::Other);
    let custom = stub("DraftSpec", false, ToolCategory::Spec);
    let bash = stub("Bash", false, ToolCategory::Shell);
    assert!(PermissionMode::Spec.allows_tool(&update));
    assert!(PermissionMode::Spec.allows_tool(&custom));
    assert!(!PermissionMode::Spec.allows_tool(&bash));
    assert!(!PermissionMode::Plan.allows_tool(&update));
}

#[test]
fn test_auto_approval() {
    let edit = stub("Edit", false, ToolCategory::FileEdit);
    let bash = stub("Bash", false, ToolCategory::Shell);
    assert!(PermissionMode::AutoEdit.auto_approves(&edit));
    assert!(!PermissionMode::AutoEdit.auto_approves(&bash));
    assert!(PermissionMode::Yolo.auto_approves(&bash));
    assert!(!PermissionMode::Default.auto_approves(&edit));
}

#[test]
fn test_parse_round_trip() {
    for mode in [
        PermissionMode::Default,
        PermissionMode::AutoEdit,
        PermissionMode::Yolo,
        PermissionMode::Plan,
        PermissionMode::Spec,
    ] {
        assert_eq!(mode.to_string().parse::<PermissionMode>().unwrap(), mode);
    }
    assert_eq!("auto-edit".parse::<PermissionMode>().unwrap(), PermissionMode::AutoEdit);
    assert!("turbo".parse::<PermissionMode>().is_err());
}
