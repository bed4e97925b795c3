pub mod hooks;
pub mod tool;

pub use hooks::{new_hook_registry, HookHandler, HookRegistry, HookResult, SharedHookRegistry};
pub use tool::{EditFileTool, ReadFileTool, RunShellTool, Tool, ToolRegistry, ToolResult, ToolSchema, WriteFileTool};
