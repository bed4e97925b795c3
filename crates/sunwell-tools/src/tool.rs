use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::fs;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::hooks::SharedHookRegistry;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    pub output: String,
    pub metadata: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult>;
    async fn execute_with_cancel(
        &self,
        args: Value,
        _cancel: CancellationToken,
    ) -> anyhow::Result<ToolResult> {
        self.execute(args).await
    }
}

/// Rejects absolute paths and `..` traversal, then requires the
/// resolved path stay under `workspace_root`. Every file tool runs
/// paths through this before touching disk.
fn is_path_allowed(workspace_root: &Path, path: &str) -> bool {
    let raw = Path::new(path);
    if raw.is_absolute() {
        return false;
    }
    if raw.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return false;
    }
    workspace_root.join(raw).starts_with(workspace_root)
}

pub struct ReadFileTool {
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".to_string(),
            description: "Read a file's contents".to_string(),
            input_schema: json!({"type":"object","properties":{"path":{"type":"string"}}}),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let path = args["path"].as_str().unwrap_or("");
        if !is_path_allowed(&self.workspace_root, path) {
            return Ok(ToolResult {
                output: "path denied: outside workspace".to_string(),
                metadata: json!({"path": path}),
            });
        }
        let data = fs::read_to_string(self.workspace_root.join(path)).await?;
        Ok(ToolResult {
            output: data,
            metadata: json!({}),
        })
    }
}

pub struct WriteFileTool {
    workspace_root: PathBuf,
    hooks: SharedHookRegistry,
}

impl WriteFileTool {
    pub fn new(workspace_root: PathBuf, hooks: SharedHookRegistry) -> Self {
        Self { workspace_root, hooks }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write_file".to_string(),
            description: "Write a file's contents, creating parent directories as needed".to_string(),
            input_schema: json!({"type":"object","properties":{"path":{"type":"string"},"content":{"type":"string"}}}),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let path = args["path"].as_str().unwrap_or("");
        let content = args["content"].as_str().unwrap_or("");
        if !is_path_allowed(&self.workspace_root, path) {
            return Ok(ToolResult {
                output: "path denied: outside workspace".to_string(),
                metadata: json!({"path": path}),
            });
        }

        let hooks = self.hooks.read().await;
        if hooks.run_before_file_write(path, content).await.is_none() {
            return Ok(ToolResult {
                output: "write blocked by hook".to_string(),
                metadata: json!({"path": path}),
            });
        }

        let full_path = self.workspace_root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, content).await?;
        hooks.fire_on_file_write(path, content.len()).await;

        Ok(ToolResult {
            output: "ok".to_string(),
            metadata: json!({"path": path, "bytes_written": content.len()}),
        })
    }
}

pub struct EditFileTool {
    workspace_root: PathBuf,
    hooks: SharedHookRegistry,
}

impl EditFileTool {
    pub fn new(workspace_root: PathBuf, hooks: SharedHookRegistry) -> Self {
        Self { workspace_root, hooks }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "edit_file".to_string(),
            description: "Replace one occurrence of old text with new text in a file".to_string(),
            input_schema: json!({"type":"object","properties":{"path":{"type":"string"},"old":{"type":"string"},"new":{"type":"string"}}}),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let path = args["path"].as_str().unwrap_or("");
        let old = args["old"].as_str().unwrap_or("");
        let new = args["new"].as_str().unwrap_or("");
        if !is_path_allowed(&self.workspace_root, path) {
            return Ok(ToolResult {
                output: "path denied: outside workspace".to_string(),
                metadata: json!({"path": path}),
            });
        }

        let full_path = self.workspace_root.join(path);
        let content = fs::read_to_string(&full_path).await?;
        if content.matches(old).count() != 1 {
            return Ok(ToolResult {
                output: format!("expected exactly one match for old text, found {}", content.matches(old).count()),
                metadata: json!({"path": path}),
            });
        }
        let updated = content.replacen(old, new, 1);

        let hooks = self.hooks.read().await;
        if hooks.run_before_file_write(path, &updated).await.is_none() {
            return Ok(ToolResult {
                output: "edit blocked by hook".to_string(),
                metadata: json!({"path": path}),
            });
        }

        fs::write(&full_path, &updated).await?;
        hooks.fire_on_file_write(path, updated.len()).await;

        Ok(ToolResult {
            output: "ok".to_string(),
            metadata: json!({"path": path}),
        })
    }
}

pub struct RunShellTool {
    workspace_root: PathBuf,
}

impl RunShellTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for RunShellTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "run_shell".to_string(),
            description: "Run a shell command from the workspace root".to_string(),
            input_schema: json!({"type":"object","properties":{"command":{"type":"string"}}}),
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let cmd = args["command"].as_str().unwrap_or("");
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.workspace_root)
            .output()
            .await?;
        Ok(ToolResult {
            output: String::from_utf8_lossy(&output.stdout).to_string(),
            metadata: json!({
                "stderr": String::from_utf8_lossy(&output.stderr),
                "exit_code": output.status.code(),
            }),
        })
    }

    async fn execute_with_cancel(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> anyhow::Result<ToolResult> {
        let cmd = args["command"].as_str().unwrap_or("");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.workspace_root)
            .spawn()?;

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Ok(ToolResult {
                    output: "command cancelled".to_string(),
                    metadata: json!({"cancelled": true}),
                });
            }
            result = child.wait() => result?
        };
        Ok(ToolResult {
            output: format!("command exited: {status}"),
            metadata: json!({}),
        })
    }
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn for_workspace(workspace_root: PathBuf, hooks: SharedHookRegistry) -> Self {
        let mut map: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        map.insert("read_file".to_string(), Arc::new(ReadFileTool::new(workspace_root.clone())));
        map.insert(
            "write_file".to_string(),
            Arc::new(WriteFileTool::new(workspace_root.clone(), hooks.clone())),
        );
        map.insert(
            "edit_file".to_string(),
            Arc::new(EditFileTool::new(workspace_root.clone(), hooks)),
        );
        map.insert("run_shell".to_string(), Arc::new(RunShellTool::new(workspace_root)));
        Self {
            tools: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn list(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.read().await.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<ToolResult> {
        let tools = self.tools.read().await;
        let Some(tool) = tools.get(name) else {
            return Ok(ToolResult {
                output: format!("unknown tool: {name}"),
                metadata: json!({}),
            });
        };
        tool.execute(args).await
    }

    pub async fn execute_with_cancel(
        &self,
        name: &str,
        args: Value,
        cancel: CancellationToken,
    ) -> anyhow::Result<ToolResult> {
        let tools = self.tools.read().await;
        let Some(tool) = tools.get(name) else {
            return Ok(ToolResult {
                output: format!("unknown tool: {name}"),
                metadata: json!({}),
            });
        };
        tool.execute_with_cancel(args, cancel).await
    }
}
