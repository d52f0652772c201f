//! Tool registry and trait definitions.
//!
//! Each tool is a self-contained module implementing the `Tool` trait. Tools can be added
//! or removed by editing the `tools/` directory and the registry-factory functions in
//! `lib.rs`.

use agentcore_llm::LlmTool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Error(e) => format!("Error: {}", e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Implement this to add a new capability. Each tool is a standalone unit registered with
/// a `ToolRegistry`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "bash", "read_file", "glob").
    fn name(&self) -> &str;

    /// Human-readable description sent to the LLM.
    fn description(&self) -> &str;

    /// System prompt fragment for this tool (injected into LLM context).
    fn prompt(&self) -> &str {
        ""
    }

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Whether this tool only reads state (no side effects).
    fn is_read_only(&self) -> bool {
        false
    }

    /// Whether this tool is currently enabled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> ToolResult;

    /// Execute with cancellation support. Default: race `execute()` against cancellation.
    /// Tools that manage child processes (like `BashTool`) override this to kill the
    /// process on cancellation instead of leaving it orphaned.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolResult {
        tokio::select! {
            result = self.execute(args) => result,
            _ = cancel.cancelled() => ToolResult::text("[cancelled]"),
        }
    }

    /// Convert to the LLM tool definition format.
    fn to_llm_tool(&self) -> LlmTool {
        LlmTool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Name-keyed, last-writer-wins mapping from tool name to tool. Mutated only between turns
/// by the owning Session, so no internal locking.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Registers a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Registers an already-boxed tool (used by the subagent bridge, which needs to hand
    /// back an `Arc<dyn Tool>` it built itself).
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) if tool.is_enabled() => tool.execute(args).await,
            Some(_) => ToolResult::Error(format!("Tool '{}' is disabled", name)),
            None => ToolResult::Error(format!("Tool not found: {}", name)),
        }
    }

    pub async fn execute_cancellable(&self, name: &str, args: Value, cancel: CancellationToken) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) if tool.is_enabled() => tool.execute_cancellable(args, cancel).await,
            Some(_) => ToolResult::Error(format!("Tool '{}' is disabled", name)),
            None => ToolResult::Error(format!("Tool not found: {}", name)),
        }
    }

    /// LLM-facing tool definitions (schema view) for all enabled tools.
    pub fn definitions(&self) -> Vec<LlmTool> {
        self.tools.values().filter(|t| t.is_enabled()).map(|t| t.to_llm_tool()).collect()
    }

    /// System prompt fragments from all enabled tools.
    pub fn combined_prompts(&self) -> String {
        self.tools
            .values()
            .filter(|t| t.is_enabled())
            .map(|t| t.prompt())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn list_read_only(&self) -> Vec<&str> {
        self.tools.iter().filter(|(_, t)| t.is_read_only()).map(|(k, _)| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::Json(args)
        }
    }

    struct EchoToolV2;

    #[async_trait::async_trait]
    impl Tool for EchoToolV2 {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input, v2"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::Json(args)
        }
    }

    #[test]
    fn register_is_last_writer_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(EchoToolV2);
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "echoes input, v2");
    }

    #[test]
    fn unregister_removes_and_reports() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        assert!(registry.unregister("echo"));
        assert!(!registry.unregister("echo"));
        assert!(registry.get("echo").is_none());
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_error() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", serde_json::json!({})).await;
        assert!(result.is_error());
    }
}
