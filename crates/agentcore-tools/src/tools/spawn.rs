//! Subagent tools — `spawn_agent`, `send_input`, `wait`, `close_agent`.
//!
//! A parent session registers these four tools on its own registry, each closing over the
//! same `RuntimeHandle`. The handle is a trait object implemented by the session-owning crate
//! (whatever constructs `Session`), so this crate never depends on the concrete session type.

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a completed (or aborted) subagent run, as seen by `wait`.
#[derive(Debug, Clone)]
pub struct SubagentWaitResult {
    pub output: String,
    pub success: bool,
    pub turns_used: usize,
}

/// Implemented by the session-owning crate. One instance is shared by all four tools and
/// closes over the parent's environment, client, profile, config, and current depth.
#[async_trait::async_trait]
pub trait SubagentRuntime: Send + Sync {
    /// Spawns a child session under `id` and submits `instruction` without awaiting
    /// completion. Fails if the parent is already at `MAX_SUBAGENT_DEPTH`, or `id` is taken.
    async fn spawn(
        &self,
        id: &str,
        instruction: &str,
        model: Option<String>,
        max_turns: Option<usize>,
    ) -> Result<(), String>;

    /// Forwards `message` to a running child and awaits its `submit` to return.
    async fn send_input(&self, id: &str, message: &str) -> Result<(), String>;

    /// Drains the child's event sequence until `SessionEnd`, concatenating assistant text.
    async fn wait(&self, id: &str) -> Result<SubagentWaitResult, String>;

    /// Aborts the child and marks its handle closed.
    async fn close(&self, id: &str) -> Result<(), String>;
}

/// Shared handle to the runtime, set after the owning `Session` is constructed — breaks the
/// circular dependency (the session needs the tools registered, the tools need the session).
pub type RuntimeHandle = Arc<RwLock<Option<Arc<dyn SubagentRuntime>>>>;

pub fn new_runtime_handle() -> RuntimeHandle {
    Arc::new(RwLock::new(None))
}

async fn runtime(handle: &RuntimeHandle) -> Result<Arc<dyn SubagentRuntime>, ToolResult> {
    handle
        .read()
        .await
        .as_ref()
        .cloned()
        .ok_or_else(|| ToolResult::error("Subagent runtime not initialized"))
}

pub struct SpawnAgentTool {
    runtime: RuntimeHandle,
}

impl SpawnAgentTool {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }
}

#[async_trait::async_trait]
impl Tool for SpawnAgentTool {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn description(&self) -> &str {
        "Spawn a child subagent with its own conversation, identified by an id you choose. \
         The child runs independently — use wait to collect its output."
    }

    fn prompt(&self) -> &str {
        "Use spawn_agent to delegate a scoped, independent task. Give it a short unique id \
         and a clear instruction; the child discovers its own context by reading files. \
         Follow with wait{id} to collect the result."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["id", "instruction"],
            "properties": {
                "id": {"type": "string", "description": "Unique identifier for this subagent"},
                "instruction": {"type": "string", "description": "What the subagent should do"},
                "model": {"type": "string", "description": "Override the model for this subagent"},
                "max_turns": {"type": "integer", "description": "Override the max turn count for this subagent"}
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(id) = args["id"].as_str() else {
            return ToolResult::error("Missing required parameter: id");
        };
        let Some(instruction) = args["instruction"].as_str() else {
            return ToolResult::error("Missing required parameter: instruction");
        };
        let model = args["model"].as_str().map(str::to_string);
        let max_turns = args["max_turns"].as_u64().map(|n| n as usize);

        let rt = match runtime(&self.runtime).await {
            Ok(rt) => rt,
            Err(e) => return e,
        };

        match rt.spawn(id, instruction, model, max_turns).await {
            Ok(()) => ToolResult::Json(json!({"success": true, "message": format!("Subagent {id} spawned")})),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct SendInputTool {
    runtime: RuntimeHandle,
}

impl SendInputTool {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }
}

#[async_trait::async_trait]
impl Tool for SendInputTool {
    fn name(&self) -> &str {
        "send_input"
    }

    fn description(&self) -> &str {
        "Send a follow-up message to a running subagent identified by id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["id", "message"],
            "properties": {
                "id": {"type": "string"},
                "message": {"type": "string"}
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(id) = args["id"].as_str() else {
            return ToolResult::error("Missing required parameter: id");
        };
        let Some(message) = args["message"].as_str() else {
            return ToolResult::error("Missing required parameter: message");
        };

        let rt = match runtime(&self.runtime).await {
            Ok(rt) => rt,
            Err(e) => return e,
        };

        match rt.send_input(id, message).await {
            Ok(()) => ToolResult::Json(json!({"success": true})),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct WaitTool {
    runtime: RuntimeHandle,
}

impl WaitTool {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }
}

#[async_trait::async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Block until the subagent identified by id finishes its current turn, \
         returning its accumulated output."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["id"],
            "properties": {"id": {"type": "string"}}
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(id) = args["id"].as_str() else {
            return ToolResult::error("Missing required parameter: id");
        };

        let rt = match runtime(&self.runtime).await {
            Ok(rt) => rt,
            Err(e) => return e,
        };

        match rt.wait(id).await {
            Ok(result) => ToolResult::Json(json!({
                "output": result.output,
                "success": result.success,
                "turns_used": result.turns_used,
            })),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct CloseAgentTool {
    runtime: RuntimeHandle,
}

impl CloseAgentTool {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }
}

#[async_trait::async_trait]
impl Tool for CloseAgentTool {
    fn name(&self) -> &str {
        "close_agent"
    }

    fn description(&self) -> &str {
        "Abort the subagent identified by id and release its handle."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["id"],
            "properties": {"id": {"type": "string"}}
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(id) = args["id"].as_str() else {
            return ToolResult::error("Missing required parameter: id");
        };

        let rt = match runtime(&self.runtime).await {
            Ok(rt) => rt,
            Err(e) => return e,
        };

        match rt.close(id).await {
            Ok(()) => ToolResult::Json(json!({"success": true})),
            Err(e) => ToolResult::error(e),
        }
    }
}
