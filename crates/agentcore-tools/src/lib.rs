//! Agentcore Tools — modular tool implementations
//!
//! Each tool is a self-contained file in src/tools/.
//! To add a tool: create the file, implement Tool trait, register below.
//! To remove a tool: delete the file, remove from mod.rs and registry below.

pub mod dispatcher;
pub mod environment;
pub mod registry;
pub mod tools;

pub use dispatcher::Dispatcher;
pub use environment::{Environment, LocalEnvironment};
pub use registry::{Tool, ToolRegistry, ToolResult};
pub use tools::spawn::{RuntimeHandle, SubagentRuntime, SubagentWaitResult};

use std::path::Path;
use std::sync::Arc;

/// Create a runtime handle for the subagent tools. Call this before creating the registry,
/// then set the runtime after constructing the owning Session.
pub fn create_runtime_handle() -> RuntimeHandle {
    tools::spawn::new_runtime_handle()
}

/// Create the default tool registry with all builtin tools, backed by a `LocalEnvironment`
/// rooted at `workspace_root`.
pub fn create_default_registry(workspace_root: impl AsRef<Path>) -> ToolRegistry {
    create_default_registry_with_spawn(workspace_root, create_runtime_handle())
}

/// Create registry with a shared runtime handle for the subagent tools.
/// After constructing the owning Session, set `runtime_handle.write().await = Some(session)`.
pub fn create_default_registry_with_spawn(
    workspace_root: impl AsRef<Path>,
    runtime_handle: RuntimeHandle,
) -> ToolRegistry {
    let environment: Arc<dyn Environment> = Arc::new(LocalEnvironment::new(workspace_root.as_ref()));
    create_default_registry_with_environment(environment, runtime_handle)
}

/// Create registry against an already-constructed environment (e.g. a fake for tests).
pub fn create_default_registry_with_environment(
    environment: Arc<dyn Environment>,
    runtime_handle: RuntimeHandle,
) -> ToolRegistry {
    create_default_registry_with_environment_and_timeout(environment, runtime_handle, None)
}

/// Same as `create_default_registry_with_environment`, but overrides the bash tool's default
/// command timeout (seconds) when `Some` — threads `SessionConfig::default_command_timeout`.
pub fn create_default_registry_with_environment_and_timeout(
    environment: Arc<dyn Environment>,
    runtime_handle: RuntimeHandle,
    default_command_timeout_secs: Option<u64>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(tools::read::ReadTool::new(environment.clone()));
    registry.register(tools::glob::GlobTool::new(environment.clone()));
    registry.register(tools::grep::GrepTool::new(environment.clone()));
    registry.register(tools::write::WriteTool::new(environment.clone()));
    registry.register(tools::edit::EditTool::new(environment.clone()));
    let bash_tool = match default_command_timeout_secs {
        Some(secs) => tools::bash::BashTool::with_default_timeout(environment, secs),
        None => tools::bash::BashTool::new(environment),
    };
    registry.register(bash_tool);

    registry.register(tools::spawn::SpawnAgentTool::new(runtime_handle.clone()));
    registry.register(tools::spawn::SendInputTool::new(runtime_handle.clone()));
    registry.register(tools::spawn::WaitTool::new(runtime_handle.clone()));
    registry.register(tools::spawn::CloseAgentTool::new(runtime_handle));

    registry
}

/// Create a policy-scoped tool registry.
///
/// Only registers tools whose names appear in `allowed_tools`.
/// Used by operator containers to enforce policy at the tool registration level.
/// If a tool isn't registered, the LLM never sees it and can't call it.
pub fn create_policy_registry(
    workspace_root: impl AsRef<Path>,
    runtime_handle: RuntimeHandle,
    allowed_tools: &[&str],
) -> ToolRegistry {
    let environment: Arc<dyn Environment> = Arc::new(LocalEnvironment::new(workspace_root.as_ref()));
    let mut registry = ToolRegistry::new();

    for name in allowed_tools {
        match *name {
            "read_file" => registry.register(tools::read::ReadTool::new(environment.clone())),
            "glob" => registry.register(tools::glob::GlobTool::new(environment.clone())),
            "grep" => registry.register(tools::grep::GrepTool::new(environment.clone())),
            "write_file" => registry.register(tools::write::WriteTool::new(environment.clone())),
            "edit_file" => registry.register(tools::edit::EditTool::new(environment.clone())),
            "bash" => registry.register(tools::bash::BashTool::new(environment.clone())),
            "spawn_agent" => registry.register(tools::spawn::SpawnAgentTool::new(runtime_handle.clone())),
            "send_input" => registry.register(tools::spawn::SendInputTool::new(runtime_handle.clone())),
            "wait" => registry.register(tools::spawn::WaitTool::new(runtime_handle.clone())),
            "close_agent" => registry.register(tools::spawn::CloseAgentTool::new(runtime_handle.clone())),
            _ => tracing::warn!("Unknown tool in policy: {}", name),
        }
    }

    registry
}
