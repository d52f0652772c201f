//! Bash tool — execute shell commands with timeout and cancellation.

use crate::environment::{Environment, ExecOptions};
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct BashTool {
    environment: Arc<dyn Environment>,
    default_timeout_secs: u64,
}

impl BashTool {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment, default_timeout_secs: 120 }
    }

    pub fn with_default_timeout(environment: Arc<dyn Environment>, default_timeout_secs: u64) -> Self {
        Self { environment, default_timeout_secs }
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command. Use for git, npm, docker, system commands. \
         Captures stdout and stderr. Set timeout in seconds (default 120). \
         Include a short description of what the command does."
    }

    fn prompt(&self) -> &str {
        "Use the bash tool for terminal operations. Quote paths with spaces. \
         Prefer dedicated tools (read_file, write_file, edit_file, glob, grep) over bash equivalents."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 120, max 600)"
                },
                "description": {
                    "type": "string",
                    "description": "Short description of what this command does"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        self.execute_cancellable(args, CancellationToken::new()).await
    }

    /// Honours the Session's abort signal: `exec_command` races the child process against
    /// cancellation and kills it immediately on abort.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolResult {
        let Some(command) = args["command"].as_str() else {
            return ToolResult::error("Missing required parameter: command");
        };
        let timeout_secs = args["timeout"].as_u64().unwrap_or(self.default_timeout_secs).min(600);

        if let Some(desc) = args["description"].as_str() {
            debug!(desc, command = &command[..command.len().min(80)], "bash");
        } else {
            debug!(command = &command[..command.len().min(80)], "bash");
        }

        let opts = ExecOptions { timeout_ms: Some(timeout_secs * 1000), ..Default::default() };
        match self.environment.exec_command(command, opts, cancel).await {
            Ok(output) if output.timed_out => ToolResult::error(format!("Command timed out after {timeout_secs}s")),
            Ok(output) => format_output(&output),
            Err(e) => ToolResult::error(format!("Failed to execute: {e}")),
        }
    }
}

fn format_output(output: &crate::environment::ExecOutput) -> ToolResult {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();

    let result = if output.exit_code == 0 {
        if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{stdout}\n{stderr}")
        }
    } else {
        format!("Exit code: {}\n{stdout}\n{stderr}", output.exit_code)
    };

    if result.is_empty() {
        ToolResult::text("(no output)")
    } else {
        ToolResult::text(result)
    }
}
