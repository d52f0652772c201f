//! Read tool — read file contents with optional offset/limit.

use crate::environment::Environment;
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct ReadTool {
    environment: Arc<dyn Environment>,
}

impl ReadTool {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }
}

#[async_trait::async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Returns numbered lines. Use offset/limit for large files."
    }

    fn prompt(&self) -> &str {
        "Use the read_file tool to view files. Read files before editing them."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read (default 2000)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(path) = args.get("file_path").or(args.get("path")).and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required parameter: file_path");
        };

        // Offset/limit are applied to the line-split content by the environment; the
        // cat -n style numbering stays here since it's display formatting, not I/O.
        let offset = args["offset"].as_u64().unwrap_or(1) as usize;
        let limit = args["limit"].as_u64().unwrap_or(2000) as usize;

        let bytes = match self.environment.read_file(path, Some(offset), Some(limit)).await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("Failed to read file: {e}")),
        };
        let content = String::from_utf8_lossy(&bytes);

        let result: Vec<String> = content
            .lines()
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", offset + i, line))
            .collect();

        debug!(%path, lines = result.len(), offset, "read_file");
        ToolResult::text(result.join("\n"))
    }
}
