//! Write tool — create or overwrite a file.

use crate::environment::Environment;
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct WriteTool {
    environment: Arc<dyn Environment>,
}

impl WriteTool {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }
}

#[async_trait::async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories if needed. \
         Overwrites the file if it exists. Prefer edit_file for modifications."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(path) = args.get("file_path").or(args.get("path")).and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required parameter: file_path");
        };
        let Some(content) = args["content"].as_str() else {
            return ToolResult::error("Missing required parameter: content");
        };

        match self.environment.write_file(path, content.as_bytes()).await {
            Ok(()) => {
                debug!(%path, bytes = content.len(), "write_file");
                ToolResult::text(format!("Wrote {} bytes to {}", content.len(), path))
            }
            Err(e) => ToolResult::error(format!("Failed to write: {e}")),
        }
    }
}
