//! Edit tool — find and replace exact strings in files.

use crate::environment::Environment;
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct EditTool {
    environment: Arc<dyn Environment>,
}

impl EditTool {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }
}

#[async_trait::async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing an exact string match. The old_string must appear \
         exactly once in the file. Use replace_all to replace all occurrences."
    }

    fn prompt(&self) -> &str {
        "Always read a file before editing it. The old_string must match exactly \
         including whitespace and indentation."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(path) = args.get("file_path").or(args.get("path")).and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required parameter: file_path");
        };
        let Some(old) = args["old_string"].as_str() else {
            return ToolResult::error("Missing required parameter: old_string");
        };
        let Some(new) = args["new_string"].as_str() else {
            return ToolResult::error("Missing required parameter: new_string");
        };
        let replace_all = args["replace_all"].as_bool().unwrap_or(false);

        let bytes = match self.environment.read_file(path, None, None).await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("Failed to read file: {e}")),
        };
        let content = String::from_utf8_lossy(&bytes).into_owned();

        if !content.contains(old) {
            return ToolResult::error("old_string not found in file");
        }

        let new_content = if replace_all {
            content.replace(old, new)
        } else {
            let count = content.matches(old).count();
            if count > 1 {
                return ToolResult::error(format!(
                    "old_string found {count} times — must be unique. Use replace_all or provide more context."
                ));
            }
            content.replacen(old, new, 1)
        };

        match self.environment.write_file(path, new_content.as_bytes()).await {
            Ok(()) => {
                debug!(%path, "edit_file");
                ToolResult::text(format!("Edited {path}"))
            }
            Err(e) => ToolResult::error(format!("Failed to write: {e}")),
        }
    }
}
