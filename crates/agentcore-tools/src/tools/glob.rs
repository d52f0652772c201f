//! Glob tool — fast file pattern matching.

use crate::environment::Environment;
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct GlobTool {
    environment: Arc<dyn Environment>,
}

impl GlobTool {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }
}

#[async_trait::async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. Supports ** for recursive matching. \
         Returns file paths sorted by modification time (newest first)."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (e.g. '**/*.rs', 'src/**/*.ts')"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: workspace root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(pattern) = args["pattern"].as_str() else {
            return ToolResult::error("Missing required parameter: pattern");
        };
        let search_path = args["path"].as_str().unwrap_or(".");

        match self.environment.glob(pattern, search_path).await {
            Ok(matches) if matches.is_empty() => {
                debug!(pattern, "glob: no matches");
                ToolResult::text("No files found")
            }
            Ok(matches) => {
                debug!(pattern, count = matches.len(), "glob");
                ToolResult::text(matches.join("\n"))
            }
            Err(e) => ToolResult::error(format!("Invalid glob pattern: {e}")),
        }
    }
}
