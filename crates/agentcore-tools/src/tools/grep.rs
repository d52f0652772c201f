//! Grep tool — content search with regex support.

use crate::environment::{Environment, GrepOptions, GrepOutputMode};
use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct GrepTool {
    environment: Arc<dyn Environment>,
}

impl GrepTool {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }
}

#[async_trait::async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents using regex patterns. Returns matching file paths by default, \
         or matching lines with context. Use glob parameter to filter files."
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
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: workspace root)"
                },
                "glob": {
                    "type": "string",
                    "description": "Glob pattern to filter files (e.g. '*.rs', '*.{ts,tsx}')"
                },
                "output_mode": {
                    "type": "string",
                    "enum": ["files_with_matches", "content", "count"],
                    "description": "Output mode (default: files_with_matches)"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Case insensitive search (default: false)"
                },
                "context": {
                    "type": "integer",
                    "description": "Lines of context around matches (for content mode)"
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

        let output_mode = match args["output_mode"].as_str().unwrap_or("files_with_matches") {
            "content" => GrepOutputMode::Content,
            "count" => GrepOutputMode::Count,
            _ => GrepOutputMode::FilesWithMatches,
        };

        let opts = GrepOptions {
            glob: args["glob"].as_str().map(str::to_string),
            case_insensitive: args["case_insensitive"].as_bool().unwrap_or(false),
            output_mode,
            context_lines: args["context"].as_u64().unwrap_or(0) as usize,
        };

        match self.environment.grep(pattern, search_path, opts).await {
            Ok(results) if results.is_empty() => ToolResult::text("No matches found"),
            Ok(results) => {
                debug!(pattern, "grep");
                ToolResult::text(results)
            }
            Err(e) => ToolResult::error(format!("Invalid regex: {e}")),
        }
    }
}
