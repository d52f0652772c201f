//! Truncation pipeline — a two-stage clamp applied to a tool result before it re-enters
//! history. The full, untruncated output is always what already went to the event channel;
//! this module only affects what the model sees on its next turn.
//!
//! Grounded on the flat, ad-hoc 30000-char cutoff that used to live inline in
//! `agentcore-tools::tools::bash::format_output`; generalized here into a standalone,
//! per-tool-configurable pipeline. That inline cutoff has been removed from `bash.rs` — this
//! module is now the only place truncation happens.

use agentcore_types::{ToolLimits, ToolLimitsTable, TruncationMode};

/// The registered tool name for the shell runner is `bash`, not `shell` — kept consistent
/// with `agentcore_tools::create_default_registry`'s actual registration name.
pub fn default_limits() -> ToolLimitsTable {
    let mut table = ToolLimitsTable::new();
    table.insert("read_file".into(), ToolLimits { char_limit: 50_000, mode: TruncationMode::HeadTail, line_limit: None });
    table.insert("bash".into(), ToolLimits { char_limit: 30_000, mode: TruncationMode::HeadTail, line_limit: Some(256) });
    table.insert("grep".into(), ToolLimits { char_limit: 20_000, mode: TruncationMode::Tail, line_limit: Some(200) });
    table.insert("glob".into(), ToolLimits { char_limit: 20_000, mode: TruncationMode::Tail, line_limit: Some(500) });
    table.insert("edit_file".into(), ToolLimits { char_limit: 10_000, mode: TruncationMode::Tail, line_limit: None });
    table.insert("apply_patch".into(), ToolLimits { char_limit: 10_000, mode: TruncationMode::Tail, line_limit: None });
    table.insert("write_file".into(), ToolLimits { char_limit: 1_000, mode: TruncationMode::Tail, line_limit: None });
    table.insert("spawn_agent".into(), ToolLimits { char_limit: 20_000, mode: TruncationMode::HeadTail, line_limit: None });
    table
}

/// Applies the two-stage clamp for `tool_name` to `output`, using `table`'s entry for it (or
/// leaving it unchanged if the tool has no configured limits).
pub fn truncate(output: &str, tool_name: &str, table: &ToolLimitsTable) -> String {
    let Some(limits) = table.get(tool_name) else {
        return output.to_string();
    };
    let stage1 = clamp_chars(output, limits.char_limit, limits.mode);
    match limits.line_limit {
        Some(max_lines) => clamp_lines(&stage1, max_lines),
        None => stage1,
    }
}

fn clamp_chars(text: &str, max_chars: usize, mode: TruncationMode) -> String {
    let len = text.chars().count();
    if len <= max_chars {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let removed = len - max_chars;
    match mode {
        TruncationMode::HeadTail => {
            let half = max_chars / 2;
            let head: String = chars[..half].iter().collect();
            let tail: String = chars[len - half..].iter().collect();
            format!(
                "{head}\n\n[WARNING: Tool output was truncated. {removed} characters were removed from the middle. The full output is available in the event stream.]\n\n{tail}"
            )
        }
        TruncationMode::Tail => {
            let tail: String = chars[len - max_chars..].iter().collect();
            format!(
                "[WARNING: Tool output was truncated. First {removed} characters were removed. The full output is available in the event stream.]\n\n{tail}"
            )
        }
    }
}

fn clamp_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    let removed = lines.len() - max_lines;
    let half = max_lines / 2;
    let head = lines[..half].join("\n");
    let tail = lines[lines.len() - half..].join("\n");
    format!("{head}\n[WARNING: Tool output was truncated. {removed} lines were removed from the middle.]\n{tail}")
}
