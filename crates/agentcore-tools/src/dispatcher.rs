//! Tool Dispatcher: executes a batch of pending tool calls against a registry.
//!
//! A struct holding the shared registry and environment, using `futures::future::join_all`
//! for the parallel path (kept ordering without extra bookkeeping) and a plain sequential
//! loop otherwise.

use crate::environment::Environment;
use crate::registry::{ToolRegistry, ToolResult};
use agentcore_types::{PendingToolCall, ToolCallResult};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    #[allow(dead_code)]
    environment: Arc<dyn Environment>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, environment: Arc<dyn Environment>) -> Self {
        Self { registry, environment }
    }

    /// Dispatches `calls` and returns results in the same order, one per input call. Tool
    /// failures never propagate as an `Err` — they come back as an error-flagged result so
    /// the caller can feed them straight back to the model.
    pub async fn dispatch(&self, calls: &[PendingToolCall], parallel: bool, cancel: CancellationToken) -> Vec<ToolCallResult> {
        if parallel {
            self.dispatch_parallel(calls, cancel).await
        } else {
            self.dispatch_sequential(calls, cancel).await
        }
    }

    async fn dispatch_sequential(&self, calls: &[PendingToolCall], cancel: CancellationToken) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_one(call, cancel.clone()).await);
        }
        results
    }

    async fn dispatch_parallel(&self, calls: &[PendingToolCall], cancel: CancellationToken) -> Vec<ToolCallResult> {
        let futures = calls.iter().map(|call| self.execute_one(call, cancel.clone()));
        join_all(futures).await
    }

    async fn execute_one(&self, call: &PendingToolCall, cancel: CancellationToken) -> ToolCallResult {
        let Some(_tool) = self.registry.get(&call.name) else {
            let available = self.registry.list().join(", ");
            return ToolCallResult::error(&call.id, format!("Unknown tool: {}. Available tools: {available}", call.name));
        };
        if !call.args.is_object() {
            return ToolCallResult::error(&call.id, format!("Invalid tool arguments for {}", call.name));
        }

        let result = self.registry.execute_cancellable(&call.name, call.args.clone(), cancel).await;
        to_call_result(&call.id, call, result)
    }
}

fn to_call_result(id: &str, call: &PendingToolCall, result: ToolResult) -> ToolCallResult {
    let content = result.to_content_string();
    if result.is_error() {
        ToolCallResult::error(id, format!("Tool error in {}: {content}", call.name))
    } else {
        ToolCallResult::ok(id, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::LocalEnvironment;
    use crate::registry::Tool;
    use serde_json::Value;

    struct OkTool;

    #[async_trait::async_trait]
    impl Tool for OkTool {
        fn name(&self) -> &str {
            "ok_tool"
        }
        fn description(&self) -> &str {
            "always succeeds"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::Json(args)
        }
    }

    fn make_dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(OkTool);
        let env: Arc<dyn Environment> = Arc::new(LocalEnvironment::new(std::env::temp_dir()));
        Dispatcher::new(Arc::new(registry), env)
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_same_id() {
        let dispatcher = make_dispatcher();
        let calls = vec![PendingToolCall { id: "1".into(), name: "missing".into(), args: serde_json::json!({}) }];
        let results = dispatcher.dispatch(&calls, false, CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");
        assert!(results[0].is_error);
        assert!(results[0].output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn invalid_args_yields_error_result() {
        let dispatcher = make_dispatcher();
        let calls = vec![PendingToolCall { id: "1".into(), name: "ok_tool".into(), args: serde_json::json!("not an object") }];
        let results = dispatcher.dispatch(&calls, false, CancellationToken::new()).await;
        assert!(results[0].is_error);
        assert!(results[0].output.contains("Invalid tool arguments"));
    }

    #[tokio::test]
    async fn parallel_preserves_order() {
        let dispatcher = make_dispatcher();
        let calls: Vec<_> = (0..5)
            .map(|i| PendingToolCall { id: i.to_string(), name: "ok_tool".into(), args: serde_json::json!({"i": i}) })
            .collect();
        let results = dispatcher.dispatch(&calls, true, CancellationToken::new()).await;
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.id, i.to_string());
            assert!(!result.is_error);
        }
    }

    #[tokio::test]
    async fn sequential_same_length_and_order_as_input() {
        let dispatcher = make_dispatcher();
        let calls: Vec<_> = (0..3)
            .map(|i| PendingToolCall { id: format!("c{i}"), name: "ok_tool".into(), args: serde_json::json!({}) })
            .collect();
        let results = dispatcher.dispatch(&calls, false, CancellationToken::new()).await;
        assert_eq!(results.len(), calls.len());
        for (call, result) in calls.iter().zip(results.iter()) {
            assert_eq!(call.id, result.id);
        }
    }
}
