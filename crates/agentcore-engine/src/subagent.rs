//! Subagent map and the `SubagentRuntime` bridge — lets `agentcore_tools`'s spawn/wait/
//! send_input/close_agent tools drive a child `Session` without the tools crate depending on
//! this one.

use crate::session::Session;
use agentcore_tools::{SubagentRuntime, SubagentWaitResult};
use agentcore_types::SessionEvent;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One tracked child: the session plus whatever `wait()` has learned about it so far.
/// `result` is filled in the first time `wait()` drains the child to `SessionEnd`, so a
/// second `wait()` on the same id returns the cached outcome instead of erroring.
#[derive(Default)]
struct SubagentHandle {
    session: Option<Arc<Session>>,
    result: Option<SubagentWaitResult>,
}

/// Tracks `{id -> child session + cached wait result}` for one parent. `close_all` is used
/// by the parent's `abort()` to cascade.
#[derive(Default)]
pub struct SubagentMap {
    handles: RwLock<HashMap<String, SubagentHandle>>,
}

impl SubagentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: impl Into<String>, session: Arc<Session>) {
        self.handles.write().await.insert(id.into(), SubagentHandle { session: Some(session), result: None });
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.handles.read().await.get(id).and_then(|h| h.session.clone())
    }

    /// Returns a previously cached `wait()` result for `id`, if any.
    pub async fn cached_result(&self, id: &str) -> Option<SubagentWaitResult> {
        self.handles.read().await.get(id).and_then(|h| h.result.clone())
    }

    /// Stores the outcome of the first `wait()` call on `id` so later calls can reuse it.
    pub async fn store_result(&self, id: &str, result: SubagentWaitResult) {
        if let Some(handle) = self.handles.write().await.get_mut(id) {
            handle.result = Some(result);
        }
    }

    pub async fn close_all(&self) {
        let handles: Vec<Arc<Session>> = self.handles.read().await.values().filter_map(|h| h.session.clone()).collect();
        for child in handles {
            child.abort().await;
        }
    }
}

#[async_trait::async_trait]
impl SubagentRuntime for Session {
    async fn spawn(
        &self,
        id: &str,
        instruction: &str,
        model: Option<String>,
        max_turns: Option<usize>,
    ) -> Result<(), String> {
        if self.depth() >= self.config().max_subagent_depth {
            return Err(format!(
                "subagent depth exceeded: max depth {}",
                self.config().max_subagent_depth
            ));
        }
        if self.subagents().get(id).await.is_some() {
            return Err(format!("subagent '{id}' already exists"));
        }

        let mut child_config = self.config().clone();
        if let Some(m) = model {
            child_config.model = m;
        }
        if let Some(mt) = max_turns {
            child_config.max_turns = mt;
        }

        let child = Session::new(child_config, self.environment(), self.client(), self.depth() + 1).await;
        self.subagents().insert(id, child.clone()).await;

        let instruction = instruction.to_string();
        tokio::spawn(async move {
            let _ = child.submit(&instruction).await;
            // The delegated instruction is a one-shot turn, not an interactive session — once
            // it resolves the child has nothing left to do, so close it so `wait()` observes
            // `SessionEnd` instead of blocking on a child that will never emit again.
            child.abort().await;
        });

        Ok(())
    }

    async fn send_input(&self, id: &str, message: &str) -> Result<(), String> {
        let child = self.subagents().get(id).await.ok_or_else(|| format!("unknown subagent '{id}'"))?;
        child.submit(message).await.map_err(|e| e.to_string())
    }

    async fn wait(&self, id: &str) -> Result<SubagentWaitResult, String> {
        if let Some(cached) = self.subagents().cached_result(id).await {
            return Ok(cached);
        }

        let child = self.subagents().get(id).await.ok_or_else(|| format!("unknown subagent '{id}'"))?;
        let mut stream = child.subscribe().ok_or_else(|| format!("subagent '{id}' already waited on"))?;

        let mut output = String::new();
        let mut success = true;
        while let Some(event) = stream.next().await {
            match event {
                Ok(SessionEvent::AssistantTextDelta { text }) => output.push_str(&text),
                Ok(SessionEvent::Error { .. }) | Ok(SessionEvent::LoopDetection { .. }) | Ok(SessionEvent::TurnLimit { .. }) => {
                    success = false;
                }
                Ok(SessionEvent::SessionEnd { .. }) => break,
                Err(_) => {
                    success = false;
                    break;
                }
                _ => {}
            }
        }

        let turns_used = child.history().await.iter().filter(|t| matches!(t, agentcore_types::Turn::User { .. })).count();
        let result = SubagentWaitResult { output, success, turns_used };
        self.subagents().store_result(id, result.clone()).await;
        Ok(result)
    }

    async fn close(&self, id: &str) -> Result<(), String> {
        let child = self.subagents().get(id).await.ok_or_else(|| format!("unknown subagent '{id}'"))?;
        child.abort().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_map_has_no_handles() {
        let map = SubagentMap::new();
        assert!(map.get("missing").await.is_none());
    }
}
