//! `Session` — identity, history, event emitter, trackers, and abort coordination for one
//! conversation. Persistence: none in-core; history lives in memory for the session's
//! lifetime.
//!
//! Owns the Loop Detector, Context Tracker, and Steering Queue directly (rather than
//! spreading them across a separate runtime type), matching the data model's ownership
//! table.

use crate::agent_loop::{self, LoopContext};
use crate::context::ContextTracker;
use crate::events::{self, EventEmitter, EventStream};
use crate::loop_detector::LoopDetector;
use crate::steering::SteeringQueue;
use crate::subagent::SubagentMap;
use agentcore_llm::{Client, LlmTool};
use agentcore_tools::{create_runtime_handle, Dispatcher, Environment, ToolRegistry};
use agentcore_types::{Error, Result, SessionEvent, SessionState, Turn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub provider: String,
    pub model: String,
    pub max_turns: usize,
    pub max_tool_rounds_per_input: usize,
    pub context_window_tokens: Option<usize>,
    pub context_threshold: f64,
    pub supports_parallel_tool_calls: bool,
    pub tool_limits: agentcore_types::ToolLimitsTable,
    pub max_subagent_depth: usize,
    pub system_prompt: Option<String>,
    /// Appended to the system prompt as a final, highest-priority instruction.
    pub user_instruction: Option<String>,
    /// Forwarded to the provider on every request, where supported.
    pub reasoning_effort: Option<agentcore_types::ReasoningEffort>,
    /// Overrides the bash tool's default command timeout (seconds) when `Some`.
    pub default_command_timeout: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: String::new(),
            max_turns: 100,
            max_tool_rounds_per_input: 10,
            context_window_tokens: Some(128_000),
            context_threshold: crate::context::DEFAULT_THRESHOLD,
            supports_parallel_tool_calls: true,
            tool_limits: crate::truncation::default_limits(),
            max_subagent_depth: 1,
            system_prompt: None,
            user_instruction: None,
            reasoning_effort: None,
            default_command_timeout: None,
        }
    }
}

pub struct Session {
    id: String,
    depth: usize,
    config: SessionConfig,
    environment: Arc<dyn Environment>,
    client: Arc<Client>,
    registry: Arc<ToolRegistry>,
    dispatcher: Dispatcher,
    subagents: SubagentMap,

    state: RwLock<SessionState>,
    history: RwLock<Vec<Turn>>,
    system_prompt: RwLock<Option<String>>,

    emitter: EventEmitter,
    stream: Mutex<Option<EventStream>>,

    steering: Mutex<SteeringQueue>,
    loop_detector: Mutex<LoopDetector>,
    tracker: Mutex<ContextTracker>,

    abort: CancellationToken,
    aborting: AtomicBool,
}

impl Session {
    pub async fn new(config: SessionConfig, environment: Arc<dyn Environment>, client: Arc<Client>, depth: usize) -> Arc<Self> {
        let runtime_handle = create_runtime_handle();
        let registry = Arc::new(agentcore_tools::create_default_registry_with_environment_and_timeout(
            environment.clone(),
            runtime_handle.clone(),
            config.default_command_timeout,
        ));
        let dispatcher = Dispatcher::new(registry.clone(), environment.clone());
        let (emitter, stream) = events::channel();
        let id = uuid::Uuid::new_v4().to_string();
        let system_prompt = config.system_prompt.clone();
        let context_window_tokens = config.context_window_tokens;
        let context_threshold = config.context_threshold;

        let session = Arc::new(Self {
            id: id.clone(),
            depth,
            config,
            environment,
            client,
            registry,
            dispatcher,
            subagents: SubagentMap::new(),
            state: RwLock::new(SessionState::Idle),
            history: RwLock::new(Vec::new()),
            system_prompt: RwLock::new(system_prompt),
            emitter,
            stream: Mutex::new(Some(stream)),
            steering: Mutex::new(SteeringQueue::new()),
            loop_detector: Mutex::new(LoopDetector::default()),
            tracker: Mutex::new(ContextTracker::with_threshold(context_window_tokens, context_threshold)),
            abort: CancellationToken::new(),
            aborting: AtomicBool::new(false),
        });

        *runtime_handle.write().await = Some(session.clone() as Arc<dyn agentcore_tools::SubagentRuntime>);
        let _ = session.emitter.emit(SessionEvent::SessionStart { session_id: id });
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn environment(&self) -> Arc<dyn Environment> {
        self.environment.clone()
    }

    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    pub fn subagents(&self) -> &SubagentMap {
        &self.subagents
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.history.read().await.clone()
    }

    /// Obtains the single consumer handle for this session's event stream. `None` if a
    /// consumer already subscribed.
    pub fn subscribe(&self) -> Option<EventStream> {
        self.stream.try_lock().ok().and_then(|mut guard| guard.take())
    }

    /// Queues a message injected mid-session, ahead of the next request built by the loop.
    pub async fn steer(&self, message: impl Into<String>) {
        self.steering.lock().await.steer(message);
    }

    /// Queues a message to be submitted once the current `submit` call finishes.
    pub async fn follow_up(&self, message: impl Into<String>) {
        self.steering.lock().await.follow_up(message);
    }

    /// Appends the user's input, runs the agent loop to completion, then drains and
    /// recursively submits any queued follow-ups. Fails fast with `SessionClosed` if the
    /// session is already closed.
    pub async fn submit(&self, input: &str) -> Result<()> {
        if self.state().await == SessionState::Closed {
            return Err(Error::SessionClosed);
        }

        {
            let mut history = self.history.write().await;
            history.push(Turn::User { text: input.to_string() });
        }
        self.tracker.lock().await.record(input.len());
        *self.state.write().await = SessionState::Processing;

        self.ensure_system_prompt().await;

        let result = self.run_loop().await;

        match result {
            Ok(()) => {
                if !self.abort.is_cancelled() {
                    *self.state.write().await = SessionState::Idle;
                }
                debug!(session_id = %self.id, "submit completed");

                let follow_ups = self.steering.lock().await.drain_follow_up();
                for msg in follow_ups {
                    if self.state().await == SessionState::Closed {
                        break;
                    }
                    Box::pin(self.submit(&msg)).await?;
                }
                Ok(())
            }
            Err(err) => {
                error!(session_id = %self.id, error = %err, "session closing on fatal error");
                *self.state.write().await = SessionState::Closed;
                if matches!(err, Error::ContextLength(_)) {
                    let _ = self.emitter.emit(SessionEvent::ContextWarning { fraction: 1.0 });
                }
                self.emitter.error(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_loop(&self) -> Result<()> {
        let mut history = self.history.write().await;
        let mut steering = self.steering.lock().await;
        let mut loop_detector = self.loop_detector.lock().await;
        let mut tracker = self.tracker.lock().await;
        let system_prompt = self.system_prompt.read().await.clone();

        let ctx = LoopContext {
            session_id: &self.id,
            client: self.client.as_ref(),
            dispatcher: &self.dispatcher,
            provider: &self.config.provider,
            model: &self.config.model,
            system_prompt: system_prompt.as_deref(),
            tool_defs: self.tool_definitions(),
            supports_parallel_tool_calls: self.config.supports_parallel_tool_calls,
            max_turns: self.config.max_turns,
            max_tool_rounds_per_input: self.config.max_tool_rounds_per_input,
            tool_limits: &self.config.tool_limits,
            reasoning_effort: self.config.reasoning_effort,
        };

        let emitter = self.emitter.clone();
        let emit = move |event: SessionEvent| {
            let _ = emitter.emit(event);
        };

        agent_loop::process_input(&ctx, &mut history, &mut steering, &mut loop_detector, &mut tracker, emit, &self.abort).await
    }

    fn tool_definitions(&self) -> Vec<LlmTool> {
        self.registry.definitions()
    }

    async fn ensure_system_prompt(&self) {
        let mut prompt = self.system_prompt.write().await;
        if prompt.is_some() {
            return;
        }
        let mut sections = Vec::new();
        if let Some(base) = &self.config.system_prompt {
            sections.push(base.clone());
        }
        sections.push(format!(
            "Working directory: {}\nPlatform: {}",
            self.environment.working_directory(),
            self.environment.platform()
        ));
        let tool_prompts = self.registry.combined_prompts();
        if !tool_prompts.is_empty() {
            sections.push(tool_prompts);
        }
        if let Some(instruction) = &self.config.user_instruction {
            sections.push(instruction.clone());
        }
        *prompt = Some(sections.join("\n\n"));
    }

    /// Idempotent. The first call cancels the inflight stream (and anything downstream
    /// inheriting the same `CancellationToken`), closes every subagent, moves to `Closed`,
    /// emits `SessionEnd`, and completes the event stream. Later calls are no-ops.
    pub async fn abort(&self) {
        if self.aborting.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(session_id = %self.id, "aborting session");
        self.abort.cancel();
        self.subagents.close_all().await;
        *self.state.write().await = SessionState::Closed;
        let _ = self.emitter.emit(SessionEvent::SessionEnd { session_id: self.id.clone() });
        self.emitter.complete();
    }
}
