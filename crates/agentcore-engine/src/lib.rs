//! Agentcore Engine — the Agent Loop and the `Session` that drives it.
//!
//! A `Session` owns its history, event emitter, loop detector, context tracker, steering
//! queue, abort controller, and subagent map; `agent_loop::process_input` is the think ->
//! call tools -> observe -> think state machine run on each `submit`.

pub mod agent_loop;
pub mod context;
pub mod events;
pub mod loop_detector;
pub mod steering;
pub mod subagent;
pub mod session;
pub mod truncation;

pub use context::ContextTracker;
pub use events::{AlreadyClosed, EventEmitter, EventStream};
pub use loop_detector::LoopDetector;
pub use session::{Session, SessionConfig};
pub use steering::SteeringQueue;
pub use subagent::SubagentMap;
