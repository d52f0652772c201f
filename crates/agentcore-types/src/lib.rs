//! Agentcore Types - shared data model and error taxonomy for the agent session engine

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::*;
pub use types::*;
