//! Steering queue — two FIFOs for messages injected outside the normal request/response turn.
//!
//! Only the owning Session's task ever touches these, so no locking.

use std::collections::VecDeque;

#[derive(Default)]
pub struct SteeringQueue {
    steering: VecDeque<String>,
    follow_up: VecDeque<String>,
}

impl SteeringQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message to be injected mid-session, before the next request is built.
    pub fn steer(&mut self, message: impl Into<String>) {
        self.steering.push_back(message.into());
    }

    /// Queues a message to be submitted after the current input finishes processing.
    pub fn follow_up(&mut self, message: impl Into<String>) {
        self.follow_up.push_back(message.into());
    }

    pub fn has_steering(&self) -> bool {
        !self.steering.is_empty()
    }

    pub fn has_follow_up(&self) -> bool {
        !self.follow_up.is_empty()
    }

    /// Destructively drains the steering queue in FIFO order.
    pub fn drain_steering(&mut self) -> Vec<String> {
        std::mem::take(&mut self.steering).into_iter().collect()
    }

    /// Destructively drains the follow-up queue in FIFO order.
    pub fn drain_follow_up(&mut self) -> Vec<String> {
        std::mem::take(&mut self.follow_up).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_is_fifo_and_destructive() {
        let mut q = SteeringQueue::new();
        q.steer("a");
        q.steer("b");
        assert!(q.has_steering());
        assert_eq!(q.drain_steering(), vec!["a".to_string(), "b".to_string()]);
        assert!(!q.has_steering());
        assert!(q.drain_steering().is_empty());
    }

    #[test]
    fn follow_up_independent_of_steering() {
        let mut q = SteeringQueue::new();
        q.follow_up("later");
        assert!(!q.has_steering());
        assert!(q.has_follow_up());
        assert_eq!(q.drain_follow_up(), vec!["later".to_string()]);
        assert!(!q.has_follow_up());
    }
}
