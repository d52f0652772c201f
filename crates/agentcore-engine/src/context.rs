//! Context tracker — a threshold signal over an accumulating character count.
//!
//! Exposes a threshold-signal API (`record`/`check`/`reset`) rather than tracking full
//! message history for compaction; uses a 4 chars-per-token heuristic.

pub const CHARS_PER_TOKEN: f64 = 4.0;
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Estimates a token count from character count using the fixed 4x heuristic, rounding up.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as usize
}

pub struct ContextTracker {
    token_budget: Option<usize>,
    threshold: f64,
    chars: usize,
}

impl ContextTracker {
    pub fn new(token_budget: Option<usize>) -> Self {
        Self::with_threshold(token_budget, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(token_budget: Option<usize>, threshold: f64) -> Self {
        Self { token_budget, threshold, chars: 0 }
    }

    /// Adds `n` characters to the running count.
    pub fn record(&mut self, n: usize) {
        self.chars += n;
    }

    /// Returns `chars / (4 * budget)` once it reaches the threshold fraction, else `None`.
    /// Always `None` when no token budget was configured.
    pub fn check(&self) -> Option<f64> {
        let budget = self.token_budget?;
        if budget == 0 {
            return None;
        }
        let fraction = self.chars as f64 / (CHARS_PER_TOKEN * budget as f64);
        (fraction >= self.threshold).then_some(fraction)
    }

    pub fn reset(&mut self) {
        self.chars = 0;
    }
}
