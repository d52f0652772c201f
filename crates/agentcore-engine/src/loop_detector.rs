//! Loop detector — flags a tool-call round that is repeating without making progress.
//!
//! Sliding window of `(tool_name, arg_fingerprint)` pairs, using the same
//! `VecDeque`-as-sliding-window style used elsewhere in this crate.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, VecDeque};
use std::hash::{Hash, Hasher};

pub const DEFAULT_WINDOW: usize = 10;

pub struct LoopDetector {
    window: VecDeque<(String, String)>,
    capacity: usize,
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl LoopDetector {
    pub fn new(capacity: usize) -> Self {
        Self { window: VecDeque::with_capacity(capacity), capacity }
    }

    /// Stable fingerprint of a tool call's arguments: sort keys lexicographically, then hash.
    pub fn fingerprint(args: &serde_json::Value) -> String {
        let sorted: BTreeMap<String, serde_json::Value> = args
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        serde_json::to_string(&sorted).unwrap_or_default().hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }

    pub fn record(&mut self, tool_name: &str, fingerprint: &str) {
        self.window.push_back((tool_name.to_string(), fingerprint.to_string()));
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Examines the window and returns a warning, preferring the longest matching pattern.
    pub fn check(&self) -> Option<String> {
        self.check_pattern_3().or_else(|| self.check_pattern_2()).or_else(|| self.check_pattern_1())
    }

    fn last_n(&self, n: usize) -> Option<Vec<&(String, String)>> {
        if self.window.len() < n {
            return None;
        }
        Some(self.window.iter().skip(self.window.len() - n).collect())
    }

    /// Repeating triple: the last 9 entries are a 3-entry pattern repeated 3 times.
    fn check_pattern_3(&self) -> Option<String> {
        let last9 = self.last_n(9)?;
        let triple = &last9[0..3];
        if last9[3..6] == *triple && last9[6..9] == *triple {
            let desc = triple.iter().map(|(n, f)| format!("{n}:{f}")).collect::<Vec<_>>().join(" -> ");
            return Some(format!("repeating pattern detected: {desc}"));
        }
        None
    }

    /// Alternating pair: the last 6 entries are a 2-entry pattern (A,B) repeated 3 times.
    fn check_pattern_2(&self) -> Option<String> {
        let last6 = self.last_n(6)?;
        let pair = &last6[0..2];
        if pair[0] == pair[1] {
            return None;
        }
        if last6[2..4] == *pair && last6[4..6] == *pair {
            let a = format!("{}:{}", pair[0].0, pair[0].1);
            let b = format!("{}:{}", pair[1].0, pair[1].1);
            return Some(format!("alternating pattern detected: {a}\u{2194}{b}"));
        }
        None
    }

    /// Single repeat: the last >= 5 entries are all identical.
    fn check_pattern_1(&self) -> Option<String> {
        if self.window.len() < 5 {
            return None;
        }
        let last = self.window.back()?;
        let run = self.window.iter().rev().take_while(|e| *e == last).count();
        if run >= 5 {
            return Some(format!("{}:{} repeated {} times", last.0, last.1, run));
        }
        None
    }
}
