use crate::model::MAX_DURATION;
use std::time::Duration;
use tokio::time::Instant;

/// Cycles informational strings while the operator waits.
#[derive(Debug)]
pub(crate) struct FactRotator {
    interval: Duration,
    facts: Vec<String>,
    index: usize,
    next_rotation: Option<Instant>,
}

impl FactRotator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.min(MAX_DURATION),
            facts: Vec::new(),
            index: 0,
            next_rotation: None,
        }
    }

    /// Returns false (and stays stopped) when there is nothing to show.
    pub fn start(&mut self, facts: Vec<String>, now: Instant) -> bool {
        self.stop();
        if facts.is_empty() {
            self.facts.clear();
            return false;
        }
        self.facts = facts;
        self.index = 0;
        self.next_rotation = Some(now + self.interval);
        true
    }

    pub fn stop(&mut self) {
        self.next_rotation = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_rotation
    }

    pub fn rotate(&mut self) -> Option<&str> {
        if let Some(at) = self.next_rotation {
            self.index = (self.index + 1) % self.facts.len();
            self.next_rotation = Some(at + self.interval);
        }
        self.current()
    }

    pub fn current(&self) -> Option<&str> {
        self.next_rotation?;
        self.facts.get(self.index).map(String::as_str)
    }
}
