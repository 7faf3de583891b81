use crate::model::MAX_DURATION;
use std::time::Duration;
use tokio::time::Instant;

/// Elapsed-seconds counter for display while a run is active.
#[derive(Debug)]
pub(crate) struct StageClock {
    interval: Duration,
    elapsed_seconds: u64,
    next_tick: Option<Instant>,
}

impl StageClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.min(MAX_DURATION),
            elapsed_seconds: 0,
            next_tick: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.elapsed_seconds = 0;
        self.next_tick = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Record one tick; ignored once stopped.
    pub fn tick(&mut self) -> u64 {
        if let Some(at) = self.next_tick {
            self.elapsed_seconds += 1;
            self.next_tick = Some(at + self.interval);
        }
        self.elapsed_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_until_stopped() {
        let now = Instant::now();
        let mut clock = StageClock::new(Duration::from_secs(1));
        assert_eq!(clock.deadline(), None);

        clock.start(now);
        assert_eq!(clock.deadline(), Some(now + Duration::from_secs(1)));
        clock.tick();
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.deadline(), Some(now + Duration::from_secs(3)));

        clock.stop();
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.deadline(), None);

        clock.start(now);
        assert_eq!(clock.elapsed_seconds(), 0);
    }
}
