use crate::model::{Stage, StageStatus, SyncConfig, MAX_DURATION};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::time::Duration;
use tokio::time::Instant;

/// Dwell times are clamped to this floor so a stage is always visible, and to
/// [`MAX_DURATION`] above.
pub(crate) const MIN_STAGE_DWELL: Duration = Duration::from_millis(50);

/// Outcome of a sequencer deadline firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequencerStep {
    /// Stage statuses changed.
    Advanced,
    /// Last stage completed and the settle delay elapsed.
    Completed,
    /// Nothing was scheduled.
    Idle,
}

/// Simulated pipeline progress, one stage at a time.
///
/// The sequencer only schedules; the caller owns the stage list and passes it in on every
/// step, so stage mutation happens in exactly one place.
pub(crate) struct StageSequencer {
    stage_duration: Range<Duration>,
    final_stage_duration: Range<Duration>,
    settle_delay: Duration,
    rng: StdRng,
    running: bool,
    settling: bool,
    current: usize,
    next_fire: Option<Instant>,
}

impl StageSequencer {
    pub fn new(cfg: &SyncConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            stage_duration: cfg.stage_duration.clone(),
            final_stage_duration: cfg.final_stage_duration.clone(),
            settle_delay: cfg.settle_delay.min(MAX_DURATION),
            rng,
            running: false,
            settling: false,
            current: 0,
            next_fire: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Put stage 0 to work and schedule its completion. Returns false if already running.
    pub fn start(&mut self, stages: &mut [Stage], now: Instant) -> bool {
        if self.running {
            tracing::warn!("stage sequencer already running; ignoring start");
            return false;
        }
        self.running = true;
        self.current = 0;

        if stages.is_empty() {
            tracing::warn!("empty stage list; sequence completes after settle delay");
            self.settling = true;
            self.next_fire = Some(now + self.settle_delay);
            return true;
        }

        self.settling = false;
        stages[0].advance_to(StageStatus::Working);
        let dwell = self.dwell_for(0, stages.len());
        self.next_fire = Some(now + dwell);
        true
    }

    /// Handle the pending deadline.
    pub fn fire(&mut self, stages: &mut [Stage]) -> SequencerStep {
        let Some(at) = self.next_fire.take() else {
            return SequencerStep::Idle;
        };

        if self.settling {
            self.settling = false;
            self.running = false;
            return SequencerStep::Completed;
        }

        let idx = self.current;
        for stage in stages.iter_mut().take(idx + 1) {
            stage.advance_to(StageStatus::Completed);
        }

        if idx + 1 < stages.len() {
            self.current = idx + 1;
            stages[self.current].advance_to(StageStatus::Working);
            let dwell = self.dwell_for(self.current, stages.len());
            self.next_fire = Some(at + dwell);
        } else {
            self.settling = true;
            self.next_fire = Some(at + self.settle_delay);
        }

        tracing::trace!(stage = idx, "stage completed");
        SequencerStep::Advanced
    }

    /// Drop any pending deadline and release the reentrancy guard. Idempotent.
    pub fn cancel(&mut self) {
        self.next_fire = None;
        self.running = false;
        self.settling = false;
        self.current = 0;
    }

    fn dwell_for(&mut self, idx: usize, len: usize) -> Duration {
        let range = if idx + 1 == len {
            &self.final_stage_duration
        } else {
            &self.stage_duration
        };
        let dwell = if range.start >= range.end {
            range.start
        } else {
            self.rng.gen_range(range.clone())
        };
        dwell.clamp(MIN_STAGE_DWELL, MAX_DURATION)
    }
}
