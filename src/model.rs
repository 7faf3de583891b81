use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

/// Upper bound for any configured delay, dwell or timeout.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing knobs for one synchronized run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncConfig {
    /// Dwell range for every stage except the last one.
    #[serde(with = "humantime_range")]
    pub stage_duration: Range<Duration>,
    /// Dwell range for the last stage, usually shorter so it reads as "finalizing".
    #[serde(with = "humantime_range")]
    pub final_stage_duration: Range<Duration>,
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub clock_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub fact_interval: Duration,
    /// Fixed seed for stage dwell times; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stage_duration: Duration::from_millis(1200)..Duration::from_millis(2400),
            final_stage_duration: Duration::from_millis(600)..Duration::from_millis(1200),
            settle_delay: Duration::from_millis(800),
            clock_interval: Duration::from_secs(1),
            fact_interval: Duration::from_secs(5),
            seed: None,
        }
    }
}

/// `humantime` serialization for `Range<Duration>`, written as `"1s..2s"`.
mod humantime_range {
    use serde::Serializer;
    use std::ops::Range;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(r: &Range<Duration>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!(
            "{}..{}",
            humantime::format_duration(r.start),
            humantime::format_duration(r.end)
        ))
    }
}

/// Parse a single duration such as `"800ms"`, refusing anything above [`MAX_DURATION`].
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let d = humantime::parse_duration(raw.trim()).map_err(|e| format!("invalid duration {raw:?}: {e}"))?;
    if d > MAX_DURATION {
        return Err(format!(
            "{raw:?} exceeds the maximum of {}",
            humantime::format_duration(MAX_DURATION)
        ));
    }
    Ok(d)
}

/// Parse `"1200ms..2400ms"` (or a single duration, meaning a fixed dwell) into a range.
pub fn parse_duration_range(raw: &str) -> Result<Range<Duration>, String> {
    let (lo, hi) = match raw.split_once("..") {
        Some((lo, hi)) => (lo, hi),
        None => (raw, raw),
    };
    let lo = parse_duration(lo).map_err(|e| format!("range start: {e}"))?;
    let hi = parse_duration(hi).map_err(|e| format!("range end: {e}"))?;
    if hi < lo {
        return Err(format!("range end {hi:?} is before start {lo:?}"));
    }
    Ok(lo..hi)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Waiting,
    Working,
    Completed,
}

/// Static description of a stage, declared by a dashboard adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub working_message: &'static str,
    pub done_message: &'static str,
}

/// One pipeline phase as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: String,
    pub display_name: String,
    pub status: StageStatus,
    pub working_message: String,
    pub done_message: String,
}

impl Stage {
    pub fn from_spec(spec: &StageSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            display_name: spec.display_name.to_string(),
            status: StageStatus::Waiting,
            working_message: spec.working_message.to_string(),
            done_message: spec.done_message.to_string(),
        }
    }

    /// Move forward to `status`; never regresses.
    pub fn advance_to(&mut self, status: StageStatus) {
        if status > self.status {
            self.status = status;
        }
    }

    /// Message matching the current status, if any.
    pub fn message(&self) -> Option<&str> {
        match self.status {
            StageStatus::Waiting => None,
            StageStatus::Working => Some(&self.working_message),
            StageStatus::Completed => Some(&self.done_message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Running,
    Finalizing,
    Committed,
    Failed,
}

impl RunPhase {
    /// A run in this phase still owns the coordinator.
    pub fn is_in_flight(self) -> bool {
        matches!(self, RunPhase::Running | RunPhase::Finalizing)
    }
}

/// Observable snapshot of a coordinator, published through a watch channel.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run_id: u64,
    pub phase: RunPhase,
    pub stages: Vec<Stage>,
    pub elapsed_seconds: u64,
    pub current_fact: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            run_id: 0,
            phase: RunPhase::Idle,
            stages: Vec::new(),
            elapsed_seconds: 0,
            current_fact: None,
            message: None,
            error: None,
        }
    }
}

impl RunStatus {
    /// Whether the progress panel should be rendered.
    pub fn shows_progress(&self) -> bool {
        self.phase.is_in_flight()
    }

    pub fn completed_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Completed)
            .count()
    }
}

/// Final word on a run, delivered to the owning dashboard adapter.
#[derive(Debug)]
pub enum RunOutcome<T> {
    Committed { run_id: u64, payload: T },
    Failed { run_id: u64, error: crate::error::RemoteError },
}
