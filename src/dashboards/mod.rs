//! Feature dashboards.
//!
//! Each dashboard declares its stage copy, its facts, its single backend request and where a
//! committed result is stored. [`DashboardController`] is the only writer of that slot, and it
//! writes only from a committed [`RunOutcome`].

mod learning;
mod retention;
mod scheduling;
mod sentiment;

pub use learning::{LearningPathDashboard, LearningPathRequest};
pub use retention::{RetentionDashboard, RetentionRequest};
pub use scheduling::{ScheduleRequest, SchedulingDashboard};
#[cfg(feature = "tui")]
pub use sentiment::SentimentDistribution;
pub use sentiment::{SentimentAnalysisRequest, SentimentDashboard};

use crate::backend::BackendClient;
use crate::engine::RunCoordinator;
use crate::error::RemoteError;
use crate::model::{RunOutcome, RunStatus, StageSpec, SyncConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Scheduling,
    Retention,
    LearningPath,
    Sentiment,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Scheduling,
        Feature::Retention,
        Feature::LearningPath,
        Feature::Sentiment,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Feature::Scheduling => "Scheduling",
            Feature::Retention => "Retention",
            Feature::LearningPath => "Learning Paths",
            Feature::Sentiment => "Sentiment",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Per-feature configuration of a synchronized run.
pub trait Dashboard: Send + Sync + 'static {
    type Request: Serialize + Send + Sync + 'static;
    type Payload: DeserializeOwned + Serialize + Send + 'static;

    const FEATURE: Feature;
    const ENDPOINT: &'static str;

    fn stages() -> &'static [StageSpec];
    fn facts() -> &'static [&'static str];
    /// Slot the committed payload for `request` is stored under.
    fn slot_key(request: &Self::Request) -> String;
    /// Human-readable lines for text output and the TUI result pane.
    fn summarize(payload: &Self::Payload) -> Vec<String>;
}

/// What a dashboard learned from a finished run.
#[derive(Debug, Clone)]
pub enum DashboardUpdate {
    Committed {
        feature: Feature,
        slot: String,
        lines: Vec<String>,
        json: serde_json::Value,
    },
    Failed {
        feature: Feature,
        message: String,
    },
}

pub struct DashboardController<D: Dashboard> {
    client: BackendClient,
    coordinator: RunCoordinator<D::Payload>,
    outcomes: mpsc::UnboundedReceiver<RunOutcome<D::Payload>>,
    pending: HashMap<u64, String>,
    slots: BTreeMap<String, D::Payload>,
}

impl<D: Dashboard> DashboardController<D> {
    pub fn new(client: BackendClient, cfg: SyncConfig) -> Self {
        let (coordinator, outcomes) = RunCoordinator::new(cfg);
        Self {
            client,
            coordinator,
            outcomes,
            pending: HashMap::new(),
            slots: BTreeMap::new(),
        }
    }

    /// Kick off the backend request and its progress animation. Ignored while a run is live.
    pub fn start(&mut self, request: D::Request) -> Option<u64> {
        let client = self.client.clone();
        self.start_with(request, move |request| async move {
            client.post::<_, D::Payload>(D::ENDPOINT, &request).await
        })
    }

    /// Like [`start`](Self::start), with `remote` standing in for the backend call.
    pub fn start_with<F, Fut>(&mut self, request: D::Request, remote: F) -> Option<u64>
    where
        F: FnOnce(D::Request) -> Fut,
        Fut: Future<Output = Result<D::Payload, RemoteError>> + Send + 'static,
    {
        let key = D::slot_key(&request);
        let facts = D::facts().iter().map(|f| f.to_string()).collect();
        let run_id = self
            .coordinator
            .run(D::stages(), facts, move || remote(request))?;
        tracing::info!(feature = %D::FEATURE, run_id, slot = %key, "dashboard run started");
        self.pending.insert(run_id, key);
        Some(run_id)
    }

    /// Dismiss the progress view. The live run, if any, never reaches its slot.
    pub fn cancel(&mut self) {
        let status = self.coordinator.status();
        if status.phase.is_in_flight() {
            self.pending.remove(&status.run_id);
        }
        self.coordinator.cancel();
    }

    pub fn status(&self) -> RunStatus {
        self.coordinator.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.coordinator.subscribe()
    }

    pub async fn next_outcome(&mut self) -> Option<RunOutcome<D::Payload>> {
        self.outcomes.recv().await
    }

    /// Store a committed payload in its slot, or record the failure.
    pub fn apply(&mut self, outcome: RunOutcome<D::Payload>) -> Option<DashboardUpdate> {
        match outcome {
            RunOutcome::Committed { run_id, payload } => {
                let Some(slot) = self.pending.remove(&run_id) else {
                    tracing::debug!(feature = %D::FEATURE, run_id, "dropping outcome of discarded run");
                    return None;
                };
                let lines = D::summarize(&payload);
                let json = serde_json::to_value(&payload).unwrap_or_else(|e| {
                    tracing::warn!(feature = %D::FEATURE, run_id, "result not representable as JSON: {e}");
                    serde_json::Value::Null
                });
                self.slots.insert(slot.clone(), payload);
                Some(DashboardUpdate::Committed {
                    feature: D::FEATURE,
                    slot,
                    lines,
                    json,
                })
            }
            RunOutcome::Failed { run_id, error } => {
                self.pending.remove(&run_id);
                Some(DashboardUpdate::Failed {
                    feature: D::FEATURE,
                    message: error.to_string(),
                })
            }
        }
    }

    /// Committed payloads, keyed by slot.
    pub fn slots(&self) -> &BTreeMap<String, D::Payload> {
        &self.slots
    }
}

/// Render a 0..1 ratio or a 0..100 score as a percentage.
pub(crate) fn percent(v: f64) -> String {
    if v <= 1.0 {
        format!("{:.0}%", v * 100.0)
    } else {
        format!("{v:.0}%")
    }
}

pub(crate) fn money(v: f64) -> String {
    let whole = v.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if whole < 0 {
        format!("-${out}")
    } else {
        format!("${out}")
    }
}
