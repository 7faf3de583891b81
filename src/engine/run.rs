use crate::model::{Stage, StageSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteState {
    Absent,
    Pending,
    Succeeded,
    Failed,
}

/// One execution pairing a backend call with a simulated stage sequence.
#[derive(Debug)]
pub(crate) struct Run<T> {
    pub id: u64,
    pub stages: Vec<Stage>,
    pub remote: RemoteState,
    payload: Option<T>,
    sequence_complete: bool,
    committed: bool,
}

impl<T> Run<T> {
    /// Fresh stage list per run; nothing carries over from a previous run.
    pub fn new(id: u64, specs: &[StageSpec]) -> Self {
        Self {
            id,
            stages: specs.iter().map(Stage::from_spec).collect(),
            remote: RemoteState::Absent,
            payload: None,
            sequence_complete: false,
            committed: false,
        }
    }

    pub fn remote_pending(&self) -> bool {
        self.remote == RemoteState::Pending
    }

    pub fn record_success(&mut self, payload: T) {
        if self.remote == RemoteState::Pending {
            self.remote = RemoteState::Succeeded;
            self.payload = Some(payload);
        }
    }

    pub fn record_failure(&mut self) {
        if self.remote == RemoteState::Pending {
            self.remote = RemoteState::Failed;
            self.payload = None;
        }
    }

    pub fn mark_sequence_complete(&mut self) {
        self.sequence_complete = true;
    }

    pub fn sequence_complete(&self) -> bool {
        self.sequence_complete
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// The commit gate: yields the payload once, when the backend succeeded and the
    /// stage sequence has finished. Every later call returns `None`.
    pub fn try_commit(&mut self) -> Option<T> {
        if self.committed || !self.sequence_complete || self.remote != RemoteState::Succeeded {
            return None;
        }
        self.committed = true;
        self.payload.take()
    }
}
