//! Run coordination.
//!
//! A [`RunCoordinator`] pairs one backend call with the simulated stage sequence and decides
//! when the result becomes visible. Each run is driven by a single spawned task that
//! multiplexes the remote future and every timer, so cancelling a run is one invalidation
//! point: the run id in the published status is bumped, and any write carrying the old id is
//! refused.

use super::clock::StageClock;
use super::facts::FactRotator;
use super::run::{RemoteState, Run};
use super::sequencer::{SequencerStep, StageSequencer};
use crate::error::RemoteError;
use crate::model::{RunOutcome, RunPhase, RunStatus, StageSpec, StageStatus, SyncConfig};
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub(crate) const FINALIZING_MESSAGE: &str = "Finalizing results…";

pub struct RunCoordinator<T> {
    cfg: SyncConfig,
    status: watch::Sender<RunStatus>,
    outcome_tx: mpsc::UnboundedSender<RunOutcome<T>>,
    cancel: Option<CancellationToken>,
}

impl<T: Send + 'static> RunCoordinator<T> {
    pub fn new(cfg: SyncConfig) -> (Self, mpsc::UnboundedReceiver<RunOutcome<T>>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(RunStatus::default());
        (
            Self {
                cfg,
                status,
                outcome_tx,
                cancel: None,
            },
            outcome_rx,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.borrow().phase.is_in_flight()
    }

    /// Start a run. Fire-and-forget: progress is observed through [`Self::subscribe`] and the
    /// result arrives on the outcome channel. Returns `None` when a run is already in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F, Fut>(&mut self, stages: &[StageSpec], facts: Vec<String>, remote_call: F) -> Option<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        if self.is_in_flight() {
            tracing::debug!("run already in flight; ignoring start");
            return None;
        }
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }

        let run_id = self.status.borrow().run_id + 1;
        let now = Instant::now();
        let mut run = Run::new(run_id, stages);
        let mut sequencer = StageSequencer::new(&self.cfg);
        let mut clock = StageClock::new(self.cfg.clock_interval);
        let mut rotator = FactRotator::new(self.cfg.fact_interval);

        clock.start(now);
        rotator.start(facts, now);
        sequencer.start(&mut run.stages, now);
        run.remote = RemoteState::Pending;
        let remote = remote_call();

        self.status.send_replace(RunStatus {
            run_id,
            phase: RunPhase::Running,
            stages: run.stages.clone(),
            elapsed_seconds: 0,
            current_fact: rotator.current().map(str::to_string),
            message: progress_message(&run),
            error: None,
        });
        tracing::info!(run_id, stages = run.stages.len(), "run started");

        let token = CancellationToken::new();
        let driver = RunDriver {
            run,
            sequencer,
            clock,
            rotator,
            status: self.status.clone(),
            outcome_tx: self.outcome_tx.clone(),
            cancel: token.clone(),
        };
        tokio::spawn(driver.drive(remote));
        self.cancel = Some(token);
        Some(run_id)
    }

    /// Discard the current run without committing and return to `idle`. Safe to call at any
    /// time; no update from the discarded run is observable once this returns.
    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.status.send_modify(|s| {
            let next = s.run_id + 1;
            if s.phase.is_in_flight() {
                tracing::info!(run_id = s.run_id, "run cancelled");
            }
            *s = RunStatus {
                run_id: next,
                ..RunStatus::default()
            };
        });
    }
}

impl<T> Drop for RunCoordinator<T> {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

enum DriverEvent<T> {
    Remote(Result<T, RemoteError>),
    Sequencer,
    Clock,
    Fact,
}

/// Owns one run's state machine and timers for the lifetime of its task.
struct RunDriver<T> {
    run: Run<T>,
    sequencer: StageSequencer,
    clock: StageClock,
    rotator: FactRotator,
    status: watch::Sender<RunStatus>,
    outcome_tx: mpsc::UnboundedSender<RunOutcome<T>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> RunDriver<T> {
    async fn drive<Fut>(mut self, remote: Fut)
    where
        Fut: Future<Output = Result<T, RemoteError>> + Send,
    {
        tokio::pin!(remote);
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                res = &mut remote, if self.run.remote_pending() => DriverEvent::Remote(res),
                _ = sleep_until(self.sequencer.deadline()) => DriverEvent::Sequencer,
                _ = sleep_until(self.clock.deadline()) => DriverEvent::Clock,
                _ = sleep_until(self.rotator.deadline()) => DriverEvent::Fact,
            };
            let live = match event {
                DriverEvent::Remote(Ok(payload)) => {
                    self.run.record_success(payload);
                    tracing::debug!(
                        run_id = self.run.id,
                        sequence_complete = self.run.sequence_complete(),
                        "remote result received"
                    );
                    self.commit_if_ready()
                }
                DriverEvent::Remote(Err(error)) => {
                    self.abort(error);
                    break;
                }
                DriverEvent::Sequencer => self.advance_sequence(),
                DriverEvent::Clock => {
                    let elapsed = self.clock.tick();
                    self.publish(|s| s.elapsed_seconds = elapsed)
                }
                DriverEvent::Fact => {
                    let fact = self.rotator.rotate().map(str::to_string);
                    self.publish(|s| s.current_fact = fact)
                }
            };
            if !live || self.run.is_committed() {
                break;
            }
        }
        self.sequencer.cancel();
        self.clock.stop();
        self.rotator.stop();
    }

    fn advance_sequence(&mut self) -> bool {
        match self.sequencer.fire(&mut self.run.stages) {
            SequencerStep::Idle => true,
            SequencerStep::Advanced => {
                let stages = self.run.stages.clone();
                let message = progress_message(&self.run);
                self.publish(|s| {
                    s.stages = stages;
                    s.message = message;
                })
            }
            SequencerStep::Completed => {
                self.run.mark_sequence_complete();
                if self.run.remote_pending() {
                    tracing::debug!(run_id = self.run.id, "stage sequence done; awaiting backend");
                    if !self.publish(|s| {
                        s.phase = RunPhase::Finalizing;
                        s.message = Some(FINALIZING_MESSAGE.to_string());
                    }) {
                        return false;
                    }
                }
                self.commit_if_ready()
            }
        }
    }

    /// Evaluate the commit gate. Redundant calls are no-ops.
    fn commit_if_ready(&mut self) -> bool {
        let Some(payload) = self.run.try_commit() else {
            return true;
        };
        self.clock.stop();
        self.rotator.stop();

        let run_id = self.run.id;
        let stages = self.run.stages.clone();
        let tx = &self.outcome_tx;
        let delivered = self.status.send_if_modified(|s| {
            if s.run_id != run_id {
                return false;
            }
            s.phase = RunPhase::Committed;
            s.stages = stages;
            s.current_fact = None;
            s.message = None;
            let _ = tx.send(RunOutcome::Committed { run_id, payload });
            true
        });
        if delivered {
            tracing::info!(run_id, elapsed = self.clock.elapsed_seconds(), "run committed");
        }
        delivered
    }

    /// Fail fast: stop every timer and surface the error once.
    fn abort(&mut self, error: RemoteError) {
        let mid_sequence = self.sequencer.is_running();
        self.run.record_failure();
        self.sequencer.cancel();
        self.clock.stop();
        self.rotator.stop();

        let run_id = self.run.id;
        let completed = self
            .run
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Completed)
            .count();
        tracing::warn!(
            run_id,
            completed,
            mid_sequence,
            endpoint = error.endpoint(),
            "run failed: {error}"
        );

        let message = error.to_string();
        let tx = &self.outcome_tx;
        self.status.send_if_modified(|s| {
            if s.run_id != run_id {
                return false;
            }
            *s = RunStatus {
                run_id,
                phase: RunPhase::Failed,
                error: Some(message),
                ..RunStatus::default()
            };
            let _ = tx.send(RunOutcome::Failed { run_id, error });
            true
        });
    }

    /// Apply `f` to the shared status unless this run has been superseded.
    fn publish(&self, f: impl FnOnce(&mut RunStatus)) -> bool {
        let run_id = self.run.id;
        self.status.send_if_modified(|s| {
            if s.run_id != run_id {
                return false;
            }
            f(s);
            true
        })
    }
}

fn progress_message<T>(run: &Run<T>) -> Option<String> {
    run.stages
        .iter()
        .rev()
        .find(|s| s.status != StageStatus::Waiting)
        .and_then(|s| s.message())
        .map(str::to_string)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    const STAGES: [StageSpec; 5] = [
        spec("collect"),
        spec("analyze"),
        spec("optimize"),
        spec("validate"),
        spec("report"),
    ];

    const fn spec(name: &'static str) -> StageSpec {
        StageSpec {
            name,
            display_name: name,
            working_message: "working",
            done_message: "done",
        }
    }

    /// 4 x 1.7s + 0.8s final + 0.4s settle = 8s of animation.
    fn eight_second_cfg() -> SyncConfig {
        SyncConfig {
            stage_duration: Duration::from_millis(1700)..Duration::from_millis(1700),
            final_stage_duration: Duration::from_millis(800)..Duration::from_millis(800),
            settle_delay: Duration::from_millis(400),
            clock_interval: Duration::from_secs(1),
            fact_interval: Duration::from_secs(3),
            seed: Some(9),
        }
    }

    fn facts() -> Vec<String> {
        vec!["Agents share context".into(), "Forecasts use Prophet".into()]
    }

    fn rejected() -> RemoteError {
        RemoteError::Rejected {
            endpoint: "/api/test".into(),
            detail: "pipeline crashed".into(),
        }
    }

    fn assert_near(actual: Duration, expected: Duration) {
        let slack = Duration::from_millis(20);
        assert!(
            actual >= expected && actual <= expected + slack,
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn result_is_held_until_animation_finishes() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        let started = Instant::now();
        let run_id = coord
            .run(&STAGES, facts(), || async {
                sleep(Duration::from_secs(2)).await;
                Ok::<_, RemoteError>("schedule")
            })
            .unwrap();

        sleep(Duration::from_millis(2500)).await;
        let mid = coord.status();
        assert_eq!(mid.phase, RunPhase::Running);
        assert_eq!(mid.elapsed_seconds, 2);
        assert!(outcomes.try_recv().is_err());

        match outcomes.recv().await {
            Some(RunOutcome::Committed { run_id: id, payload }) => {
                assert_eq!(id, run_id);
                assert_eq!(payload, "schedule");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_near(started.elapsed(), Duration::from_secs(8));

        let done = coord.status();
        assert_eq!(done.phase, RunPhase::Committed);
        assert_eq!(done.completed_stages(), 5);
        assert!(done.current_fact.is_none());
        assert!(!coord.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn finalizing_while_backend_is_slower() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        let mut status = coord.subscribe();
        let started = Instant::now();
        coord.run(&STAGES, facts(), || async {
            sleep(Duration::from_secs(12)).await;
            Ok::<_, RemoteError>(7u32)
        });

        status
            .wait_for(|s| s.phase == RunPhase::Finalizing)
            .await
            .unwrap();
        assert_near(started.elapsed(), Duration::from_secs(8));
        {
            let s = status.borrow();
            assert_eq!(s.message.as_deref(), Some(FINALIZING_MESSAGE));
            assert_eq!(s.completed_stages(), 5);
        }

        sleep(Duration::from_secs(2)).await;
        assert!(coord.status().elapsed_seconds >= 9, "clock keeps running");

        assert!(matches!(
            outcomes.recv().await,
            Some(RunOutcome::Committed { payload: 7, .. })
        ));
        assert_near(started.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_one_commit_for_every_interleaving() {
        for remote_secs in [0u64, 1, 4, 8, 9, 20] {
            let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
            coord.run(&STAGES, facts(), move || async move {
                sleep(Duration::from_secs(remote_secs)).await;
                Ok::<_, RemoteError>(remote_secs)
            });

            assert!(matches!(
                outcomes.recv().await,
                Some(RunOutcome::Committed { payload, .. }) if payload == remote_secs
            ));
            sleep(Duration::from_secs(30)).await;
            assert!(outcomes.try_recv().is_err(), "second commit for {remote_secs}s");
            assert_eq!(coord.status().phase, RunPhase::Committed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_stage_completes_for_any_stage_count() {
        for n in 0..=STAGES.len() {
            let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
            coord.run(&STAGES[..n], Vec::new(), || async { Ok::<_, RemoteError>(()) });
            assert!(matches!(
                outcomes.recv().await,
                Some(RunOutcome::Committed { .. })
            ));
            let status = coord.status();
            assert_eq!(status.phase, RunPhase::Committed);
            assert_eq!(status.stages.len(), n);
            assert_eq!(status.completed_stages(), n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_aborts_immediately() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        let mut status = coord.subscribe();
        let started = Instant::now();
        coord.run(&STAGES, facts(), || async {
            sleep(Duration::from_secs(1)).await;
            Err::<(), _>(rejected())
        });

        match outcomes.recv().await {
            Some(RunOutcome::Failed { error, .. }) => {
                assert!(error.to_string().contains("pipeline crashed"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_near(started.elapsed(), Duration::from_secs(1));

        {
            let s = status.borrow_and_update();
            assert_eq!(s.phase, RunPhase::Failed);
            assert!(s.stages.is_empty(), "progress panel clears");
            assert!(!s.shows_progress());
            assert_eq!(s.elapsed_seconds, 0);
            assert!(s.error.as_deref().unwrap_or_default().contains("pipeline crashed"));
        }

        sleep(Duration::from_secs(20)).await;
        assert!(!status.has_changed().unwrap());
        assert!(outcomes.try_recv().is_err());
        assert!(!coord.is_in_flight(), "retry is possible");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_animation_never_commits() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        coord.run(&STAGES, facts(), || async {
            sleep(Duration::from_secs(15)).await;
            Err::<(), _>(rejected())
        });
        assert!(matches!(
            outcomes.recv().await,
            Some(RunOutcome::Failed { .. })
        ));
        assert_eq!(coord.status().phase, RunPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_run_and_restart_is_clean() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        let mut status = coord.subscribe();
        let first = coord
            .run(&STAGES, facts(), || async {
                sleep(Duration::from_secs(2)).await;
                Ok::<_, RemoteError>("first")
            })
            .unwrap();

        sleep(Duration::from_secs(3)).await;
        assert_eq!(coord.status().completed_stages(), 1);
        coord.cancel();

        {
            let s = status.borrow_and_update();
            assert_eq!(s.phase, RunPhase::Idle);
            assert_eq!(s.elapsed_seconds, 0);
            assert!(s.stages.is_empty());
        }
        sleep(Duration::from_secs(10)).await;
        assert!(!status.has_changed().unwrap(), "cancelled run still updating");
        assert!(outcomes.try_recv().is_err());

        let second = coord
            .run(&STAGES, facts(), || async { Ok::<_, RemoteError>("second") })
            .unwrap();
        assert!(second > first);
        let fresh = coord.status();
        assert_eq!(fresh.elapsed_seconds, 0);
        assert_eq!(fresh.stages[0].status, StageStatus::Working);
        assert!(fresh.stages[1..]
            .iter()
            .all(|s| s.status == StageStatus::Waiting));

        match outcomes.recv().await {
            Some(RunOutcome::Committed { run_id, payload }) => {
                assert_eq!(run_id, second);
                assert_eq!(payload, "second");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_then_restart_in_the_same_tick() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        coord.run(&STAGES, facts(), || async { Ok::<_, RemoteError>(1) });
        coord.cancel();
        let second = coord
            .run(&STAGES, facts(), || async { Ok::<_, RemoteError>(2) })
            .unwrap();

        match outcomes.recv().await {
            Some(RunOutcome::Committed { run_id, payload }) => {
                assert_eq!((run_id, payload), (second, 2));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        sleep(Duration::from_secs(30)).await;
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn double_run_in_one_tick_is_ignored() {
        let (mut coord, mut outcomes) = RunCoordinator::new(eight_second_cfg());
        let first = coord.run(&STAGES, facts(), || async { Ok::<_, RemoteError>("a") });
        let second = coord.run(&STAGES[..2], facts(), || async { Ok::<_, RemoteError>("b") });
        assert!(first.is_some());
        assert_eq!(second, None);
        assert_eq!(coord.status().stages.len(), 5);

        assert!(matches!(
            outcomes.recv().await,
            Some(RunOutcome::Committed { payload: "a", .. })
        ));
        sleep(Duration::from_secs(30)).await;
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn facts_rotate_during_the_wait() {
        let (mut coord, _outcomes) = RunCoordinator::new(eight_second_cfg());
        coord.run(&STAGES, facts(), || async {
            sleep(Duration::from_secs(60)).await;
            Ok::<_, RemoteError>(())
        });
        assert_eq!(
            coord.status().current_fact.as_deref(),
            Some("Agents share context")
        );
        sleep(Duration::from_millis(3100)).await;
        assert_eq!(
            coord.status().current_fact.as_deref(),
            Some("Forecasts use Prophet")
        );
        sleep(Duration::from_secs(3)).await;
        assert_eq!(
            coord.status().current_fact.as_deref(),
            Some("Agents share context")
        );
    }
}
