//! Resumable, retryable operations against the game session
//!
//! An operation runs as a sequence of rounds, each taking one screenshot and
//! deciding on one action. The runner owns the loop: round budget, retry
//! pacing and cooperative pause/resume.

pub mod scale_map;

pub use scale_map::ScaleLargeMap;

use crate::error::NavResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, sleep};

/// Lifecycle of a whole operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Ready,
    Running,
    Success,
    Fail,
}

/// Verdict of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The operation's goal is reached.
    Success,
    /// Nothing achieved this round; try again soon.
    Retry,
    /// Progress made, but the game needs time before the next round.
    Wait,
    /// The operation cannot succeed; stop now.
    Fail,
}

/// Shared pause switch, checked by the runner between rounds.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle {
    paused: Arc<AtomicBool>,
}

impl PauseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// One retryable unit of game interaction.
///
/// Side effects stay behind [`crate::controller::Controller`]; everything
/// else a round computes is derived from the screenshot it took.
#[allow(async_fn_in_trait)]
pub trait Operation {
    fn name(&self) -> &str;

    /// Round budget before the runner gives up.
    fn max_rounds(&self) -> u32 {
        10
    }

    /// Attempt one round.
    async fn execute_round(&mut self) -> NavResult<RoundOutcome>;

    /// Called once on the paused-to-running edge, before the next round.
    ///
    /// Implementations must discard cached per-round scratch state (matched
    /// positions, remembered click targets): the screen may have changed
    /// arbitrarily while paused, so the next round re-derives everything
    /// from a fresh screenshot.
    async fn on_resume(&mut self) -> NavResult<()> {
        Ok(())
    }
}

/// Drives an [`Operation`] to completion.
pub struct OperationRunner {
    pause: PauseHandle,
    status: Mutex<OperationStatus>,
    retry_interval: Duration,
    wait_interval: Duration,
    pause_poll: Duration,
}

impl OperationRunner {
    pub fn new(pause: PauseHandle) -> Self {
        Self {
            pause,
            status: Mutex::new(OperationStatus::Ready),
            retry_interval: Duration::from_millis(100),
            wait_interval: Duration::from_secs(1),
            pause_poll: Duration::from_millis(100),
        }
    }

    /// Current lifecycle state: `Ready` until a run starts, `Running`
    /// while rounds execute, then the terminal outcome.
    pub fn status(&self) -> OperationStatus {
        *self.status.lock().expect("runner status poisoned")
    }

    fn set_status(&self, status: OperationStatus) {
        *self.status.lock().expect("runner status poisoned") = status;
    }

    /// Run rounds until the operation settles.
    ///
    /// `Retry` and `Wait` each consume one round of the budget; exhausting
    /// the budget is a failure. A round returning `Err` is terminal with
    /// the cause logged.
    pub async fn run(&self, op: &mut impl Operation) -> OperationStatus {
        self.set_status(OperationStatus::Running);
        log::info!("operation {}: starting", op.name());
        let status = self.drive(op).await;
        self.set_status(status);
        status
    }

    async fn drive(&self, op: &mut impl Operation) -> OperationStatus {
        let mut resumed_from_pause = false;

        for round in 1..=op.max_rounds() {
            while self.pause.is_paused() {
                resumed_from_pause = true;
                sleep(self.pause_poll).await;
            }
            if resumed_from_pause {
                resumed_from_pause = false;
                log::info!("operation {}: resuming after pause", op.name());
                if let Err(e) = op.on_resume().await {
                    log::error!("operation {}: resume failed: {e}", op.name());
                    return OperationStatus::Fail;
                }
            }

            match op.execute_round().await {
                Ok(RoundOutcome::Success) => {
                    log::info!("operation {}: success in round {round}", op.name());
                    return OperationStatus::Success;
                }
                Ok(RoundOutcome::Fail) => {
                    log::warn!("operation {}: failed in round {round}", op.name());
                    return OperationStatus::Fail;
                }
                Ok(RoundOutcome::Retry) => {
                    log::debug!("operation {}: round {round} retrying", op.name());
                    if round < op.max_rounds() {
                        sleep(self.retry_interval).await;
                    }
                }
                Ok(RoundOutcome::Wait) => {
                    log::debug!("operation {}: round {round} waiting", op.name());
                    if round < op.max_rounds() {
                        sleep(self.wait_interval).await;
                    }
                }
                Err(e) => {
                    log::error!("operation {}: round {round} errored: {e}", op.name());
                    return OperationStatus::Fail;
                }
            }
        }

        log::warn!(
            "operation {}: round budget ({}) exhausted",
            op.name(),
            op.max_rounds()
        );
        OperationStatus::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;

    fn round_error() -> NavError {
        NavError::UnknownRegion {
            planet_id: "hs".to_string(),
            region_id: "nowhere".to_string(),
            level: 0,
        }
    }

    /// Scripted operation: plays back a fixed sequence of outcomes and
    /// counts rounds and resumes.
    struct Scripted {
        script: Vec<NavResult<RoundOutcome>>,
        rounds: usize,
        resumes: usize,
        budget: u32,
    }

    impl Scripted {
        fn new(script: Vec<NavResult<RoundOutcome>>, budget: u32) -> Self {
            Self {
                script,
                rounds: 0,
                resumes: 0,
                budget,
            }
        }
    }

    impl Operation for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn max_rounds(&self) -> u32 {
            self.budget
        }

        async fn execute_round(&mut self) -> NavResult<RoundOutcome> {
            let outcome = if self.rounds < self.script.len() {
                match &self.script[self.rounds] {
                    Ok(o) => Ok(*o),
                    Err(_) => Err(round_error()),
                }
            } else {
                Ok(RoundOutcome::Retry)
            };
            self.rounds += 1;
            outcome
        }

        async fn on_resume(&mut self) -> NavResult<()> {
            self.resumes += 1;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_retry_consumes_exactly_the_budget() {
        let mut op = Scripted::new(vec![], 7);
        let runner = OperationRunner::new(PauseHandle::new());

        let status = runner.run(&mut op).await;
        assert_eq!(status, OperationStatus::Fail);
        assert_eq!(op.rounds, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn success_ends_the_run_early() {
        let mut op = Scripted::new(
            vec![
                Ok(RoundOutcome::Retry),
                Ok(RoundOutcome::Wait),
                Ok(RoundOutcome::Success),
            ],
            10,
        );
        let runner = OperationRunner::new(PauseHandle::new());

        let status = runner.run(&mut op).await;
        assert_eq!(status, OperationStatus::Success);
        assert_eq!(op.rounds, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn round_error_is_terminal_with_no_further_rounds() {
        let mut op = Scripted::new(vec![Ok(RoundOutcome::Retry), Err(round_error())], 10);
        let runner = OperationRunner::new(PauseHandle::new());

        let status = runner.run(&mut op).await;
        assert_eq!(status, OperationStatus::Fail);
        assert_eq!(op.rounds, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_outcome_is_terminal() {
        let mut op = Scripted::new(vec![Ok(RoundOutcome::Fail)], 10);
        let runner = OperationRunner::new(PauseHandle::new());

        assert_eq!(runner.run(&mut op).await, OperationStatus::Fail);
        assert_eq!(op.rounds, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_edge_calls_on_resume_once() {
        let pause = PauseHandle::new();
        pause.pause();

        let resumer = {
            let pause = pause.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(350)).await;
                pause.resume();
            })
        };

        let mut op = Scripted::new(
            vec![Ok(RoundOutcome::Retry), Ok(RoundOutcome::Success)],
            10,
        );
        let runner = OperationRunner::new(pause);
        let status = runner.run(&mut op).await;
        resumer.await.unwrap();

        assert_eq!(status, OperationStatus::Success);
        assert_eq!(op.rounds, 2);
        // Only the first post-pause round re-derives state.
        assert_eq!(op.resumes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn runner_status_tracks_the_lifecycle() {
        let pause = PauseHandle::new();
        pause.pause();
        let runner = Arc::new(OperationRunner::new(pause.clone()));
        assert_eq!(runner.status(), OperationStatus::Ready);

        let task = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move {
                let mut op = Scripted::new(vec![Ok(RoundOutcome::Success)], 10);
                runner.run(&mut op).await
            })
        };

        // Let the runner start and settle into its pause poll.
        sleep(Duration::from_millis(250)).await;
        assert_eq!(runner.status(), OperationStatus::Running);

        pause.resume();
        assert_eq!(task.await.unwrap(), OperationStatus::Success);
        assert_eq!(runner.status(), OperationStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn unpaused_runs_never_call_on_resume() {
        let mut op = Scripted::new(vec![Ok(RoundOutcome::Success)], 10);
        let runner = OperationRunner::new(PauseHandle::new());

        runner.run(&mut op).await;
        assert_eq!(op.resumes, 0);
    }
}
