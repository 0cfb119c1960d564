// Execution engine - runs a route's steps in order against a chain backend
// Each step is built, submitted and awaited to finality before the next one
// is touched; the first failure aborts the run and leaves confirmed steps as-is
//
// Numan Thabit 2025 Nov

use crate::chains::{ChainBackend, Finality, StepTransaction};
use crate::errors::ExecError;
use crate::metrics::STEP_OUTCOMES;
use crate::router::routes::{ExecutionResult, Route, Step, StepStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Execution statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionStats {
    pub total_runs: u64,
    pub completed_runs: u64,
    pub aborted_runs: u64,
    pub confirmed_steps: u64,
}

/// Lifecycle of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Running(usize),
    Completed,
    Aborted { step: usize, reason: String },
}

/// Receiving side of a cancellation request. Observed only before a step is
/// submitted and while a submitted step awaits finality.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

/// Sending side of a cancellation request.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested; never resolves if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sequential route executor.
pub struct RouteExecutor {
    confirmation_timeout: Duration,
    total_runs: AtomicU64,
    completed_runs: AtomicU64,
    aborted_runs: AtomicU64,
    confirmed_steps: AtomicU64,
}

impl Default for RouteExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_TIMEOUT)
    }
}

impl RouteExecutor {
    pub fn new(confirmation_timeout: Duration) -> Self {
        Self {
            confirmation_timeout,
            total_runs: AtomicU64::new(0),
            completed_runs: AtomicU64::new(0),
            aborted_runs: AtomicU64::new(0),
            confirmed_steps: AtomicU64::new(0),
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    pub fn get_stats(&self) -> ExecutionStats {
        ExecutionStats {
            total_runs: self.total_runs.load(Ordering::Relaxed),
            completed_runs: self.completed_runs.load(Ordering::Relaxed),
            aborted_runs: self.aborted_runs.load(Ordering::Relaxed),
            confirmed_steps: self.confirmed_steps.load(Ordering::Relaxed),
        }
    }

    /// Execute every step of `route` in order.
    pub async fn execute<B: ChainBackend>(
        &self,
        route: &Route,
        backend: &B,
    ) -> Result<Vec<ExecutionResult>, ExecError> {
        self.run(route, 0, backend, None).await
    }

    /// Execute every step of `route`, stopping early if `cancel` fires.
    pub async fn execute_with_cancel<B: ChainBackend>(
        &self,
        route: &Route,
        backend: &B,
        cancel: &CancelSignal,
    ) -> Result<Vec<ExecutionResult>, ExecError> {
        self.run(route, 0, backend, Some(cancel)).await
    }

    /// Execute steps `from_step..` of `route`, for re-entry after the last
    /// confirmed step of an earlier run.
    pub async fn resume<B: ChainBackend>(
        &self,
        route: &Route,
        from_step: usize,
        backend: &B,
        cancel: Option<&CancelSignal>,
    ) -> Result<Vec<ExecutionResult>, ExecError> {
        self.run(route, from_step, backend, cancel).await
    }

    #[tracing::instrument(skip_all, fields(route = %route.name(), chain = %backend.chain(), from_step = from_step))]
    async fn run<B: ChainBackend>(
        &self,
        route: &Route,
        from_step: usize,
        backend: &B,
        cancel: Option<&CancelSignal>,
    ) -> Result<Vec<ExecutionResult>, ExecError> {
        if route.steps.is_empty() {
            return Err(ExecError::EmptyRoute);
        }
        let total = route.steps.len();
        if from_step > total {
            return Err(ExecError::StepExecution {
                step: from_step,
                submission_id: None,
                reason: format!("resume index beyond route of {total} steps"),
            });
        }

        self.total_runs.fetch_add(1, Ordering::Relaxed);
        let mut state = ExecutorState::Idle;
        let mut results = Vec::with_capacity(total - from_step);

        for (index, step) in route.steps.iter().enumerate().skip(from_step) {
            transition(&mut state, ExecutorState::Running(index));
            match self.run_step(index, total, step, backend, cancel).await {
                Ok(result) => {
                    self.confirmed_steps.fetch_add(1, Ordering::Relaxed);
                    STEP_OUTCOMES
                        .with_label_values(&[backend.chain(), "confirmed"])
                        .inc();
                    results.push(result);
                }
                Err(err) => {
                    self.aborted_runs.fetch_add(1, Ordering::Relaxed);
                    STEP_OUTCOMES
                        .with_label_values(&[backend.chain(), outcome_label(&err)])
                        .inc();
                    transition(
                        &mut state,
                        ExecutorState::Aborted {
                            step: index,
                            reason: err.to_string(),
                        },
                    );
                    return Err(err);
                }
            }
        }

        transition(&mut state, ExecutorState::Completed);
        self.completed_runs.fetch_add(1, Ordering::Relaxed);
        info!(steps = results.len(), "all steps executed successfully");
        Ok(results)
    }

    async fn run_step<B: ChainBackend>(
        &self,
        index: usize,
        total: usize,
        step: &Step,
        backend: &B,
        cancel: Option<&CancelSignal>,
    ) -> Result<ExecutionResult, ExecError> {
        if cancel.is_some_and(CancelSignal::is_cancelled) {
            return Err(ExecError::Cancelled {
                step: index,
                submission_id: None,
            });
        }

        let tx = build_step_transaction(step).map_err(|reason| ExecError::StepExecution {
            step: index,
            submission_id: None,
            reason,
        })?;
        info!(
            step = index + 1,
            total,
            kind = step.kind.as_deref().unwrap_or("-"),
            to = %tx.to,
            value = ?tx.value,
            "executing step"
        );

        let started = Instant::now();
        let submission_id =
            backend
                .submit(&tx)
                .await
                .map_err(|e| ExecError::StepExecution {
                    step: index,
                    submission_id: None,
                    reason: format!("submit: {e}"),
                })?;
        info!(
            step = index + 1,
            submission = %submission_id,
            status = ?StepStatus::Pending,
            "step submitted"
        );

        let wait = backend.await_finality(&submission_id, self.confirmation_timeout);
        let finality = match cancel {
            Some(signal) => tokio::select! {
                outcome = wait => outcome,
                _ = signal.cancelled() => {
                    warn!(
                        step = index + 1,
                        submission = %submission_id,
                        "cancelled while awaiting finality; submitted transaction may still land"
                    );
                    return Err(ExecError::Cancelled {
                        step: index,
                        submission_id: Some(submission_id),
                    });
                }
            },
            None => wait.await,
        };

        match finality {
            Ok(Finality::Confirmed) => {
                let elapsed = started.elapsed();
                info!(
                    step = index + 1,
                    submission = %submission_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "step confirmed"
                );
                Ok(ExecutionResult {
                    step: index,
                    submission_id,
                    status: StepStatus::Confirmed,
                    elapsed,
                })
            }
            Ok(Finality::Failed(reason)) => {
                warn!(
                    step = index + 1,
                    submission = %submission_id,
                    status = ?StepStatus::Failed,
                    reason = %reason,
                    "step failed on chain"
                );
                Err(ExecError::StepExecution {
                    step: index,
                    submission_id: Some(submission_id),
                    reason,
                })
            }
            Ok(Finality::TimedOut) => Err(ExecError::ConfirmationTimeout {
                step: index,
                submission_id,
            }),
            Err(e) => Err(ExecError::ConfirmationUnknown {
                step: index,
                submission_id,
                reason: e.to_string(),
            }),
        }
    }
}

fn transition(state: &mut ExecutorState, next: ExecutorState) {
    debug!(from = ?state, to = ?next, "executor state");
    *state = next;
}

fn outcome_label(err: &ExecError) -> &'static str {
    match err {
        ExecError::ConfirmationTimeout { .. } => "timeout",
        ExecError::ConfirmationUnknown { .. } => "unknown",
        ExecError::Cancelled { .. } => "cancelled",
        _ => "failed",
    }
}

/// Build the chain-agnostic transaction for a step. Absent, empty and zero
/// values all mean "no value transfer" and leave `value` unset.
pub fn build_step_transaction(step: &Step) -> Result<StepTransaction, String> {
    let descriptor = &step.transaction;
    if descriptor.to.trim().is_empty() {
        return Err("step has no destination".to_string());
    }
    let value = match descriptor.value.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let parsed = raw
                .parse::<u128>()
                .map_err(|e| format!("unparsable value {raw:?}: {e}"))?;
            (parsed > 0).then_some(parsed)
        }
    };
    Ok(StepTransaction {
        to: descriptor.to.clone(),
        data: descriptor.data.clone(),
        value,
    })
}
