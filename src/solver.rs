//! Solve orchestration for Maintenance Scheduling.
//!
//! [`SolverService`] owns a registry of solve jobs keyed by schedule id. Each
//! accepted [`SolverService::submit`] runs the engine on a dedicated worker
//! thread; every improvement the engine reports is persisted as assignment
//! deltas before the search continues.
//!
//! Status is always read before the schedule in
//! [`SolverService::fetch_current`], and a worker only flips its job back to
//! [`SolverStatus::NotSolving`] after the final best is committed, so a reader
//! that sees `NOT_SOLVING` also sees the final solution.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::domain::{MaintenanceSchedule, ScheduleId, SINGLETON_SCHEDULE_ID};
use crate::engine::{SolveOutcome, SolverEngine};
use crate::error::SolveError;
use crate::repository::ScheduleRepository;
use crate::score::HardSoftScore;

/// Default number of failed saves in a row before a solve is aborted.
const DEFAULT_MAX_CONSECUTIVE_PERSISTENCE_FAILURES: u32 = 5;

/// Status of a schedule's solve job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    /// Not currently solving.
    #[default]
    NotSolving,
    /// Accepted; the worker has not started the engine yet.
    SolvingScheduled,
    /// The engine is running.
    SolvingActive,
}

impl SolverStatus {
    /// Returns the status as a SCREAMING_SNAKE_CASE string for API responses.
    ///
    /// ```
    /// use maintenance_scheduling::solver::SolverStatus;
    ///
    /// assert_eq!(SolverStatus::NotSolving.as_str(), "NOT_SOLVING");
    /// assert_eq!(SolverStatus::SolvingScheduled.as_str(), "SOLVING_SCHEDULED");
    /// assert_eq!(SolverStatus::SolvingActive.as_str(), "SOLVING_ACTIVE");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::NotSolving => "NOT_SOLVING",
            SolverStatus::SolvingScheduled => "SOLVING_SCHEDULED",
            SolverStatus::SolvingActive => "SOLVING_ACTIVE",
        }
    }

    pub fn is_solving(self) -> bool {
        self != SolverStatus::NotSolving
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// The single schedule this deployment serves.
    pub schedule_id: ScheduleId,
    pub max_consecutive_persistence_failures: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            schedule_id: SINGLETON_SCHEDULE_ID,
            max_consecutive_persistence_failures: DEFAULT_MAX_CONSECUTIVE_PERSISTENCE_FAILURES,
        }
    }
}

/// How the last finished solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveOutcomeKind {
    /// The engine stopped on its own termination criteria.
    Converged,
    /// Stopped through [`SolverService::stop_early`] or shutdown.
    TerminatedEarly,
    /// Too many improvements in a row failed to persist.
    AbortedOnPersistenceFailures,
    /// The engine or the repository panicked.
    Failed,
}

/// Persistence and outcome counters of a schedule's latest solve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolveDiagnostics {
    pub status: SolverStatus,
    pub improvements_persisted: u64,
    pub persistence_failures: u64,
    pub consecutive_persistence_failures: u32,
    pub last_persistence_error: Option<String>,
    #[schema(value_type = Option<String>)]
    pub last_best_score: Option<HardSoftScore>,
    pub last_outcome: Option<SolveOutcomeKind>,
    /// Panic message of a failed solve.
    pub last_failure: Option<String>,
}

/// Registry entry for one schedule.
struct SolveJob {
    status: SolverStatus,
    terminate: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    diagnostics: SolveDiagnostics,
}

impl SolveJob {
    fn idle() -> Self {
        Self {
            status: SolverStatus::NotSolving,
            terminate: Arc::new(AtomicBool::new(false)),
            handle: None,
            diagnostics: SolveDiagnostics::default(),
        }
    }
}

type Registry = Arc<Mutex<HashMap<ScheduleId, SolveJob>>>;

/// Runs solves in the background and persists their improvements.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use maintenance_scheduling::demo_data::{generate, DemoData};
/// use maintenance_scheduling::engine::LocalSearchEngine;
/// use maintenance_scheduling::repository::InMemoryRepository;
/// use maintenance_scheduling::solver::{OrchestratorConfig, SolverService, SolverStatus};
///
/// let repository = Arc::new(InMemoryRepository::from_schedule(&generate(DemoData::Small)));
/// let engine = Arc::new(LocalSearchEngine::default());
/// let service = SolverService::new(repository, engine, OrchestratorConfig::default());
///
/// assert_eq!(service.status(1), SolverStatus::NotSolving);
/// let schedule = service.fetch_current(1).unwrap();
/// assert_eq!(schedule.solver_status, Some(SolverStatus::NotSolving));
/// assert!(schedule.score.is_some());
/// ```
pub struct SolverService {
    repository: Arc<dyn ScheduleRepository>,
    engine: Arc<dyn SolverEngine>,
    config: OrchestratorConfig,
    jobs: Registry,
}

impl SolverService {
    pub fn new(
        repository: Arc<dyn ScheduleRepository>,
        engine: Arc<dyn SolverEngine>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            repository,
            engine,
            config,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn schedule_id(&self) -> ScheduleId {
        self.config.schedule_id
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    fn check_id(&self, id: ScheduleId) -> Result<(), SolveError> {
        if id == self.config.schedule_id {
            Ok(())
        } else {
            Err(SolveError::InvalidState(id))
        }
    }

    /// Starts solving `id` in the background.
    ///
    /// Fails with [`SolveError::AlreadySolving`] while a solve for `id` is
    /// scheduled or active. Returns as soon as the worker is spawned.
    pub fn submit(&self, id: ScheduleId) -> Result<(), SolveError> {
        self.check_id(id)?;

        let terminate = Arc::new(AtomicBool::new(false));
        let finished_worker = {
            let mut jobs = self.jobs.lock();
            let job = jobs.entry(id).or_insert_with(SolveJob::idle);
            if job.status.is_solving() {
                return Err(SolveError::AlreadySolving(id));
            }
            job.status = SolverStatus::SolvingScheduled;
            job.terminate = Arc::clone(&terminate);
            job.diagnostics = SolveDiagnostics {
                status: SolverStatus::SolvingScheduled,
                ..SolveDiagnostics::default()
            };
            job.handle.take()
        };
        if let Some(handle) = finished_worker {
            join_worker(id, handle);
        }

        let problem = match self.repository.load_instance(id) {
            Ok(problem) => problem,
            Err(e) => {
                warn!(schedule_id = id, error = %e, "Failed to load schedule for solving");
                self.rollback(id);
                return Err(e.into());
            }
        };

        let worker = Worker {
            id,
            repository: Arc::clone(&self.repository),
            engine: Arc::clone(&self.engine),
            jobs: Arc::clone(&self.jobs),
            terminate: Arc::clone(&terminate),
            max_consecutive_failures: self.config.max_consecutive_persistence_failures.max(1),
        };
        let spawned = std::thread::Builder::new()
            .name(format!("solver-{id}"))
            .spawn(move || worker.run(problem));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!(schedule_id = id, error = %e, "Failed to spawn solver worker");
                self.rollback(id);
                return Err(SolveError::Worker(e.to_string()));
            }
        };

        let stale = {
            let mut jobs = self.jobs.lock();
            match jobs.get_mut(&id) {
                Some(job) if Arc::ptr_eq(&job.terminate, &terminate) => {
                    job.handle = Some(handle);
                    None
                }
                // A newer solve replaced ours, so ours already finished.
                _ => Some(handle),
            }
        };
        if let Some(handle) = stale {
            join_worker(id, handle);
        }

        info!(schedule_id = id, "Solve submitted");
        Ok(())
    }

    fn rollback(&self, id: ScheduleId) {
        if let Some(job) = self.jobs.lock().get_mut(&id) {
            job.status = SolverStatus::NotSolving;
            job.diagnostics.status = SolverStatus::NotSolving;
        }
    }

    /// Requests termination of the solve for `id`.
    ///
    /// A no-op when nothing is solving. Does not wait for the worker.
    pub fn stop_early(&self, id: ScheduleId) -> Result<(), SolveError> {
        let jobs = self.jobs.lock();
        match jobs.get(&id) {
            Some(job) if job.status.is_solving() => {
                job.terminate.store(true, Ordering::Release);
                info!(schedule_id = id, "Stop requested");
            }
            _ => info!(schedule_id = id, "Stop requested while not solving"),
        }
        Ok(())
    }

    /// Current status of `id`. Never waits on a worker.
    pub fn status(&self, id: ScheduleId) -> SolverStatus {
        self.jobs
            .lock()
            .get(&id)
            .map_or(SolverStatus::NotSolving, |job| job.status)
    }

    /// Loads the persisted schedule with a fresh score and its solver status.
    pub fn fetch_current(&self, id: ScheduleId) -> Result<MaintenanceSchedule, SolveError> {
        self.check_id(id)?;
        // Status first: a worker reports NOT_SOLVING only after its final commit.
        let status = self.status(id);
        let mut schedule = self.repository.load_instance(id)?;
        self.engine.update_score(&mut schedule);
        schedule.solver_status = Some(status);
        Ok(schedule)
    }

    pub fn diagnostics(&self, id: ScheduleId) -> SolveDiagnostics {
        self.jobs
            .lock()
            .get(&id)
            .map(|job| SolveDiagnostics {
                status: job.status,
                ..job.diagnostics.clone()
            })
            .unwrap_or_default()
    }

    /// Terminates every solve and waits for the workers to exit.
    pub fn shutdown(&self) {
        let handles: Vec<(ScheduleId, JoinHandle<()>)> = {
            let mut jobs = self.jobs.lock();
            jobs.iter_mut()
                .filter_map(|(&id, job)| {
                    job.terminate.store(true, Ordering::Release);
                    job.handle.take().map(|h| (id, h))
                })
                .collect()
        };
        for (id, handle) in handles {
            join_worker(id, handle);
        }
        info!("Solver service shut down");
    }
}

impl Drop for SolverService {
    fn drop(&mut self) {
        for job in self.jobs.lock().values() {
            job.terminate.store(true, Ordering::Release);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn join_worker(id: ScheduleId, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!(schedule_id = id, "Solver worker panicked");
    }
}

/// State moved onto a worker thread.
struct Worker {
    id: ScheduleId,
    repository: Arc<dyn ScheduleRepository>,
    engine: Arc<dyn SolverEngine>,
    jobs: Registry,
    terminate: Arc<AtomicBool>,
    max_consecutive_failures: u32,
}

/// Result of persisting one best solution.
enum Persisted {
    Saved,
    Failed,
    Abort,
}

impl Worker {
    fn run(self, problem: MaintenanceSchedule) {
        self.update_job(|job| {
            job.status = SolverStatus::SolvingActive;
            job.diagnostics.status = SolverStatus::SolvingActive;
        });
        info!(
            schedule_id = self.id,
            engine = self.engine.name(),
            jobs = problem.assignments.len(),
            "Solving started"
        );

        let kind = match panic::catch_unwind(AssertUnwindSafe(|| self.solve_and_persist(problem))) {
            Ok(kind) => kind,
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(schedule_id = self.id, panic = %message, "Solver worker panicked");
                self.update_job(|job| job.diagnostics.last_failure = Some(message));
                SolveOutcomeKind::Failed
            }
        };

        self.update_job(|job| {
            job.status = SolverStatus::NotSolving;
            job.diagnostics.status = SolverStatus::NotSolving;
            job.diagnostics.last_outcome = Some(kind);
        });
    }

    fn solve_and_persist(&self, problem: MaintenanceSchedule) -> SolveOutcomeKind {
        let mut consecutive_failures = 0u32;
        let mut aborted = false;
        let mut pending: Option<HardSoftScore> = None;
        let outcome = {
            let mut on_improve = |best: &MaintenanceSchedule| {
                match self.persist(best, &mut consecutive_failures) {
                    Persisted::Saved => pending = None,
                    Persisted::Failed => pending = best.score,
                    Persisted::Abort => {
                        pending = best.score;
                        if !aborted {
                            aborted = true;
                            self.terminate.store(true, Ordering::Release);
                        }
                    }
                }
            };
            self.engine.solve(problem, &mut on_improve, &self.terminate)
        };

        // The last improvement failed to save; give the final best one more try.
        if pending.is_some() {
            self.commit_final(&outcome, &mut consecutive_failures);
        }

        let kind = if aborted {
            SolveOutcomeKind::AbortedOnPersistenceFailures
        } else if outcome.terminated_early {
            SolveOutcomeKind::TerminatedEarly
        } else {
            SolveOutcomeKind::Converged
        };

        info!(
            schedule_id = self.id,
            score = %outcome.score,
            steps = outcome.steps,
            duration_ms = outcome.duration.as_millis() as u64,
            outcome = ?kind,
            "Solving ended"
        );
        kind
    }

    fn persist(&self, best: &MaintenanceSchedule, consecutive_failures: &mut u32) -> Persisted {
        let deltas = best.assignment_deltas();
        match self.repository.save_assignment_deltas(&deltas) {
            Ok(report) => {
                if !report.missing.is_empty() {
                    warn!(
                        schedule_id = self.id,
                        missing = ?report.missing,
                        "Skipped deltas for assignments that no longer exist"
                    );
                }
                *consecutive_failures = 0;
                self.update_job(|job| {
                    job.diagnostics.improvements_persisted += 1;
                    job.diagnostics.consecutive_persistence_failures = 0;
                    job.diagnostics.last_best_score = best.score;
                });
                Persisted::Saved
            }
            Err(e) => {
                *consecutive_failures += 1;
                let failures = *consecutive_failures;
                error!(
                    schedule_id = self.id,
                    consecutive_failures = failures,
                    error = %e,
                    "Failed to persist improved solution"
                );
                let message = e.to_string();
                self.update_job(|job| {
                    job.diagnostics.persistence_failures += 1;
                    job.diagnostics.consecutive_persistence_failures = failures;
                    job.diagnostics.last_persistence_error = Some(message);
                });
                if failures >= self.max_consecutive_failures {
                    error!(
                        schedule_id = self.id,
                        consecutive_failures = failures,
                        "Aborting solve after repeated persistence failures"
                    );
                    Persisted::Abort
                } else {
                    Persisted::Failed
                }
            }
        }
    }

    fn commit_final(&self, outcome: &SolveOutcome, consecutive_failures: &mut u32) {
        match self.persist(&outcome.best, consecutive_failures) {
            Persisted::Saved => info!(schedule_id = self.id, "Final best solution persisted"),
            Persisted::Failed | Persisted::Abort => {
                warn!(schedule_id = self.id, "Final best solution could not be persisted")
            }
        }
    }

    /// Updates this worker's registry entry, if it still owns it.
    fn update_job(&self, f: impl FnOnce(&mut SolveJob)) {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(&self.id) {
            if Arc::ptr_eq(&job.terminate, &self.terminate) {
                f(job);
            }
        }
    }
}
