//! Solver engine for Maintenance Scheduling.
//!
//! The orchestrator only sees the [`SolverEngine`] trait. The default
//! [`LocalSearchEngine`] runs a best-fit construction heuristic followed by
//! Late Acceptance local search with change and swap moves.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::console::{self, PhaseTimer};
use crate::constraints::{calculate_score, calculate_score_with, ScoreContext};
use crate::domain::MaintenanceSchedule;
use crate::score::HardSoftScore;

/// Default solving time: 30 seconds.
const DEFAULT_TIME_LIMIT_SECS: u64 = 30;

/// Late acceptance history size.
const DEFAULT_LATE_ACCEPTANCE_SIZE: usize = 400;

/// Solver configuration with termination criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    /// Stop after this duration.
    pub time_limit: Option<Duration>,
    /// Stop local search after this many steps.
    pub step_limit: Option<u64>,
    /// Stop local search after this many steps without a new best.
    pub unimproved_step_limit: Option<u64>,
    pub late_acceptance_size: usize,
    /// Fixed seed for reproducible runs; entropy when absent.
    pub random_seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            step_limit: None,
            unimproved_step_limit: None,
            late_acceptance_size: DEFAULT_LATE_ACCEPTANCE_SIZE,
            random_seed: None,
        }
    }
}

impl SolverConfig {
    /// Creates a config with default 30-second time limit.
    ///
    /// ```
    /// use std::time::Duration;
    /// use maintenance_scheduling::engine::SolverConfig;
    ///
    /// let config = SolverConfig::default_config();
    /// assert_eq!(config.time_limit, Some(Duration::from_secs(30)));
    /// assert_eq!(config.late_acceptance_size, 400);
    /// ```
    pub fn default_config() -> Self {
        Self {
            time_limit: Some(Duration::from_secs(DEFAULT_TIME_LIMIT_SECS)),
            ..Default::default()
        }
    }
}

/// Result of one engine run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Best solution found; the last one handed to the listener, if any.
    pub best: MaintenanceSchedule,
    pub score: HardSoftScore,
    pub steps: u64,
    pub moves_evaluated: u64,
    pub duration: Duration,
    /// True when the run ended because the terminate flag was raised.
    pub terminated_early: bool,
}

/// A search engine that improves a schedule and reports each new best.
pub trait SolverEngine: Send + Sync {
    /// Runs until converged or until `terminate` is raised.
    ///
    /// `on_improve` receives every new best solution with its score set.
    /// Scores passed to it are strictly increasing.
    fn solve(
        &self,
        problem: MaintenanceSchedule,
        on_improve: &mut dyn FnMut(&MaintenanceSchedule),
        terminate: &AtomicBool,
    ) -> SolveOutcome;

    /// Sets the schedule's score from its current data.
    fn update_score(&self, schedule: &mut MaintenanceSchedule);

    fn name(&self) -> &'static str;
}

/// Construction heuristic plus Late Acceptance local search.
#[derive(Debug, Clone)]
pub struct LocalSearchEngine {
    config: SolverConfig,
}

impl LocalSearchEngine {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl Default for LocalSearchEngine {
    fn default() -> Self {
        Self::new(SolverConfig::default_config())
    }
}

/// Per-run search state shared by both phases.
struct Search<'a> {
    ctx: ScoreContext,
    terminate: &'a AtomicBool,
    deadline: Option<Instant>,
    terminated_early: bool,
    moves_evaluated: u64,
    rng: StdRng,
}

impl Search<'_> {
    fn should_stop(&mut self) -> bool {
        if self.terminate.load(Ordering::Acquire) {
            self.terminated_early = true;
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn evaluate(&mut self, schedule: &MaintenanceSchedule) -> HardSoftScore {
        self.moves_evaluated += 1;
        calculate_score_with(&self.ctx, schedule)
    }
}

/// Best solution seen so far.
struct Best {
    solution: MaintenanceSchedule,
    score: HardSoftScore,
}

impl Best {
    /// Records `working` if it strictly beats the best and notifies the listener.
    fn offer(
        &mut self,
        working: &MaintenanceSchedule,
        score: HardSoftScore,
        on_improve: &mut dyn FnMut(&MaintenanceSchedule),
    ) -> bool {
        if score <= self.score {
            return false;
        }
        self.solution = working.clone();
        self.solution.score = Some(score);
        self.score = score;
        on_improve(&self.solution);
        true
    }
}

/// Value domains of the two decision variables.
struct Domains {
    crew_ids: Vec<u64>,
    grain_ids: Vec<u64>,
}

enum Undo {
    Change {
        index: usize,
        crew: Option<u64>,
        grain: Option<u64>,
    },
    Swap {
        a: usize,
        b: usize,
    },
}

impl Undo {
    fn revert(self, schedule: &mut MaintenanceSchedule) {
        match self {
            Undo::Change { index, crew, grain } => {
                let assignment = &mut schedule.assignments[index];
                assignment.assigned_crew = crew;
                assignment.starting_time_grain = grain;
            }
            Undo::Swap { a, b } => swap_values(schedule, a, b),
        }
    }
}

fn swap_values(schedule: &mut MaintenanceSchedule, a: usize, b: usize) {
    let first = schedule.assignments[a].delta();
    let second = schedule.assignments[b].delta();
    let target = &mut schedule.assignments[a];
    target.assigned_crew = second.assigned_crew;
    target.starting_time_grain = second.starting_time_grain;
    let target = &mut schedule.assignments[b];
    target.assigned_crew = first.assigned_crew;
    target.starting_time_grain = first.starting_time_grain;
}

impl LocalSearchEngine {
    /// Places every unassigned job at its best (crew, grain), critical jobs first.
    fn construct(
        &self,
        search: &mut Search<'_>,
        domains: &Domains,
        working: &mut MaintenanceSchedule,
        best: &mut Best,
        on_improve: &mut dyn FnMut(&MaintenanceSchedule),
    ) -> HardSoftScore {
        let mut timer = PhaseTimer::start("ConstructionHeuristic", 0);
        let mut current = best.score;

        let mut order: Vec<usize> = working
            .assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_assigned())
            .map(|(i, _)| i)
            .collect();
        order.sort_by_key(|&i| {
            let job = &working.assignments[i].job;
            (!job.critical, job.ready_grain_index, job.id)
        });

        if order.is_empty() {
            info!("All jobs already assigned, skipping construction heuristic");
        }

        for index in order {
            if search.should_stop() {
                break;
            }
            let mut placed: Option<(u64, u64, HardSoftScore)> = None;
            for &crew in &domains.crew_ids {
                for &grain in &domains.grain_ids {
                    let assignment = &mut working.assignments[index];
                    assignment.assigned_crew = Some(crew);
                    assignment.starting_time_grain = Some(grain);
                    let score = search.evaluate(working);
                    timer.record_move();
                    if placed.map_or(true, |(_, _, s)| score > s) {
                        placed = Some((crew, grain, score));
                    }
                }
            }
            if let Some((crew, grain, score)) = placed {
                let assignment = &mut working.assignments[index];
                assignment.assigned_crew = Some(crew);
                assignment.starting_time_grain = Some(grain);
                current = score;
                best.offer(working, score, on_improve);
                timer.record_accepted(best.score);
            }
        }

        timer.finish();
        current
    }

    /// Late Acceptance over change and swap moves.
    fn late_acceptance(
        &self,
        search: &mut Search<'_>,
        domains: &Domains,
        working: &mut MaintenanceSchedule,
        mut current: HardSoftScore,
        best: &mut Best,
        on_improve: &mut dyn FnMut(&MaintenanceSchedule),
    ) -> u64 {
        let mut timer = PhaseTimer::start("LateAcceptance", 1);
        let mut history = vec![current; self.config.late_acceptance_size.max(1)];
        let mut steps = 0u64;
        let mut unimproved = 0u64;

        while !search.should_stop() {
            if self.config.step_limit.is_some_and(|limit| steps >= limit) {
                break;
            }
            if self
                .config
                .unimproved_step_limit
                .is_some_and(|limit| unimproved >= limit)
            {
                break;
            }

            let undo = random_move(working, domains, &mut search.rng);
            let score = search.evaluate(working);
            timer.record_move();

            let slot = (steps % history.len() as u64) as usize;
            if score >= history[slot] || score >= current {
                current = score;
                if best.offer(working, score, on_improve) {
                    unimproved = 0;
                } else {
                    unimproved += 1;
                }
                timer.record_accepted(best.score);
            } else {
                undo.revert(working);
                unimproved += 1;
            }
            history[slot] = current;
            steps += 1;
        }

        debug!(steps, best_score = %best.score, "Late acceptance finished");
        timer.finish();
        steps
    }
}

fn random_move(working: &mut MaintenanceSchedule, domains: &Domains, rng: &mut StdRng) -> Undo {
    let n = working.assignments.len();
    if n >= 2 && rng.gen_bool(0.3) {
        let a = rng.gen_range(0..n);
        let mut b = rng.gen_range(0..n - 1);
        if b >= a {
            b += 1;
        }
        swap_values(working, a, b);
        return Undo::Swap { a, b };
    }

    let index = rng.gen_range(0..n);
    let assignment = &mut working.assignments[index];
    let undo = Undo::Change {
        index,
        crew: assignment.assigned_crew,
        grain: assignment.starting_time_grain,
    };
    let crew = domains.crew_ids[rng.gen_range(0..domains.crew_ids.len())];
    let grain = domains.grain_ids[rng.gen_range(0..domains.grain_ids.len())];
    match (assignment.is_assigned(), rng.gen_range(0..3)) {
        (true, 0) => assignment.assigned_crew = Some(crew),
        (true, 1) => assignment.starting_time_grain = Some(grain),
        _ => {
            assignment.assigned_crew = Some(crew);
            assignment.starting_time_grain = Some(grain);
        }
    }
    undo
}

impl SolverEngine for LocalSearchEngine {
    fn solve(
        &self,
        mut problem: MaintenanceSchedule,
        on_improve: &mut dyn FnMut(&MaintenanceSchedule),
        terminate: &AtomicBool,
    ) -> SolveOutcome {
        let solve_start = Instant::now();
        let mut search = Search {
            ctx: ScoreContext::new(&problem),
            terminate,
            deadline: self.config.time_limit.map(|limit| solve_start + limit),
            terminated_early: false,
            moves_evaluated: 0,
            rng: match self.config.random_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        };

        let initial_score = search.evaluate(&problem);
        problem.score = Some(initial_score);

        console::print_config(
            problem.id,
            problem.crews.len(),
            problem.assignments.len(),
            problem.time_grains.len(),
        );
        info!(
            schedule_id = problem.id,
            jobs = problem.assignments.len(),
            crews = problem.crews.len(),
            time_grains = problem.time_grains.len(),
            score = %initial_score,
            "Starting maintenance solver"
        );

        let mut grains: Vec<_> = problem.time_grains.iter().collect();
        grains.sort_by_key(|g| (g.grain_index, g.id));
        let domains = Domains {
            crew_ids: problem.crews.iter().map(|c| c.id).collect(),
            grain_ids: grains.iter().map(|g| g.id).collect(),
        };

        if domains.crew_ids.is_empty() || domains.grain_ids.is_empty() || problem.assignments.is_empty() {
            info!(schedule_id = problem.id, "Nothing to optimize");
            return SolveOutcome {
                score: initial_score,
                best: problem,
                steps: 0,
                moves_evaluated: search.moves_evaluated,
                duration: solve_start.elapsed(),
                terminated_early: terminate.load(Ordering::Acquire),
            };
        }

        let mut working = problem.clone();
        let mut best = Best {
            solution: problem,
            score: initial_score,
        };

        let current = self.construct(&mut search, &domains, &mut working, &mut best, on_improve);
        console::print_solving_started(solve_start.elapsed(), best.score);

        let steps = if search.should_stop() {
            0
        } else {
            self.late_acceptance(
                &mut search,
                &domains,
                &mut working,
                current,
                &mut best,
                on_improve,
            )
        };

        let duration = solve_start.elapsed();
        info!(
            schedule_id = best.solution.id,
            duration_secs = duration.as_secs_f64(),
            steps,
            moves_evaluated = search.moves_evaluated,
            score = %best.score,
            feasible = best.score.is_feasible(),
            "Solving complete"
        );
        console::print_solving_ended(duration, search.moves_evaluated, 2, best.score);

        SolveOutcome {
            score: best.score,
            best: best.solution,
            steps,
            moves_evaluated: search.moves_evaluated,
            duration,
            terminated_early: search.terminated_early,
        }
    }

    fn update_score(&self, schedule: &mut MaintenanceSchedule) {
        schedule.score = Some(calculate_score(schedule));
    }

    fn name(&self) -> &'static str {
        "LocalSearchEngine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{generate, DemoData};
    use crate::domain::*;
    use chrono::NaiveDate;

    fn small_problem(crews: usize) -> MaintenanceSchedule {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        MaintenanceSchedule::new(
            SINGLETON_SCHEDULE_ID,
            vec![MaintainableUnit::new(1, "Bridge")],
            vec![MutuallyExclusiveJobs::new(1, "Bridge works", [1, 2])],
            (1..=crews as u64).map(|i| MaintenanceCrew::new(i, format!("Crew {i}"))).collect(),
            (0..6).map(|i| TimeGrain::new(i as u64 + 1, i, date, 480 + 60 * i as u32)).collect(),
            vec![
                MaintenanceJobAssignment::new(1, MaintenanceJob::new(1, "Inspect", 1, 0, 6, 2)),
                MaintenanceJobAssignment::new(2, MaintenanceJob::new(2, "Paint", 1, 0, 6, 2).critical()),
                MaintenanceJobAssignment::new(3, MaintenanceJob::new(3, "Weld", 1, 1, 6, 3)),
            ],
        )
    }

    fn engine(step_limit: u64) -> LocalSearchEngine {
        LocalSearchEngine::new(SolverConfig {
            step_limit: Some(step_limit),
            random_seed: Some(7),
            ..SolverConfig::default()
        })
    }

    #[test]
    fn test_nothing_to_optimize_without_crews() {
        let problem = small_problem(0);
        let mut calls = 0;
        let outcome = engine(100).solve(problem.clone(), &mut |_| calls += 1, &AtomicBool::new(false));
        assert_eq!(calls, 0);
        assert_eq!(outcome.best.assignments, problem.assignments);
        assert_eq!(outcome.best.score, Some(outcome.score));
        assert_eq!(outcome.steps, 0);
    }

    #[test]
    fn test_improvements_are_strictly_better_and_last_is_best() {
        let mut seen: Vec<MaintenanceSchedule> = Vec::new();
        let outcome = engine(2_000).solve(
            small_problem(2),
            &mut |s| seen.push(s.clone()),
            &AtomicBool::new(false),
        );

        assert!(!seen.is_empty());
        let scores: Vec<HardSoftScore> = seen.iter().filter_map(|s| s.score).collect();
        assert_eq!(scores.len(), seen.len());
        assert!(scores.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&outcome.best));
        assert_eq!(outcome.score, calculate_score(&outcome.best));
        assert!(outcome.score.is_feasible());
        assert_eq!(outcome.best.unassigned_count(), 0);
        assert!(!outcome.terminated_early);
    }

    #[test]
    fn test_raised_flag_stops_before_any_step() {
        let problem = small_problem(2);
        let mut calls = 0;
        let outcome = engine(2_000).solve(problem.clone(), &mut |_| calls += 1, &AtomicBool::new(true));
        assert_eq!(calls, 0);
        assert!(outcome.terminated_early);
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.best.assignments, problem.assignments);
    }

    #[test]
    fn test_time_limit_ends_unbounded_search() {
        let engine = LocalSearchEngine::new(SolverConfig {
            time_limit: Some(Duration::from_millis(50)),
            random_seed: Some(1),
            ..SolverConfig::default()
        });
        let outcome = engine.solve(small_problem(2), &mut |_| {}, &AtomicBool::new(false));
        assert!(outcome.duration < Duration::from_secs(5));
        assert!(outcome.steps > 0);
        assert!(!outcome.terminated_early);
    }

    #[test]
    fn test_unimproved_step_limit_converges() {
        let engine = LocalSearchEngine::new(SolverConfig {
            unimproved_step_limit: Some(500),
            random_seed: Some(3),
            ..SolverConfig::default()
        });
        let outcome = engine.solve(small_problem(2), &mut |_| {}, &AtomicBool::new(false));
        assert!(outcome.steps >= 500);
    }

    #[test]
    fn test_small_demo_is_solved_feasibly() {
        let outcome = engine(20_000).solve(generate(DemoData::Small), &mut |_| {}, &AtomicBool::new(false));
        assert_eq!(outcome.best.unassigned_count(), 0);
        assert!(outcome.score.is_feasible(), "score {}", outcome.score);
    }

    #[test]
    fn test_update_score_matches_constraints() {
        let mut schedule = small_problem(1);
        schedule.assignments[0].assigned_crew = Some(1);
        schedule.assignments[0].starting_time_grain = Some(1);
        LocalSearchEngine::default().update_score(&mut schedule);
        assert_eq!(schedule.score, Some(calculate_score(&schedule)));
    }
}
