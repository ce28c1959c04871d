//! Constraint definitions for Maintenance Scheduling.
//!
//! # Constraints
//!
//! - **Crew conflict** (hard): a crew works one job at a time
//! - **Mutually exclusive jobs** (hard): grouped jobs never overlap
//! - **Start after ready grain** (hard): no job starts before it is ready
//! - **Finish before deadline** (hard): no job ends after its deadline
//! - **Fits planning horizon** (hard): no job runs past the last time grain
//! - **Assign critical jobs** (hard): every critical job is planned
//! - **Assign non-critical jobs** (soft): every other job should be planned
//! - **Safety margin** (soft): jobs should end a margin before their deadline
//! - **Finish early** (soft): earlier completion is preferred
//!
//! Overlap and lateness penalties are measured in grains.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use utoipa::ToSchema;

use crate::domain::{overlap, MaintenanceSchedule};
use crate::score::HardSoftScore;

/// Soft penalty for leaving a non-critical job unplanned.
pub const UNASSIGNED_NON_CRITICAL_WEIGHT: i64 = 100;

/// Every constraint the default engine scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    CrewConflict,
    MutuallyExclusiveJobs,
    StartAfterReadyGrain,
    FinishBeforeDeadline,
    FitsPlanningHorizon,
    AssignCriticalJobs,
    AssignNonCriticalJobs,
    SafetyMargin,
    FinishEarly,
}

impl Constraint {
    pub const ALL: [Constraint; 9] = [
        Constraint::CrewConflict,
        Constraint::MutuallyExclusiveJobs,
        Constraint::StartAfterReadyGrain,
        Constraint::FinishBeforeDeadline,
        Constraint::FitsPlanningHorizon,
        Constraint::AssignCriticalJobs,
        Constraint::AssignNonCriticalJobs,
        Constraint::SafetyMargin,
        Constraint::FinishEarly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Constraint::CrewConflict => "Crew conflict",
            Constraint::MutuallyExclusiveJobs => "Mutually exclusive jobs",
            Constraint::StartAfterReadyGrain => "Start after ready grain",
            Constraint::FinishBeforeDeadline => "Finish before deadline",
            Constraint::FitsPlanningHorizon => "Fits planning horizon",
            Constraint::AssignCriticalJobs => "Assign critical jobs",
            Constraint::AssignNonCriticalJobs => "Assign non-critical jobs",
            Constraint::SafetyMargin => "Safety margin",
            Constraint::FinishEarly => "Finish early",
        }
    }

    pub fn is_hard(self) -> bool {
        !matches!(
            self,
            Constraint::AssignNonCriticalJobs | Constraint::SafetyMargin | Constraint::FinishEarly
        )
    }

    /// Score of one penalty unit.
    fn weight(self) -> HardSoftScore {
        match self {
            Constraint::AssignNonCriticalJobs => HardSoftScore::of_soft(-UNASSIGNED_NON_CRITICAL_WEIGHT),
            c if c.is_hard() => HardSoftScore::of_hard(-1),
            _ => HardSoftScore::of_soft(-1),
        }
    }
}

/// Lookups derived once per problem instance.
///
/// Decision variables are not part of the context, so one context serves
/// every candidate solution of the same instance.
#[derive(Debug, Clone)]
pub struct ScoreContext {
    grain_index: HashMap<u64, i64>,
    horizon_end: i64,
    exclusive_pairs: HashSet<(u64, u64)>,
}

impl ScoreContext {
    pub fn new(schedule: &MaintenanceSchedule) -> Self {
        let grain_index = schedule.grain_index_by_id();
        let horizon_end = schedule
            .time_grains
            .iter()
            .map(|g| g.grain_index + 1)
            .max()
            .unwrap_or(0);

        let mut exclusive_pairs = HashSet::new();
        for group in &schedule.mutually_exclusive_jobs {
            for &a in &group.job_ids {
                for &b in &group.job_ids {
                    if a < b {
                        exclusive_pairs.insert((a, b));
                    }
                }
            }
        }

        Self {
            grain_index,
            horizon_end,
            exclusive_pairs,
        }
    }

    fn excludes(&self, a: u64, b: u64) -> bool {
        self.exclusive_pairs.contains(&(a.min(b), a.max(b)))
    }
}

/// Penalty totals and match counts per constraint.
#[derive(Debug, Default)]
struct Tally {
    penalties: [i64; Constraint::ALL.len()],
    matches: [usize; Constraint::ALL.len()],
}

impl Tally {
    fn penalize(&mut self, constraint: Constraint, amount: i64) {
        if amount > 0 {
            self.penalties[constraint as usize] += amount;
            self.matches[constraint as usize] += 1;
        }
    }

    fn score_of(&self, constraint: Constraint) -> HardSoftScore {
        constraint.weight().multiply(self.penalties[constraint as usize])
    }

    fn total(&self) -> HardSoftScore {
        Constraint::ALL
            .iter()
            .fold(HardSoftScore::ZERO, |acc, &c| acc + self.score_of(c))
    }
}

struct Placed {
    job_id: u64,
    crew: u64,
    range: Range<i64>,
}

fn tally(ctx: &ScoreContext, schedule: &MaintenanceSchedule) -> Tally {
    let mut tally = Tally::default();
    let mut placed = Vec::with_capacity(schedule.assignments.len());

    for assignment in &schedule.assignments {
        let job = &assignment.job;
        let start = assignment
            .starting_time_grain
            .and_then(|g| ctx.grain_index.get(&g).copied());

        let (Some(crew), Some(start)) = (assignment.assigned_crew, start) else {
            if job.critical {
                tally.penalize(Constraint::AssignCriticalJobs, 1);
            } else {
                tally.penalize(Constraint::AssignNonCriticalJobs, 1);
            }
            continue;
        };

        let range = assignment.occupied_range(start);
        tally.penalize(Constraint::StartAfterReadyGrain, job.ready_grain_index - range.start);
        tally.penalize(Constraint::FinishBeforeDeadline, range.end - job.deadline_grain_index);
        tally.penalize(Constraint::FitsPlanningHorizon, range.end - ctx.horizon_end);
        let margin_start = job.deadline_grain_index - job.safety_margin_in_grains;
        tally.penalize(
            Constraint::SafetyMargin,
            (range.end - margin_start).min(job.safety_margin_in_grains),
        );
        tally.penalize(Constraint::FinishEarly, range.end);

        placed.push(Placed {
            job_id: job.id,
            crew,
            range,
        });
    }

    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            let shared = overlap(&a.range, &b.range);
            if shared == 0 {
                continue;
            }
            if a.crew == b.crew {
                tally.penalize(Constraint::CrewConflict, shared);
            }
            if ctx.excludes(a.job_id, b.job_id) {
                tally.penalize(Constraint::MutuallyExclusiveJobs, shared);
            }
        }
    }

    tally
}

/// Scores a schedule against a prepared context.
pub fn calculate_score_with(ctx: &ScoreContext, schedule: &MaintenanceSchedule) -> HardSoftScore {
    tally(ctx, schedule).total()
}

/// Scores a schedule from scratch.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use maintenance_scheduling::constraints::calculate_score;
/// use maintenance_scheduling::domain::*;
/// use maintenance_scheduling::score::HardSoftScore;
///
/// let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
/// let mut schedule = MaintenanceSchedule::new(
///     SINGLETON_SCHEDULE_ID,
///     vec![MaintainableUnit::new(1, "Pump")],
///     vec![],
///     vec![MaintenanceCrew::new(1, "Alpha")],
///     vec![TimeGrain::new(1, 0, date, 480), TimeGrain::new(2, 1, date, 540)],
///     vec![MaintenanceJobAssignment::new(1, MaintenanceJob::new(1, "Oil", 1, 0, 2, 1))],
/// );
///
/// // Unassigned non-critical job
/// assert_eq!(calculate_score(&schedule), HardSoftScore::of(0, -100));
///
/// schedule.assignments[0].assigned_crew = Some(1);
/// schedule.assignments[0].starting_time_grain = Some(1);
/// // Only the finish-early preference remains
/// assert_eq!(calculate_score(&schedule), HardSoftScore::of(0, -1));
/// ```
pub fn calculate_score(schedule: &MaintenanceSchedule) -> HardSoftScore {
    calculate_score_with(&ScoreContext::new(schedule), schedule)
}

/// Score contribution of one constraint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintAnalysis {
    pub name: &'static str,
    pub hard: bool,
    #[schema(value_type = String)]
    pub weight: HardSoftScore,
    #[schema(value_type = String)]
    pub score: HardSoftScore,
    pub match_count: usize,
}

/// Breakdown of a schedule's score by constraint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAnalysis {
    #[schema(value_type = String)]
    pub score: HardSoftScore,
    pub constraints: Vec<ConstraintAnalysis>,
}

impl ScoreAnalysis {
    pub fn constraint(&self, constraint: Constraint) -> Option<&ConstraintAnalysis> {
        self.constraints.iter().find(|c| c.name == constraint.name())
    }
}

/// Analyzes a schedule for constraint violations.
pub fn analyze(schedule: &MaintenanceSchedule) -> ScoreAnalysis {
    let tally = tally(&ScoreContext::new(schedule), schedule);
    let constraints = Constraint::ALL
        .iter()
        .map(|&c| ConstraintAnalysis {
            name: c.name(),
            hard: c.is_hard(),
            weight: c.weight(),
            score: tally.score_of(c),
            match_count: tally.matches[c as usize],
        })
        .collect();

    ScoreAnalysis {
        score: tally.total(),
        constraints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use chrono::NaiveDate;

    fn schedule(jobs: Vec<MaintenanceJob>, groups: Vec<MutuallyExclusiveJobs>) -> MaintenanceSchedule {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let assignments = jobs
            .into_iter()
            .map(|job| MaintenanceJobAssignment::new(job.id, job))
            .collect();
        MaintenanceSchedule::new(
            SINGLETON_SCHEDULE_ID,
            vec![MaintainableUnit::new(1, "Unit")],
            groups,
            vec![MaintenanceCrew::new(1, "Alpha"), MaintenanceCrew::new(2, "Beta")],
            (0..10).map(|i| TimeGrain::new(100 + i as u64, i, date, 60 * i as u32)).collect(),
            assignments,
        )
    }

    fn place(s: &mut MaintenanceSchedule, assignment_id: u64, crew: u64, grain_index: i64) {
        let assignment = s.assignments.iter_mut().find(|a| a.id == assignment_id).unwrap();
        assignment.assigned_crew = Some(crew);
        assignment.starting_time_grain = Some(100 + grain_index as u64);
    }

    #[test]
    fn test_crew_conflict_penalizes_overlap_grains() {
        let mut s = schedule(
            vec![
                MaintenanceJob::new(1, "A", 1, 0, 10, 3),
                MaintenanceJob::new(2, "B", 1, 0, 10, 3),
            ],
            vec![],
        );
        place(&mut s, 1, 1, 0);
        place(&mut s, 2, 1, 1);
        let analysis = analyze(&s);
        let conflict = analysis.constraint(Constraint::CrewConflict).unwrap();
        assert_eq!(conflict.score, HardSoftScore::of_hard(-2));
        assert_eq!(conflict.match_count, 1);

        place(&mut s, 2, 2, 1);
        assert!(calculate_score(&s).is_feasible());
    }

    #[test]
    fn test_mutually_exclusive_jobs_ignore_crew() {
        let mut s = schedule(
            vec![
                MaintenanceJob::new(1, "A", 1, 0, 10, 2),
                MaintenanceJob::new(2, "B", 1, 0, 10, 2),
            ],
            vec![MutuallyExclusiveJobs::new(1, "Same bridge", [1, 2])],
        );
        place(&mut s, 1, 1, 0);
        place(&mut s, 2, 2, 1);
        assert_eq!(calculate_score(&s).hard(), -1);

        place(&mut s, 2, 2, 2);
        assert_eq!(calculate_score(&s).hard(), 0);
    }

    #[test]
    fn test_time_window_and_horizon() {
        let mut s = schedule(vec![MaintenanceJob::new(1, "A", 1, 3, 6, 4)], vec![]);
        place(&mut s, 1, 1, 1);
        let analysis = analyze(&s);
        assert_eq!(analysis.constraint(Constraint::StartAfterReadyGrain).unwrap().score.hard(), -2);
        assert_eq!(analysis.constraint(Constraint::FinishBeforeDeadline).unwrap().score.hard(), 0);

        place(&mut s, 1, 1, 8);
        let analysis = analyze(&s);
        assert_eq!(analysis.constraint(Constraint::FinishBeforeDeadline).unwrap().score.hard(), -6);
        assert_eq!(analysis.constraint(Constraint::FitsPlanningHorizon).unwrap().score.hard(), -2);
    }

    #[test]
    fn test_unassigned_penalties() {
        let s = schedule(
            vec![
                MaintenanceJob::new(1, "A", 1, 0, 10, 1).critical(),
                MaintenanceJob::new(2, "B", 1, 0, 10, 1),
            ],
            vec![],
        );
        let analysis = analyze(&s);
        assert_eq!(analysis.score, HardSoftScore::of(-1, -UNASSIGNED_NON_CRITICAL_WEIGHT));
        assert_eq!(analysis.constraint(Constraint::AssignCriticalJobs).unwrap().match_count, 1);
        assert_eq!(analysis.constraint(Constraint::AssignNonCriticalJobs).unwrap().match_count, 1);
    }

    #[test]
    fn test_safety_margin_is_capped_by_margin() {
        let mut s = schedule(
            vec![MaintenanceJob::new(1, "A", 1, 0, 6, 2).with_safety_margin(2)],
            vec![],
        );
        place(&mut s, 1, 1, 3);
        let margin = analyze(&s).constraint(Constraint::SafetyMargin).unwrap().score;
        assert_eq!(margin, HardSoftScore::of_soft(-1));

        place(&mut s, 1, 1, 6);
        let margin = analyze(&s).constraint(Constraint::SafetyMargin).unwrap().score;
        assert_eq!(margin, HardSoftScore::of_soft(-2));
    }

    #[test]
    fn test_analysis_sums_to_score() {
        let mut s = schedule(
            vec![
                MaintenanceJob::new(1, "A", 1, 0, 5, 3).critical(),
                MaintenanceJob::new(2, "B", 1, 0, 5, 3),
                MaintenanceJob::new(3, "C", 1, 0, 5, 3),
            ],
            vec![MutuallyExclusiveJobs::new(1, "g", [1, 3])],
        );
        place(&mut s, 1, 1, 0);
        place(&mut s, 3, 2, 2);
        let analysis = analyze(&s);
        let sum = analysis
            .constraints
            .iter()
            .fold(HardSoftScore::ZERO, |acc, c| acc + c.score);
        assert_eq!(sum, analysis.score);
        assert_eq!(analysis.score, calculate_score(&s));
    }
}
