//! Domain model for Maintenance Scheduling.
//!
//! # Overview
//!
//! - [`MaintainableUnit`], [`MaintenanceCrew`], [`TimeGrain`]: immutable reference facts
//! - [`MaintenanceJob`]: the job definition an assignment plans
//! - [`MaintenanceJobAssignment`]: planning entity with two decision variables,
//!   the assigned crew and the starting time grain
//! - [`MutuallyExclusiveJobs`]: jobs that must never overlap in time
//! - [`MaintenanceSchedule`]: the complete planning solution
//!
//! Decision variables hold ids, not copies, so an [`AssignmentDelta`] is all a
//! store needs to persist an improved solution.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

use crate::score::HardSoftScore;
use crate::solver::SolverStatus;

/// Identity of a schedule.
pub type ScheduleId = u64;

/// The only schedule a deployment holds.
///
/// Multi-tenancy is out of scope: every request addresses this id and any
/// other id is rejected.
pub const SINGLETON_SCHEDULE_ID: ScheduleId = 1;

/// Length of one time grain in minutes.
pub const GRAIN_LENGTH_IN_MINUTES: u32 = 60;

/// A piece of equipment or site that needs maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintainableUnit {
    pub id: u64,
    pub unit_name: String,
}

impl MaintainableUnit {
    pub fn new(id: u64, unit_name: impl Into<String>) -> Self {
        Self {
            id,
            unit_name: unit_name.into(),
        }
    }
}

/// A crew that can carry out one job at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceCrew {
    pub id: u64,
    pub crew_name: String,
}

impl MaintenanceCrew {
    pub fn new(id: u64, crew_name: impl Into<String>) -> Self {
        Self {
            id,
            crew_name: crew_name.into(),
        }
    }
}

/// A fixed-length slot on the planning horizon.
///
/// `grain_index` orders grains; jobs occupy consecutive indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeGrain {
    pub id: u64,
    pub grain_index: i64,
    pub date: NaiveDate,
    pub starting_minute_of_day: u32,
}

impl TimeGrain {
    pub fn new(id: u64, grain_index: i64, date: NaiveDate, starting_minute_of_day: u32) -> Self {
        Self {
            id,
            grain_index,
            date,
            starting_minute_of_day,
        }
    }

    /// Start of this grain as a local date-time.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use maintenance_scheduling::domain::TimeGrain;
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
    /// let grain = TimeGrain::new(1, 0, date, 8 * 60 + 30);
    /// assert_eq!(grain.start_date_time().to_string(), "2025-01-06 08:30:00");
    /// ```
    pub fn start_date_time(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(self.starting_minute_of_day))
    }
}

/// Definition of a maintenance job. Never changed by solving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceJob {
    pub id: u64,
    pub job_name: String,
    pub maintainable_unit_id: u64,
    /// Earliest grain index the job may start at.
    pub ready_grain_index: i64,
    /// The job must end at or before this grain index.
    pub deadline_grain_index: i64,
    pub duration_in_grains: i64,
    /// Preferred slack between the job's end and its deadline.
    pub safety_margin_in_grains: i64,
    pub critical: bool,
}

impl MaintenanceJob {
    pub fn new(
        id: u64,
        job_name: impl Into<String>,
        maintainable_unit_id: u64,
        ready_grain_index: i64,
        deadline_grain_index: i64,
        duration_in_grains: i64,
    ) -> Self {
        Self {
            id,
            job_name: job_name.into(),
            maintainable_unit_id,
            ready_grain_index,
            deadline_grain_index,
            duration_in_grains,
            safety_margin_in_grains: 0,
            critical: false,
        }
    }

    pub fn with_safety_margin(mut self, grains: i64) -> Self {
        self.safety_margin_in_grains = grains;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// A set of jobs that must not be scheduled in overlapping time grains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutuallyExclusiveJobs {
    pub id: u64,
    pub name: String,
    pub job_ids: Vec<u64>,
}

impl MutuallyExclusiveJobs {
    pub fn new(id: u64, name: impl Into<String>, job_ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            id,
            name: name.into(),
            job_ids: job_ids.into_iter().collect(),
        }
    }

    /// Returns true if both jobs belong to this group and are distinct.
    pub fn excludes(&self, a: u64, b: u64) -> bool {
        a != b && self.job_ids.contains(&a) && self.job_ids.contains(&b)
    }
}

/// Planning entity: where and by whom one job is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceJobAssignment {
    pub id: u64,
    pub job: MaintenanceJob,
    /// Decision variable: crew id, `None` while unassigned.
    pub assigned_crew: Option<u64>,
    /// Decision variable: time grain id, `None` while unassigned.
    pub starting_time_grain: Option<u64>,
}

impl MaintenanceJobAssignment {
    pub fn new(id: u64, job: MaintenanceJob) -> Self {
        Self {
            id,
            job,
            assigned_crew: None,
            starting_time_grain: None,
        }
    }

    /// True when both decision variables are set.
    pub fn is_assigned(&self) -> bool {
        self.assigned_crew.is_some() && self.starting_time_grain.is_some()
    }

    /// Grain indices the job occupies when started at `start_index`.
    ///
    /// ```
    /// use maintenance_scheduling::domain::{MaintenanceJob, MaintenanceJobAssignment};
    ///
    /// let job = MaintenanceJob::new(1, "Repave", 1, 0, 10, 3);
    /// let assignment = MaintenanceJobAssignment::new(1, job);
    /// assert_eq!(assignment.occupied_range(4), 4..7);
    /// ```
    pub fn occupied_range(&self, start_index: i64) -> Range<i64> {
        start_index..start_index + self.job.duration_in_grains.max(0)
    }

    /// Extracts the decision variables of this assignment.
    pub fn delta(&self) -> AssignmentDelta {
        AssignmentDelta {
            assignment_id: self.id,
            assigned_crew: self.assigned_crew,
            starting_time_grain: self.starting_time_grain,
        }
    }

    /// Overwrites the decision variables and nothing else.
    pub fn apply(&mut self, delta: &AssignmentDelta) {
        self.assigned_crew = delta.assigned_crew;
        self.starting_time_grain = delta.starting_time_grain;
    }
}

/// The mutable part of one assignment, as persisted after an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDelta {
    pub assignment_id: u64,
    pub assigned_crew: Option<u64>,
    pub starting_time_grain: Option<u64>,
}

/// Number of grains two half-open ranges share.
///
/// ```
/// use maintenance_scheduling::domain::overlap;
///
/// assert_eq!(overlap(&(0..4), &(2..6)), 2);
/// assert_eq!(overlap(&(0..2), &(2..4)), 0);
/// ```
pub fn overlap(a: &Range<i64>, b: &Range<i64>) -> i64 {
    (a.end.min(b.end) - a.start.max(b.start)).max(0)
}

/// The maintenance scheduling solution.
///
/// `score` and `solver_status` are transient: computed on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSchedule {
    pub id: ScheduleId,
    pub maintainable_units: Vec<MaintainableUnit>,
    pub mutually_exclusive_jobs: Vec<MutuallyExclusiveJobs>,
    pub crews: Vec<MaintenanceCrew>,
    pub time_grains: Vec<TimeGrain>,
    pub assignments: Vec<MaintenanceJobAssignment>,
    #[serde(skip)]
    pub score: Option<HardSoftScore>,
    #[serde(skip)]
    pub solver_status: Option<SolverStatus>,
}

impl MaintenanceSchedule {
    pub fn new(
        id: ScheduleId,
        maintainable_units: Vec<MaintainableUnit>,
        mutually_exclusive_jobs: Vec<MutuallyExclusiveJobs>,
        crews: Vec<MaintenanceCrew>,
        time_grains: Vec<TimeGrain>,
        assignments: Vec<MaintenanceJobAssignment>,
    ) -> Self {
        Self {
            id,
            maintainable_units,
            mutually_exclusive_jobs,
            crews,
            time_grains,
            assignments,
            score: None,
            solver_status: None,
        }
    }

    pub fn crew(&self, id: u64) -> Option<&MaintenanceCrew> {
        self.crews.iter().find(|c| c.id == id)
    }

    pub fn time_grain(&self, id: u64) -> Option<&TimeGrain> {
        self.time_grains.iter().find(|g| g.id == id)
    }

    pub fn maintainable_unit(&self, id: u64) -> Option<&MaintainableUnit> {
        self.maintainable_units.iter().find(|u| u.id == id)
    }

    /// Maps time grain ids to grain indices.
    pub fn grain_index_by_id(&self) -> HashMap<u64, i64> {
        self.time_grains.iter().map(|g| (g.id, g.grain_index)).collect()
    }

    /// Number of assignments missing a crew or a start grain.
    pub fn unassigned_count(&self) -> usize {
        self.assignments.iter().filter(|a| !a.is_assigned()).count()
    }

    /// Decision variables of every assignment, in assignment order.
    pub fn assignment_deltas(&self) -> Vec<AssignmentDelta> {
        self.assignments.iter().map(MaintenanceJobAssignment::delta).collect()
    }

    /// Applies deltas by assignment id. Returns the ids that matched nothing.
    pub fn apply_deltas(&mut self, deltas: &[AssignmentDelta]) -> Vec<u64> {
        let mut missing = Vec::new();
        for delta in deltas {
            match self.assignments.iter_mut().find(|a| a.id == delta.assignment_id) {
                Some(assignment) => assignment.apply(delta),
                None => missing.push(delta.assignment_id),
            }
        }
        missing
    }
}
