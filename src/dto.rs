//! DTOs for REST API requests/responses.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    MaintainableUnit, MaintenanceCrew, MaintenanceJobAssignment, MaintenanceSchedule,
    MutuallyExclusiveJobs, TimeGrain,
};
use crate::solver::{SolveDiagnostics, SolverStatus};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaintainableUnitDto {
    pub id: u64,
    pub unit_name: String,
}

impl From<&MaintainableUnit> for MaintainableUnitDto {
    fn from(u: &MaintainableUnit) -> Self {
        Self {
            id: u.id,
            unit_name: u.unit_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrewDto {
    pub id: u64,
    pub crew_name: String,
}

impl From<&MaintenanceCrew> for CrewDto {
    fn from(c: &MaintenanceCrew) -> Self {
        Self {
            id: c.id,
            crew_name: c.crew_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeGrainDto {
    pub id: u64,
    pub grain_index: i64,
    pub date: NaiveDate,
    pub starting_minute_of_day: u32,
    pub start_date_time: NaiveDateTime,
}

impl From<&TimeGrain> for TimeGrainDto {
    fn from(g: &TimeGrain) -> Self {
        Self {
            id: g.id,
            grain_index: g.grain_index,
            date: g.date,
            starting_minute_of_day: g.starting_minute_of_day,
            start_date_time: g.start_date_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutuallyExclusiveJobsDto {
    pub id: u64,
    pub name: String,
    pub job_ids: Vec<u64>,
}

impl From<&MutuallyExclusiveJobs> for MutuallyExclusiveJobsDto {
    fn from(m: &MutuallyExclusiveJobs) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            job_ids: m.job_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub id: u64,
    pub job_name: String,
    pub maintainable_unit_id: u64,
    pub ready_grain_index: i64,
    pub deadline_grain_index: i64,
    pub duration_in_grains: i64,
    pub safety_margin_in_grains: i64,
    pub critical: bool,
}

/// An assignment with its decision values and their resolved times.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub id: u64,
    pub job: JobDto,
    pub assigned_crew: Option<u64>,
    pub starting_time_grain: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<NaiveDateTime>,
    /// First grain index after the job ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_grain_index: Option<i64>,
}

impl AssignmentDto {
    fn from_assignment(a: &MaintenanceJobAssignment, schedule: &MaintenanceSchedule) -> Self {
        let grain = a.starting_time_grain.and_then(|id| schedule.time_grain(id));
        let job = &a.job;
        Self {
            id: a.id,
            job: JobDto {
                id: job.id,
                job_name: job.job_name.clone(),
                maintainable_unit_id: job.maintainable_unit_id,
                ready_grain_index: job.ready_grain_index,
                deadline_grain_index: job.deadline_grain_index,
                duration_in_grains: job.duration_in_grains,
                safety_margin_in_grains: job.safety_margin_in_grains,
                critical: job.critical,
            },
            assigned_crew: a.assigned_crew,
            starting_time_grain: a.starting_time_grain,
            start_date_time: grain.map(TimeGrain::start_date_time),
            end_grain_index: grain.map(|g| a.occupied_range(g.grain_index).end),
        }
    }
}

/// Full schedule with computed score and solver status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDto {
    pub id: u64,
    pub maintainable_units: Vec<MaintainableUnitDto>,
    pub mutually_exclusive_jobs: Vec<MutuallyExclusiveJobsDto>,
    pub crews: Vec<CrewDto>,
    pub time_grains: Vec<TimeGrainDto>,
    pub assignments: Vec<AssignmentDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_status: Option<SolverStatus>,
}

impl ScheduleDto {
    pub fn from_schedule(schedule: &MaintenanceSchedule) -> Self {
        Self {
            id: schedule.id,
            maintainable_units: schedule.maintainable_units.iter().map(Into::into).collect(),
            mutually_exclusive_jobs: schedule.mutually_exclusive_jobs.iter().map(Into::into).collect(),
            crews: schedule.crews.iter().map(Into::into).collect(),
            time_grains: schedule.time_grains.iter().map(Into::into).collect(),
            assignments: schedule
                .assignments
                .iter()
                .map(|a| AssignmentDto::from_assignment(a, schedule))
                .collect(),
            score: schedule.score.map(|s| s.to_string()),
            solver_status: schedule.solver_status,
        }
    }
}

/// Response of `GET /schedule/status`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub solver_status: SolverStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    pub diagnostics: SolveDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{generate, DemoData};

    #[test]
    fn test_schedule_dto_resolves_assignment_times() {
        let mut schedule = generate(DemoData::Small);
        let grain = schedule.time_grains[9].clone();
        schedule.assignments[0].assigned_crew = Some(schedule.crews[0].id);
        schedule.assignments[0].starting_time_grain = Some(grain.id);
        schedule.solver_status = Some(SolverStatus::NotSolving);

        let dto = ScheduleDto::from_schedule(&schedule);
        let first = &dto.assignments[0];
        assert_eq!(first.start_date_time, Some(grain.start_date_time()));
        assert_eq!(
            first.end_grain_index,
            Some(grain.grain_index + schedule.assignments[0].job.duration_in_grains)
        );
        assert!(dto.assignments[1].start_date_time.is_none());

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["solverStatus"], "NOT_SOLVING");
        assert!(json["assignments"][0]["assignedCrew"].is_u64());
        assert!(json["assignments"][1]["startingTimeGrain"].is_null());
        assert_eq!(json["timeGrains"][0]["startDateTime"], "2025-01-06T08:00:00");
        assert!(json.get("score").is_none());
    }
}
