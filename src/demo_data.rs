//! Demo data generators for Maintenance Scheduling.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{
    MaintainableUnit, MaintenanceCrew, MaintenanceJob, MaintenanceJobAssignment,
    MaintenanceSchedule, MutuallyExclusiveJobs, TimeGrain, GRAIN_LENGTH_IN_MINUTES,
    SINGLETON_SCHEDULE_ID,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                crew_count: 3,
                unit_count: 6,
                job_count: 16,
                days: 5,
                critical_ratio: 0.25,
            },
            DemoData::Large => DemoDataParameters {
                crew_count: 6,
                unit_count: 14,
                job_count: 50,
                days: 10,
                critical_ratio: 0.2,
            },
        }
    }
}

struct DemoDataParameters {
    crew_count: usize,
    unit_count: usize,
    job_count: usize,
    days: i64,
    critical_ratio: f64,
}

const CREW_NAMES: [&str; 8] = [
    "Alpha crew", "Beta crew", "Gamma crew", "Delta crew", "Epsilon crew", "Zeta crew", "Eta crew",
    "Theta crew",
];

const UNIT_NAMES: [&str; 16] = [
    "Bridge A28", "Bridge E40", "Tunnel Kennedy", "Tunnel Liefkens", "Pump station North",
    "Pump station South", "Lock Berendrecht", "Lock Zandvliet", "Overpass R1", "Overpass R2",
    "Viaduct Merksem", "Viaduct Gentbrugge", "Substation West", "Substation East",
    "Signal box Central", "Signal box Harbour",
];

const JOB_NAMES: [&str; 10] = [
    "Inspection", "Cleaning", "Repainting", "Joint replacement", "Lighting repair",
    "Sensor calibration", "Drain unclogging", "Surface repair", "Cable replacement",
    "Safety audit",
];

/// First day of every demo horizon (a Monday).
const START_DATE: (i32, u32, u32) = (2025, 1, 6);

/// Working hours per day, 08:00 to 16:00.
const GRAINS_PER_DAY: i64 = 8;
const FIRST_GRAIN_MINUTE: u32 = 8 * 60;

/// Generates a demo schedule with every job unassigned.
///
/// Generation is seeded, so the same data set always yields the same schedule.
///
/// # Examples
///
/// ```
/// use maintenance_scheduling::demo_data::{generate, DemoData};
///
/// let schedule = generate(DemoData::Small);
/// assert_eq!(schedule.crews.len(), 3);
/// assert_eq!(schedule.time_grains.len(), 40);
/// assert_eq!(schedule.unassigned_count(), schedule.assignments.len());
/// assert_eq!(schedule, generate(DemoData::Small));
/// ```
pub fn generate(demo: DemoData) -> MaintenanceSchedule {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    let crews: Vec<MaintenanceCrew> = CREW_NAMES
        .iter()
        .take(params.crew_count)
        .enumerate()
        .map(|(i, name)| MaintenanceCrew::new(i as u64 + 1, *name))
        .collect();

    let units: Vec<MaintainableUnit> = UNIT_NAMES
        .iter()
        .take(params.unit_count)
        .enumerate()
        .map(|(i, name)| MaintainableUnit::new(i as u64 + 1, *name))
        .collect();

    let time_grains = generate_time_grains(params.days);
    let horizon = params.days * GRAINS_PER_DAY;

    let mut assignments = Vec::with_capacity(params.job_count);
    for i in 0..params.job_count {
        let id = i as u64 + 1;
        let unit = &units[rng.gen_range(0..units.len())];
        let duration = rng.gen_range(1..=4);
        let ready = rng.gen_range(0..=horizon / 2);
        let slack = rng.gen_range(GRAINS_PER_DAY..=3 * GRAINS_PER_DAY);
        let deadline = (ready + duration + slack).min(horizon);
        let name = format!("{} {}", JOB_NAMES[rng.gen_range(0..JOB_NAMES.len())], unit.unit_name);

        let mut job = MaintenanceJob::new(id, name, unit.id, ready, deadline, duration)
            .with_safety_margin(rng.gen_range(1..=2));
        if rng.gen_bool(params.critical_ratio) {
            job = job.critical();
        }
        assignments.push(MaintenanceJobAssignment::new(id, job));
    }

    // Work on the same unit can't happen in parallel.
    let mutually_exclusive_jobs: Vec<MutuallyExclusiveJobs> = units
        .iter()
        .filter_map(|unit| {
            let job_ids: Vec<u64> = assignments
                .iter()
                .filter(|a| a.job.maintainable_unit_id == unit.id)
                .map(|a| a.job.id)
                .collect();
            (job_ids.len() > 1).then(|| (unit, job_ids))
        })
        .enumerate()
        .map(|(i, (unit, job_ids))| {
            MutuallyExclusiveJobs::new(i as u64 + 1, format!("{} works", unit.unit_name), job_ids)
        })
        .collect();

    MaintenanceSchedule::new(
        SINGLETON_SCHEDULE_ID,
        units,
        mutually_exclusive_jobs,
        crews,
        time_grains,
        assignments,
    )
}

fn generate_time_grains(days: i64) -> Vec<TimeGrain> {
    let (y, m, d) = START_DATE;
    let Some(start) = NaiveDate::from_ymd_opt(y, m, d) else {
        return Vec::new();
    };

    (0..days)
        .flat_map(|day| (0..GRAINS_PER_DAY).map(move |slot| (day, slot)))
        .enumerate()
        .map(|(i, (day, slot))| {
            TimeGrain::new(
                i as u64 + 1,
                day * GRAINS_PER_DAY + slot,
                start + Duration::days(day),
                FIRST_GRAIN_MINUTE + slot as u32 * GRAIN_LENGTH_IN_MINUTES,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("small".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("LARGE".parse::<DemoData>(), Ok(DemoData::Large));
        assert!("huge".parse::<DemoData>().is_err());
        assert_eq!(DemoData::Large.as_str(), "LARGE");
    }

    #[test]
    fn test_jobs_fit_their_windows() {
        for demo in [DemoData::Small, DemoData::Large] {
            let schedule = generate(demo);
            let horizon = schedule.time_grains.len() as i64;
            for a in &schedule.assignments {
                let job = &a.job;
                assert!(job.ready_grain_index + job.duration_in_grains <= job.deadline_grain_index);
                assert!(job.deadline_grain_index <= horizon);
                assert!(schedule.maintainable_unit(job.maintainable_unit_id).is_some());
            }
        }
    }

    #[test]
    fn test_time_grains_are_consecutive_working_hours() {
        let grains = generate(DemoData::Small).time_grains;
        for (i, g) in grains.iter().enumerate() {
            assert_eq!(g.grain_index, i as i64);
        }
        assert_eq!(grains[0].start_date_time().to_string(), "2025-01-06 08:00:00");
        assert_eq!(grains[8].start_date_time().to_string(), "2025-01-07 08:00:00");
        assert_eq!(grains[7].starting_minute_of_day, 15 * 60);
    }

    #[test]
    fn test_exclusive_groups_share_a_unit() {
        let schedule = generate(DemoData::Large);
        assert!(!schedule.mutually_exclusive_jobs.is_empty());
        for group in &schedule.mutually_exclusive_jobs {
            let units: std::collections::HashSet<u64> = schedule
                .assignments
                .iter()
                .filter(|a| group.job_ids.contains(&a.job.id))
                .map(|a| a.job.maintainable_unit_id)
                .collect();
            assert_eq!(units.len(), 1);
        }
    }
}
