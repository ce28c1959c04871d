//! Solution repository: loads problem instances and persists decision deltas.
//!
//! The orchestrator only sees the [`ScheduleRepository`] trait. The bundled
//! [`InMemoryRepository`] keeps one table per record type and can mirror every
//! committed write to a JSON snapshot file.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::{
    AssignmentDelta, MaintainableUnit, MaintenanceCrew, MaintenanceJobAssignment,
    MaintenanceSchedule, MutuallyExclusiveJobs, ScheduleId, TimeGrain,
};
use crate::error::RepositoryError;

/// Result of applying one improvement's deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaReport {
    /// Deltas that matched a stored assignment.
    pub applied: usize,
    /// Assignment ids with no stored record; those deltas were skipped.
    pub missing: Vec<u64>,
}

/// Storage seen by the solve orchestrator.
pub trait ScheduleRepository: Send + Sync {
    /// Loads the full problem instance.
    ///
    /// Fails with [`RepositoryError::NotFound`] for any id but the stored one.
    fn load_instance(&self, id: ScheduleId) -> Result<MaintenanceSchedule, RepositoryError>;

    /// Updates only the decision fields of the matching stored assignment.
    fn save_assignment_delta(&self, delta: &AssignmentDelta) -> Result<(), RepositoryError>;

    /// Applies one improvement's deltas, skipping assignments that vanished.
    ///
    /// Implementations should make the batch visible atomically; this default
    /// saves one delta at a time.
    fn save_assignment_deltas(
        &self,
        deltas: &[AssignmentDelta],
    ) -> Result<DeltaReport, RepositoryError> {
        let mut report = DeltaReport::default();
        for delta in deltas {
            match self.save_assignment_delta(delta) {
                Ok(()) => report.applied += 1,
                Err(RepositoryError::NotFound { .. }) => report.missing.push(delta.assignment_id),
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tables {
    schedule_id: ScheduleId,
    maintainable_units: BTreeMap<u64, MaintainableUnit>,
    mutually_exclusive_jobs: BTreeMap<u64, MutuallyExclusiveJobs>,
    crews: BTreeMap<u64, MaintenanceCrew>,
    time_grains: BTreeMap<u64, TimeGrain>,
    assignments: BTreeMap<u64, MaintenanceJobAssignment>,
}

/// Borrowed view of [`Tables`] with staged assignments, written before commit.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    schedule_id: ScheduleId,
    maintainable_units: &'a BTreeMap<u64, MaintainableUnit>,
    mutually_exclusive_jobs: &'a BTreeMap<u64, MutuallyExclusiveJobs>,
    crews: &'a BTreeMap<u64, MaintenanceCrew>,
    time_grains: &'a BTreeMap<u64, TimeGrain>,
    assignments: &'a BTreeMap<u64, MaintenanceJobAssignment>,
}

impl Tables {
    fn from_schedule(schedule: &MaintenanceSchedule) -> Self {
        Self {
            schedule_id: schedule.id,
            maintainable_units: schedule.maintainable_units.iter().map(|u| (u.id, u.clone())).collect(),
            mutually_exclusive_jobs: schedule
                .mutually_exclusive_jobs
                .iter()
                .map(|m| (m.id, m.clone()))
                .collect(),
            crews: schedule.crews.iter().map(|c| (c.id, c.clone())).collect(),
            time_grains: schedule.time_grains.iter().map(|g| (g.id, g.clone())).collect(),
            assignments: schedule.assignments.iter().map(|a| (a.id, a.clone())).collect(),
        }
    }

    fn snapshot<'a>(&'a self, assignments: &'a BTreeMap<u64, MaintenanceJobAssignment>) -> SnapshotRef<'a> {
        SnapshotRef {
            schedule_id: self.schedule_id,
            maintainable_units: &self.maintainable_units,
            mutually_exclusive_jobs: &self.mutually_exclusive_jobs,
            crews: &self.crews,
            time_grains: &self.time_grains,
            assignments,
        }
    }
}

/// Lock-protected record store with optional JSON snapshot durability.
///
/// Readers take the read lock; each batch of deltas is staged, written to the
/// snapshot (when configured) and committed under one write lock, so a reader
/// never observes half an improvement.
///
/// # Examples
///
/// ```
/// use maintenance_scheduling::demo_data::{generate, DemoData};
/// use maintenance_scheduling::domain::SINGLETON_SCHEDULE_ID;
/// use maintenance_scheduling::repository::{InMemoryRepository, ScheduleRepository};
///
/// let repository = InMemoryRepository::from_schedule(&generate(DemoData::Small));
/// let schedule = repository.load_instance(SINGLETON_SCHEDULE_ID).unwrap();
/// assert!(!schedule.assignments.is_empty());
/// assert!(repository.load_instance(42).is_err());
/// ```
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryRepository {
    /// Creates an empty store for `schedule_id`.
    pub fn new(schedule_id: ScheduleId) -> Self {
        Self {
            tables: RwLock::new(Tables {
                schedule_id,
                ..Tables::default()
            }),
            snapshot_path: None,
        }
    }

    /// Creates a store holding one record per entity of `schedule`.
    pub fn from_schedule(schedule: &MaintenanceSchedule) -> Self {
        Self {
            tables: RwLock::new(Tables::from_schedule(schedule)),
            snapshot_path: None,
        }
    }

    /// Opens a snapshot-backed store.
    ///
    /// Loads `path` when it exists; otherwise stores `seed()` and writes the
    /// first snapshot.
    pub fn open(
        path: impl Into<PathBuf>,
        seed: impl FnOnce() -> MaintenanceSchedule,
    ) -> Result<Self, RepositoryError> {
        let path = path.into();
        let tables = if path.exists() {
            let tables: Tables = serde_json::from_slice(&fs::read(&path)?)?;
            info!(
                path = %path.display(),
                assignments = tables.assignments.len(),
                "Loaded schedule snapshot"
            );
            tables
        } else {
            let tables = Tables::from_schedule(&seed());
            write_snapshot(&path, &tables.snapshot(&tables.assignments))?;
            info!(path = %path.display(), "Seeded new schedule snapshot");
            tables
        };

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn insert_crew(&self, crew: MaintenanceCrew) {
        self.tables.write().crews.insert(crew.id, crew);
    }

    pub fn insert_assignment(&self, assignment: MaintenanceJobAssignment) {
        self.tables.write().assignments.insert(assignment.id, assignment);
    }

    /// Deletes an assignment record, as a concurrent administrative edit would.
    pub fn remove_assignment(&self, id: u64) -> Option<MaintenanceJobAssignment> {
        self.tables.write().assignments.remove(&id)
    }
}

fn write_snapshot(path: &Path, snapshot: &SnapshotRef<'_>) -> Result<(), RepositoryError> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ScheduleRepository for InMemoryRepository {
    fn load_instance(&self, id: ScheduleId) -> Result<MaintenanceSchedule, RepositoryError> {
        let tables = self.tables.read();
        if tables.schedule_id != id {
            return Err(RepositoryError::schedule_not_found(id));
        }

        let mut units: Vec<MaintainableUnit> = tables.maintainable_units.values().cloned().collect();
        units.sort_by(|a, b| a.unit_name.cmp(&b.unit_name).then(a.id.cmp(&b.id)));
        let mut crews: Vec<MaintenanceCrew> = tables.crews.values().cloned().collect();
        crews.sort_by(|a, b| a.crew_name.cmp(&b.crew_name).then(a.id.cmp(&b.id)));
        let mut grains: Vec<TimeGrain> = tables.time_grains.values().cloned().collect();
        grains.sort_by(|a, b| a.grain_index.cmp(&b.grain_index).then(a.id.cmp(&b.id)));

        // BTreeMap iteration is already ordered by id.
        Ok(MaintenanceSchedule::new(
            id,
            units,
            tables.mutually_exclusive_jobs.values().cloned().collect(),
            crews,
            grains,
            tables.assignments.values().cloned().collect(),
        ))
    }

    fn save_assignment_delta(&self, delta: &AssignmentDelta) -> Result<(), RepositoryError> {
        let report = self.save_assignment_deltas(std::slice::from_ref(delta))?;
        if report.missing.is_empty() {
            Ok(())
        } else {
            Err(RepositoryError::assignment_not_found(delta.assignment_id))
        }
    }

    fn save_assignment_deltas(
        &self,
        deltas: &[AssignmentDelta],
    ) -> Result<DeltaReport, RepositoryError> {
        let mut tables = self.tables.write();
        let mut staged = tables.assignments.clone();
        let mut report = DeltaReport::default();

        for delta in deltas {
            match staged.get_mut(&delta.assignment_id) {
                Some(assignment) => {
                    assignment.apply(delta);
                    report.applied += 1;
                }
                None => report.missing.push(delta.assignment_id),
            }
        }

        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &tables.snapshot(&staged))?;
        }
        tables.assignments = staged;

        debug!(applied = report.applied, missing = report.missing.len(), "Saved assignment deltas");
        Ok(report)
    }
}
