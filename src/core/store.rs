//! Repository of opportunities, workfiles and tasks
//!
//! Every aggregate lives behind its own `Arc<Mutex<_>>`; the maps holding them
//! sit behind `RwLock`s. Rules that keep this deadlock-free:
//!
//! - entry locks are taken in the order opportunity, workfile, task;
//! - a map lock is never held while waiting on an entry lock (handles are
//!   cloned out first);
//! - only the assignment path holds more than one workfile entry lock, and it
//!   is serialized by [`Repository::assignment_lock`].
//!
//! Writes go through the [`DataSource`] before the in-memory copy changes, so a
//! storage failure leaves memory untouched.

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::core::error::{LifecycleError, LifecycleResult};
use crate::core::identity::{EntityKind, OpportunityId, TaskId, WorkfileId};
use crate::entities::{Opportunity, RelatedTo, Task, Workfile, WorkfileStatus};

/// Shared handle to one aggregate
pub type Shared<T> = Arc<Mutex<T>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to serialize {id}: {message}")]
    Serialize { id: String, message: String },

    #[error("Duplicate {kind} id: {id}")]
    Duplicate { kind: EntityKind, id: String },

    #[error("{kind} {id} would overwrite the file of {existing}")]
    PathCollision {
        kind: EntityKind,
        id: String,
        existing: String,
    },

    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

/// Everything a data source holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub workfiles: Vec<Workfile>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Backing storage: read-all plus write-one per entity type
pub trait DataSource: Send + Sync {
    fn load(&self) -> Result<Snapshot, StoreError>;

    fn write_opportunity(&self, opportunity: &Opportunity) -> Result<(), StoreError>;

    fn write_workfile(&self, workfile: &Workfile) -> Result<(), StoreError>;

    /// Only used to roll back a workfile whose creation could not complete
    fn remove_workfile(&self, id: &WorkfileId) -> Result<(), StoreError>;

    fn write_task(&self, task: &Task) -> Result<(), StoreError>;

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError>;
}

/// In-memory data source, seeded from a snapshot
#[derive(Debug, Default)]
pub struct MemorySource {
    data: Mutex<Snapshot>,
    fail_writes: AtomicBool,
}

impl MemorySource {
    pub fn new(seed: Snapshot) -> Self {
        Self {
            data: Mutex::new(seed),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail (storage outage simulation)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// What has been persisted so far
    pub fn snapshot(&self) -> Snapshot {
        self.data.lock().clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn upsert<T, F>(items: &mut Vec<T>, item: &T, same: F)
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

impl DataSource for MemorySource {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.data.lock().clone())
    }

    fn write_opportunity(&self, opportunity: &Opportunity) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut data = self.data.lock();
        upsert(&mut data.opportunities, opportunity, |o| o.id == opportunity.id);
        Ok(())
    }

    fn write_workfile(&self, workfile: &Workfile) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut data = self.data.lock();
        upsert(&mut data.workfiles, workfile, |w| w.id == workfile.id);
        Ok(())
    }

    fn remove_workfile(&self, id: &WorkfileId) -> Result<(), StoreError> {
        self.data.lock().workfiles.retain(|w| &w.id != id);
        Ok(())
    }

    fn write_task(&self, task: &Task) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut data = self.data.lock();
        upsert(&mut data.tasks, task, |t| t.id == task.id);
        Ok(())
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        self.check_writable()?;
        self.data.lock().tasks.retain(|t| &t.id != id);
        Ok(())
    }
}

#[derive(Default)]
struct WorkfileIndex {
    by_id: BTreeMap<WorkfileId, Shared<Workfile>>,
    /// Most recent workfile per opportunity
    by_opportunity: HashMap<OpportunityId, WorkfileId>,
}

/// In-memory aggregates over a write-through [`DataSource`]
///
/// Outside the crate the repository is read-only; every change goes through
/// the lifecycle components on [`Shop`](crate::core::Shop).
///
/// ```compile_fail
/// use bodyshop::core::{Repository, Snapshot, WorkfileId};
///
/// let repo = Repository::in_memory(Snapshot::default()).unwrap();
/// let _ = repo.modify_workfile(&WorkfileId::from("WF-1"), |_| Ok(()));
/// ```
pub struct Repository {
    source: Arc<dyn DataSource>,
    opportunities: RwLock<BTreeMap<OpportunityId, Shared<Opportunity>>>,
    workfiles: RwLock<WorkfileIndex>,
    tasks: RwLock<BTreeMap<TaskId, Shared<Task>>>,
    assignment: Mutex<()>,
}

impl Repository {
    /// Load everything from the source
    pub fn open(source: Arc<dyn DataSource>) -> Result<Self, StoreError> {
        let snapshot = source.load()?;

        let mut opportunities = BTreeMap::new();
        for opp in snapshot.opportunities {
            let id = opp.id.clone();
            if opportunities.insert(id.clone(), Arc::new(Mutex::new(opp))).is_some() {
                return Err(StoreError::Duplicate {
                    kind: EntityKind::Opportunity,
                    id: id.to_string(),
                });
            }
        }

        let mut workfiles = WorkfileIndex::default();
        let mut ordered = snapshot.workfiles;
        ordered.sort_by_key(|w| w.created);
        for wf in ordered {
            let id = wf.id.clone();
            workfiles
                .by_opportunity
                .insert(wf.opportunity_id.clone(), id.clone());
            if workfiles.by_id.insert(id.clone(), Arc::new(Mutex::new(wf))).is_some() {
                return Err(StoreError::Duplicate {
                    kind: EntityKind::Workfile,
                    id: id.to_string(),
                });
            }
        }

        let mut tasks = BTreeMap::new();
        for task in snapshot.tasks {
            let id = task.id.clone();
            if tasks.insert(id.clone(), Arc::new(Mutex::new(task))).is_some() {
                return Err(StoreError::Duplicate {
                    kind: EntityKind::Task,
                    id: id.to_string(),
                });
            }
        }

        Ok(Self {
            source,
            opportunities: RwLock::new(opportunities),
            workfiles: RwLock::new(workfiles),
            tasks: RwLock::new(tasks),
            assignment: Mutex::new(()),
        })
    }

    pub fn in_memory(seed: Snapshot) -> Result<Self, StoreError> {
        Self::open(Arc::new(MemorySource::new(seed)))
    }

    pub(crate) fn source(&self) -> &dyn DataSource {
        self.source.as_ref()
    }

    /// Serializes technician assignment across the whole pool
    pub(crate) fn assignment_lock(&self) -> MutexGuard<'_, ()> {
        self.assignment.lock()
    }

    // =========================================================================
    // Handles
    // =========================================================================

    pub(crate) fn opportunity_handle(&self, id: &OpportunityId) -> LifecycleResult<Shared<Opportunity>> {
        self.opportunities
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Opportunity, id))
    }

    pub(crate) fn workfile_handle(&self, id: &WorkfileId) -> LifecycleResult<Shared<Workfile>> {
        self.workfiles
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Workfile, id))
    }

    pub(crate) fn task_handle(&self, id: &TaskId) -> LifecycleResult<Shared<Task>> {
        self.tasks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Task, id))
    }

    pub(crate) fn opportunity_handles(&self) -> Vec<Shared<Opportunity>> {
        self.opportunities.read().values().cloned().collect()
    }

    pub(crate) fn workfile_handles(&self) -> Vec<Shared<Workfile>> {
        self.workfiles.read().by_id.values().cloned().collect()
    }

    pub(crate) fn task_handles(&self) -> Vec<Shared<Task>> {
        self.tasks.read().values().cloned().collect()
    }

    /// Latest workfile created from the opportunity, if any
    pub(crate) fn workfile_for_opportunity(&self, id: &OpportunityId) -> Option<Shared<Workfile>> {
        let index = self.workfiles.read();
        index
            .by_opportunity
            .get(id)
            .and_then(|wf_id| index.by_id.get(wf_id))
            .cloned()
    }

    /// Handles of tasks related to `target`, in id order
    pub(crate) fn related_task_handles(&self, target: &RelatedTo) -> Vec<Shared<Task>> {
        self.task_handles()
            .into_iter()
            .filter(|handle| handle.lock().is_related_to(target))
            .collect()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn opportunity(&self, id: &OpportunityId) -> Option<Opportunity> {
        self.opportunity_handle(id).ok().map(|h| h.lock().clone())
    }

    pub fn workfile(&self, id: &WorkfileId) -> Option<Workfile> {
        self.workfile_handle(id).ok().map(|h| h.lock().clone())
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.task_handle(id).ok().map(|h| h.lock().clone())
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.opportunity_handles()
            .iter()
            .map(|h| h.lock().clone())
            .collect()
    }

    pub fn workfiles(&self) -> Vec<Workfile> {
        self.workfile_handles()
            .iter()
            .map(|h| h.lock().clone())
            .collect()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.task_handles().iter().map(|h| h.lock().clone()).collect()
    }

    pub fn workfiles_by_status(&self, status: WorkfileStatus) -> Vec<Workfile> {
        self.workfiles()
            .into_iter()
            .filter(|w| w.status == status)
            .collect()
    }

    pub fn tasks_for(&self, target: &RelatedTo) -> Vec<Task> {
        self.related_task_handles(target)
            .iter()
            .map(|h| h.lock().clone())
            .collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub(crate) fn add_opportunity(&self, opportunity: Opportunity) -> LifecycleResult<()> {
        let mut map = self.opportunities.write();
        if map.contains_key(&opportunity.id) {
            return Err(StoreError::Duplicate {
                kind: EntityKind::Opportunity,
                id: opportunity.id.to_string(),
            }
            .into());
        }
        self.source.write_opportunity(&opportunity)?;
        map.insert(opportunity.id.clone(), Arc::new(Mutex::new(opportunity)));
        Ok(())
    }

    /// Register a freshly created workfile; the caller already persisted it
    pub(crate) fn insert_workfile(&self, workfile: Workfile) -> Shared<Workfile> {
        let mut index = self.workfiles.write();
        let id = workfile.id.clone();
        index
            .by_opportunity
            .insert(workfile.opportunity_id.clone(), id.clone());
        let handle = Arc::new(Mutex::new(workfile));
        index.by_id.insert(id, handle.clone());
        handle
    }

    pub(crate) fn add_task(&self, task: Task) -> LifecycleResult<()> {
        let mut map = self.tasks.write();
        if map.contains_key(&task.id) {
            return Err(StoreError::Duplicate {
                kind: EntityKind::Task,
                id: task.id.to_string(),
            }
            .into());
        }
        self.source.write_task(&task)?;
        map.insert(task.id.clone(), Arc::new(Mutex::new(task)));
        Ok(())
    }

    pub(crate) fn remove_task(&self, id: &TaskId) -> LifecycleResult<Task> {
        let mut map = self.tasks.write();
        let Some(handle) = map.get(id).cloned() else {
            return Err(LifecycleError::not_found(EntityKind::Task, id));
        };
        self.source.delete_task(id)?;
        map.remove(id);
        drop(map);
        let task = handle.lock().clone();
        Ok(task)
    }

    /// Apply `f` to a draft copy; persist and commit only if it returns Ok and
    /// changed something
    pub(crate) fn modify_opportunity<R>(
        &self,
        id: &OpportunityId,
        f: impl FnOnce(&mut Opportunity) -> LifecycleResult<R>,
    ) -> LifecycleResult<R> {
        let handle = self.opportunity_handle(id)?;
        let mut guard = handle.lock();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        self.commit_opportunity(&mut guard, draft)?;
        Ok(out)
    }

    pub(crate) fn modify_workfile<R>(
        &self,
        id: &WorkfileId,
        f: impl FnOnce(&mut Workfile) -> LifecycleResult<R>,
    ) -> LifecycleResult<R> {
        let handle = self.workfile_handle(id)?;
        let mut guard = handle.lock();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        self.commit_workfile(&mut guard, draft)?;
        Ok(out)
    }

    pub(crate) fn modify_task<R>(
        &self,
        id: &TaskId,
        f: impl FnOnce(&mut Task) -> LifecycleResult<R>,
    ) -> LifecycleResult<R> {
        let handle = self.task_handle(id)?;
        let mut guard = handle.lock();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        self.commit_task(&mut guard, draft)?;
        Ok(out)
    }

    pub(crate) fn commit_opportunity(
        &self,
        current: &mut Opportunity,
        next: Opportunity,
    ) -> Result<(), StoreError> {
        if *current == next {
            return Ok(());
        }
        self.source.write_opportunity(&next).inspect_err(|e| {
            warn!(id = %next.id, error = %e, "opportunity write failed");
        })?;
        *current = next;
        Ok(())
    }

    pub(crate) fn commit_workfile(&self, current: &mut Workfile, next: Workfile) -> Result<(), StoreError> {
        if *current == next {
            return Ok(());
        }
        self.source.write_workfile(&next).inspect_err(|e| {
            warn!(id = %next.id, error = %e, "workfile write failed");
        })?;
        *current = next;
        Ok(())
    }

    pub(crate) fn commit_task(&self, current: &mut Task, next: Task) -> Result<(), StoreError> {
        if *current == next {
            return Ok(());
        }
        self.source.write_task(&next).inspect_err(|e| {
            warn!(id = %next.id, error = %e, "task write failed");
        })?;
        *current = next;
        Ok(())
    }
}
