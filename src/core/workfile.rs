//! Workfile lifecycle: the gated forward path from upcoming to archived
//!
//! ```text
//! Upcoming -> InProgress -> QC -> ReadyForPickup -> Archived
//! ```
//!
//! Every transition re-reads the status under the workfile lock, checks its
//! guards against that state, writes through and commits, all in one critical
//! section. Events go out once the lock is released.

use chrono::Duration;
use tracing::{debug, info};

use crate::core::error::{GuardFailure, LifecycleError, LifecycleResult};
use crate::core::events::LifecycleEvent;
use crate::core::identity::{EntityKind, WorkfileId};
use crate::core::metrics::cycle_time_of;
use crate::core::scheduling::choose_technician;
use crate::core::shop::Shop;
use crate::core::store::Shared;
use crate::entities::{
    AssignedTech, Checkpoint, PartRecord, PartStatus, RelatedTo, TaskStatus, Workfile,
    WorkfileStatus,
};

const QC_CHECKPOINTS: &[Checkpoint] = &[Checkpoint::PreScan, Checkpoint::PostScan];

const PICKUP_CHECKPOINTS: &[Checkpoint] = &[
    Checkpoint::Voil,
    Checkpoint::FourCorners,
    Checkpoint::QcInspection,
];

/// The single status a workfile in `status` may move to
pub fn allowed_transition(status: WorkfileStatus) -> Option<WorkfileStatus> {
    status.next()
}

pub struct WorkfileLifecycle<'a> {
    shop: &'a Shop,
}

impl<'a> WorkfileLifecycle<'a> {
    pub fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Upcoming to in progress
    ///
    /// Needs the upload window behind us and every part ordered. A workfile
    /// without a technician gets the least-loaded one in the same step; if
    /// nobody is available the transition fails.
    pub fn start_repair_work(&self, id: &WorkfileId) -> LifecycleResult<Workfile> {
        let repo = self.shop.repository();
        let window = self.shop.config().upload_window();
        let now = self.shop.now();
        let mut assigned: Option<AssignedTech> = None;

        let pool = repo.assignment_lock();
        let result = self.advance(id, WorkfileStatus::InProgress, |handle, wf| {
            if wf.drop_date.is_none() {
                return Err(GuardFailure::NoDropDate.into());
            }
            let deadline = wf.deadline_status(window, now);
            if !deadline.passed {
                return Err(GuardFailure::UploadWindowOpen {
                    remaining: deadline.remaining.unwrap_or_else(Duration::zero),
                }
                .into());
            }
            let count = wf.parts.to_order_count();
            if count > 0 {
                return Err(GuardFailure::UnorderedParts { count }.into());
            }
            if wf.assigned_tech.is_none() {
                let tech = choose_technician(repo, handle, wf)
                    .ok_or(GuardFailure::NoTechnicianAvailable)?;
                wf.assigned_tech = Some(tech.clone());
                assigned = Some(tech);
            }
            wf.repair_start_date = Some(now);
            Ok(())
        });
        drop(pool);
        let updated = result?;

        if let Some(tech) = assigned {
            self.shop.publish(LifecycleEvent::TechnicianAssigned {
                workfile_id: id.clone(),
                technician: tech.id,
                hours: tech.hours_assigned,
            });
        }
        self.announce(id, WorkfileStatus::InProgress);
        Ok(updated)
    }

    /// In progress to QC: linked tasks done, both scans recorded
    pub fn move_to_qc(&self, id: &WorkfileId) -> LifecycleResult<Workfile> {
        let repo = self.shop.repository();
        let updated = self.advance(id, WorkfileStatus::QC, |_, wf| {
            let open = repo
                .related_task_handles(&RelatedTo::Workfile(wf.id.clone()))
                .iter()
                .filter(|handle| {
                    let task = handle.lock();
                    task.is_live() && task.status != TaskStatus::Completed
                })
                .count();
            if open > 0 {
                return Err(GuardFailure::OpenTasks { count: open }.into());
            }
            require(wf, QC_CHECKPOINTS)
        })?;
        self.announce(id, WorkfileStatus::QC);
        Ok(updated)
    }

    /// QC to ready for pickup: VOIL, 4 corners and QC inspection all done
    pub fn move_to_ready_for_pickup(&self, id: &WorkfileId) -> LifecycleResult<Workfile> {
        let now = self.shop.now();
        let updated = self.advance(id, WorkfileStatus::ReadyForPickup, |_, wf| {
            require(wf, PICKUP_CHECKPOINTS)?;
            wf.repair_completed_date.get_or_insert(now);
            Ok(())
        })?;
        self.announce(id, WorkfileStatus::ReadyForPickup);
        self.shop
            .publish(LifecycleEvent::VehicleReadyForPickup { id: id.clone() });
        Ok(updated)
    }

    /// Vehicle handed back; records the out date and the final cycle time
    pub fn archive_workfile(&self, id: &WorkfileId) -> LifecycleResult<Workfile> {
        let now = self.shop.now();
        let updated = self.advance(id, WorkfileStatus::Archived, |_, wf| {
            wf.vehicle_out_date = Some(now);
            wf.cycle_time = cycle_time_of(wf, now);
            Ok(())
        })?;
        self.announce(id, WorkfileStatus::Archived);
        self.shop.publish(LifecycleEvent::WorkfileArchived {
            id: id.clone(),
            cycle_time: updated.cycle_time,
        });
        Ok(updated)
    }

    /// Move to `target` if it is the next step, through its gated operation
    pub fn transition(&self, id: &WorkfileId, target: WorkfileStatus) -> LifecycleResult<Workfile> {
        let from = self
            .shop
            .workfile(id)
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Workfile, id))?
            .status;
        if allowed_transition(from) != Some(target) {
            return Err(GuardFailure::InvalidTransition { from, to: target }.into());
        }

        match target {
            WorkfileStatus::InProgress => self.start_repair_work(id),
            WorkfileStatus::QC => self.move_to_qc(id),
            WorkfileStatus::ReadyForPickup => self.move_to_ready_for_pickup(id),
            WorkfileStatus::Archived => self.archive_workfile(id),
            WorkfileStatus::Upcoming => Err(GuardFailure::InvalidTransition { from, to: target }.into()),
        }
    }

    /// Tick or clear a checklist item
    pub fn record_checkpoint(
        &self,
        id: &WorkfileId,
        checkpoint: Checkpoint,
        done: bool,
    ) -> LifecycleResult<Workfile> {
        self.edit(id, |wf| {
            wf.set_checkpoint(checkpoint, done);
            Ok(())
        })
    }

    pub fn add_part(&self, id: &WorkfileId, part: PartRecord) -> LifecycleResult<Workfile> {
        let now = self.shop.now();
        self.edit(id, |wf| {
            if part.status == PartStatus::Ordered {
                wf.parts.last_order_date = Some(now);
            }
            wf.parts.list.push(part);
            Ok(())
        })
    }

    /// Update one line of the parts list; ordering a part stamps
    /// `last_order_date`
    pub fn set_part_status(
        &self,
        id: &WorkfileId,
        index: usize,
        status: PartStatus,
    ) -> LifecycleResult<Workfile> {
        let now = self.shop.now();
        self.edit(id, |wf| {
            let len = wf.parts.list.len();
            let part = wf
                .parts
                .list
                .get_mut(index)
                .ok_or(GuardFailure::NoSuchPart { index, len })?;
            part.status = status;
            if status == PartStatus::Ordered {
                wf.parts.last_order_date = Some(now);
            }
            Ok(())
        })
    }

    /// Descriptive edit on a workfile that is not archived
    fn edit(
        &self,
        id: &WorkfileId,
        f: impl FnOnce(&mut Workfile) -> LifecycleResult<()>,
    ) -> LifecycleResult<Workfile> {
        self.shop.repository().modify_workfile(id, |wf| {
            if wf.status == WorkfileStatus::Archived {
                return Err(GuardFailure::WorkfileArchived.into());
            }
            f(wf)?;
            Ok(wf.clone())
        })
    }

    /// One forward step under the workfile lock
    ///
    /// `apply` checks guards and sets side effects on a draft; the status is
    /// set afterwards. Nothing is published here.
    fn advance<F>(&self, id: &WorkfileId, target: WorkfileStatus, apply: F) -> LifecycleResult<Workfile>
    where
        F: FnOnce(&Shared<Workfile>, &mut Workfile) -> LifecycleResult<()>,
    {
        let repo = self.shop.repository();
        let handle = repo.workfile_handle(id)?;
        let mut current = handle.lock();
        let from = current.status;

        let expected = target
            .previous()
            .ok_or(GuardFailure::InvalidTransition { from, to: target })?;
        if from != expected {
            debug!(%id, %from, to = %target, "workfile not in expected status");
            return Err(GuardFailure::WrongWorkfileStatus {
                expected,
                current: from,
            }
            .into());
        }

        let mut next = current.clone();
        if let Err(e) = apply(&handle, &mut next) {
            debug!(%id, to = %target, error = %e, "workfile transition refused");
            return Err(e);
        }
        next.status = target;
        repo.commit_workfile(&mut current, next)?;
        Ok(current.clone())
    }

    fn announce(&self, id: &WorkfileId, to: WorkfileStatus) {
        let Some(from) = to.previous() else {
            return;
        };
        info!(%id, %from, %to, "workfile status changed");
        self.shop.publish(LifecycleEvent::WorkfileStatusChanged {
            id: id.clone(),
            from,
            to,
        });
    }
}

fn require(wf: &Workfile, required: &[Checkpoint]) -> LifecycleResult<()> {
    let missing = wf.missing_checkpoints(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GuardFailure::Incomplete { missing }.into())
    }
}
