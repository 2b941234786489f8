//! Shop service - the entry point wiring storage, clock, config and events
//!
//! Each `Shop` owns its own repository, so independent instances (one per
//! tenant, one per test) can coexist in a process.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Config;
use crate::core::error::{GuardFailure, LifecycleResult};
use crate::core::events::{EventBus, EventSink, LifecycleEvent};
use crate::core::identity::{OpportunityId, TaskId, WorkfileId};
use crate::core::metrics::MetricsEngine;
use crate::core::opportunity::OpportunityLifecycle;
use crate::core::scheduling::SchedulingEngine;
use crate::core::store::{DataSource, MemorySource, Repository, Snapshot, StoreError};
use crate::core::tasks::{NewTask, TaskCarryOver, TaskLinkage};
use crate::core::workfile::WorkfileLifecycle;
use crate::entities::{Opportunity, RelatedTo, Task, TaskStatus, Workfile, WorkfileStatus};

pub struct Shop {
    repo: Arc<Repository>,
    config: Config,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl Shop {
    /// Open a shop over `source`, registering the built-in event subscribers
    pub fn new(
        source: Arc<dyn DataSource>,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let repo = Arc::new(Repository::open(source)?);
        let events = EventBus::new();

        if config.tasks.carry_over_on_workfile {
            events.subscribe(Arc::new(TaskCarryOver::new(repo.clone())));
        }

        Ok(Self {
            repo,
            config,
            clock,
            events,
        })
    }

    /// In-memory shop on the wall clock
    pub fn in_memory(seed: Snapshot) -> Result<Self, StoreError> {
        Self::new(
            Arc::new(MemorySource::new(seed)),
            Config::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.events.subscribe(sink);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        self.events.publish(event);
    }

    // =========================================================================
    // Components
    // =========================================================================

    pub fn opportunity_lifecycle(&self) -> OpportunityLifecycle<'_> {
        OpportunityLifecycle::new(self)
    }

    pub fn workfile_lifecycle(&self) -> WorkfileLifecycle<'_> {
        WorkfileLifecycle::new(self)
    }

    pub fn scheduler(&self) -> SchedulingEngine<'_> {
        SchedulingEngine::new(self)
    }

    pub fn metrics(&self) -> MetricsEngine<'_> {
        MetricsEngine::new(self)
    }

    pub fn task_linkage(&self) -> TaskLinkage<'_> {
        TaskLinkage::new(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn opportunity(&self, id: &OpportunityId) -> Option<Opportunity> {
        self.repo.opportunity(id)
    }

    pub fn workfile(&self, id: &WorkfileId) -> Option<Workfile> {
        self.repo.workfile(id)
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.repo.task(id)
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.repo.opportunities()
    }

    pub fn workfiles(&self) -> Vec<Workfile> {
        self.repo.workfiles()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.repo.tasks()
    }

    pub fn workfiles_by_status(&self, status: WorkfileStatus) -> Vec<Workfile> {
        self.repo.workfiles_by_status(status)
    }

    pub fn workfile_for_opportunity(&self, id: &OpportunityId) -> Option<Workfile> {
        self.repo
            .workfile_for_opportunity(id)
            .map(|handle| handle.lock().clone())
    }

    pub fn tasks_for(&self, target: &RelatedTo) -> Vec<Task> {
        self.repo.tasks_for(target)
    }

    pub fn add_task(&self, new: NewTask) -> LifecycleResult<Task> {
        self.task_linkage().add_task(new)
    }

    pub fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> LifecycleResult<Task> {
        self.task_linkage().update_task_status(id, status)
    }

    pub fn remove_task(&self, id: &TaskId) -> LifecycleResult<Task> {
        self.task_linkage().remove_task(id)
    }

    /// Lead intake
    pub fn add_opportunity(&self, mut opportunity: Opportunity) -> LifecycleResult<()> {
        let window = self.config.upload_window();
        opportunity.set_drop_date(opportunity.drop_date, window);
        self.repo.add_opportunity(opportunity)
    }

    /// Edit descriptive fields; status, stage and the archive flag only move
    /// through the lifecycle operations
    pub fn update_opportunity(
        &self,
        id: &OpportunityId,
        f: impl FnOnce(&mut Opportunity),
    ) -> LifecycleResult<Opportunity> {
        let window = self.config.upload_window();
        self.repo.modify_opportunity(id, |opp| {
            let (status, stage, archived) = (opp.status, opp.stage, opp.is_archived);
            f(opp);
            opp.id = id.clone();
            opp.status = status;
            opp.stage = stage;
            opp.is_archived = archived;
            opp.set_drop_date(opp.drop_date, window);
            Ok(opp.clone())
        })
    }

    /// Edit descriptive fields; status, assignment and lifecycle dates are
    /// owned by the lifecycle operations. Archived workfiles are read-only.
    pub fn update_workfile(
        &self,
        id: &WorkfileId,
        f: impl FnOnce(&mut Workfile),
    ) -> LifecycleResult<Workfile> {
        let window = self.config.upload_window();
        self.repo.modify_workfile(id, |wf| {
            if wf.status == WorkfileStatus::Archived {
                return Err(GuardFailure::WorkfileArchived.into());
            }
            let kept = wf.clone();
            f(wf);
            wf.id = kept.id;
            wf.opportunity_id = kept.opportunity_id;
            wf.status = kept.status;
            wf.assigned_tech = kept.assigned_tech;
            wf.repair_start_date = kept.repair_start_date;
            wf.repair_completed_date = kept.repair_completed_date;
            wf.vehicle_out_date = kept.vehicle_out_date;
            wf.cycle_time = kept.cycle_time;
            wf.upload_deadline = wf.drop_date.map(|d| d + window);
            Ok(wf.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::RecordingSink;
    use crate::entities::OpportunityStatus;
    use chrono::{Duration, Utc};

    #[test]
    fn test_update_opportunity_cannot_touch_lifecycle_fields() {
        let shop = Shop::in_memory(Snapshot::default()).unwrap();
        shop.add_opportunity(Opportunity::new("OPP-1", shop.now())).unwrap();

        let updated = shop
            .update_opportunity(&"OPP-1".into(), |opp| {
                opp.status = OpportunityStatus::Upcoming;
                opp.is_archived = true;
                opp.owner.name = "Riley".into();
                opp.drop_date = Some(opp.created);
            })
            .unwrap();

        assert_eq!(updated.status, OpportunityStatus::New);
        assert!(!updated.is_archived);
        assert_eq!(updated.owner.name, "Riley");
        assert_eq!(updated.upload_deadline, Some(updated.created + Duration::hours(24)));
    }

    #[test]
    fn test_intake_derives_upload_deadline() {
        let shop = Shop::in_memory(Snapshot::default()).unwrap();
        let mut opp = Opportunity::new("OPP-1", shop.now());
        opp.drop_date = Some(opp.created);
        shop.add_opportunity(opp).unwrap();

        let stored = shop.opportunity(&"OPP-1".into()).unwrap();
        assert_eq!(stored.upload_deadline, Some(stored.created + Duration::hours(24)));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Shop::in_memory(Snapshot::default()).unwrap();
        let b = Shop::in_memory(Snapshot::default()).unwrap();
        a.add_opportunity(Opportunity::new("OPP-1", a.now())).unwrap();

        assert!(a.opportunity(&"OPP-1".into()).is_some());
        assert!(b.opportunity(&"OPP-1".into()).is_none());
    }

    #[test]
    fn test_subscribers_receive_events() {
        let shop = Shop::in_memory(Snapshot::default()).unwrap();
        let recorder = Arc::new(RecordingSink::new());
        shop.subscribe(recorder.clone());
        shop.add_opportunity(Opportunity::new("OPP-1", shop.now())).unwrap();

        shop.opportunity_lifecycle().archive(&"OPP-1".into()).unwrap();
        assert_eq!(
            recorder.events(),
            vec![LifecycleEvent::OpportunityArchived { id: "OPP-1".into() }]
        );
    }

    #[test]
    fn test_update_workfile_keeps_lifecycle_fields() {
        let shop = Shop::in_memory(Snapshot::default()).unwrap();
        let mut opp = Opportunity::new("OPP-1", shop.now());
        opp.status = OpportunityStatus::Estimate;
        opp.insurance.approved = Some(true);
        opp.is_voil_complete = true;
        opp.is_four_corners_complete = true;
        shop.add_opportunity(opp).unwrap();
        let id = shop
            .opportunity_lifecycle()
            .create_workfile_from_opportunity(&"OPP-1".into())
            .unwrap();

        let updated = shop
            .update_workfile(&id, |wf| {
                wf.status = WorkfileStatus::Archived;
                wf.requires_paint = true;
                wf.drop_date = Some(wf.created);
            })
            .unwrap();

        assert_eq!(updated.status, WorkfileStatus::Upcoming);
        assert!(updated.requires_paint);
        assert_eq!(updated.upload_deadline, Some(updated.created + Duration::hours(24)));
    }

    #[test]
    fn test_update_workfile_refuses_archived() {
        let mut opp = Opportunity::new("OPP-1", Utc::now());
        opp.status = OpportunityStatus::Upcoming;
        let mut wf = Workfile::from_opportunity(&opp, opp.created);
        wf.status = WorkfileStatus::Archived;
        let id = wf.id.clone();
        let shop = Shop::in_memory(Snapshot {
            opportunities: vec![opp],
            workfiles: vec![wf.clone()],
            ..Default::default()
        })
        .unwrap();

        let err = shop
            .update_workfile(&id, |w| w.notes = Some("late edit".into()))
            .unwrap_err();
        assert_eq!(err.guard(), Some(&GuardFailure::WorkfileArchived));
        assert_eq!(shop.workfile(&id).unwrap(), wf);
    }
}
