//! Technician workload and assignment
//!
//! The technician pool is whatever the active workfiles say it is: anyone
//! assigned to an upcoming or in-progress job. Assignment is serialized across
//! the whole pool by the repository's assignment lock, and workload is always
//! recomputed inside it so two racing assignments cannot see the same numbers.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::error::{GuardFailure, LifecycleResult};
use crate::core::events::LifecycleEvent;
use crate::core::identity::{TechnicianId, WorkfileId};
use crate::core::shop::Shop;
use crate::core::store::{Repository, Shared};
use crate::entities::{AssignedTech, RelatedTo, Workfile, WorkfileStatus};

/// Active load carried by one technician
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechLoad {
    pub name: String,
    pub hours: f64,
    pub workfiles: Vec<WorkfileId>,
}

pub type WorkloadDistribution = BTreeMap<TechnicianId, TechLoad>;

fn add_load(dist: &mut WorkloadDistribution, wf: &Workfile) {
    if !wf.status.is_active_workload() {
        return;
    }
    let Some(tech) = &wf.assigned_tech else {
        return;
    };
    let load = dist.entry(tech.id.clone()).or_insert_with(|| TechLoad {
        name: tech.name.clone(),
        hours: 0.0,
        workfiles: Vec::new(),
    });
    load.hours += tech.hours_assigned;
    load.workfiles.push(wf.id.clone());
}

/// Workload over `handles`, leaving out `skip` (a workfile the caller has
/// already locked)
pub(crate) fn workload_of(
    handles: &[Shared<Workfile>],
    skip: Option<&Shared<Workfile>>,
) -> WorkloadDistribution {
    let mut dist = WorkloadDistribution::new();
    for handle in handles {
        if skip.is_some_and(|s| Arc::ptr_eq(s, handle)) {
            continue;
        }
        add_load(&mut dist, &handle.lock());
    }
    dist
}

/// Strict minimum of total hours; the first minimum in id order wins ties
pub(crate) fn least_loaded(dist: &WorkloadDistribution) -> Option<(&TechnicianId, &TechLoad)> {
    let mut best: Option<(&TechnicianId, &TechLoad)> = None;
    for (id, load) in dist {
        match best {
            Some((_, current)) if load.hours >= current.hours => {}
            _ => best = Some((id, load)),
        }
    }
    best
}

/// Sum of estimated hours over the workfile's live tasks
pub(crate) fn estimated_hours_for(repo: &Repository, id: &WorkfileId) -> f64 {
    repo.related_task_handles(&RelatedTo::Workfile(id.clone()))
        .iter()
        .map(|handle| {
            let task = handle.lock();
            if task.is_live() {
                task.estimated_hours.unwrap_or(0.0)
            } else {
                0.0
            }
        })
        .sum()
}

/// Pick a technician for `locked`, whose lock the caller holds along with the
/// assignment lock
pub(crate) fn choose_technician(
    repo: &Repository,
    target: &Shared<Workfile>,
    locked: &Workfile,
) -> Option<AssignedTech> {
    let handles = repo.workfile_handles();
    let dist = workload_of(&handles, Some(target));
    let (id, load) = least_loaded(&dist)?;
    Some(AssignedTech {
        id: id.clone(),
        name: load.name.clone(),
        hours_assigned: estimated_hours_for(repo, &locked.id),
    })
}

pub struct SchedulingEngine<'a> {
    shop: &'a Shop,
}

impl<'a> SchedulingEngine<'a> {
    pub fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Hours per technician over upcoming and in-progress workfiles
    pub fn get_tech_workload_distribution(&self) -> WorkloadDistribution {
        workload_of(&self.shop.repository().workfile_handles(), None)
    }

    /// Estimated hours the workfile would carry if assigned now
    pub fn estimated_hours(&self, id: &WorkfileId) -> f64 {
        estimated_hours_for(self.shop.repository(), id)
    }

    /// Assign the least-loaded technician
    ///
    /// An already assigned workfile keeps its technician. `Ok(None)` means no
    /// technician is known yet; the workfile stays unassigned.
    pub fn auto_assign_tech(&self, id: &WorkfileId) -> LifecycleResult<Option<AssignedTech>> {
        let repo = self.shop.repository();
        let pool = repo.assignment_lock();
        let target = repo.workfile_handle(id)?;
        let mut wf = target.lock();

        if let Some(existing) = &wf.assigned_tech {
            return Ok(Some(existing.clone()));
        }
        let Some(tech) = choose_technician(repo, &target, &wf) else {
            debug!(%id, "no technician available");
            return Ok(None);
        };

        let mut next = wf.clone();
        next.assigned_tech = Some(tech.clone());
        repo.commit_workfile(&mut wf, next)?;
        drop(wf);
        drop(pool);

        info!(%id, technician = %tech.id, hours = tech.hours_assigned, "technician assigned");
        self.shop.publish(LifecycleEvent::TechnicianAssigned {
            workfile_id: id.clone(),
            technician: tech.id.clone(),
            hours: tech.hours_assigned,
        });
        Ok(Some(tech))
    }

    /// Put a named technician on the workfile, replacing any assignment
    pub fn assign_tech(
        &self,
        id: &WorkfileId,
        technician: TechnicianId,
        name: impl Into<String>,
    ) -> LifecycleResult<AssignedTech> {
        let repo = self.shop.repository();
        let pool = repo.assignment_lock();
        let target = repo.workfile_handle(id)?;
        let mut wf = target.lock();

        if wf.status == WorkfileStatus::Archived {
            return Err(GuardFailure::WorkfileArchived.into());
        }

        let tech = AssignedTech {
            id: technician,
            name: name.into(),
            hours_assigned: estimated_hours_for(repo, id),
        };
        let mut next = wf.clone();
        next.assigned_tech = Some(tech.clone());
        repo.commit_workfile(&mut wf, next)?;
        drop(wf);
        drop(pool);

        info!(%id, technician = %tech.id, "technician assigned by hand");
        self.shop.publish(LifecycleEvent::TechnicianAssigned {
            workfile_id: id.clone(),
            technician: tech.id.clone(),
            hours: tech.hours_assigned,
        });
        Ok(tech)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Snapshot;
    use crate::entities::{Opportunity, Task};
    use chrono::Utc;

    fn workfile(id: &str, status: WorkfileStatus, tech: Option<(&str, f64)>) -> Workfile {
        let opp = Opportunity::new(format!("OPP-{}", id), Utc::now());
        let mut wf = Workfile::from_opportunity(&opp, Utc::now());
        wf.id = WorkfileId::from(id);
        wf.status = status;
        wf.assigned_tech = tech.map(|(t, hours)| AssignedTech {
            id: TechnicianId::from(t),
            name: format!("Tech {}", t),
            hours_assigned: hours,
        });
        wf
    }

    fn shop(workfiles: Vec<Workfile>, tasks: Vec<Task>) -> Shop {
        Shop::in_memory(Snapshot {
            workfiles,
            tasks,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_distribution_counts_active_work_only() {
        let shop = shop(
            vec![
                workfile("WF-1", WorkfileStatus::InProgress, Some(("TECH-A", 6.0))),
                workfile("WF-2", WorkfileStatus::Upcoming, Some(("TECH-A", 4.0))),
                workfile("WF-3", WorkfileStatus::QC, Some(("TECH-B", 9.0))),
                workfile("WF-4", WorkfileStatus::Upcoming, None),
            ],
            vec![],
        );

        let dist = shop.scheduler().get_tech_workload_distribution();
        assert_eq!(dist.len(), 1);
        let a = &dist[&TechnicianId::from("TECH-A")];
        assert_eq!(a.hours, 10.0);
        assert_eq!(a.workfiles.len(), 2);
    }

    #[test]
    fn test_auto_assign_picks_least_loaded() {
        let mut task = Task::new("Blend door", "sam", Utc::now());
        task.related_to = Some(RelatedTo::Workfile("WF-9".into()));
        task.estimated_hours = Some(3.5);

        let shop = shop(
            vec![
                workfile("WF-1", WorkfileStatus::InProgress, Some(("TECH-A", 10.0))),
                workfile("WF-2", WorkfileStatus::InProgress, Some(("TECH-B", 4.0))),
                workfile("WF-9", WorkfileStatus::Upcoming, None),
            ],
            vec![task],
        );

        let tech = shop
            .scheduler()
            .auto_assign_tech(&"WF-9".into())
            .unwrap()
            .unwrap();
        assert_eq!(tech.id, TechnicianId::from("TECH-B"));
        assert_eq!(tech.name, "Tech TECH-B");
        assert_eq!(tech.hours_assigned, 3.5);
        assert_eq!(
            shop.workfile(&"WF-9".into()).unwrap().assigned_tech,
            Some(tech)
        );
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let shop = shop(
            vec![
                workfile("WF-1", WorkfileStatus::InProgress, Some(("TECH-C", 5.0))),
                workfile("WF-2", WorkfileStatus::InProgress, Some(("TECH-A", 5.0))),
                workfile("WF-9", WorkfileStatus::Upcoming, None),
            ],
            vec![],
        );

        let tech = shop
            .scheduler()
            .auto_assign_tech(&"WF-9".into())
            .unwrap()
            .unwrap();
        assert_eq!(tech.id, TechnicianId::from("TECH-A"));
    }

    #[test]
    fn test_auto_assign_without_pool_is_none() {
        let shop = shop(vec![workfile("WF-1", WorkfileStatus::Upcoming, None)], vec![]);

        assert_eq!(shop.scheduler().auto_assign_tech(&"WF-1".into()).unwrap(), None);
        assert!(shop.workfile(&"WF-1".into()).unwrap().assigned_tech.is_none());
    }

    #[test]
    fn test_existing_assignment_is_kept() {
        let shop = shop(
            vec![
                workfile("WF-1", WorkfileStatus::InProgress, Some(("TECH-A", 1.0))),
                workfile("WF-2", WorkfileStatus::Upcoming, Some(("TECH-Z", 8.0))),
            ],
            vec![],
        );

        let tech = shop
            .scheduler()
            .auto_assign_tech(&"WF-2".into())
            .unwrap()
            .unwrap();
        assert_eq!(tech.id, TechnicianId::from("TECH-Z"));
    }

    #[test]
    fn test_manual_assignment_joins_pool() {
        let shop = shop(
            vec![
                workfile("WF-1", WorkfileStatus::Upcoming, None),
                workfile("WF-2", WorkfileStatus::Upcoming, None),
            ],
            vec![],
        );
        let scheduler = shop.scheduler();

        scheduler
            .assign_tech(&"WF-1".into(), TechnicianId::from("TECH-A"), "Alex")
            .unwrap();
        let tech = scheduler.auto_assign_tech(&"WF-2".into()).unwrap().unwrap();
        assert_eq!(tech.name, "Alex");
    }

    #[test]
    fn test_unknown_workfile_is_not_found() {
        let shop = shop(vec![], vec![]);
        assert!(shop.scheduler().auto_assign_tech(&"WF-404".into()).is_err());
    }
}
