//! Opportunity lifecycle: archiving, deadlines, status moves and conversion
//! into a workfile

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::error::{GuardFailure, LifecycleResult};
use crate::core::events::LifecycleEvent;
use crate::core::identity::{OpportunityId, WorkfileId};
use crate::core::shop::Shop;
use crate::entities::{
    Checkpoint, DeadlineStatus, Opportunity, OpportunityStage, OpportunityStatus, Workfile,
    WorkfileStatus,
};

/// Statuses an operator may set by hand
const SETTABLE: &[OpportunityStatus] = &[
    OpportunityStatus::New,
    OpportunityStatus::SecondCall,
    OpportunityStatus::Estimate,
    OpportunityStatus::TotalLoss,
];

/// Check whether an opportunity may become a workfile
///
/// Shared by [`OpportunityLifecycle::create_workfile_from_opportunity`] and
/// [`OpportunityLifecycle::get_ready_for_workfile`].
pub fn check_ready_for_workfile(opp: &Opportunity) -> Result<(), GuardFailure> {
    if opp.is_archived {
        return Err(GuardFailure::OpportunityArchived);
    }
    if opp.status != OpportunityStatus::Estimate {
        return Err(GuardFailure::WrongOpportunityStatus {
            expected: OpportunityStatus::Estimate,
            current: opp.status,
        });
    }

    let mut missing = Vec::new();
    if !opp.insurance.is_approved() {
        missing.push(Checkpoint::InsuranceApproval);
    }
    if !opp.is_voil_complete {
        missing.push(Checkpoint::Voil);
    }
    if !opp.is_four_corners_complete {
        missing.push(Checkpoint::FourCorners);
    }
    if !missing.is_empty() {
        return Err(GuardFailure::Incomplete { missing });
    }
    Ok(())
}

pub struct OpportunityLifecycle<'a> {
    shop: &'a Shop,
}

impl<'a> OpportunityLifecycle<'a> {
    pub fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Archive without touching `status`. Returns whether anything changed.
    pub fn archive(&self, id: &OpportunityId) -> LifecycleResult<bool> {
        self.set_archived(id, true)
    }

    /// Restore from archive; `status` comes back exactly as it was
    pub fn unarchive(&self, id: &OpportunityId) -> LifecycleResult<bool> {
        self.set_archived(id, false)
    }

    fn set_archived(&self, id: &OpportunityId, archived: bool) -> LifecycleResult<bool> {
        let changed = self.shop.repository().modify_opportunity(id, |opp| {
            if opp.is_archived == archived {
                return Ok(false);
            }
            opp.is_archived = archived;
            Ok(true)
        })?;

        if changed {
            info!(%id, archived, "opportunity archive flag changed");
            let event = if archived {
                LifecycleEvent::OpportunityArchived { id: id.clone() }
            } else {
                LifecycleEvent::OpportunityUnarchived { id: id.clone() }
            };
            self.shop.publish(event);
        }
        Ok(changed)
    }

    /// Time left in the upload window. Unknown, archived or undated
    /// opportunities report `{passed: false, remaining: None}`.
    pub fn check_upload_deadline(&self, id: &OpportunityId) -> DeadlineStatus {
        match self.shop.opportunity(id) {
            Some(opp) => opp.deadline_status(self.shop.config().upload_window(), self.shop.now()),
            None => DeadlineStatus::not_applicable(),
        }
    }

    /// Convert an approved, fully inspected estimate into a workfile
    ///
    /// Nothing is written unless every gate passes.
    pub fn create_workfile_from_opportunity(&self, id: &OpportunityId) -> LifecycleResult<WorkfileId> {
        let repo = self.shop.repository();
        let handle = repo.opportunity_handle(id)?;
        let mut opp = handle.lock();

        if let Err(reason) = check_ready_for_workfile(&opp) {
            debug!(%id, %reason, "workfile creation refused");
            return Err(reason.into());
        }

        if let Some(existing) = repo.workfile_for_opportunity(id) {
            let existing = existing.lock();
            if existing.status != WorkfileStatus::Archived {
                debug!(%id, workfile = %existing.id, "live workfile already exists");
                return Err(GuardFailure::WorkfileExists(existing.id.clone()).into());
            }
        }

        let workfile = Workfile::from_opportunity(&opp, self.shop.now());
        let workfile_id = workfile.id.clone();
        let from = opp.status;

        let mut next = opp.clone();
        next.status = OpportunityStatus::Upcoming;
        next.stage = OpportunityStage::RepairOrder;

        repo.source().write_workfile(&workfile)?;
        if let Err(e) = repo.commit_opportunity(&mut opp, next) {
            if let Err(rollback) = repo.source().remove_workfile(&workfile_id) {
                warn!(workfile = %workfile_id, error = %rollback, "failed to roll back workfile");
            }
            return Err(e.into());
        }
        repo.insert_workfile(workfile);
        drop(opp);

        info!(%id, workfile = %workfile_id, "workfile created");
        self.shop.publish(LifecycleEvent::WorkfileCreated {
            id: workfile_id.clone(),
            opportunity_id: id.clone(),
        });
        self.shop.publish(LifecycleEvent::OpportunityStatusChanged {
            id: id.clone(),
            from,
            to: OpportunityStatus::Upcoming,
        });
        Ok(workfile_id)
    }

    /// `Archived` selects every archived opportunity whatever its preserved
    /// status; any other status selects live opportunities with that status.
    pub fn get_opportunities_by_status(&self, status: OpportunityStatus) -> Vec<Opportunity> {
        self.shop
            .opportunities()
            .into_iter()
            .filter(|opp| match status {
                OpportunityStatus::Archived => opp.is_archived,
                other => opp.is_active_with(other),
            })
            .collect()
    }

    pub fn get_ready_for_workfile(&self) -> Vec<Opportunity> {
        self.shop
            .opportunities()
            .into_iter()
            .filter(|opp| check_ready_for_workfile(opp).is_ok())
            .collect()
    }

    /// Live estimates and upcoming jobs whose paint work the forecast threatens
    pub fn get_weather_impacted_opportunities(&self) -> Vec<Opportunity> {
        self.shop
            .opportunities()
            .into_iter()
            .filter(|opp| {
                !opp.is_archived
                    && opp.affects_paint()
                    && matches!(
                        opp.status,
                        OpportunityStatus::Estimate | OpportunityStatus::Upcoming
                    )
            })
            .collect()
    }

    /// Manual workflow move among new, second call, estimate and total loss
    ///
    /// Returns whether the status changed.
    ///
    /// Setting total loss escalates every task about the opportunity before
    /// returning, even when the status was already total loss. If escalation
    /// fails the status stays committed and the storage error is returned;
    /// calling again finishes the cascade.
    pub fn set_status(&self, id: &OpportunityId, status: OpportunityStatus) -> LifecycleResult<bool> {
        if !SETTABLE.contains(&status) {
            return Err(GuardFailure::StatusNotSettable(status).into());
        }

        let from = self.shop.repository().modify_opportunity(id, |opp| {
            if opp.is_archived {
                return Err(GuardFailure::OpportunityArchived.into());
            }
            let from = opp.status;
            opp.status = status;
            Ok(from)
        })?;

        let changed = from != status;
        if changed {
            info!(%id, %from, to = %status, "opportunity status changed");
            self.shop.publish(LifecycleEvent::OpportunityStatusChanged {
                id: id.clone(),
                from,
                to: status,
            });
        }

        if status == OpportunityStatus::TotalLoss {
            let count = self.shop.task_linkage().handle_total_loss(id).inspect_err(|e| {
                warn!(opportunity = %id, error = %e, "total loss escalation failed");
            })?;
            info!(opportunity = %id, count, "total loss: tasks escalated");
        }
        Ok(changed)
    }

    pub fn set_stage(&self, id: &OpportunityId, stage: OpportunityStage) -> LifecycleResult<()> {
        self.shop.repository().modify_opportunity(id, |opp| {
            opp.stage = stage;
            Ok(())
        })
    }

    /// Record the drop date; the upload deadline follows it
    pub fn set_drop_date(&self, id: &OpportunityId, drop_date: Option<DateTime<Utc>>) -> LifecycleResult<()> {
        let window = self.shop.config().upload_window();
        self.shop.repository().modify_opportunity(id, |opp| {
            opp.set_drop_date(drop_date, window);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::config::Config;
    use crate::core::error::LifecycleError;
    use crate::core::store::{MemorySource, Snapshot};
    use crate::entities::WeatherImpact;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
    }

    fn ready_opportunity(id: &str) -> Opportunity {
        let mut opp = Opportunity::new(id, start());
        opp.status = OpportunityStatus::Estimate;
        opp.insurance.approved = Some(true);
        opp.is_voil_complete = true;
        opp.is_four_corners_complete = true;
        opp
    }

    fn shop_with(opps: Vec<Opportunity>) -> (Arc<FixedClock>, Shop) {
        let clock = Arc::new(FixedClock::new(start()));
        let seed = Snapshot {
            opportunities: opps,
            ..Default::default()
        };
        let shop = Shop::new(
            Arc::new(MemorySource::new(seed)),
            Config::default(),
            clock.clone(),
        )
        .unwrap();
        (clock, shop)
    }

    #[test]
    fn test_archive_round_trip_preserves_status() {
        let mut opp = Opportunity::new("OPP-1", start());
        opp.status = OpportunityStatus::SecondCall;
        let (_clock, shop) = shop_with(vec![opp.clone()]);
        let flow = shop.opportunity_lifecycle();
        let id = OpportunityId::from("OPP-1");

        assert!(flow.archive(&id).unwrap());
        assert!(!flow.archive(&id).unwrap());
        let archived = shop.opportunity(&id).unwrap();
        assert!(archived.is_archived);
        assert_eq!(archived.status, OpportunityStatus::SecondCall);

        assert!(flow.unarchive(&id).unwrap());
        assert_eq!(shop.opportunity(&id).unwrap(), opp);
    }

    #[test]
    fn test_check_ready_lists_every_missing_gate() {
        let mut opp = ready_opportunity("OPP-1");
        opp.insurance.approved = None;
        opp.is_four_corners_complete = false;

        assert_eq!(
            check_ready_for_workfile(&opp),
            Err(GuardFailure::Incomplete {
                missing: vec![Checkpoint::InsuranceApproval, Checkpoint::FourCorners]
            })
        );
    }

    #[test]
    fn test_create_workfile_happy_path() {
        let (_clock, shop) = shop_with(vec![ready_opportunity("OPP-1")]);
        let id = OpportunityId::from("OPP-1");

        let wf_id = shop
            .opportunity_lifecycle()
            .create_workfile_from_opportunity(&id)
            .unwrap();

        let opp = shop.opportunity(&id).unwrap();
        assert_eq!(opp.status, OpportunityStatus::Upcoming);
        assert_eq!(opp.stage, OpportunityStage::RepairOrder);

        let wf = shop.workfile(&wf_id).unwrap();
        assert_eq!(wf.opportunity_id, id);
        assert_eq!(wf.status, WorkfileStatus::Upcoming);
        assert_eq!(wf.created, start());
    }

    /// Conversion is refused with `expected`, the opportunity is left as it
    /// was and no workfile exists
    fn assert_blocked(opp: Opportunity, expected: GuardFailure) {
        let id = opp.id.clone();
        let (_clock, shop) = shop_with(vec![opp.clone()]);

        let err = shop
            .opportunity_lifecycle()
            .create_workfile_from_opportunity(&id)
            .unwrap_err();

        assert_eq!(err.guard(), Some(&expected));
        assert_eq!(shop.opportunity(&id).unwrap(), opp);
        assert!(shop.workfiles().is_empty());
    }

    #[test]
    fn test_create_workfile_needs_estimate_status() {
        let mut opp = ready_opportunity("OPP-1");
        opp.status = OpportunityStatus::SecondCall;
        assert_blocked(
            opp,
            GuardFailure::WrongOpportunityStatus {
                expected: OpportunityStatus::Estimate,
                current: OpportunityStatus::SecondCall,
            },
        );
    }

    #[test]
    fn test_create_workfile_blocked_by_rejected_insurance() {
        let mut opp = ready_opportunity("OPP-1");
        opp.insurance.approved = Some(false);
        assert_blocked(
            opp,
            GuardFailure::Incomplete {
                missing: vec![Checkpoint::InsuranceApproval],
            },
        );
    }

    #[test]
    fn test_create_workfile_blocked_by_pending_insurance() {
        let mut opp = ready_opportunity("OPP-1");
        opp.insurance.approved = None;
        assert_blocked(
            opp,
            GuardFailure::Incomplete {
                missing: vec![Checkpoint::InsuranceApproval],
            },
        );
    }

    #[test]
    fn test_create_workfile_blocked_by_voil() {
        let mut opp = ready_opportunity("OPP-1");
        opp.is_voil_complete = false;
        assert_blocked(
            opp,
            GuardFailure::Incomplete {
                missing: vec![Checkpoint::Voil],
            },
        );
    }

    #[test]
    fn test_create_workfile_blocked_by_four_corners() {
        let mut opp = ready_opportunity("OPP-1");
        opp.is_four_corners_complete = false;
        assert_blocked(
            opp,
            GuardFailure::Incomplete {
                missing: vec![Checkpoint::FourCorners],
            },
        );
    }

    #[test]
    fn test_create_workfile_blocked_when_archived() {
        let mut opp = ready_opportunity("OPP-1");
        opp.is_archived = true;
        assert_blocked(opp, GuardFailure::OpportunityArchived);
    }

    #[test]
    fn test_create_workfile_twice_is_refused() {
        let (_clock, shop) = shop_with(vec![ready_opportunity("OPP-1")]);
        let flow = shop.opportunity_lifecycle();
        let id = OpportunityId::from("OPP-1");
        flow.create_workfile_from_opportunity(&id).unwrap();

        // Back to estimate by hand; the live workfile still blocks a second one
        flow.set_status(&id, OpportunityStatus::Estimate).unwrap();
        let err = flow.create_workfile_from_opportunity(&id).unwrap_err();
        assert!(matches!(err.guard(), Some(GuardFailure::WorkfileExists(_))));
        assert_eq!(shop.workfiles().len(), 1);
    }

    #[test]
    fn test_create_workfile_rolls_back_on_storage_failure() {
        let clock = Arc::new(FixedClock::new(start()));
        let source = Arc::new(MemorySource::new(Snapshot {
            opportunities: vec![ready_opportunity("OPP-1")],
            ..Default::default()
        }));
        let shop = Shop::new(source.clone(), Config::default(), clock).unwrap();
        source.set_fail_writes(true);

        let err = shop
            .opportunity_lifecycle()
            .create_workfile_from_opportunity(&"OPP-1".into())
            .unwrap_err();

        assert!(err.is_infrastructure());
        assert!(shop.workfiles().is_empty());
        assert!(source.snapshot().workfiles.is_empty());
        assert_eq!(
            shop.opportunity(&"OPP-1".into()).unwrap().status,
            OpportunityStatus::Estimate
        );
    }

    #[test]
    fn test_deadline_countdown() {
        let mut opp = Opportunity::new("OPP-1", start());
        opp.set_drop_date(Some(start()), Duration::hours(24));
        let (clock, shop) = shop_with(vec![opp, Opportunity::new("OPP-2", start())]);
        let flow = shop.opportunity_lifecycle();

        clock.advance(Duration::hours(10));
        let status = flow.check_upload_deadline(&"OPP-1".into());
        assert!(!status.passed);
        assert_eq!(status.remaining, Some(Duration::hours(14)));

        clock.advance(Duration::hours(14));
        assert!(flow.check_upload_deadline(&"OPP-1".into()).passed);

        assert_eq!(
            flow.check_upload_deadline(&"OPP-2".into()),
            DeadlineStatus::not_applicable()
        );
        assert_eq!(
            flow.check_upload_deadline(&"OPP-404".into()),
            DeadlineStatus::not_applicable()
        );
    }

    #[test]
    fn test_by_status_archived_is_cross_cutting() {
        let mut archived_estimate = ready_opportunity("OPP-1");
        archived_estimate.is_archived = true;
        let live_estimate = ready_opportunity("OPP-2");
        let (_clock, shop) = shop_with(vec![archived_estimate, live_estimate]);
        let flow = shop.opportunity_lifecycle();

        let archived: Vec<_> = flow
            .get_opportunities_by_status(OpportunityStatus::Archived)
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(archived, vec![OpportunityId::from("OPP-1")]);

        let estimates: Vec<_> = flow
            .get_opportunities_by_status(OpportunityStatus::Estimate)
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(estimates, vec![OpportunityId::from("OPP-2")]);

        let ready: Vec<_> = flow.get_ready_for_workfile().into_iter().map(|o| o.id).collect();
        assert_eq!(ready, vec![OpportunityId::from("OPP-2")]);
    }

    #[test]
    fn test_weather_impacted_filter() {
        let weather = Some(WeatherImpact {
            affects_paint: true,
            ..Default::default()
        });
        let mut a = ready_opportunity("OPP-1");
        a.weather_impact = weather.clone();
        let mut b = Opportunity::new("OPP-2", start());
        b.weather_impact = weather.clone();
        let mut c = ready_opportunity("OPP-3");
        c.weather_impact = weather;
        c.is_archived = true;
        let (_clock, shop) = shop_with(vec![a, b, c]);

        let ids: Vec<_> = shop
            .opportunity_lifecycle()
            .get_weather_impacted_opportunities()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![OpportunityId::from("OPP-1")]);
    }

    #[test]
    fn test_set_status_rules() {
        let (_clock, shop) = shop_with(vec![Opportunity::new("OPP-1", start())]);
        let flow = shop.opportunity_lifecycle();
        let id = OpportunityId::from("OPP-1");

        assert!(flow.set_status(&id, OpportunityStatus::SecondCall).unwrap());
        assert!(!flow.set_status(&id, OpportunityStatus::SecondCall).unwrap());

        let err = flow.set_status(&id, OpportunityStatus::Upcoming).unwrap_err();
        assert_eq!(
            err.guard(),
            Some(&GuardFailure::StatusNotSettable(OpportunityStatus::Upcoming))
        );

        flow.archive(&id).unwrap();
        let err = flow.set_status(&id, OpportunityStatus::Estimate).unwrap_err();
        assert_eq!(err.guard(), Some(&GuardFailure::OpportunityArchived));

        let err = flow
            .set_status(&"OPP-404".into(), OpportunityStatus::Estimate)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }
}
