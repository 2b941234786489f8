//! Racing callers against one shop

mod common;

use bodyshop::core::TechnicianId;
use bodyshop::entities::{OpportunityStatus, WorkfileStatus};
use chrono::Duration;
use common::{fixture, new_workfile, ready_opportunity, workfile_with_hours};
use std::thread;

#[test]
fn test_racing_starts_apply_once() {
    let fx = fixture();
    let wf_id = new_workfile(&fx.shop, "OPP-1");
    fx.shop
        .scheduler()
        .assign_tech(&wf_id, TechnicianId::from("TECH-A"), "A")
        .unwrap();
    fx.clock.advance(Duration::days(2));

    let results: Vec<bool> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| fx.shop.workfile_lifecycle().start_repair_work(&wf_id).is_ok()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(fx.shop.workfile(&wf_id).unwrap().status, WorkfileStatus::InProgress);
}

#[test]
fn test_racing_conversions_create_one_workfile() {
    let fx = fixture();
    fx.shop.add_opportunity(ready_opportunity("OPP-1")).unwrap();

    let created = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                s.spawn(|| {
                    fx.shop
                        .opportunity_lifecycle()
                        .create_workfile_from_opportunity(&"OPP-1".into())
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(created, 1);
    assert_eq!(fx.shop.workfiles().len(), 1);
    assert_eq!(
        fx.shop.opportunity(&"OPP-1".into()).unwrap().status,
        OpportunityStatus::Upcoming
    );
}

#[test]
fn test_racing_auto_assignments_balance_the_pool() {
    let fx = fixture();
    let shop = &fx.shop;

    // Two technicians, four hours each
    let a = workfile_with_hours(shop, "OPP-A", 4.0);
    let b = workfile_with_hours(shop, "OPP-B", 4.0);
    let scheduler = shop.scheduler();
    scheduler.assign_tech(&a, TechnicianId::from("TECH-A"), "A").unwrap();
    scheduler.assign_tech(&b, TechnicianId::from("TECH-B"), "B").unwrap();

    let targets: Vec<_> = (0..4)
        .map(|i| workfile_with_hours(shop, &format!("OPP-{}", i), 2.0))
        .collect();

    thread::scope(|s| {
        for id in &targets {
            s.spawn(move || shop.scheduler().auto_assign_tech(id).unwrap());
        }
    });

    let dist = shop.scheduler().get_tech_workload_distribution();
    assert_eq!(dist.len(), 2);
    assert_eq!(dist[&TechnicianId::from("TECH-A")].hours, 8.0);
    assert_eq!(dist[&TechnicianId::from("TECH-B")].hours, 8.0);
    for id in &targets {
        assert!(shop.workfile(id).unwrap().assigned_tech.is_some());
    }
}
