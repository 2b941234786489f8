//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use bodyshop::core::{Config, FixedClock, MemorySource, NewTask, Shop, Snapshot, WorkfileId};
use bodyshop::entities::Opportunity;
use bodyshop::entities::OpportunityStatus;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to get a bodyshop command
pub fn bodyshop() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("bodyshop"));
    cmd.env_remove("BODYSHOP_DATA_DIR").env_remove("RUST_LOG");
    cmd
}

/// Helper to create an initialized data directory in a temp dir
pub fn setup_data_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    bodyshop().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Run a command in `tmp` with `-o id` and return the printed id
pub fn run_for_id(tmp: &TempDir, args: &[&str]) -> String {
    let output = bodyshop()
        .current_dir(tmp.path())
        .args(args)
        .args(["-o", "id"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Monday 2024-03-04 08:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
}

/// In-memory shop on a pinned clock
pub struct Fixture {
    pub shop: Shop,
    pub clock: Arc<FixedClock>,
    pub source: Arc<MemorySource>,
}

pub fn fixture() -> Fixture {
    fixture_with(Config::default())
}

pub fn fixture_with(config: Config) -> Fixture {
    let clock = Arc::new(FixedClock::new(t0()));
    let source = Arc::new(MemorySource::new(Snapshot::default()));
    let shop = Shop::new(source.clone(), config, clock.clone()).unwrap();
    Fixture {
        shop,
        clock,
        source,
    }
}

/// An estimate with every gate satisfied, dropped at `t0`
pub fn ready_opportunity(id: &str) -> Opportunity {
    let mut opp = Opportunity::new(id, t0() - Duration::days(1));
    opp.status = OpportunityStatus::Estimate;
    opp.insurance.approved = Some(true);
    opp.is_voil_complete = true;
    opp.is_four_corners_complete = true;
    opp.drop_date = Some(t0());
    opp.vehicle.make = "Honda".to_string();
    opp.vehicle.model = "Civic".to_string();
    opp
}

/// Add a ready opportunity and convert it
pub fn new_workfile(shop: &Shop, opp_id: &str) -> WorkfileId {
    shop.add_opportunity(ready_opportunity(opp_id)).unwrap();
    shop.opportunity_lifecycle()
        .create_workfile_from_opportunity(&opp_id.into())
        .unwrap()
}

/// Workfile with a task of `hours` estimated labour
pub fn workfile_with_hours(shop: &Shop, opp_id: &str, hours: f64) -> WorkfileId {
    let id = new_workfile(shop, opp_id);
    shop.task_linkage()
        .add_task_to_workfile(&id, NewTask::new("Body work").estimated_hours(hours))
        .unwrap();
    id
}
