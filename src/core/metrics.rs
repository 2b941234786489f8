//! Read-only shop metrics
//!
//! Everything here is computed per call from the current aggregates. Each
//! workfile is read under its own lock, one at a time, so results spanning
//! several workfiles are only eventually consistent with transitions running
//! concurrently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::identity::WorkfileId;
use crate::core::shop::Shop;
use crate::entities::{Workfile, WorkfileStatus};

const SECS_PER_DAY: i64 = 86_400;

/// Whole days from `from` to `to`, rounded up; never negative
pub fn ceil_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let secs = (to - from).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + SECS_PER_DAY - 1) / SECS_PER_DAY
    }
}

/// Cycle time of a workfile as of `now`
///
/// Finished repairs count intake to completion; live ones count intake to
/// `now`. QC and archived workfiles report `None` (archived ones carry the
/// value recorded at archive time in `cycle_time`).
pub fn cycle_time_of(wf: &Workfile, now: DateTime<Utc>) -> Option<i64> {
    let in_date = wf.in_date?;
    match wf.status {
        WorkfileStatus::ReadyForPickup => wf.repair_completed_date.map(|done| ceil_days(in_date, done)),
        WorkfileStatus::Upcoming | WorkfileStatus::InProgress => Some(ceil_days(in_date, now)),
        WorkfileStatus::QC | WorkfileStatus::Archived => None,
    }
}

/// Shop-wide snapshot for dashboards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopSummary {
    /// Live opportunities per status
    pub opportunities: BTreeMap<String, usize>,
    pub archived_opportunities: usize,
    pub workfiles: BTreeMap<String, usize>,
    pub parts_return_rate: f64,
    pub average_cycle_time: Option<f64>,
    pub overdue: usize,
    pub last_minute_orders: usize,
    pub paint_risks: usize,
}

pub struct MetricsEngine<'a> {
    shop: &'a Shop,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    pub fn calculate_cycle_time(&self, id: &WorkfileId) -> Option<i64> {
        let wf = self.shop.workfile(id)?;
        cycle_time_of(&wf, self.shop.now())
    }

    /// Returned parts as a percentage of all parts, 0 with no parts at all
    pub fn get_parts_return_rate(&self) -> f64 {
        let (returns, total) = self
            .shop
            .workfiles()
            .iter()
            .fold((0u64, 0u64), |(r, t), wf| {
                (r + u64::from(wf.parts.returns()), t + u64::from(wf.parts.total()))
            });
        if total == 0 {
            return 0.0;
        }
        (returns as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Workfiles whose latest parts order landed inside the configured window
    /// before the ECD
    pub fn get_last_minute_parts_orders(&self) -> Vec<Workfile> {
        let window = &self.shop.config().last_minute_parts;
        self.shop
            .workfiles()
            .into_iter()
            .filter(|wf| {
                let (Some(ecd), Some(ordered)) = (wf.estimated_completion_date, wf.parts.last_order_date)
                else {
                    return false;
                };
                let hours = (ecd - ordered).num_seconds() as f64 / 3600.0;
                window.contains(hours)
            })
            .collect()
    }

    pub fn check_weather_impact(&self, id: &WorkfileId) -> bool {
        self.shop
            .workfile(id)
            .map(|wf| wf.affects_paint())
            .unwrap_or(false)
    }

    /// Days until the ECD, rounded up; negative once overdue
    pub fn days_until_completion(&self, id: &WorkfileId) -> Option<i64> {
        let wf = self.shop.workfile(id)?;
        if wf.status == WorkfileStatus::Archived {
            return None;
        }
        let secs = (wf.estimated_completion_date? - self.shop.now()).num_seconds();
        Some(-(-secs).div_euclid(SECS_PER_DAY))
    }

    /// Unfinished workfiles whose ECD has passed
    pub fn get_overdue_workfiles(&self) -> Vec<Workfile> {
        let now = self.shop.now();
        self.shop
            .workfiles()
            .into_iter()
            .filter(|wf| {
                matches!(
                    wf.status,
                    WorkfileStatus::Upcoming | WorkfileStatus::InProgress | WorkfileStatus::QC
                ) && wf.estimated_completion_date.is_some_and(|ecd| ecd < now)
            })
            .collect()
    }

    /// Paint still to do on jobs the forecast threatens
    pub fn get_paint_schedule_risks(&self) -> Vec<Workfile> {
        self.shop
            .workfiles()
            .into_iter()
            .filter(|wf| {
                wf.affects_paint()
                    && wf.paint_pending()
                    && matches!(wf.status, WorkfileStatus::Upcoming | WorkfileStatus::InProgress)
            })
            .collect()
    }

    pub fn summary(&self) -> ShopSummary {
        let now = self.shop.now();

        let mut opportunities = BTreeMap::new();
        let mut archived_opportunities = 0;
        for opp in self.shop.opportunities() {
            if opp.is_archived {
                archived_opportunities += 1;
            } else {
                *opportunities.entry(opp.status.to_string()).or_insert(0) += 1;
            }
        }

        let workfiles = self.shop.workfiles();
        let mut by_status = BTreeMap::new();
        let mut cycle_times = Vec::new();
        for wf in &workfiles {
            *by_status.entry(wf.status.to_string()).or_insert(0) += 1;
            if let Some(days) = cycle_time_of(wf, now).or(wf.cycle_time) {
                cycle_times.push(days as f64);
            }
        }
        let average_cycle_time = if cycle_times.is_empty() {
            None
        } else {
            Some(cycle_times.iter().sum::<f64>() / cycle_times.len() as f64)
        };

        ShopSummary {
            opportunities,
            archived_opportunities,
            workfiles: by_status,
            parts_return_rate: self.get_parts_return_rate(),
            average_cycle_time,
            overdue: self.get_overdue_workfiles().len(),
            last_minute_orders: self.get_last_minute_parts_orders().len(),
            paint_risks: self.get_paint_schedule_risks().len(),
        }
    }
}
