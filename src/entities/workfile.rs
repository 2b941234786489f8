//! Workfile entity type - active repair jobs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityKind, OpportunityId, TechnicianId, WorkfileId};
use crate::entities::common::{DeadlineStatus, Insurance, Owner, Parts, Vehicle, WeatherImpact};
use crate::entities::opportunity::Opportunity;

/// Repair progression. Ordered: each status may only move to the next one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkfileStatus {
    #[default]
    Upcoming,
    InProgress,
    #[serde(rename = "qc")]
    QC,
    ReadyForPickup,
    Archived,
}

impl WorkfileStatus {
    pub fn all() -> &'static [WorkfileStatus] {
        &[
            WorkfileStatus::Upcoming,
            WorkfileStatus::InProgress,
            WorkfileStatus::QC,
            WorkfileStatus::ReadyForPickup,
            WorkfileStatus::Archived,
        ]
    }

    /// The only status this one may move to
    pub fn next(&self) -> Option<WorkfileStatus> {
        match self {
            WorkfileStatus::Upcoming => Some(WorkfileStatus::InProgress),
            WorkfileStatus::InProgress => Some(WorkfileStatus::QC),
            WorkfileStatus::QC => Some(WorkfileStatus::ReadyForPickup),
            WorkfileStatus::ReadyForPickup => Some(WorkfileStatus::Archived),
            WorkfileStatus::Archived => None,
        }
    }

    /// The status a workfile must be in to move to this one
    pub fn previous(&self) -> Option<WorkfileStatus> {
        WorkfileStatus::all()
            .iter()
            .copied()
            .find(|s| s.next() == Some(*self))
    }

    /// Counts toward a technician's active workload
    pub fn is_active_workload(&self) -> bool {
        matches!(self, WorkfileStatus::Upcoming | WorkfileStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkfileStatus::Upcoming => "upcoming",
            WorkfileStatus::InProgress => "in_progress",
            WorkfileStatus::QC => "qc",
            WorkfileStatus::ReadyForPickup => "ready_for_pickup",
            WorkfileStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for WorkfileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkfileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "upcoming" => Ok(WorkfileStatus::Upcoming),
            "in_progress" | "inprogress" => Ok(WorkfileStatus::InProgress),
            "qc" => Ok(WorkfileStatus::QC),
            "ready_for_pickup" | "readyforpickup" => Ok(WorkfileStatus::ReadyForPickup),
            "archived" => Ok(WorkfileStatus::Archived),
            _ => Err(format!(
                "Invalid workfile status: {}. Use upcoming, in_progress, qc, ready_for_pickup, or archived",
                s
            )),
        }
    }
}

/// Technician assignment on a workfile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedTech {
    pub id: TechnicianId,
    pub name: String,
    #[serde(default)]
    pub hours_assigned: f64,
}

/// Inspection and scan checkpoints tracked on a repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    InsuranceApproval,
    Voil,
    #[serde(rename = "4_corners")]
    FourCorners,
    PreScan,
    PostScan,
    QcInspection,
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Checkpoint::InsuranceApproval => write!(f, "insurance approval"),
            Checkpoint::Voil => write!(f, "VOIL"),
            Checkpoint::FourCorners => write!(f, "4 corners"),
            Checkpoint::PreScan => write!(f, "pre-scan"),
            Checkpoint::PostScan => write!(f, "post-scan"),
            Checkpoint::QcInspection => write!(f, "QC inspection"),
        }
    }
}

impl std::str::FromStr for Checkpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "voil" => Ok(Checkpoint::Voil),
            "4_corners" | "four_corners" => Ok(Checkpoint::FourCorners),
            "pre_scan" => Ok(Checkpoint::PreScan),
            "post_scan" => Ok(Checkpoint::PostScan),
            "qc" | "qc_inspection" => Ok(Checkpoint::QcInspection),
            _ => Err(format!(
                "Invalid checkpoint: {}. Use voil, 4_corners, pre_scan, post_scan, or qc",
                s
            )),
        }
    }
}

/// A Workfile entity - an active repair job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workfile {
    pub id: WorkfileId,

    /// Source opportunity
    pub opportunity_id: OpportunityId,

    #[serde(default)]
    pub status: WorkfileStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_tech: Option<AssignedTech>,

    #[serde(default)]
    pub vehicle: Vehicle,

    #[serde(default)]
    pub owner: Owner,

    #[serde(default)]
    pub insurance: Insurance,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ro_number: Option<String>,

    #[serde(default)]
    pub parts: Parts,

    #[serde(default)]
    pub pre_scan_completed: bool,

    #[serde(default)]
    pub post_scan_completed: bool,

    #[serde(default)]
    pub qc_completed: bool,

    #[serde(default)]
    pub is_voil_complete: bool,

    #[serde(default, rename = "is_4_corners_complete")]
    pub is_four_corners_complete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_deadline: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_start_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_completed_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_out_date: Option<DateTime<Utc>>,

    /// ECD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion_date: Option<DateTime<Utc>>,

    /// Days from intake to repair completion, recorded at archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_time: Option<i64>,

    #[serde(default)]
    pub requires_paint: bool,

    #[serde(default)]
    pub paint_completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_impact: Option<WeatherImpact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created: DateTime<Utc>,
}

impl Entity for Workfile {
    const KIND: EntityKind = EntityKind::Workfile;

    fn id_str(&self) -> &str {
        self.id.as_str()
    }

    fn title(&self) -> String {
        let vehicle = self.vehicle.label();
        if vehicle.is_empty() {
            format!("Repair for {}", self.opportunity_id)
        } else {
            vehicle
        }
    }

    fn status(&self) -> &str {
        self.status.as_str()
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Workfile {
    /// Seed a new workfile from an opportunity
    pub fn from_opportunity(opp: &Opportunity, created: DateTime<Utc>) -> Self {
        Self {
            id: WorkfileId::generate(),
            opportunity_id: opp.id.clone(),
            status: WorkfileStatus::Upcoming,
            assigned_tech: None,
            vehicle: opp.vehicle.clone(),
            owner: opp.owner.clone(),
            insurance: opp.insurance.clone(),
            ro_number: opp.ro_number.clone(),
            parts: opp.parts.clone(),
            pre_scan_completed: false,
            post_scan_completed: false,
            qc_completed: false,
            is_voil_complete: opp.is_voil_complete,
            is_four_corners_complete: opp.is_four_corners_complete,
            drop_date: opp.drop_date,
            upload_deadline: opp.upload_deadline,
            in_date: opp.in_date.or(opp.drop_date),
            repair_start_date: None,
            repair_completed_date: None,
            vehicle_out_date: None,
            estimated_completion_date: opp.estimated_completion_date,
            cycle_time: None,
            requires_paint: false,
            paint_completed: false,
            weather_impact: opp.weather_impact.clone(),
            notes: None,
            created,
        }
    }

    pub fn deadline_status(&self, window: Duration, now: DateTime<Utc>) -> DeadlineStatus {
        DeadlineStatus::evaluate(self.drop_date, window, now)
    }

    pub fn affects_paint(&self) -> bool {
        self.weather_impact
            .as_ref()
            .map(|w| w.affects_paint)
            .unwrap_or(false)
    }

    pub fn paint_pending(&self) -> bool {
        self.requires_paint && !self.paint_completed
    }

    pub fn checkpoint(&self, checkpoint: Checkpoint) -> bool {
        match checkpoint {
            Checkpoint::InsuranceApproval => self.insurance.is_approved(),
            Checkpoint::Voil => self.is_voil_complete,
            Checkpoint::FourCorners => self.is_four_corners_complete,
            Checkpoint::PreScan => self.pre_scan_completed,
            Checkpoint::PostScan => self.post_scan_completed,
            Checkpoint::QcInspection => self.qc_completed,
        }
    }

    /// Set a checklist flag; insurance approval lives on the opportunity
    pub fn set_checkpoint(&mut self, checkpoint: Checkpoint, done: bool) {
        match checkpoint {
            Checkpoint::InsuranceApproval => self.insurance.approved = Some(done),
            Checkpoint::Voil => self.is_voil_complete = done,
            Checkpoint::FourCorners => self.is_four_corners_complete = done,
            Checkpoint::PreScan => self.pre_scan_completed = done,
            Checkpoint::PostScan => self.post_scan_completed = done,
            Checkpoint::QcInspection => self.qc_completed = done,
        }
    }

    /// Checkpoints from `required` that are not yet done
    pub fn missing_checkpoints(&self, required: &[Checkpoint]) -> Vec<Checkpoint> {
        required
            .iter()
            .copied()
            .filter(|c| !self.checkpoint(*c))
            .collect()
    }
}
