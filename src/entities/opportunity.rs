//! Opportunity entity type - inbound repair leads

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityKind, OpportunityId};
use crate::entities::common::{DeadlineStatus, Insurance, Owner, Parts, Vehicle, WeatherImpact};

/// Coarse workflow state of an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    #[default]
    New,
    SecondCall,
    Estimate,
    TotalLoss,
    Upcoming,
    /// Cross-cutting filter value; archiving itself only sets `is_archived`
    Archived,
}

impl OpportunityStatus {
    pub fn all() -> &'static [OpportunityStatus] {
        &[
            OpportunityStatus::New,
            OpportunityStatus::SecondCall,
            OpportunityStatus::Estimate,
            OpportunityStatus::TotalLoss,
            OpportunityStatus::Upcoming,
            OpportunityStatus::Archived,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::New => "new",
            OpportunityStatus::SecondCall => "second_call",
            OpportunityStatus::Estimate => "estimate",
            OpportunityStatus::TotalLoss => "total_loss",
            OpportunityStatus::Upcoming => "upcoming",
            OpportunityStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OpportunityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "new" => Ok(OpportunityStatus::New),
            "second_call" | "secondcall" => Ok(OpportunityStatus::SecondCall),
            "estimate" => Ok(OpportunityStatus::Estimate),
            "total_loss" | "totalloss" => Ok(OpportunityStatus::TotalLoss),
            "upcoming" => Ok(OpportunityStatus::Upcoming),
            "archived" => Ok(OpportunityStatus::Archived),
            _ => Err(format!(
                "Invalid opportunity status: {}. Use new, second_call, estimate, total_loss, upcoming, or archived",
                s
            )),
        }
    }
}

/// Fine-grained progress marker, not strictly aligned with status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStage {
    #[default]
    Lead,
    Inspection,
    EstimateCreated,
    SupplementRequested,
    PartsOrdered,
    RepairOrder,
    QcInspection,
    Closed,
}

impl std::fmt::Display for OpportunityStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpportunityStage::Lead => write!(f, "lead"),
            OpportunityStage::Inspection => write!(f, "inspection"),
            OpportunityStage::EstimateCreated => write!(f, "estimate_created"),
            OpportunityStage::SupplementRequested => write!(f, "supplement_requested"),
            OpportunityStage::PartsOrdered => write!(f, "parts_ordered"),
            OpportunityStage::RepairOrder => write!(f, "repair_order"),
            OpportunityStage::QcInspection => write!(f, "qc_inspection"),
            OpportunityStage::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for OpportunityStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "lead" => Ok(OpportunityStage::Lead),
            "inspection" => Ok(OpportunityStage::Inspection),
            "estimate_created" => Ok(OpportunityStage::EstimateCreated),
            "supplement_requested" => Ok(OpportunityStage::SupplementRequested),
            "parts_ordered" => Ok(OpportunityStage::PartsOrdered),
            "repair_order" => Ok(OpportunityStage::RepairOrder),
            "qc_inspection" => Ok(OpportunityStage::QcInspection),
            "closed" => Ok(OpportunityStage::Closed),
            _ => Err(format!("Invalid opportunity stage: {}", s)),
        }
    }
}

/// An Opportunity entity - a prospective repair job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique identifier, assigned at lead intake
    pub id: OpportunityId,

    #[serde(default)]
    pub status: OpportunityStatus,

    #[serde(default)]
    pub stage: OpportunityStage,

    /// Archived flag; `status` is preserved underneath
    #[serde(default)]
    pub is_archived: bool,

    #[serde(default)]
    pub vehicle: Vehicle,

    #[serde(default)]
    pub owner: Owner,

    #[serde(default)]
    pub insurance: Insurance,

    /// VIN/Odometer/Interior/License-plate intake check done
    #[serde(default)]
    pub is_voil_complete: bool,

    /// Four-angle exterior inspection done
    #[serde(default, rename = "is_4_corners_complete")]
    pub is_four_corners_complete: bool,

    /// When the vehicle was dropped at the shop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_date: Option<DateTime<Utc>>,

    /// Photo/document upload deadline (`drop_date` + window)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_deadline: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_date: Option<DateTime<Utc>>,

    /// ECD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_amount: Option<f64>,

    /// Shop repair-order number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ro_number: Option<String>,

    #[serde(default)]
    pub parts: Parts,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_impact: Option<WeatherImpact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created: DateTime<Utc>,
}

impl Entity for Opportunity {
    const KIND: EntityKind = EntityKind::Opportunity;

    fn id_str(&self) -> &str {
        self.id.as_str()
    }

    fn title(&self) -> String {
        let vehicle = self.vehicle.label();
        match (self.owner.name.is_empty(), vehicle.is_empty()) {
            (false, false) => format!("{} - {}", self.owner.name, vehicle),
            (false, true) => self.owner.name.clone(),
            (true, false) => vehicle,
            (true, true) => self.id.to_string(),
        }
    }

    fn status(&self) -> &str {
        if self.is_archived {
            "archived"
        } else {
            self.status.as_str()
        }
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Opportunity {
    /// Create a new lead
    pub fn new(id: impl Into<OpportunityId>, created: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: OpportunityStatus::New,
            stage: OpportunityStage::Lead,
            is_archived: false,
            vehicle: Vehicle::default(),
            owner: Owner::default(),
            insurance: Insurance::default(),
            is_voil_complete: false,
            is_four_corners_complete: false,
            drop_date: None,
            upload_deadline: None,
            in_date: None,
            estimated_completion_date: None,
            estimate_amount: None,
            ro_number: None,
            parts: Parts::default(),
            weather_impact: None,
            notes: None,
            created,
        }
    }

    /// Set the drop date and keep the upload deadline in sync
    pub fn set_drop_date(&mut self, drop_date: Option<DateTime<Utc>>, window: Duration) {
        self.drop_date = drop_date;
        self.upload_deadline = drop_date.map(|d| d + window);
    }

    /// Upload deadline check; archived leads are never "due"
    pub fn deadline_status(&self, window: Duration, now: DateTime<Utc>) -> DeadlineStatus {
        if self.is_archived {
            return DeadlineStatus::not_applicable();
        }
        DeadlineStatus::evaluate(self.drop_date, window, now)
    }

    /// Paint work at risk from the forecast
    pub fn affects_paint(&self) -> bool {
        self.weather_impact
            .as_ref()
            .map(|w| w.affects_paint)
            .unwrap_or(false)
    }

    /// Live (non-archived) status match
    pub fn is_active_with(&self, status: OpportunityStatus) -> bool {
        !self.is_archived && self.status == status
    }
}
