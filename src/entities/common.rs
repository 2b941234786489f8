//! Shared value types carried by opportunities and workfiles

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Vehicle under repair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,

    #[serde(default)]
    pub make: String,

    #[serde(default)]
    pub model: String,

    /// Vehicle identification number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Vehicle {
    /// Short "2019 Honda Civic" style label
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        if !self.make.is_empty() {
            parts.push(self.make.clone());
        }
        if !self.model.is_empty() {
            parts.push(self.model.clone());
        }
        parts.join(" ")
    }
}

/// Vehicle owner contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Insurance claim details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insurance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_number: Option<String>,

    /// Tri-state approval: unset until the carrier answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
}

impl Insurance {
    /// Only an explicit approval counts
    pub fn is_approved(&self) -> bool {
        self.approved == Some(true)
    }
}

/// Weather forecast impact on the repair schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherImpact {
    /// Forecast conditions would spoil paint work (humidity, cold, rain)
    #[serde(default)]
    pub affects_paint: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Ordering state of a single part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    #[default]
    ToOrder,
    Ordered,
    Received,
    Returned,
}

impl std::fmt::Display for PartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartStatus::ToOrder => write!(f, "to_order"),
            PartStatus::Ordered => write!(f, "ordered"),
            PartStatus::Received => write!(f, "received"),
            PartStatus::Returned => write!(f, "returned"),
        }
    }
}

impl std::str::FromStr for PartStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "to_order" => Ok(PartStatus::ToOrder),
            "ordered" => Ok(PartStatus::Ordered),
            "received" => Ok(PartStatus::Received),
            "returned" => Ok(PartStatus::Returned),
            _ => Err(format!(
                "Invalid part status: {}. Use to_order, ordered, received, or returned",
                s
            )),
        }
    }
}

/// A single line on the parts list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    #[serde(default)]
    pub unit_price: f64,

    /// Part carries a core charge refunded when the old part goes back
    #[serde(default)]
    pub is_core: bool,

    #[serde(default)]
    pub status: PartStatus,
}

fn default_quantity() -> u32 {
    1
}

impl PartRecord {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            part_number: None,
            quantity,
            unit_price,
            is_core: false,
            status: PartStatus::ToOrder,
        }
    }

    /// Extended price of the line
    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

/// Parts list with derived counts and monetary totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parts {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<PartRecord>,

    /// When the most recent part order was placed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_order_date: Option<DateTime<Utc>>,
}

impl Parts {
    /// Total number of parts (quantity-weighted)
    pub fn total(&self) -> u32 {
        self.list.iter().map(|p| p.quantity).sum()
    }

    /// Number of parts carrying a core charge
    pub fn cores(&self) -> u32 {
        self.list
            .iter()
            .filter(|p| p.is_core)
            .map(|p| p.quantity)
            .sum()
    }

    /// Number of parts sent back to the vendor
    pub fn returns(&self) -> u32 {
        self.list
            .iter()
            .filter(|p| p.status == PartStatus::Returned)
            .map(|p| p.quantity)
            .sum()
    }

    /// Lines still waiting to be ordered
    pub fn to_order_count(&self) -> usize {
        self.list
            .iter()
            .filter(|p| p.status == PartStatus::ToOrder)
            .count()
    }

    pub fn total_cost(&self) -> f64 {
        self.list.iter().map(PartRecord::line_total).sum()
    }

    pub fn core_charges(&self) -> f64 {
        self.list
            .iter()
            .filter(|p| p.is_core)
            .map(PartRecord::line_total)
            .sum()
    }

    pub fn return_credits(&self) -> f64 {
        self.list
            .iter()
            .filter(|p| p.status == PartStatus::Returned)
            .map(PartRecord::line_total)
            .sum()
    }

    /// Cost after vendor credits for returned parts
    pub fn net_cost(&self) -> f64 {
        self.total_cost() - self.return_credits()
    }
}

/// Upload-deadline check result
///
/// `remaining` is `None` when no deadline applies, and zero once it passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadlineStatus {
    pub passed: bool,
    #[serde(serialize_with = "serialize_minutes")]
    pub remaining: Option<Duration>,
}

impl DeadlineStatus {
    /// The "not applicable" result
    pub fn not_applicable() -> Self {
        Self {
            passed: false,
            remaining: None,
        }
    }

    /// Evaluate `drop_date + window` against `now`
    pub fn evaluate(drop_date: Option<DateTime<Utc>>, window: Duration, now: DateTime<Utc>) -> Self {
        let Some(drop_date) = drop_date else {
            return Self::not_applicable();
        };
        let left = (drop_date + window) - now;
        if left <= Duration::zero() {
            Self {
                passed: true,
                remaining: Some(Duration::zero()),
            }
        } else {
            Self {
                passed: false,
                remaining: Some(left),
            }
        }
    }
}

fn serialize_minutes<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(d) => serializer.serialize_some(&d.num_minutes()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn part(status: PartStatus, quantity: u32, price: f64, core: bool) -> PartRecord {
        PartRecord {
            status,
            is_core: core,
            ..PartRecord::new("Bumper cover", quantity, price)
        }
    }

    #[test]
    fn test_parts_derived_counts() {
        let parts = Parts {
            list: vec![
                part(PartStatus::Received, 2, 50.0, false),
                part(PartStatus::Returned, 1, 120.0, true),
                part(PartStatus::ToOrder, 1, 30.0, true),
            ],
            last_order_date: None,
        };

        assert_eq!(parts.total(), 4);
        assert_eq!(parts.cores(), 2);
        assert_eq!(parts.returns(), 1);
        assert_eq!(parts.to_order_count(), 1);
        assert_eq!(parts.total_cost(), 250.0);
        assert_eq!(parts.core_charges(), 150.0);
        assert_eq!(parts.return_credits(), 120.0);
        assert_eq!(parts.net_cost(), 130.0);
    }

    #[test]
    fn test_insurance_tri_state() {
        let mut ins = Insurance::default();
        assert!(!ins.is_approved());
        ins.approved = Some(false);
        assert!(!ins.is_approved());
        ins.approved = Some(true);
        assert!(ins.is_approved());
    }

    #[test]
    fn test_deadline_not_applicable_without_drop_date() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let status = DeadlineStatus::evaluate(None, Duration::hours(24), now);
        assert_eq!(status, DeadlineStatus::not_applicable());
    }

    #[test]
    fn test_deadline_remaining_and_passed() {
        let drop = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();

        let before = DeadlineStatus::evaluate(Some(drop), Duration::hours(24), drop + Duration::hours(20));
        assert!(!before.passed);
        assert_eq!(before.remaining, Some(Duration::hours(4)));

        let exact = DeadlineStatus::evaluate(Some(drop), Duration::hours(24), drop + Duration::hours(24));
        assert!(exact.passed);
        assert_eq!(exact.remaining, Some(Duration::zero()));
    }

    #[test]
    fn test_part_status_parse() {
        assert_eq!("To Order".parse::<PartStatus>().unwrap(), PartStatus::ToOrder);
        assert_eq!("returned".parse::<PartStatus>().unwrap(), PartStatus::Returned);
        assert!("lost".parse::<PartStatus>().is_err());
    }

    #[test]
    fn test_vehicle_label() {
        let v = Vehicle {
            year: Some(2019),
            make: "Honda".into(),
            model: "Civic".into(),
            ..Default::default()
        };
        assert_eq!(v.label(), "2019 Honda Civic");
    }
}
