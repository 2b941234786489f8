//! Task entity type - units of work tied to an opportunity or workfile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityKind, OpportunityId, TaskId, WorkfileId};

/// Display variant paired with each priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Danger,
    Warning,
    Success,
    Slate,
}

/// Task priority, each level carrying its display variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn variant(&self) -> Variant {
        match self {
            Priority::Urgent => Variant::Danger,
            Priority::High => Variant::Warning,
            Priority::Normal => Variant::Success,
            Priority::Low => Variant::Slate,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::High => "High",
            Priority::Normal => "Normal",
            Priority::Low => "Low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text().to_lowercase())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "urgent" => Ok(Priority::Urgent),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(format!(
                "Invalid priority: {}. Use urgent, high, normal, or low",
                s
            )),
        }
    }
}

/// Accepted wire forms: `urgent` or `{variant: danger, text: Urgent}`
#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Text(String),
    Tagged {
        #[allow(dead_code)]
        variant: Option<Variant>,
        text: String,
    },
}

impl Serialize for Priority {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match PriorityRepr::deserialize(deserializer)? {
            PriorityRepr::Text(text) => text,
            PriorityRepr::Tagged { text, .. } => text,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Completed,
    Archived,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Open => write!(f, "open"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "archived" => Ok(TaskStatus::Archived),
            _ => Err(format!(
                "Invalid task status: {}. Use open, in_progress, completed, or archived",
                s
            )),
        }
    }
}

/// Weak reference from a task to the record it is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RelatedTo {
    Opportunity(OpportunityId),
    Workfile(WorkfileId),
}

impl RelatedTo {
    pub fn kind(&self) -> EntityKind {
        match self {
            RelatedTo::Opportunity(_) => EntityKind::Opportunity,
            RelatedTo::Workfile(_) => EntityKind::Workfile,
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            RelatedTo::Opportunity(id) => id.as_str(),
            RelatedTo::Workfile(id) => id.as_str(),
        }
    }
}

impl std::fmt::Display for RelatedTo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.id_str())
    }
}

/// A Task entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User who owns the task
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_to: Option<RelatedTo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// Labor estimate, summed into technician assignments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// System-set warning (e.g. total loss)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub created: DateTime<Utc>,
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id_str(&self) -> &str {
        self.id.as_str()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn status(&self) -> &str {
        match self.status {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Task {
    pub fn new(title: impl Into<String>, owner: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::generate(),
            title: title.into(),
            description: None,
            owner: owner.into(),
            priority: Priority::Normal,
            status: TaskStatus::Open,
            related_to: None,
            due_date: None,
            estimated_hours: None,
            message: None,
            created,
        }
    }

    pub fn is_related_to(&self, target: &RelatedTo) -> bool {
        self.related_to.as_ref() == Some(target)
    }

    /// Archived tasks no longer gate anything
    pub fn is_live(&self) -> bool {
        self.status != TaskStatus::Archived
    }
}
