//! Filter enums for the list commands

use clap::ValueEnum;

use crate::entities::{Opportunity, OpportunityStatus, Priority, TaskStatus, WorkfileStatus};

/// Opportunity list filter
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OppFilter {
    New,
    SecondCall,
    Estimate,
    TotalLoss,
    Upcoming,
    /// Archived opportunities, whatever their status
    Archived,
    /// Everything not archived - default
    #[default]
    Active,
    All,
}

impl OppFilter {
    /// The status query this filter maps to, if it is a single status
    pub fn status(&self) -> Option<OpportunityStatus> {
        match self {
            OppFilter::New => Some(OpportunityStatus::New),
            OppFilter::SecondCall => Some(OpportunityStatus::SecondCall),
            OppFilter::Estimate => Some(OpportunityStatus::Estimate),
            OppFilter::TotalLoss => Some(OpportunityStatus::TotalLoss),
            OppFilter::Upcoming => Some(OpportunityStatus::Upcoming),
            OppFilter::Archived => Some(OpportunityStatus::Archived),
            OppFilter::Active | OppFilter::All => None,
        }
    }

    pub fn matches(&self, opp: &Opportunity) -> bool {
        match self {
            OppFilter::Archived => opp.is_archived,
            OppFilter::Active => !opp.is_archived,
            OppFilter::All => true,
            other => other.status().is_some_and(|s| opp.is_active_with(s)),
        }
    }
}

/// Workfile list filter
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum WfFilter {
    Upcoming,
    InProgress,
    Qc,
    ReadyForPickup,
    Archived,
    /// Everything not archived - default
    #[default]
    Active,
    All,
}

impl WfFilter {
    pub fn matches(&self, status: WorkfileStatus) -> bool {
        match self {
            WfFilter::Upcoming => status == WorkfileStatus::Upcoming,
            WfFilter::InProgress => status == WorkfileStatus::InProgress,
            WfFilter::Qc => status == WorkfileStatus::QC,
            WfFilter::ReadyForPickup => status == WorkfileStatus::ReadyForPickup,
            WfFilter::Archived => status == WorkfileStatus::Archived,
            WfFilter::Active => status != WorkfileStatus::Archived,
            WfFilter::All => true,
        }
    }
}

/// Task list filter
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum TaskFilter {
    Open,
    InProgress,
    Completed,
    Archived,
    /// Open and in progress - default
    #[default]
    Pending,
    All,
}

impl TaskFilter {
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            TaskFilter::Open => status == TaskStatus::Open,
            TaskFilter::InProgress => status == TaskStatus::InProgress,
            TaskFilter::Completed => status == TaskStatus::Completed,
            TaskFilter::Archived => status == TaskStatus::Archived,
            TaskFilter::Pending => matches!(status, TaskStatus::Open | TaskStatus::InProgress),
            TaskFilter::All => true,
        }
    }
}

/// Priority filter for task lists
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    Urgent,
    High,
    Normal,
    Low,
    /// Urgent and high
    Pressing,
    #[default]
    All,
}

impl PriorityFilter {
    pub fn matches(&self, priority: Priority) -> bool {
        match self {
            PriorityFilter::Urgent => priority == Priority::Urgent,
            PriorityFilter::High => priority == Priority::High,
            PriorityFilter::Normal => priority == Priority::Normal,
            PriorityFilter::Low => priority == Priority::Low,
            PriorityFilter::Pressing => matches!(priority, Priority::Urgent | Priority::High),
            PriorityFilter::All => true,
        }
    }
}
