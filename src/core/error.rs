//! Lifecycle error taxonomy
//!
//! Business outcomes (`NotFound`, `GuardFailed`) are kept apart from
//! infrastructure failures (`Storage`) so callers can tell "not allowed right
//! now" from "the system is broken".

use chrono::Duration;
use thiserror::Error;

use crate::core::identity::{EntityKind, OpportunityId, WorkfileId};
use crate::core::store::StoreError;
use crate::entities::{Checkpoint, OpportunityStatus, WorkfileStatus};

/// Why a gated operation was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardFailure {
    #[error("workfile is {current}, expected {expected}")]
    WrongWorkfileStatus {
        expected: WorkfileStatus,
        current: WorkfileStatus,
    },

    #[error("opportunity is {current}, expected {expected}")]
    WrongOpportunityStatus {
        expected: OpportunityStatus,
        current: OpportunityStatus,
    },

    #[error("cannot move workfile from {from} to {to}")]
    InvalidTransition {
        from: WorkfileStatus,
        to: WorkfileStatus,
    },

    #[error("opportunity status cannot be set to {0} directly")]
    StatusNotSettable(OpportunityStatus),

    #[error("opportunity is archived")]
    OpportunityArchived,

    #[error("workfile is archived")]
    WorkfileArchived,

    #[error("workfile {0} already exists for this opportunity")]
    WorkfileExists(WorkfileId),

    #[error("incomplete: {}", format_checkpoints(.missing))]
    Incomplete { missing: Vec<Checkpoint> },

    #[error("no drop date recorded")]
    NoDropDate,

    #[error("upload window still open ({} min remaining)", minutes(.remaining))]
    UploadWindowOpen { remaining: Duration },

    #[error("{count} part(s) still to order")]
    UnorderedParts { count: usize },

    #[error("{count} linked task(s) not completed")]
    OpenTasks { count: usize },

    #[error("no technician available for assignment")]
    NoTechnicianAvailable,

    #[error("task is not linked to an opportunity")]
    NotOpportunityTask,

    #[error("workfile {workfile} was not created from {opportunity}")]
    WorkfileForOtherOpportunity {
        workfile: WorkfileId,
        opportunity: OpportunityId,
    },

    #[error("part index {index} out of range ({len} parts)")]
    NoSuchPart { index: usize, len: usize },
}

fn minutes(d: &Duration) -> i64 {
    d.num_minutes()
}

fn format_checkpoints(missing: &[Checkpoint]) -> String {
    missing
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Transition blocked: {0}")]
    GuardFailed(#[from] GuardFailure),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl LifecycleError {
    pub fn not_found(kind: EntityKind, id: impl AsRef<str>) -> Self {
        LifecycleError::NotFound {
            kind,
            id: id.as_ref().to_string(),
        }
    }

    /// True for failures of the system rather than business refusals
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, LifecycleError::Storage(_))
    }

    pub fn guard(&self) -> Option<&GuardFailure> {
        match self {
            LifecycleError::GuardFailed(g) => Some(g),
            _ => None,
        }
    }
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;
