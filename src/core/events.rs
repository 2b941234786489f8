//! Lifecycle events and their subscribers
//!
//! Mutators publish after their locks are released. Notification sinks
//! (confirmation toasts, audit logs) and internal reactions such as task
//! carry-over subscribe through [`EventSink`].

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::core::identity::{OpportunityId, TechnicianId, WorkfileId};
use crate::entities::{OpportunityStatus, WorkfileStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    OpportunityArchived {
        id: OpportunityId,
    },
    OpportunityUnarchived {
        id: OpportunityId,
    },
    OpportunityStatusChanged {
        id: OpportunityId,
        from: OpportunityStatus,
        to: OpportunityStatus,
    },
    WorkfileCreated {
        id: WorkfileId,
        opportunity_id: OpportunityId,
    },
    WorkfileStatusChanged {
        id: WorkfileId,
        from: WorkfileStatus,
        to: WorkfileStatus,
    },
    TechnicianAssigned {
        workfile_id: WorkfileId,
        technician: TechnicianId,
        hours: f64,
    },
    VehicleReadyForPickup {
        id: WorkfileId,
    },
    WorkfileArchived {
        id: WorkfileId,
        cycle_time: Option<i64>,
    },
}

impl LifecycleEvent {
    /// One-line human summary
    pub fn summary(&self) -> String {
        match self {
            LifecycleEvent::OpportunityArchived { id } => format!("Opportunity {} archived", id),
            LifecycleEvent::OpportunityUnarchived { id } => {
                format!("Opportunity {} restored from archive", id)
            }
            LifecycleEvent::OpportunityStatusChanged { id, from, to } => {
                format!("Opportunity {} moved {} → {}", id, from, to)
            }
            LifecycleEvent::WorkfileCreated { id, opportunity_id } => {
                format!("Workfile {} created from {}", id, opportunity_id)
            }
            LifecycleEvent::WorkfileStatusChanged { id, from, to } => {
                format!("Workfile {} moved {} → {}", id, from, to)
            }
            LifecycleEvent::TechnicianAssigned {
                workfile_id,
                technician,
                hours,
            } => format!("{} assigned to {} ({:.1}h)", technician, workfile_id, hours),
            LifecycleEvent::VehicleReadyForPickup { id } => {
                format!("Vehicle for {} is ready for pickup", id)
            }
            LifecycleEvent::WorkfileArchived { id, cycle_time } => match cycle_time {
                Some(days) => format!("Workfile {} archived after {} day(s)", id, days),
                None => format!("Workfile {} archived", id),
            },
        }
    }
}

/// Receiver of lifecycle events
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &LifecycleEvent);
}

impl<F> EventSink for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn notify(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// Fan-out to registered sinks
#[derive(Default)]
pub struct EventBus {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    pub fn publish(&self, event: LifecycleEvent) {
        // Sinks may publish or subscribe in turn; do not hold the list lock
        let sinks: Vec<_> = self.sinks.read().clone();
        for sink in sinks {
            sink.notify(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.read().len()
    }
}

/// Logs every event at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &LifecycleEvent) {
        info!(target: "bodyshop::events", "{}", event.summary());
    }
}

/// Keeps every event it sees
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}
