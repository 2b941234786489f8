//! Entity type definitions

pub mod common;
pub mod opportunity;
pub mod task;
pub mod workfile;

pub use common::{DeadlineStatus, Insurance, Owner, PartRecord, PartStatus, Parts, Vehicle, WeatherImpact};
pub use opportunity::{Opportunity, OpportunityStage, OpportunityStatus};
pub use task::{Priority, RelatedTo, Task, TaskStatus, Variant};
pub use workfile::{AssignedTech, Checkpoint, Workfile, WorkfileStatus};
