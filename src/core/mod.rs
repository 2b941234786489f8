//! Core module - storage, lifecycle rules and the shop service

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod identity;
pub mod metrics;
pub mod opportunity;
pub mod scheduling;
pub mod shop;
pub mod store;
pub mod tasks;
pub mod workfile;
pub mod yaml_store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, ConfigError};
pub use entity::Entity;
pub use error::{GuardFailure, LifecycleError, LifecycleResult};
pub use events::{EventBus, EventSink, LifecycleEvent, RecordingSink, TracingSink};
pub use identity::{EntityKind, OpportunityId, TaskId, TechnicianId, WorkfileId};
pub use metrics::{MetricsEngine, ShopSummary};
pub use opportunity::OpportunityLifecycle;
pub use scheduling::{SchedulingEngine, TechLoad, WorkloadDistribution};
pub use shop::Shop;
pub use store::{DataSource, MemorySource, Repository, Snapshot, StoreError};
pub use tasks::{NewTask, TaskCarryOver, TaskLinkage};
pub use workfile::{allowed_transition, WorkfileLifecycle};
pub use yaml_store::YamlSource;
