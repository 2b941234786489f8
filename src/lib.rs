//! Bodyshop: repair-order lifecycle coordinator for auto-body shops
//!
//! Tracks inbound leads (opportunities) through estimate and approval, turns
//! them into workfiles, and walks each workfile through a gated repair
//! lifecycle with technician assignment, linked tasks and shop metrics.
//! Records are plain YAML files, one per entity.

pub mod cli;
pub mod core;
pub mod entities;
