//! Entity identifiers
//!
//! Opportunity ids arrive with the lead (e.g. `OPP-1`); workfile and task ids
//! are minted here as `<PREFIX>-<ULID>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Entity kinds tracked by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Opportunity,
    Workfile,
    Task,
    Technician,
}

impl EntityKind {
    /// Id prefix used when minting new ids
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Opportunity => "OPP",
            EntityKind::Workfile => "WF",
            EntityKind::Task => "TASK",
            EntityKind::Technician => "TECH",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Opportunity => write!(f, "opportunity"),
            EntityKind::Workfile => write!(f, "workfile"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::Technician => write!(f, "technician"),
        }
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh `<PREFIX>-<ULID>` id
            pub fn generate() -> Self {
                Self(format!("{}-{}", $kind.prefix(), Ulid::new()))
            }

            /// Borrow the raw id string
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The entity kind this id refers to
            pub fn kind(&self) -> EntityKind {
                $kind
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Identifier of an Opportunity (repair lead)
    OpportunityId,
    EntityKind::Opportunity
);

entity_id!(
    /// Identifier of a Workfile (active repair job)
    WorkfileId,
    EntityKind::Workfile
);

entity_id!(
    /// Identifier of a Task
    TaskId,
    EntityKind::Task
);

entity_id!(
    /// Identifier of a technician
    TechnicianId,
    EntityKind::Technician
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_carry_prefix() {
        let wf = WorkfileId::generate();
        let task = TaskId::generate();

        assert!(wf.as_str().starts_with("WF-"));
        assert!(task.as_str().starts_with("TASK-"));
        assert_ne!(WorkfileId::generate(), wf);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = OpportunityId::from("OPP-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"OPP-1\"");

        let parsed: OpportunityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.kind(), EntityKind::Opportunity);
    }

    #[test]
    fn test_technician_ids_order_lexically() {
        let a = TechnicianId::from("TECH-A");
        let b = TechnicianId::from("TECH-B");
        assert!(a < b);
    }
}
