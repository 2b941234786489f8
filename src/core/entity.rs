//! Entity trait - common interface for all entity types

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::identity::EntityKind;

/// Common trait for all shop entities
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// The entity kind
    const KIND: EntityKind;

    /// Get the entity's unique ID as a string
    fn id_str(&self) -> &str;

    /// Get the entity's display title
    fn title(&self) -> String;

    /// Get the entity's status
    fn status(&self) -> &str;

    /// Get the creation timestamp
    fn created(&self) -> DateTime<Utc>;
}
