//! Measurement point and sub-assembly handles
//!
//! The model stores these verbatim and never interprets them beyond id-based
//! lookup and the well-known slot classification below; reporting semantics
//! live in the streaming engine.

use serde::{Deserialize, Serialize};

/// Well-known data item roles cached on the owning component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataItemSlot {
    /// Reports whether the component is reachable at all
    Availability,
    /// Reports asset additions and updates
    AssetChanged,
    /// Reports asset removals
    AssetRemoved,
}

/// A measurement point reporting through exactly one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    /// Unique id within the owning device's scope
    pub id: String,
    /// Human-readable name, if any
    pub name: Option<String>,
    /// Type string, e.g. "POSITION" or "AVAILABILITY"
    pub kind: String,
    /// Subtype string, e.g. "ACTUAL"
    pub subtype: Option<String>,
}

impl DataItem {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: kind.into(),
            subtype: None,
        }
    }

    /// Classify this data item into a well-known slot, matching on the type
    /// string. Anything else is an ordinary measurement point.
    pub fn slot(&self) -> Option<DataItemSlot> {
        match self.kind.as_str() {
            "AVAILABILITY" => Some(DataItemSlot::Availability),
            "ASSET_CHANGED" => Some(DataItemSlot::AssetChanged),
            "ASSET_REMOVED" => Some(DataItemSlot::AssetRemoved),
            _ => None,
        }
    }
}

/// A sub-assembly grouping within a component. Structurally similar to a
/// child component but never owns data items or children of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    /// Unique id within the owning device's scope
    pub id: String,
    /// Type string, e.g. "MOTOR" or "CHUCK"
    pub kind: String,
    /// Human-readable name, if any
    pub name: Option<String>,
    /// Globally unique identifier, if assigned
    pub uuid: Option<String>,
}

impl Composition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            uuid: None,
        }
    }
}
