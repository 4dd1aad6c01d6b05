//! Arbor Model - In-memory structure model of a monitored device
//!
//! This crate provides the foundational types the Arbor agent builds its
//! device tree from:
//! - Component tree nodes with a derived attribute view for serializers
//! - DataItem and Composition handles associated with components
//! - Deferred cross-references, resolved against the device's entity index
//!   in a second pass once the full tree exists
//! - The DeviceModel arena that owns every node and the id indexes
//!
//! Construction is single-threaded; once the builder has attached every
//! node and run [`DeviceModel::resolve_references`], the tree is treated as
//! frozen and read concurrently without locking.

pub mod component;
pub mod data_item;
pub mod device;
pub mod reference;

pub use component::{Component, Element, ELEMENT_NAMES};
pub use data_item::{Composition, DataItem, DataItemSlot};
pub use device::{
    ComponentKey, CompositionKey, DataItemKey, DeviceModel, ModelError, DEVICE_CLASS,
};
pub use reference::{Reference, ReferenceTarget, ReferenceType};
