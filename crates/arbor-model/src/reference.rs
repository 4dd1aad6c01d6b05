//! Deferred, id-based links between components and data items
//!
//! A reference is declared during tree construction, possibly before its
//! target exists, and resolved in a second pass against the device's entity
//! index. The unresolved state is a tagged variant rather than a null
//! pointer, so consumers cannot read a target that was never bound.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::{ComponentKey, DataItemKey};

/// Which entity index a reference is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    DataItem,
    Component,
}

/// Resolution state of a reference.
///
/// Transitions are one-way: `Unresolved` becomes `DataItem` or `Component`
/// on the first successful lookup and never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTarget {
    Unresolved(ReferenceType),
    DataItem(DataItemKey),
    Component(ComponentKey),
}

/// A named pointer to another component or data item, looked up by id once
/// the full tree exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Target identifier
    id: String,
    /// Human-readable label, if any
    name: Option<String>,
    /// Resolution state
    target: ReferenceTarget,
}

impl Reference {
    /// Declare a reference to a data item by id.
    pub fn data_item(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            target: ReferenceTarget::Unresolved(ReferenceType::DataItem),
        }
    }

    /// Declare a reference to a component by id.
    pub fn component(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            target: ReferenceTarget::Unresolved(ReferenceType::Component),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Which index this reference is (or was) resolved against.
    pub fn kind(&self) -> ReferenceType {
        match self.target {
            ReferenceTarget::Unresolved(kind) => kind,
            ReferenceTarget::DataItem(_) => ReferenceType::DataItem,
            ReferenceTarget::Component(_) => ReferenceType::Component,
        }
    }

    pub fn target(&self) -> ReferenceTarget {
        self.target
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.target, ReferenceTarget::Unresolved(_))
    }

    /// The resolved data item, if this reference points at one.
    pub fn data_item_key(&self) -> Option<DataItemKey> {
        match self.target {
            ReferenceTarget::DataItem(key) => Some(key),
            _ => None,
        }
    }

    /// The resolved component, if this reference points at one.
    pub fn component_key(&self) -> Option<ComponentKey> {
        match self.target {
            ReferenceTarget::Component(key) => Some(key),
            _ => None,
        }
    }

    /// Attempt resolution against the device's entity indexes. Returns true
    /// if the reference is resolved afterwards. Already-resolved references
    /// are left untouched, misses stay unresolved.
    pub(crate) fn resolve(
        &mut self,
        components: &BTreeMap<String, ComponentKey>,
        data_items: &BTreeMap<String, DataItemKey>,
    ) -> bool {
        match self.target {
            ReferenceTarget::Unresolved(ReferenceType::DataItem) => {
                if let Some(&key) = data_items.get(&self.id) {
                    self.target = ReferenceTarget::DataItem(key);
                    true
                } else {
                    false
                }
            }
            ReferenceTarget::Unresolved(ReferenceType::Component) => {
                if let Some(&key) = components.get(&self.id) {
                    self.target = ReferenceTarget::Component(key);
                    true
                } else {
                    false
                }
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexes() -> (BTreeMap<String, ComponentKey>, BTreeMap<String, DataItemKey>) {
        let mut components = BTreeMap::new();
        components.insert("c1".to_string(), ComponentKey::for_tests(1));
        let mut data_items = BTreeMap::new();
        data_items.insert("d1".to_string(), DataItemKey::for_tests(0));
        (components, data_items)
    }

    #[test]
    fn test_new_reference_is_unresolved() {
        let reference = Reference::data_item("d1", Some("flow"));
        assert!(!reference.is_resolved());
        assert_eq!(reference.kind(), ReferenceType::DataItem);
        assert_eq!(reference.id(), "d1");
        assert_eq!(reference.name(), Some("flow"));
        assert_eq!(reference.data_item_key(), None);
        assert_eq!(reference.component_key(), None);
    }

    #[test]
    fn test_resolve_hit_and_miss() {
        let (components, data_items) = indexes();

        let mut hit = Reference::data_item("d1", None);
        assert!(hit.resolve(&components, &data_items));
        assert_eq!(hit.data_item_key(), Some(DataItemKey::for_tests(0)));
        assert_eq!(hit.kind(), ReferenceType::DataItem);

        let mut miss = Reference::component("nope", None);
        assert!(!miss.resolve(&components, &data_items));
        assert!(!miss.is_resolved());
        assert_eq!(miss.target(), ReferenceTarget::Unresolved(ReferenceType::Component));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (components, data_items) = indexes();

        let mut reference = Reference::component("c1", None);
        assert!(reference.resolve(&components, &data_items));
        let first = reference.target();

        // A second pass leaves the binding exactly as it was
        assert!(reference.resolve(&components, &data_items));
        assert_eq!(reference.target(), first);
        assert_eq!(reference.component_key(), Some(ComponentKey::for_tests(1)));
    }
}
