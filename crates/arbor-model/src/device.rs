//! Device arena: owns every node in one structure tree
//!
//! All components, data items and compositions of a device live in arenas
//! inside [`DeviceModel`]; relations between them are stored as arena keys
//! rather than back-references, which keeps ownership one-directional
//! (device → nodes) and makes the acyclic-parent invariant hold by
//! construction: [`DeviceModel::add_component`] only ever attaches a brand
//! new node under an existing parent, so no attach can close a cycle.
//!
//! The device also owns the entity indexes (id → key) consulted by
//! [`DeviceModel::resolve_references`] and by-id lookups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::component::Component;
use crate::data_item::{Composition, DataItem, DataItemSlot};
use crate::reference::Reference;

/// Class name of the root component of every device tree.
pub const DEVICE_CLASS: &str = "Device";

/// Key of a component in its device's arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ComponentKey(pub(crate) usize);

/// Key of a data item in its device's arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DataItemKey(pub(crate) usize);

/// Key of a composition in its device's arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CompositionKey(pub(crate) usize);

#[cfg(test)]
impl ComponentKey {
    pub(crate) fn for_tests(index: usize) -> Self {
        Self(index)
    }
}

#[cfg(test)]
impl DataItemKey {
    pub(crate) fn for_tests(index: usize) -> Self {
        Self(index)
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("duplicate component id `{0}` in device index")]
    DuplicateComponentId(String),
    #[error("duplicate data item id `{0}` in device index")]
    DuplicateDataItemId(String),
    #[error("component key {0:?} does not belong to this device")]
    UnknownComponent(ComponentKey),
}

/// One device: the root component, the arenas behind it, and the id indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceModel {
    components: Vec<Component>,
    data_items: Vec<DataItem>,
    compositions: Vec<Composition>,
    /// id → key over all components in the tree, root included
    component_index: BTreeMap<String, ComponentKey>,
    /// id → key over all data items in the tree
    data_item_index: BTreeMap<String, DataItemKey>,
}

impl DeviceModel {
    /// Create a device with a root component of class [`DEVICE_CLASS`] built
    /// from the given attribute seed.
    pub fn new(seed: &BTreeMap<String, String>) -> Self {
        let root = Component::new(DEVICE_CLASS, seed, None);
        let mut component_index = BTreeMap::new();
        component_index.insert(root.id().to_string(), ComponentKey(0));
        Self {
            components: vec![root],
            data_items: Vec::new(),
            compositions: Vec::new(),
            component_index,
            data_item_index: BTreeMap::new(),
        }
    }

    /// Key of the root component.
    pub fn root(&self) -> ComponentKey {
        ComponentKey(0)
    }

    /// Attach a detached component under `parent`. Both sides of the
    /// relation are wired here, so a child always has exactly one parent and
    /// a parent always lists the child.
    pub fn add_component(
        &mut self,
        parent: ComponentKey,
        component: Component,
    ) -> Result<ComponentKey, ModelError> {
        if parent.0 >= self.components.len() {
            return Err(ModelError::UnknownComponent(parent));
        }
        if self.component_index.contains_key(component.id()) {
            return Err(ModelError::DuplicateComponentId(component.id().to_string()));
        }

        let key = ComponentKey(self.components.len());
        self.component_index.insert(component.id().to_string(), key);

        let mut component = component;
        component.parent = Some(parent);
        self.components.push(component);
        self.components[parent.0].children.push(key);
        Ok(key)
    }

    /// Register a data item on `owner`, in insertion order. Well-known
    /// types (see [`DataItem::slot`]) are also cached in the owner's
    /// availability / asset-changed / asset-removed slot.
    pub fn add_data_item(
        &mut self,
        owner: ComponentKey,
        data_item: DataItem,
    ) -> Result<DataItemKey, ModelError> {
        if owner.0 >= self.components.len() {
            return Err(ModelError::UnknownComponent(owner));
        }
        if self.data_item_index.contains_key(&data_item.id) {
            return Err(ModelError::DuplicateDataItemId(data_item.id.clone()));
        }

        let key = DataItemKey(self.data_items.len());
        self.data_item_index.insert(data_item.id.clone(), key);
        let slot = data_item.slot();
        self.data_items.push(data_item);

        let owner = &mut self.components[owner.0];
        owner.data_items.push(key);
        match slot {
            Some(DataItemSlot::Availability) => owner.availability = Some(key),
            Some(DataItemSlot::AssetChanged) => owner.asset_changed = Some(key),
            Some(DataItemSlot::AssetRemoved) => owner.asset_removed = Some(key),
            None => {}
        }
        Ok(key)
    }

    /// Register a sub-assembly on `owner`, in insertion order.
    pub fn add_composition(
        &mut self,
        owner: ComponentKey,
        composition: Composition,
    ) -> Result<CompositionKey, ModelError> {
        if owner.0 >= self.components.len() {
            return Err(ModelError::UnknownComponent(owner));
        }
        let key = CompositionKey(self.compositions.len());
        self.compositions.push(composition);
        self.components[owner.0].compositions.push(key);
        Ok(key)
    }

    /// Declare a reference on `owner`, to be resolved later.
    pub fn add_reference(
        &mut self,
        owner: ComponentKey,
        reference: Reference,
    ) -> Result<(), ModelError> {
        if owner.0 >= self.components.len() {
            return Err(ModelError::UnknownComponent(owner));
        }
        self.components[owner.0].add_reference(reference);
        Ok(())
    }

    /// Look up a component. Panics on a key minted by another device; keys
    /// are only valid for the arena that created them.
    pub fn component(&self, key: ComponentKey) -> &Component {
        &self.components[key.0]
    }

    pub fn component_mut(&mut self, key: ComponentKey) -> &mut Component {
        &mut self.components[key.0]
    }

    pub fn data_item(&self, key: DataItemKey) -> &DataItem {
        &self.data_items[key.0]
    }

    pub fn composition(&self, key: CompositionKey) -> &Composition {
        &self.compositions[key.0]
    }

    /// Find a component anywhere in the tree by id.
    pub fn component_by_id(&self, id: &str) -> Option<ComponentKey> {
        self.component_index.get(id).copied()
    }

    /// Find a data item anywhere in the tree by id.
    pub fn data_item_by_id(&self, id: &str) -> Option<DataItemKey> {
        self.data_item_index.get(id).copied()
    }

    /// All components in creation order, root first.
    pub fn components(&self) -> impl Iterator<Item = (ComponentKey, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(index, component)| (ComponentKey(index), component))
    }

    /// Children of a component, in insertion order.
    pub fn children(&self, key: ComponentKey) -> Vec<&Component> {
        self.components[key.0]
            .children()
            .iter()
            .map(|&child| self.component(child))
            .collect()
    }

    /// Parent of a component, if it has one.
    pub fn parent(&self, key: ComponentKey) -> Option<&Component> {
        self.components[key.0].parent().map(|p| self.component(p))
    }

    /// Walk parent links from `key` to the owning device root.
    ///
    /// Panics if the walk does not terminate within the arena size or the
    /// terminal node is not Device-typed; either means the builder violated
    /// a structural invariant and the tree must not be used.
    pub fn owning_device(&self, key: ComponentKey) -> ComponentKey {
        let mut current = key;
        let mut steps = 0usize;
        while let Some(parent) = self.components[current.0].parent() {
            current = parent;
            steps += 1;
            assert!(
                steps <= self.components.len(),
                "cyclic parent chain reached from component `{}`",
                self.components[key.0].id()
            );
        }
        let root = &self.components[current.0];
        assert!(
            root.class() == DEVICE_CLASS,
            "root component `{}` of class `{}` is not Device-typed",
            root.id(),
            root.class()
        );
        current
    }

    /// Resolve every unresolved reference in the tree against the entity
    /// indexes. Misses are left unresolved for the caller to inspect via
    /// [`Self::unresolved_references`]; running again after the tree gained
    /// the missing target binds it (late binding). Idempotent.
    pub fn resolve_references(&mut self) {
        let Self {
            components,
            component_index,
            data_item_index,
            ..
        } = self;

        for component in components.iter_mut() {
            let owner = component.id().to_string();
            for reference in component.references.iter_mut() {
                let was_resolved = reference.is_resolved();
                if reference.resolve(component_index, data_item_index) {
                    if !was_resolved {
                        debug!(component = %owner, id = %reference.id(), "resolved reference");
                    }
                } else {
                    debug!(
                        component = %owner,
                        id = %reference.id(),
                        kind = ?reference.kind(),
                        "reference target not in device index, left unresolved"
                    );
                }
            }
        }
    }

    /// References that are still unresolved, with the component that
    /// declared them.
    pub fn unresolved_references(&self) -> Vec<(ComponentKey, &Reference)> {
        let mut pending = Vec::new();
        for (index, component) in self.components.iter().enumerate() {
            for reference in component.references() {
                if !reference.is_resolved() {
                    pending.push((ComponentKey(index), reference));
                }
            }
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ReferenceTarget, ReferenceType};
    use std::collections::BTreeMap;

    fn seed(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn mill() -> DeviceModel {
        DeviceModel::new(&seed(&[("id", "dev"), ("name", "Mill")]))
    }

    #[test]
    fn test_root_is_device_typed() {
        let device = mill();
        let root = device.component(device.root());
        assert_eq!(root.class(), DEVICE_CLASS);
        assert_eq!(root.id(), "dev");
        assert!(root.parent().is_none());
        assert_eq!(device.component_by_id("dev"), Some(device.root()));
    }

    #[test]
    fn test_attach_wires_both_sides() {
        let mut device = mill();
        let axes = device
            .add_component(
                device.root(),
                Component::new("Axes", &seed(&[("id", "a"), ("name", "Axes")]), None),
            )
            .unwrap();
        let x = device
            .add_component(
                axes,
                Component::new("Linear", &seed(&[("id", "x"), ("name", "X")]), None),
            )
            .unwrap();

        assert_eq!(device.component(x).parent(), Some(axes));
        assert_eq!(device.component(axes).children(), &[x]);
        assert_eq!(device.parent(x).unwrap().id(), "a");
        assert_eq!(device.children(device.root()).len(), 1);
    }

    #[test]
    fn test_owning_device_walk() {
        let mut device = mill();
        let axes = device
            .add_component(
                device.root(),
                Component::new("Axes", &seed(&[("id", "a")]), None),
            )
            .unwrap();
        let x = device
            .add_component(axes, Component::new("Linear", &seed(&[("id", "x")]), None))
            .unwrap();

        assert_eq!(device.owning_device(x), device.root());
        assert_eq!(device.owning_device(axes), device.root());
        assert_eq!(device.owning_device(device.root()), device.root());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut device = mill();
        device
            .add_component(
                device.root(),
                Component::new("Axes", &seed(&[("id", "a")]), None),
            )
            .unwrap();

        let before = device.components().count();
        let err = device
            .add_component(
                device.root(),
                Component::new("Controller", &seed(&[("id", "a")]), None),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateComponentId(id) if id == "a"));
        assert_eq!(device.components().count(), before);

        device
            .add_data_item(device.root(), DataItem::new("d1", "POSITION"))
            .unwrap();
        let err = device
            .add_data_item(device.root(), DataItem::new("d1", "ANGLE"))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateDataItemId(id) if id == "d1"));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut device = mill();
        let foreign = ComponentKey::for_tests(42);
        let err = device
            .add_component(foreign, Component::new("Axes", &seed(&[("id", "a")]), None))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownComponent(_)));
        // Nothing was indexed
        assert_eq!(device.component_by_id("a"), None);
    }

    #[test]
    fn test_well_known_slots_cached() {
        let mut device = mill();
        let avail = device
            .add_data_item(device.root(), DataItem::new("avail", "AVAILABILITY"))
            .unwrap();
        let changed = device
            .add_data_item(device.root(), DataItem::new("ac", "ASSET_CHANGED"))
            .unwrap();
        let removed = device
            .add_data_item(device.root(), DataItem::new("ar", "ASSET_REMOVED"))
            .unwrap();
        let plain = device
            .add_data_item(device.root(), DataItem::new("pos", "POSITION"))
            .unwrap();

        let root = device.component(device.root());
        assert_eq!(root.availability(), Some(avail));
        assert_eq!(root.asset_changed(), Some(changed));
        assert_eq!(root.asset_removed(), Some(removed));
        // Insertion order is preserved for serialization
        assert_eq!(root.data_items(), &[avail, changed, removed, plain]);
    }

    #[test]
    fn test_reference_resolves_to_exact_data_item() {
        let mut device = mill();
        let spindle = device
            .add_component(
                device.root(),
                Component::new("Rotary", &seed(&[("id", "c1"), ("name", "spindle")]), None),
            )
            .unwrap();
        let d1 = device
            .add_data_item(spindle, DataItem::new("d1", "ROTARY_VELOCITY"))
            .unwrap();

        let sibling = device
            .add_component(
                device.root(),
                Component::new("Controller", &seed(&[("id", "c2")]), None),
            )
            .unwrap();
        device
            .add_reference(sibling, Reference::data_item("d1", Some("spindle_speed")))
            .unwrap();

        device.resolve_references();

        let reference = &device.component(sibling).references()[0];
        assert!(reference.is_resolved());
        assert_eq!(reference.data_item_key(), Some(d1));
        assert_eq!(device.data_item(d1).id, "d1");
        assert!(device.unresolved_references().is_empty());
    }

    #[test]
    fn test_missing_target_stays_unresolved() {
        let mut device = mill();
        device
            .add_reference(device.root(), Reference::component("ghost", None))
            .unwrap();

        device.resolve_references();

        let pending = device.unresolved_references();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, device.root());
        assert_eq!(pending[0].1.id(), "ghost");
        assert_eq!(
            pending[0].1.target(),
            ReferenceTarget::Unresolved(ReferenceType::Component)
        );
    }

    #[test]
    fn test_late_binding() {
        let mut device = mill();
        // Declared before the target exists anywhere in the tree
        device
            .add_reference(device.root(), Reference::component("c9", None))
            .unwrap();

        device.resolve_references();
        assert_eq!(device.unresolved_references().len(), 1);

        let late = device
            .add_component(
                device.root(),
                Component::new("Axis", &seed(&[("id", "c9")]), None),
            )
            .unwrap();

        device.resolve_references();
        assert!(device.unresolved_references().is_empty());
        let reference = &device.component(device.root()).references()[0];
        assert_eq!(reference.component_key(), Some(late));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut device = mill();
        let axis = device
            .add_component(
                device.root(),
                Component::new("Axis", &seed(&[("id", "c1")]), None),
            )
            .unwrap();
        device
            .add_data_item(axis, DataItem::new("d1", "POSITION"))
            .unwrap();
        device
            .add_reference(device.root(), Reference::data_item("d1", None))
            .unwrap();
        device
            .add_reference(device.root(), Reference::component("ghost", None))
            .unwrap();

        device.resolve_references();
        let first: Vec<_> = device
            .component(device.root())
            .references()
            .iter()
            .map(|r| r.target())
            .collect();

        device.resolve_references();
        let second: Vec<_> = device
            .component(device.root())
            .references()
            .iter()
            .map(|r| r.target())
            .collect();

        assert_eq!(first, second);
        assert_eq!(device.unresolved_references().len(), 1);
    }

    #[test]
    fn test_compositions_in_insertion_order() {
        let mut device = mill();
        let spindle = device
            .add_component(
                device.root(),
                Component::new("Rotary", &seed(&[("id", "c1")]), None),
            )
            .unwrap();
        let motor = device
            .add_composition(spindle, Composition::new("m1", "MOTOR"))
            .unwrap();
        let chuck = device
            .add_composition(spindle, Composition::new("k1", "CHUCK"))
            .unwrap();

        assert_eq!(device.component(spindle).compositions(), &[motor, chuck]);
        assert_eq!(device.composition(motor).kind, "MOTOR");
        assert_eq!(device.composition(chuck).kind, "CHUCK");
    }

    #[test]
    fn test_serde_round_trip() {
        let mut device = mill();
        let axis = device
            .add_component(
                device.root(),
                Component::new("Axis", &seed(&[("id", "x"), ("name", "X")]), None),
            )
            .unwrap();
        device
            .add_data_item(axis, DataItem::new("p", "POSITION"))
            .unwrap();
        device
            .add_reference(device.root(), Reference::data_item("p", None))
            .unwrap();
        device.resolve_references();

        let json = serde_json::to_string(&device).unwrap();
        let back: DeviceModel = serde_json::from_str(&json).unwrap();

        assert_eq!(back.component_by_id("x"), Some(axis));
        assert_eq!(back.component(axis).name(), "X");
        assert!(back.component(back.root()).references()[0].is_resolved());
    }
}
