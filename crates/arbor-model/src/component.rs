//! Component tree nodes and their derived attribute view
//!
//! A [`Component`] represents one physical or logical part of a monitored
//! device (an axis, a controller, a sensor head). Identity fields feed a
//! derived attribute map that is rebuilt by every mutating setter, so a
//! serializer can read the view at any point without seeing stale values.
//! Structural relations (parent, children, data items, compositions) are
//! stored as arena keys owned by [`DeviceModel`](crate::device::DeviceModel).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::device::{ComponentKey, CompositionKey, DataItemKey};
use crate::reference::Reference;

/// Structural element names emitted by description serializers.
///
/// Order and membership are fixed; serializers index into this table by
/// position, so reordering or renaming entries is a wire-format break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    Device,
    Components,
    DataItem,
    DataItems,
    Configuration,
    Description,
    Source,
    Text,
    References,
    Reference,
    DataItemRef,
    ComponentRef,
    Compositions,
    Composition,
}

/// Tag names for [`Element`], in table order.
pub const ELEMENT_NAMES: [&str; 14] = [
    "Device",
    "Components",
    "DataItem",
    "DataItems",
    "Configuration",
    "Description",
    "Source",
    "text",
    "References",
    "Reference",
    "DataItemRef",
    "ComponentRef",
    "Compositions",
    "Composition",
];

impl Element {
    /// All elements in table order.
    pub const ALL: [Element; 14] = [
        Element::Device,
        Element::Components,
        Element::DataItem,
        Element::DataItems,
        Element::Configuration,
        Element::Description,
        Element::Source,
        Element::Text,
        Element::References,
        Element::Reference,
        Element::DataItemRef,
        Element::ComponentRef,
        Element::Compositions,
        Element::Composition,
    ];

    /// The tag name used for this element in a serialized description.
    pub fn as_str(self) -> &'static str {
        ELEMENT_NAMES[self as usize]
    }
}

/// A node in the device structure tree.
///
/// Components are created detached (no parent, no children) and wired into
/// a tree through [`DeviceModel::add_component`](crate::device::DeviceModel::add_component),
/// which is the only operation that grows the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Unique id within the owning device's scope
    id: String,
    /// Human-readable name
    name: String,
    /// Vendor-specific alias, if any
    native_name: Option<String>,
    /// Structural category (e.g. "Axis", "Controller", "Device")
    class: String,
    /// Namespace prefix applied to the class, if any
    prefix: Option<String>,
    /// Class with the namespace prefix applied
    prefixed_class: String,
    /// Globally unique identifier, if assigned
    uuid: Option<String>,
    /// Reporting interval in milliseconds, if this component samples
    sample_interval: Option<f64>,

    /// Derived attribute view, rebuilt whenever an identity field changes
    attributes: BTreeMap<String, String>,

    /// Free-form description entries (manufacturer, serialNumber, station, ...)
    description: BTreeMap<String, String>,
    /// Free-text description body
    description_body: Option<String>,
    /// Opaque configuration blob, passed through to the serializer verbatim
    configuration: Option<String>,

    /// Parent component (back-reference; None only for the device root)
    pub(crate) parent: Option<ComponentKey>,
    /// Child components in insertion order
    pub(crate) children: Vec<ComponentKey>,
    /// Data items reporting through this component, in insertion order
    pub(crate) data_items: Vec<DataItemKey>,
    /// Sub-assemblies, in insertion order
    pub(crate) compositions: Vec<CompositionKey>,

    /// Well-known data items cached at registration for fast access
    pub(crate) availability: Option<DataItemKey>,
    pub(crate) asset_changed: Option<DataItemKey>,
    pub(crate) asset_removed: Option<DataItemKey>,

    /// References declared on this component, resolved in a second pass
    pub(crate) references: Vec<Reference>,
}

impl Component {
    /// Create a detached component from a class name, an attribute seed map,
    /// and an optional namespace prefix.
    ///
    /// Seed keys consumed: `id`, `name`, `nativeName`, `uuid`,
    /// `sampleInterval`. Unknown keys are ignored. A `sampleInterval` that
    /// is absent, unparsable, or not positive leaves the field unset.
    pub fn new(
        class: impl Into<String>,
        seed: &BTreeMap<String, String>,
        prefix: Option<&str>,
    ) -> Self {
        let class = class.into();
        let prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        let prefixed_class = match &prefix {
            Some(p) => format!("{p}:{class}"),
            None => class.clone(),
        };

        let mut component = Self {
            id: seed.get("id").cloned().unwrap_or_default(),
            name: seed.get("name").cloned().unwrap_or_default(),
            native_name: seed.get("nativeName").filter(|v| !v.is_empty()).cloned(),
            class,
            prefix,
            prefixed_class,
            uuid: seed.get("uuid").filter(|v| !v.is_empty()).cloned(),
            sample_interval: seed
                .get("sampleInterval")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| *v > 0.0),
            attributes: BTreeMap::new(),
            description: BTreeMap::new(),
            description_body: None,
            configuration: None,
            parent: None,
            children: Vec::new(),
            data_items: Vec::new(),
            compositions: Vec::new(),
            availability: None,
            asset_changed: None,
            asset_removed: None,
            references: Vec::new(),
        };
        component.rebuild_attributes();
        component
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_name(&self) -> Option<&str> {
        self.native_name.as_deref()
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn prefixed_class(&self) -> &str {
        &self.prefixed_class
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn sample_interval(&self) -> Option<f64> {
        self.sample_interval
    }

    /// The derived attribute view, always consistent with the identity
    /// fields at the time of the call.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn set_uuid(&mut self, uuid: impl Into<String>) {
        self.uuid = Some(uuid.into());
        self.rebuild_attributes();
    }

    pub fn set_native_name(&mut self, native_name: impl Into<String>) {
        self.native_name = Some(native_name.into());
        self.rebuild_attributes();
    }

    pub fn set_sample_interval(&mut self, interval: f64) {
        self.sample_interval = Some(interval).filter(|v| *v > 0.0);
        self.rebuild_attributes();
    }

    pub fn set_manufacturer(&mut self, manufacturer: impl Into<String>) {
        self.description
            .insert("manufacturer".to_string(), manufacturer.into());
    }

    pub fn set_serial_number(&mut self, serial_number: impl Into<String>) {
        self.description
            .insert("serialNumber".to_string(), serial_number.into());
    }

    pub fn set_station(&mut self, station: impl Into<String>) {
        self.description
            .insert("station".to_string(), station.into());
    }

    pub fn set_description_body(&mut self, body: impl Into<String>) {
        self.description_body = Some(body.into());
    }

    /// Merge a description attribute map, optionally replacing the body.
    ///
    /// Previously set entries survive unless the map overwrites them; a
    /// `None` body leaves any existing body in place.
    pub fn add_description(&mut self, body: Option<&str>, attributes: &BTreeMap<String, String>) {
        for (key, value) in attributes {
            self.description.insert(key.clone(), value.clone());
        }
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            self.description_body = Some(body.to_string());
        }
    }

    /// Description entries (manufacturer, serialNumber, station, ...).
    /// These are not part of the attribute view.
    pub fn description(&self) -> &BTreeMap<String, String> {
        &self.description
    }

    pub fn description_body(&self) -> Option<&str> {
        self.description_body.as_deref()
    }

    pub fn set_configuration(&mut self, configuration: impl Into<String>) {
        self.configuration = Some(configuration.into());
    }

    pub fn configuration(&self) -> Option<&str> {
        self.configuration.as_deref()
    }

    /// Parent component key. `None` only for the device root.
    pub fn parent(&self) -> Option<ComponentKey> {
        self.parent
    }

    /// Child component keys in insertion order.
    pub fn children(&self) -> &[ComponentKey] {
        &self.children
    }

    /// Data item keys in insertion order.
    pub fn data_items(&self) -> &[DataItemKey] {
        &self.data_items
    }

    /// Composition keys in insertion order.
    pub fn compositions(&self) -> &[CompositionKey] {
        &self.compositions
    }

    /// The availability data item, if one was registered on this component.
    pub fn availability(&self) -> Option<DataItemKey> {
        self.availability
    }

    /// The asset-changed data item, if one was registered on this component.
    pub fn asset_changed(&self) -> Option<DataItemKey> {
        self.asset_changed
    }

    /// The asset-removed data item, if one was registered on this component.
    pub fn asset_removed(&self) -> Option<DataItemKey> {
        self.asset_removed
    }

    /// Declare a reference on this component. Resolution is deferred to
    /// [`DeviceModel::resolve_references`](crate::device::DeviceModel::resolve_references).
    pub fn add_reference(&mut self, reference: Reference) {
        self.references.push(reference);
    }

    /// References declared on this component, resolved or not.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    fn rebuild_attributes(&mut self) {
        self.attributes = self.build_attributes();
    }

    /// Build the attribute view from the current identity fields.
    /// Pure over identity state; absent optional fields are omitted.
    fn build_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert("id".to_string(), self.id.clone());
        attributes.insert("name".to_string(), self.name.clone());
        attributes.insert("class".to_string(), self.prefixed_class.clone());
        if let Some(interval) = self.sample_interval {
            attributes.insert("sampleInterval".to_string(), interval.to_string());
        }
        if let Some(uuid) = &self.uuid {
            attributes.insert("uuid".to_string(), uuid.clone());
        }
        if let Some(native_name) = &self.native_name {
            attributes.insert("nativeName".to_string(), native_name.clone());
        }
        attributes
    }
}

// Identity is the id alone, so components can live in ordered containers
// keyed by id regardless of any other field.
impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Component {}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
