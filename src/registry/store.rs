//! Node and element storage with create-or-update semantics.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use nalgebra::{UnitQuaternion, Vector3};

use super::RegistrySnapshot;
use crate::rotation::{AngleUnit, Parametrization, RotationError, decode_orientation};
use crate::schema::{Element, ElementClass, ElementKey, ElementKind, Node, ObjectHandle};

/// Whether an upsert created a new entry or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Per-entity resolution failures reported while building elements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Element {element} references node {label}, which is not in the registry")]
    NodeNotFound { element: ElementKey, label: u32 },
}

/// One node reference in an element record, with what is attached to it.
#[derive(Debug, Clone)]
pub struct NodeAttachment {
    pub node: u32,
    pub offsets: Vec<Vector3<f64>>,
    pub rotations: Vec<UnitQuaternion<f64>>,
}

/// Parsed contents of an element record.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub int_label: u32,
    pub attachments: Vec<NodeAttachment>,
    /// Offsets not tied to a node (e.g. a total pin joint's ground position).
    pub extra_offsets: Vec<Vector3<f64>>,
    pub extra_rotations: Vec<UnitQuaternion<f64>>,
    pub aux_labels: Vec<u32>,
    pub flags: Vec<bool>,
}

impl ElementSpec {
    pub fn new(kind: ElementKind, int_label: u32) -> Self {
        Self {
            kind,
            int_label,
            attachments: Vec::new(),
            extra_offsets: Vec::new(),
            extra_rotations: Vec::new(),
            aux_labels: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// Attach a node with offsets only.
    pub fn with_node(mut self, node: u32, offsets: Vec<Vector3<f64>>) -> Self {
        self.attachments.push(NodeAttachment {
            node,
            offsets,
            rotations: Vec::new(),
        });
        self
    }
}

/// Result of [`EntityRegistry::upsert_element`].
#[derive(Debug, Clone)]
pub struct ElementUpsert {
    pub key: ElementKey,
    pub status: Upsert,
    /// One entry per referenced node that could not be resolved.
    pub missing: Vec<RegistryError>,
}

/// Which entities a labels-file record names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    Node,
    Element(ElementClass),
}

/// A `(kind, numeric label, name)` triple from a labels file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub target: LabelTarget,
    pub int_label: u32,
    pub name: String,
}

/// Keyed collections of nodes and elements.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    nodes: HashMap<u32, Node>,
    elements: HashMap<ElementKey, Element>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a node.
    ///
    /// Updating keeps the node's string label and bound object.
    pub fn upsert_node(
        &mut self,
        int_label: u32,
        initial_position: Vector3<f64>,
        initial_orientation_raw: &[f64],
        parametrization_tag: &str,
        units: AngleUnit,
    ) -> Result<Upsert, RotationError> {
        let parametrization = Parametrization::parse(parametrization_tag)?;
        let orientation = decode_orientation(initial_orientation_raw, parametrization, units)?;
        Ok(self.upsert_node_decoded(int_label, initial_position, orientation, parametrization))
    }

    /// Create or update a node from an already decoded orientation.
    pub fn upsert_node_decoded(
        &mut self,
        int_label: u32,
        initial_position: Vector3<f64>,
        initial_orientation: UnitQuaternion<f64>,
        parametrization: Parametrization,
    ) -> Upsert {
        if let Some(node) = self.nodes.get_mut(&int_label) {
            node.initial_position = initial_position;
            node.initial_orientation = initial_orientation;
            node.parametrization = parametrization;
            return Upsert::Updated;
        }

        debug!("Registering node {}", int_label);
        self.nodes.insert(
            int_label,
            Node {
                int_label,
                string_label: Node::default_label(int_label),
                initial_position,
                initial_orientation,
                parametrization,
                bound_object: None,
            },
        );
        Upsert::Created
    }

    /// Create or update an element.
    ///
    /// Attachments to nodes missing from the registry are dropped and reported;
    /// the element is registered with whatever did resolve.
    pub fn upsert_element(&mut self, spec: ElementSpec) -> ElementUpsert {
        let key = ElementKey::new(spec.kind, spec.int_label);

        let mut missing = Vec::new();
        let mut nodes = Vec::with_capacity(spec.attachments.len());
        let mut offsets = Vec::new();
        let mut rotational_offsets = Vec::new();
        for attachment in spec.attachments {
            if !self.nodes.contains_key(&attachment.node) {
                missing.push(RegistryError::NodeNotFound {
                    element: key,
                    label: attachment.node,
                });
                continue;
            }
            nodes.push(attachment.node);
            offsets.extend(attachment.offsets);
            rotational_offsets.extend(attachment.rotations);
        }
        offsets.extend(spec.extra_offsets);
        rotational_offsets.extend(spec.extra_rotations);

        let status = match self.elements.get_mut(&key) {
            Some(element) => {
                element.nodes = nodes;
                element.offsets = offsets;
                element.rotational_offsets = rotational_offsets;
                element.aux_labels = spec.aux_labels;
                element.flags = spec.flags;
                Upsert::Updated
            }
            None => {
                debug!("Registering element {}", key);
                self.elements.insert(
                    key,
                    Element {
                        kind: spec.kind,
                        int_label: spec.int_label,
                        string_label: key.to_string(),
                        nodes,
                        offsets,
                        rotational_offsets,
                        aux_labels: spec.aux_labels,
                        flags: spec.flags,
                        is_imported: false,
                        bound_object: None,
                    },
                );
                Upsert::Created
            }
        };

        ElementUpsert {
            key,
            status,
            missing,
        }
    }

    /// Overlay human-readable names. Returns how many labels changed.
    ///
    /// Records that match no entity are ignored.
    pub fn apply_labels_overlay<'a, I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = &'a LabelRecord>,
    {
        let mut changes = 0;
        for record in records {
            match record.target {
                LabelTarget::Node => {
                    if let Some(node) = self.nodes.get_mut(&record.int_label)
                        && node.string_label != record.name
                    {
                        node.string_label = record.name.clone();
                        changes += 1;
                    }
                }
                LabelTarget::Element(class) => {
                    for kind in ElementKind::ALL.into_iter().filter(|k| k.class() == class) {
                        let key = ElementKey::new(kind, record.int_label);
                        if let Some(element) = self.elements.get_mut(&key)
                            && element.string_label != record.name
                        {
                            element.string_label = record.name.clone();
                            changes += 1;
                        }
                    }
                }
            }
        }
        changes
    }

    /// Remove every node and element.
    pub fn clear_all(&mut self) {
        self.nodes.clear();
        self.elements.clear();
    }

    pub fn node(&self, int_label: u32) -> Option<&Node> {
        self.nodes.get(&int_label)
    }

    pub fn element(&self, key: ElementKey) -> Option<&Element> {
        self.elements.get(&key)
    }

    pub fn contains_node(&self, int_label: u32) -> bool {
        self.nodes.contains_key(&int_label)
    }

    /// All nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All elements, in no particular order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.is_empty()
    }

    /// Node labels in ascending order.
    pub fn node_labels(&self) -> BTreeSet<u32> {
        self.nodes.keys().copied().collect()
    }

    /// Element keys in ascending order.
    pub fn element_keys(&self) -> BTreeSet<ElementKey> {
        self.elements.keys().copied().collect()
    }

    /// Capture the current label sets for a later consistency check.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            nodes: self.node_labels(),
            elements: self.element_keys(),
        }
    }

    /// Bind a scene object to a node. Returns false if the node is unknown.
    pub fn bind_node(&mut self, int_label: u32, handle: ObjectHandle) -> bool {
        if let Some(node) = self.nodes.get_mut(&int_label) {
            node.bound_object = Some(handle);
            return true;
        }
        false
    }

    /// Clear a node's bound object, returning the previous handle.
    pub fn unbind_node(&mut self, int_label: u32) -> Option<ObjectHandle> {
        self.nodes
            .get_mut(&int_label)
            .and_then(|node| node.bound_object.take())
    }

    /// Bind a scene object to an element. Returns false if the element is unknown.
    pub fn bind_element(&mut self, key: ElementKey, handle: ObjectHandle) -> bool {
        if let Some(element) = self.elements.get_mut(&key) {
            element.bound_object = Some(handle);
            return true;
        }
        false
    }

    /// Set an element's imported flag. Returns false if the element is unknown.
    pub fn set_imported(&mut self, key: ElementKey, imported: bool) -> bool {
        if let Some(element) = self.elements.get_mut(&key) {
            element.is_imported = imported;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_node(registry: &mut EntityRegistry, label: u32, x: f64) -> Upsert {
        registry
            .upsert_node(
                label,
                Vector3::new(x, 0.0, 0.0),
                &[0.0, 0.0, 0.0],
                "euler123",
                AngleUnit::Degrees,
            )
            .unwrap()
    }

    #[test]
    fn test_node_upsert_updates_in_place() {
        let mut registry = EntityRegistry::new();
        assert_eq!(add_node(&mut registry, 1, 0.0), Upsert::Created);

        registry.apply_labels_overlay(&[LabelRecord {
            target: LabelTarget::Node,
            int_label: 1,
            name: "hub".to_string(),
        }]);
        assert!(registry.bind_node(1, ObjectHandle(42)));

        assert_eq!(add_node(&mut registry, 1, 5.0), Upsert::Updated);
        assert_eq!(registry.node_count(), 1);

        let node = registry.node(1).unwrap();
        assert_eq!(node.initial_position.x, 5.0);
        assert_eq!(node.string_label, "hub");
        assert_eq!(node.bound_object, Some(ObjectHandle(42)));
    }

    #[test]
    fn test_node_unsupported_parametrization() {
        let mut registry = EntityRegistry::new();
        let result =
            registry.upsert_node(1, Vector3::zeros(), &[0.0; 3], "euler999", AngleUnit::Degrees);
        assert!(matches!(result, Err(RotationError::UnsupportedParametrization(_))));
        assert_eq!(registry.node_count(), 0);
    }

    #[test]
    fn test_element_keys_scoped_by_kind() {
        let mut registry = EntityRegistry::new();
        add_node(&mut registry, 1, 0.0);

        let rod = registry.upsert_element(
            ElementSpec::new(ElementKind::Rod, 5).with_node(1, vec![Vector3::zeros()]),
        );
        let beam = registry.upsert_element(
            ElementSpec::new(ElementKind::Beam3, 5).with_node(1, vec![Vector3::zeros()]),
        );

        assert_eq!(rod.status, Upsert::Created);
        assert_eq!(beam.status, Upsert::Created);
        assert_eq!(registry.element_count(), 2);
        assert_eq!(
            registry.element(ElementKey::new(ElementKind::Rod, 5)).unwrap().string_label,
            "rod_5"
        );
    }

    #[test]
    fn test_element_partial_resolution() {
        let mut registry = EntityRegistry::new();
        add_node(&mut registry, 7, 0.0);

        let outcome = registry.upsert_element(
            ElementSpec::new(ElementKind::Rod, 1)
                .with_node(7, vec![Vector3::zeros()])
                .with_node(99, vec![Vector3::x()]),
        );

        assert_eq!(outcome.status, Upsert::Created);
        assert_eq!(
            outcome.missing,
            vec![RegistryError::NodeNotFound {
                element: ElementKey::new(ElementKind::Rod, 1),
                label: 99
            }]
        );
        let element = registry.element(outcome.key).unwrap();
        assert_eq!(element.nodes, vec![7]);
        assert_eq!(element.offsets, vec![Vector3::zeros()]);
    }

    #[test]
    fn test_element_update_keeps_binding() {
        let mut registry = EntityRegistry::new();
        add_node(&mut registry, 1, 0.0);
        add_node(&mut registry, 2, 1.0);

        let key = registry
            .upsert_element(ElementSpec::new(ElementKind::Rod, 3).with_node(1, vec![Vector3::zeros()]))
            .key;
        assert!(registry.set_imported(key, true));
        assert!(registry.bind_element(key, ObjectHandle(7)));

        let outcome = registry.upsert_element(
            ElementSpec::new(ElementKind::Rod, 3)
                .with_node(1, vec![Vector3::zeros()])
                .with_node(2, vec![Vector3::zeros()]),
        );
        assert_eq!(outcome.status, Upsert::Updated);

        let element = registry.element(key).unwrap();
        assert_eq!(element.nodes, vec![1, 2]);
        assert!(element.is_imported);
        assert_eq!(element.bound_object, Some(ObjectHandle(7)));
    }

    #[test]
    fn test_labels_overlay_counts_changes() {
        let mut registry = EntityRegistry::new();
        add_node(&mut registry, 3, 0.0);
        registry.upsert_element(
            ElementSpec::new(ElementKind::RevoluteHinge, 3).with_node(3, vec![Vector3::zeros()]),
        );

        let records = vec![
            LabelRecord {
                target: LabelTarget::Node,
                int_label: 3,
                name: "crank".to_string(),
            },
            LabelRecord {
                target: LabelTarget::Element(ElementClass::Joint),
                int_label: 3,
                name: "pivot".to_string(),
            },
            LabelRecord {
                target: LabelTarget::Element(ElementClass::Beam),
                int_label: 3,
                name: "unused".to_string(),
            },
            LabelRecord {
                target: LabelTarget::Node,
                int_label: 100,
                name: "ghost".to_string(),
            },
        ];

        assert_eq!(registry.apply_labels_overlay(&records), 2);
        assert_eq!(registry.node(3).unwrap().string_label, "crank");
        // Same names again: nothing changes.
        assert_eq!(registry.apply_labels_overlay(&records), 0);
    }

    #[test]
    fn test_clear_all_idempotent() {
        let mut registry = EntityRegistry::new();
        add_node(&mut registry, 1, 0.0);
        registry.clear_all();
        assert!(registry.is_empty());
        registry.clear_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unbind() {
        let mut registry = EntityRegistry::new();
        add_node(&mut registry, 1, 0.0);
        assert!(!registry.bind_node(2, ObjectHandle(1)));
        registry.bind_node(1, ObjectHandle(9));
        assert_eq!(registry.unbind_node(1), Some(ObjectHandle(9)));
        assert_eq!(registry.unbind_node(1), None);
    }
}
