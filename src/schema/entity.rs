//! Node and element types held by the entity registry.

use std::fmt;

use nalgebra::{UnitQuaternion, Vector3};

use crate::rotation::Parametrization;

/// Opaque handle to an object owned by a scene-binding layer.
///
/// The registry stores and clears handles but never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// A structural node.
#[derive(Debug, Clone)]
pub struct Node {
    /// Solver label, unique within a registry.
    pub int_label: u32,
    /// Human-readable name (defaults to `Node_<int_label>`).
    pub string_label: String,
    /// Position at simulation start.
    pub initial_position: Vector3<f64>,
    /// Orientation at simulation start.
    pub initial_orientation: UnitQuaternion<f64>,
    /// Encoding of this node's orientation fields in motion output.
    pub parametrization: Parametrization,
    /// Bound scene object, if any.
    pub bound_object: Option<ObjectHandle>,
}

impl Node {
    pub fn default_label(int_label: u32) -> String {
        format!("Node_{}", int_label)
    }
}

/// Broad family of an element, used to match labels-file prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementClass {
    Joint,
    Beam,
    Shell,
    Force,
    Aerodynamic,
}

/// Element types understood by the log parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Rod,
    Distance,
    RodBezier,
    Beam2,
    Beam3,
    RevoluteHinge,
    RevoluteRotation,
    SphericalHinge,
    CardanoHinge,
    UniversalHinge,
    PlaneHinge,
    AxialRotation,
    DeformableHinge,
    DeformableJoint,
    DeformableDisplacementJoint,
    InLine,
    InPlane,
    Prismatic,
    TotalJoint,
    TotalPinJoint,
    Clamp,
    StructuralForce,
    StructuralCouple,
    AerodynamicBody,
    AerodynamicBeam2,
    AerodynamicBeam3,
    Shell4,
    Membrane4,
}

impl ElementKind {
    pub const ALL: [ElementKind; 28] = [
        ElementKind::Rod,
        ElementKind::Distance,
        ElementKind::RodBezier,
        ElementKind::Beam2,
        ElementKind::Beam3,
        ElementKind::RevoluteHinge,
        ElementKind::RevoluteRotation,
        ElementKind::SphericalHinge,
        ElementKind::CardanoHinge,
        ElementKind::UniversalHinge,
        ElementKind::PlaneHinge,
        ElementKind::AxialRotation,
        ElementKind::DeformableHinge,
        ElementKind::DeformableJoint,
        ElementKind::DeformableDisplacementJoint,
        ElementKind::InLine,
        ElementKind::InPlane,
        ElementKind::Prismatic,
        ElementKind::TotalJoint,
        ElementKind::TotalPinJoint,
        ElementKind::Clamp,
        ElementKind::StructuralForce,
        ElementKind::StructuralCouple,
        ElementKind::AerodynamicBody,
        ElementKind::AerodynamicBeam2,
        ElementKind::AerodynamicBeam3,
        ElementKind::Shell4,
        ElementKind::Membrane4,
    ];

    /// Record keyword in the log file, without the trailing colon.
    pub fn keyword(self) -> &'static str {
        match self {
            ElementKind::Rod => "rod",
            ElementKind::Distance => "distance",
            ElementKind::RodBezier => "rod bezier",
            ElementKind::Beam2 => "beam2",
            ElementKind::Beam3 => "beam3",
            ElementKind::RevoluteHinge => "revolute hinge",
            ElementKind::RevoluteRotation => "revolute rotation",
            ElementKind::SphericalHinge => "spherical hinge",
            ElementKind::CardanoHinge => "cardano hinge",
            ElementKind::UniversalHinge => "universal hinge",
            ElementKind::PlaneHinge => "plane hinge",
            ElementKind::AxialRotation => "axial rotation",
            ElementKind::DeformableHinge => "deformable hinge",
            ElementKind::DeformableJoint => "deformable joint",
            ElementKind::DeformableDisplacementJoint => "deformable displacement joint",
            ElementKind::InLine => "inline",
            ElementKind::InPlane => "inplane",
            ElementKind::Prismatic => "prismatic",
            ElementKind::TotalJoint => "total joint",
            ElementKind::TotalPinJoint => "total pin joint",
            ElementKind::Clamp => "clamp",
            ElementKind::StructuralForce => "structural force",
            ElementKind::StructuralCouple => "structural couple",
            ElementKind::AerodynamicBody => "aerodynamic body",
            ElementKind::AerodynamicBeam2 => "aerodynamic beam2",
            ElementKind::AerodynamicBeam3 => "aerodynamic beam3",
            ElementKind::Shell4 => "shell4",
            ElementKind::Membrane4 => "membrane4",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == keyword)
    }

    /// Identifier form of the keyword (`revolute_hinge`).
    pub fn tag(self) -> String {
        self.keyword().replace(' ', "_")
    }

    pub fn class(self) -> ElementClass {
        match self {
            ElementKind::Beam2 | ElementKind::Beam3 => ElementClass::Beam,
            ElementKind::Shell4 | ElementKind::Membrane4 => ElementClass::Shell,
            ElementKind::StructuralForce | ElementKind::StructuralCouple => ElementClass::Force,
            ElementKind::AerodynamicBody
            | ElementKind::AerodynamicBeam2
            | ElementKind::AerodynamicBeam3 => ElementClass::Aerodynamic,
            _ => ElementClass::Joint,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Registry key of an element. Integer labels are only unique within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub kind: ElementKind,
    pub int_label: u32,
}

impl ElementKey {
    pub fn new(kind: ElementKind, int_label: u32) -> Self {
        Self { kind, int_label }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.tag(), self.int_label)
    }
}

/// A solver element connecting one or more nodes.
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub int_label: u32,
    /// Human-readable name (defaults to `<tag>_<int_label>`).
    pub string_label: String,
    /// Connected node labels in record order. Only resolved nodes are kept.
    pub nodes: Vec<u32>,
    /// Attachment offsets in the connected nodes' frames.
    pub offsets: Vec<Vector3<f64>>,
    /// Relative orientation offsets.
    pub rotational_offsets: Vec<UnitQuaternion<f64>>,
    /// Labels of other elements the record references (e.g. the beam of an
    /// aerodynamic beam).
    pub aux_labels: Vec<u32>,
    /// Activation flags (total joints: 3 position, then 3 rotation).
    pub flags: Vec<bool>,
    /// Whether a scene representation has been created.
    pub is_imported: bool,
    /// Bound scene object, if any.
    pub bound_object: Option<ObjectHandle>,
}

impl Element {
    pub fn key(&self) -> ElementKey {
        ElementKey::new(self.kind, self.int_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_roundtrip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(ElementKind::from_keyword("gimbal rotation"), None);
    }

    #[test]
    fn test_key_display() {
        let key = ElementKey::new(ElementKind::RevoluteHinge, 5);
        assert_eq!(key.to_string(), "revolute_hinge_5");
        assert_ne!(key, ElementKey::new(ElementKind::Beam3, 5));
    }

    #[test]
    fn test_classes() {
        assert_eq!(ElementKind::TotalJoint.class(), ElementClass::Joint);
        assert_eq!(ElementKind::Beam3.class(), ElementClass::Beam);
        assert_eq!(ElementKind::AerodynamicBeam2.class(), ElementClass::Aerodynamic);
    }
}
