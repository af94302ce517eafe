//! Field layouts of element records, keyed by element kind.

use crate::schema::ElementKind;

/// What follows one node label in an element record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeGroup {
    /// Number of 3-component offsets.
    pub offsets: usize,
    /// Number of 9-component orientation matrices.
    pub rotations: usize,
}

const N: NodeGroup = NodeGroup {
    offsets: 0,
    rotations: 0,
};
const F: NodeGroup = NodeGroup {
    offsets: 1,
    rotations: 0,
};
const FF: NodeGroup = NodeGroup {
    offsets: 2,
    rotations: 0,
};
const R: NodeGroup = NodeGroup {
    offsets: 0,
    rotations: 1,
};
const FR: NodeGroup = NodeGroup {
    offsets: 1,
    rotations: 1,
};
const FRR: NodeGroup = NodeGroup {
    offsets: 1,
    rotations: 2,
};

/// Field layout of an element record after its integer label.
///
/// Order: auxiliary labels, node groups, extra offsets, extra rotations, flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub aux_labels: usize,
    pub groups: &'static [NodeGroup],
    pub extra_offsets: usize,
    pub extra_rotations: usize,
    pub flags: usize,
}

impl RecordLayout {
    const fn nodes(groups: &'static [NodeGroup]) -> Self {
        Self {
            aux_labels: 0,
            groups,
            extra_offsets: 0,
            extra_rotations: 0,
            flags: 0,
        }
    }

    /// Minimum number of tokens after the label.
    pub fn field_count(&self) -> usize {
        let groups: usize = self
            .groups
            .iter()
            .map(|g| 1 + 3 * g.offsets + 9 * g.rotations)
            .sum();
        self.aux_labels + groups + 3 * self.extra_offsets + 9 * self.extra_rotations + self.flags
    }
}

/// Layout table for every supported element kind.
pub fn layout_for(kind: ElementKind) -> RecordLayout {
    match kind {
        ElementKind::Rod | ElementKind::Distance | ElementKind::Beam2 => {
            RecordLayout::nodes(&[F, F])
        }
        ElementKind::RodBezier => RecordLayout::nodes(&[FF, FF]),
        ElementKind::Beam3 => RecordLayout::nodes(&[F, F, F]),
        ElementKind::RevoluteHinge
        | ElementKind::RevoluteRotation
        | ElementKind::SphericalHinge
        | ElementKind::CardanoHinge
        | ElementKind::UniversalHinge
        | ElementKind::PlaneHinge
        | ElementKind::AxialRotation
        | ElementKind::DeformableHinge
        | ElementKind::DeformableJoint
        | ElementKind::DeformableDisplacementJoint
        | ElementKind::InLine
        | ElementKind::InPlane => RecordLayout::nodes(&[FR, FR]),
        ElementKind::Prismatic => RecordLayout::nodes(&[R, R]),
        ElementKind::TotalJoint => RecordLayout {
            flags: 6,
            ..RecordLayout::nodes(&[FRR, FRR])
        },
        ElementKind::TotalPinJoint => RecordLayout {
            extra_offsets: 1,
            extra_rotations: 2,
            flags: 6,
            ..RecordLayout::nodes(&[FRR])
        },
        ElementKind::Clamp | ElementKind::AerodynamicBody => RecordLayout::nodes(&[FR]),
        ElementKind::StructuralForce | ElementKind::StructuralCouple => RecordLayout::nodes(&[F]),
        ElementKind::AerodynamicBeam2 => RecordLayout {
            aux_labels: 1,
            ..RecordLayout::nodes(&[FR, FR])
        },
        ElementKind::AerodynamicBeam3 => RecordLayout {
            aux_labels: 1,
            ..RecordLayout::nodes(&[FR, FR, FR])
        },
        ElementKind::Shell4 | ElementKind::Membrane4 => RecordLayout::nodes(&[N, N, N, N]),
    }
}
