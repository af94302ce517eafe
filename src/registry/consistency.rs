//! Reload consistency checks between two versions of a registry.

use std::collections::BTreeSet;
use std::fmt;

use crate::schema::ElementKey;

/// Label sets of a registry at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub nodes: BTreeSet<u32>,
    pub elements: BTreeSet<ElementKey>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.is_empty()
    }
}

/// Which part of the model changed across a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    /// Node labels differ, elements match.
    Nodes,
    /// Element keys differ, nodes match.
    Elements,
    /// Both differ.
    Model,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::Nodes => write!(f, "nodes inconsistent"),
            Inconsistency::Elements => write!(f, "elements inconsistent"),
            Inconsistency::Model => write!(f, "model inconsistent"),
        }
    }
}

/// Exact label differences between a previous snapshot and a reparsed registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub added_nodes: Vec<u32>,
    pub removed_nodes: Vec<u32>,
    pub added_elements: Vec<ElementKey>,
    pub removed_elements: Vec<ElementKey>,
}

impl ConsistencyReport {
    /// Compare the label sets of a registry with those of a reparsed log.
    pub fn compare(before: &RegistrySnapshot, after: &RegistrySnapshot) -> Self {
        Self {
            added_nodes: after.nodes.difference(&before.nodes).copied().collect(),
            removed_nodes: before.nodes.difference(&after.nodes).copied().collect(),
            added_elements: after.elements.difference(&before.elements).copied().collect(),
            removed_elements: before.elements.difference(&after.elements).copied().collect(),
        }
    }

    pub fn nodes_consistent(&self) -> bool {
        self.added_nodes.is_empty() && self.removed_nodes.is_empty()
    }

    pub fn elements_consistent(&self) -> bool {
        self.added_elements.is_empty() && self.removed_elements.is_empty()
    }

    /// Summary classification, None when nothing changed.
    pub fn inconsistency(&self) -> Option<Inconsistency> {
        match (self.nodes_consistent(), self.elements_consistent()) {
            (true, true) => None,
            (false, true) => Some(Inconsistency::Nodes),
            (true, false) => Some(Inconsistency::Elements),
            (false, false) => Some(Inconsistency::Model),
        }
    }
}
