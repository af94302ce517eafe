//! Errors and outcome reports of log and labels imports.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use crate::registry::{ConsistencyReport, Inconsistency, RegistryError};
use crate::rotation::RotationError;
use crate::schema::ElementKey;

/// Errors that abort an import. The registry is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Log file not found: {}", path.display())]
    LogNotFound { path: PathBuf },
    #[error("Labels file not found: {}", path.display())]
    LabelsFileNotFound { path: PathBuf },
    #[error("No structural nodes found in {}", path.display())]
    NodesNotFound { path: PathBuf },
    #[error("{}:{line}: malformed record: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Non-fatal problems found while importing a log file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportIssue {
    #[error("line {line}: node {label} skipped: {source}")]
    Node {
        line: usize,
        label: u32,
        #[source]
        source: RotationError,
    },
    #[error("line {line}: {element} rotational offset {index} replaced by identity: {source}")]
    RotationalOffset {
        line: usize,
        element: ElementKey,
        index: usize,
        #[source]
        source: RotationError,
    },
    #[error(transparent)]
    MissingNode(#[from] RegistryError),
}

/// Outcome of applying a parsed log file to a registry.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub elements_created: usize,
    pub elements_updated: usize,
    /// Per-entity problems; none of them aborted the import.
    pub issues: Vec<ImportIssue>,
    /// Record keywords with no layout, with occurrence counts.
    pub unsupported: BTreeMap<String, usize>,
    /// Label-set differences, when the registry was not empty beforehand.
    pub consistency: Option<ConsistencyReport>,
}

impl ImportReport {
    /// Nodes referenced by elements but absent from the registry.
    pub fn missing_nodes(&self) -> impl Iterator<Item = &RegistryError> {
        self.issues.iter().filter_map(|issue| match issue {
            ImportIssue::MissingNode(e) => Some(e),
            _ => None,
        })
    }

    /// Reload classification, None for a first import or a consistent reload.
    pub fn inconsistency(&self) -> Option<Inconsistency> {
        self.consistency
            .as_ref()
            .and_then(ConsistencyReport::inconsistency)
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes ({} new), {} elements ({} new), {} issues, {} unsupported record types",
            self.nodes_created + self.nodes_updated,
            self.nodes_created,
            self.elements_created + self.elements_updated,
            self.elements_created,
            self.issues.len(),
            self.unsupported.len()
        )
    }
}
