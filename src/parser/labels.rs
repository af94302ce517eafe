//! Labels-file parser.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use super::ParseError;
use crate::registry::{EntityRegistry, LabelRecord, LabelTarget};
use crate::schema::ElementClass;

/// Symbol prefixes recognized in labels files, with the entities they name.
pub const LABEL_PREFIXES: &[(&str, LabelTarget)] = &[
    ("Node_", LabelTarget::Node),
    ("node_", LabelTarget::Node),
    ("NODE_", LabelTarget::Node),
    ("Joint_", LabelTarget::Element(ElementClass::Joint)),
    ("joint_", LabelTarget::Element(ElementClass::Joint)),
    ("JOINT_", LabelTarget::Element(ElementClass::Joint)),
    ("Beam_", LabelTarget::Element(ElementClass::Beam)),
    ("beam_", LabelTarget::Element(ElementClass::Beam)),
    ("BEAM_", LabelTarget::Element(ElementClass::Beam)),
    ("Shell_", LabelTarget::Element(ElementClass::Shell)),
    ("shell_", LabelTarget::Element(ElementClass::Shell)),
    ("SHELL_", LabelTarget::Element(ElementClass::Shell)),
    ("Force_", LabelTarget::Element(ElementClass::Force)),
    ("force_", LabelTarget::Element(ElementClass::Force)),
    ("FORCE_", LabelTarget::Element(ElementClass::Force)),
    ("Aero_", LabelTarget::Element(ElementClass::Aerodynamic)),
    ("aero_", LabelTarget::Element(ElementClass::Aerodynamic)),
    ("AERO_", LabelTarget::Element(ElementClass::Aerodynamic)),
    ("Body_", LabelTarget::Element(ElementClass::Aerodynamic)),
    ("body_", LabelTarget::Element(ElementClass::Aerodynamic)),
    ("BODY_", LabelTarget::Element(ElementClass::Aerodynamic)),
];

/// Parse one line of a labels file.
///
/// Accepts `[set:] [const] [integer] <Prefix><name> = <label>;`. The name is
/// the symbol text after the prefix; the label is the integer after the last
/// `=`. Anything else yields `None`.
pub fn parse_label_line(line: &str) -> Option<LabelRecord> {
    let line = line.split('#').next().unwrap_or_default();
    let (lhs, rhs) = line.rsplit_once('=')?;

    let symbol = lhs.split_whitespace().last()?;
    let (prefix, target) = LABEL_PREFIXES
        .iter()
        .find(|(prefix, _)| symbol.starts_with(prefix))?;
    let name = symbol[prefix.len()..].trim();
    if name.is_empty() {
        return None;
    }

    let int_label = rhs.trim().trim_end_matches(';').trim().parse().ok()?;
    Some(LabelRecord {
        target: *target,
        int_label,
        name: name.to_string(),
    })
}

/// Read every recognized record from a labels file.
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<LabelRecord>, ParseError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ParseError::LabelsFileNotFound {
            path: path.to_path_buf(),
        },
        _ => ParseError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(record) = parse_label_line(&line) {
            records.push(record);
        }
    }
    debug!("Read {} label records from {}", records.len(), path.display());
    Ok(records)
}

/// Read a labels file and overlay its names onto `registry`.
///
/// Returns the number of entities whose label changed.
pub fn import_labels<P: AsRef<Path>>(
    path: P,
    registry: &mut EntityRegistry,
) -> Result<usize, ParseError> {
    let records = read_labels(&path)?;
    let changes = registry.apply_labels_overlay(&records);
    info!(
        "Applied labels from {}: {} changed",
        path.as_ref().display(),
        changes
    );
    Ok(changes)
}
