//! Solver log-file parser.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use super::{ImportIssue, ImportReport, ParseError, layout_for};
use crate::registry::{
    ConsistencyReport, ElementSpec, EntityRegistry, NodeAttachment, RegistrySnapshot, Upsert,
};
use crate::rotation::{AngleUnit, Parametrization, matrix_to_quaternion};
use crate::schema::{ElementKey, ElementKind, ImportConfig};

/// Lines from this marker on are not node or element records.
pub const END_OF_RECORDS: &str = "Symbol table";

/// Keyword for structural node records.
pub const NODE_KEYWORD: &str = "structural node";

/// Maximum number of tokens a record keyword may span.
const KEYWORD_LOOKAHEAD: usize = 4;

/// A `structural node:` record.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub line: usize,
    pub label: u32,
    pub position: Vector3<f64>,
    pub parametrization_tag: String,
    pub orientation: Vec<f64>,
}

/// An element record.
#[derive(Debug, Clone)]
pub struct ElementRecord {
    pub line: usize,
    pub spec: ElementSpec,
    /// Rotational offsets that could not be decoded.
    pub issues: Vec<ImportIssue>,
}

/// A log file split into records, not yet applied to a registry.
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub path: PathBuf,
    pub nodes: Vec<NodeRecord>,
    pub elements: Vec<ElementRecord>,
    /// Record keywords with no layout, with occurrence counts.
    pub unsupported: BTreeMap<String, usize>,
    units: AngleUnit,
}

impl ParsedLog {
    /// Label sets this log would produce.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            nodes: self.nodes.iter().map(|n| n.label).collect(),
            elements: self
                .elements
                .iter()
                .map(|e| ElementKey::new(e.spec.kind, e.spec.int_label))
                .collect(),
        }
    }

    /// Compare against a populated registry before applying. None if the
    /// registry is empty.
    pub fn check_against(&self, registry: &EntityRegistry) -> Option<ConsistencyReport> {
        let before = registry.snapshot();
        if before.is_empty() {
            return None;
        }
        Some(ConsistencyReport::compare(&before, &self.snapshot()))
    }

    /// Upsert every record into the registry, nodes first.
    pub fn apply(self, registry: &mut EntityRegistry) -> ImportReport {
        let mut report = ImportReport {
            consistency: self.check_against(registry),
            ..Default::default()
        };

        for node in &self.nodes {
            match registry.upsert_node(
                node.label,
                node.position,
                &node.orientation,
                &node.parametrization_tag,
                self.units,
            ) {
                Ok(Upsert::Created) => report.nodes_created += 1,
                Ok(Upsert::Updated) => report.nodes_updated += 1,
                Err(source) => {
                    warn!("{}:{}: node {}: {}", self.path.display(), node.line, node.label, source);
                    report.issues.push(ImportIssue::Node {
                        line: node.line,
                        label: node.label,
                        source,
                    });
                }
            }
        }

        for element in self.elements {
            report.issues.extend(element.issues);
            let outcome = registry.upsert_element(element.spec);
            match outcome.status {
                Upsert::Created => report.elements_created += 1,
                Upsert::Updated => report.elements_updated += 1,
            }
            for missing in outcome.missing {
                warn!("{}:{}: {}", self.path.display(), element.line, missing);
                report.issues.push(missing.into());
            }
        }

        for (keyword, count) in &self.unsupported {
            debug!("Record type '{}' not implemented ({} records)", keyword, count);
        }
        report.unsupported = self.unsupported;

        if let Some(kind) = report.inconsistency() {
            warn!("Reload of {}: {}", self.path.display(), kind);
        }
        info!("Imported {}: {}", self.path.display(), report);
        report
    }
}

/// Reads solver log files into [`ParsedLog`]s.
#[derive(Debug, Clone, Default)]
pub struct LogParser {
    config: ImportConfig,
}

impl LogParser {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Parse a log file and apply it to `registry`.
    ///
    /// On error the registry is not modified.
    pub fn import<P: AsRef<Path>>(
        &self,
        path: P,
        registry: &mut EntityRegistry,
    ) -> Result<ImportReport, ParseError> {
        Ok(self.read(path)?.apply(registry))
    }

    /// Parse a log file without touching any registry.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<ParsedLog, ParseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ParseError::LogNotFound {
                path: path.to_path_buf(),
            },
            _ => ParseError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        self.read_from(BufReader::new(file), path)
    }

    /// Parse log records from any buffered reader. `path` is used for reporting.
    pub fn read_from<R: BufRead>(&self, reader: R, path: &Path) -> Result<ParsedLog, ParseError> {
        let mut parsed = ParsedLog {
            path: path.to_path_buf(),
            nodes: Vec::new(),
            elements: Vec::new(),
            unsupported: BTreeMap::new(),
            units: self.config.log_units,
        };

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim_start().starts_with(END_OF_RECORDS) {
                break;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some((keyword, consumed)) = record_keyword(&tokens) else {
                continue;
            };
            let mut fields = Fields::new(&tokens[consumed..], path, line_no);

            if keyword == NODE_KEYWORD {
                parsed.nodes.push(parse_node(&mut fields)?);
            } else if let Some(kind) = ElementKind::from_keyword(&keyword) {
                parsed.elements.push(parse_element(kind, &mut fields)?);
            } else {
                *parsed.unsupported.entry(keyword).or_default() += 1;
            }
        }

        if parsed.nodes.is_empty() {
            return Err(ParseError::NodesNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(
            "Parsed {}: {} node records, {} element records",
            path.display(),
            parsed.nodes.len(),
            parsed.elements.len()
        );
        Ok(parsed)
    }
}

/// Join leading tokens up to the first one ending in `:`.
///
/// Returns the keyword (without colon) and how many tokens it spans.
pub fn record_keyword(tokens: &[&str]) -> Option<(String, usize)> {
    let end = tokens
        .iter()
        .take(KEYWORD_LOOKAHEAD)
        .position(|t| t.ends_with(':'))?;
    let mut keyword = tokens[..=end].join(" ");
    keyword.pop();
    Some((keyword, end + 1))
}

fn parse_node(fields: &mut Fields<'_>) -> Result<NodeRecord, ParseError> {
    let label = fields.next_u32("node label")?;
    let position = fields.next_vec3("position")?;
    let tag = fields.next_token("orientation description")?;

    // An unknown tag is reported when the record is applied; keep whatever follows.
    let count = Parametrization::parse(tag)
        .map(Parametrization::field_count)
        .unwrap_or(fields.remaining());
    let orientation = fields.next_floats(count, "orientation")?;

    Ok(NodeRecord {
        line: fields.line,
        label,
        position,
        parametrization_tag: tag.to_string(),
        orientation,
    })
}

fn parse_element(kind: ElementKind, fields: &mut Fields<'_>) -> Result<ElementRecord, ParseError> {
    let label = fields.next_u32("element label")?;
    let layout = layout_for(kind);
    if fields.remaining() < layout.field_count() {
        return Err(fields.malformed(format!(
            "{} record needs {} fields after the label, found {}",
            kind,
            layout.field_count(),
            fields.remaining()
        )));
    }

    let key = ElementKey::new(kind, label);
    let mut spec = ElementSpec::new(kind, label);
    let mut issues = Vec::new();
    let mut rotation_index = 0;
    let mut next_rotation = |fields: &mut Fields<'_>| -> Result<UnitQuaternion<f64>, ParseError> {
        let raw = fields.next_floats(9, "orientation matrix")?;
        let index = rotation_index;
        rotation_index += 1;
        Ok(
            matrix_to_quaternion(&Matrix3::from_row_slice(&raw)).unwrap_or_else(|source| {
                issues.push(ImportIssue::RotationalOffset {
                    line: fields.line,
                    element: key,
                    index,
                    source,
                });
                UnitQuaternion::identity()
            }),
        )
    };

    for _ in 0..layout.aux_labels {
        spec.aux_labels.push(fields.next_u32("referenced label")?);
    }
    for group in layout.groups {
        let node = fields.next_u32("node label")?;
        let offsets = (0..group.offsets)
            .map(|_| fields.next_vec3("offset"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut rotations = Vec::with_capacity(group.rotations);
        for _ in 0..group.rotations {
            rotations.push(next_rotation(fields)?);
        }
        spec.attachments.push(NodeAttachment {
            node,
            offsets,
            rotations,
        });
    }
    for _ in 0..layout.extra_offsets {
        spec.extra_offsets.push(fields.next_vec3("offset")?);
    }
    for _ in 0..layout.extra_rotations {
        spec.extra_rotations.push(next_rotation(fields)?);
    }
    for _ in 0..layout.flags {
        spec.flags.push(fields.next_flag()?);
    }

    Ok(ElementRecord {
        line: fields.line,
        spec,
        issues,
    })
}

/// Cursor over the tokens of one record.
struct Fields<'a> {
    tokens: &'a [&'a str],
    pos: usize,
    path: &'a Path,
    line: usize,
}

impl<'a> Fields<'a> {
    fn new(tokens: &'a [&'a str], path: &'a Path, line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            path,
            line,
        }
    }

    fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    fn malformed(&self, reason: String) -> ParseError {
        ParseError::MalformedRecord {
            path: self.path.to_path_buf(),
            line: self.line,
            reason,
        }
    }

    fn next_token(&mut self, what: &str) -> Result<&'a str, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.malformed(format!("missing {}", what)))?;
        self.pos += 1;
        Ok(token)
    }

    fn next_u32(&mut self, what: &str) -> Result<u32, ParseError> {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|_| self.malformed(format!("invalid {} '{}'", what, token)))
    }

    fn next_f64(&mut self, what: &str) -> Result<f64, ParseError> {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|_| self.malformed(format!("invalid {} '{}'", what, token)))
    }

    fn next_floats(&mut self, count: usize, what: &str) -> Result<Vec<f64>, ParseError> {
        (0..count).map(|_| self.next_f64(what)).collect()
    }

    fn next_vec3(&mut self, what: &str) -> Result<Vector3<f64>, ParseError> {
        Ok(Vector3::new(
            self.next_f64(what)?,
            self.next_f64(what)?,
            self.next_f64(what)?,
        ))
    }

    fn next_flag(&mut self) -> Result<bool, ParseError> {
        let token = self.next_token("flag")?;
        token
            .parse::<i64>()
            .map(|v| v != 0)
            .map_err(|_| self.malformed(format!("invalid flag '{}'", token)))
    }
}
