//! Forward-only readers for text and binary motion-output files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::Vector3;

use super::PlaybackError;
use super::format::{CompressionType, ContainerHeader, SeriesSpec, decode_step, decompress_lz4};
use crate::rotation::AngleUnit;

/// Series kind prefix for node time series in containers.
pub const NODE_SERIES: &str = "node";

/// Series field holding node positions.
pub const POSITION_FIELD: &str = "X";

/// One undecoded row: a node label, its position and the fields after it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub node_label: u32,
    pub position: Vector3<f64>,
    /// Orientation fields first; text rows may carry trailing fields
    /// (velocities) after them.
    pub fields: Vec<f64>,
}

/// All rows of one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStep {
    /// Simulation time, when the source records it.
    pub time: Option<f64>,
    pub rows: Vec<RawRow>,
}

/// A sequential, non-seeking motion-output reader.
pub trait MotionSource {
    /// Total number of node rows in the stream.
    fn total_rows(&self) -> u64;

    /// Unit of Euler angles in this source.
    fn angle_unit(&self) -> AngleUnit;

    /// Node labels and orientation series suffixes, when the source declares
    /// them up front.
    fn declared_nodes(&self) -> Option<Vec<(u32, String)>> {
        None
    }

    /// Discard one time step of `rows` rows without decoding it.
    ///
    /// Returns false at end of stream.
    fn skip_step(&mut self, rows: usize) -> Result<bool, PlaybackError>;

    /// Read one time step of `rows` rows. Returns None at end of stream.
    fn read_step(&mut self, rows: usize) -> Result<Option<RawStep>, PlaybackError>;
}

fn open_file(path: &Path) -> Result<File, PlaybackError> {
    File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => PlaybackError::OutputFileNotFound {
            path: path.to_path_buf(),
        },
        _ => PlaybackError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Whether the file at `path` starts with the container magic bytes.
pub fn is_container<P: AsRef<Path>>(path: P) -> Result<bool, PlaybackError> {
    let path = path.as_ref();
    let mut magic = [0u8; 4];
    let mut file = open_file(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == super::format::CONTAINER_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(source) => Err(PlaybackError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Text motion file: one whitespace-separated row per node per time step.
///
/// ```text
/// <label> <x> <y> <z> <orientation...> [<trailing fields...>]
/// ```
pub struct TextMotionSource {
    path: PathBuf,
    reader: BufReader<File>,
    total_rows: u64,
    units: AngleUnit,
    line: usize,
    buf: String,
}

impl TextMotionSource {
    /// Open a text motion file. Rows are counted in a first pass, then the
    /// file is reopened for streaming.
    pub fn open<P: AsRef<Path>>(path: P, units: AngleUnit) -> Result<Self, PlaybackError> {
        let path = path.as_ref();

        let mut total_rows = 0u64;
        for line in BufReader::new(open_file(path)?).lines() {
            let line = line.map_err(|source| PlaybackError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if !line.trim().is_empty() {
                total_rows += 1;
            }
        }
        debug!("{}: {} rows", path.display(), total_rows);

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(open_file(path)?),
            total_rows,
            units,
            line: 0,
            buf: String::new(),
        })
    }

    /// Advance to the next non-blank line. Returns false at end of file.
    fn next_line(&mut self) -> Result<bool, PlaybackError> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .map_err(|source| PlaybackError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                return Ok(false);
            }
            self.line += 1;
            if !self.buf.trim().is_empty() {
                return Ok(true);
            }
        }
    }

    fn malformed(&self, reason: String) -> PlaybackError {
        PlaybackError::MalformedRecord {
            path: self.path.clone(),
            line: self.line,
            reason,
        }
    }

    fn parse_row(&self) -> Result<RawRow, PlaybackError> {
        let mut tokens = self.buf.split_whitespace();
        let label = tokens.next().unwrap_or_default();
        let node_label = label
            .parse()
            .map_err(|_| self.malformed(format!("invalid node label '{}'", label)))?;

        let values = tokens
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| self.malformed(format!("invalid number '{}'", t)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() < 3 {
            return Err(self.malformed("row has no position".to_string()));
        }

        Ok(RawRow {
            node_label,
            position: Vector3::new(values[0], values[1], values[2]),
            fields: values[3..].to_vec(),
        })
    }
}

impl MotionSource for TextMotionSource {
    fn total_rows(&self) -> u64 {
        self.total_rows
    }

    fn angle_unit(&self) -> AngleUnit {
        self.units
    }

    fn skip_step(&mut self, rows: usize) -> Result<bool, PlaybackError> {
        for i in 0..rows {
            if !self.next_line()? {
                if i == 0 {
                    return Ok(false);
                }
                return Err(self.malformed("file ends in the middle of a time step".to_string()));
            }
        }
        Ok(true)
    }

    fn read_step(&mut self, rows: usize) -> Result<Option<RawStep>, PlaybackError> {
        let mut step = RawStep {
            time: None,
            rows: Vec::with_capacity(rows),
        };
        for i in 0..rows {
            if !self.next_line()? {
                if i == 0 {
                    return Ok(None);
                }
                return Err(self.malformed("file ends in the middle of a time step".to_string()));
            }
            step.rows.push(self.parse_row()?);
        }
        Ok(Some(step))
    }
}

/// Where one node's values sit inside a step record.
#[derive(Debug, Clone)]
struct NodeColumns {
    label: u32,
    position: usize,
    orientation: usize,
    orientation_width: usize,
    suffix: String,
}

/// Binary container reader. Steps are read strictly in order.
pub struct ContainerMotionSource {
    path: PathBuf,
    reader: BufReader<File>,
    header: ContainerHeader,
    columns: Vec<NodeColumns>,
    values: Vec<f64>,
    steps_read: u64,
}

impl ContainerMotionSource {
    /// Open a container and read its series table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PlaybackError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(open_file(path)?);

        let format_err = |e: io::Error| PlaybackError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let header = ContainerHeader::read_from(&mut reader).map_err(format_err)?;
        // Grown as specs are read; the count is untrusted until the table is.
        let mut series = Vec::new();
        for _ in 0..header.series_count {
            series.push(SeriesSpec::read_from(&mut reader).map_err(format_err)?);
        }

        let (columns, value_count) = node_columns(&series).map_err(|reason| {
            PlaybackError::Format {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        debug!(
            "{}: {} steps, {} nodes, {} values per step",
            path.display(),
            header.step_count,
            columns.len(),
            value_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header,
            columns,
            values: vec![0.0; value_count],
            steps_read: 0,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Number of nodes the container holds series for.
    pub fn node_count(&self) -> usize {
        self.columns.len()
    }

    fn format_error(&self, reason: impl Into<String>) -> PlaybackError {
        PlaybackError::Format {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Read the size prefix of the next step record. None at end of stream.
    fn next_record_size(&mut self) -> Result<Option<u64>, PlaybackError> {
        if self.steps_read >= self.header.step_count {
            return Ok(None);
        }
        let mut buf8 = [0u8; 8];
        self.reader
            .read_exact(&mut buf8)
            .map_err(|e| self.format_error(format!("step {}: {}", self.steps_read, e)))?;
        self.steps_read += 1;
        Ok(Some(u64::from_le_bytes(buf8)))
    }
}

/// Uncompressed size prepended to an LZ4 record.
fn lz4_content_size(data: &[u8]) -> Option<usize> {
    let prefix: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(prefix) as usize)
}

/// Map a series table onto per-node columns.
fn node_columns(series: &[SeriesSpec]) -> Result<(Vec<NodeColumns>, usize), String> {
    let mut columns: Vec<NodeColumns> = Vec::new();
    let mut orientations: Vec<(u32, usize, usize, String)> = Vec::new();
    let mut offset = 0;

    for spec in series {
        if let Some((NODE_SERIES, label, field)) = spec.key() {
            if field == POSITION_FIELD {
                if spec.width != 3 {
                    return Err(format!("{} has width {}, expected 3", spec.name, spec.width));
                }
                if columns.iter().any(|c| c.label == label) {
                    return Err(format!("duplicate series {}", spec.name));
                }
                columns.push(NodeColumns {
                    label,
                    position: offset,
                    orientation: 0,
                    orientation_width: 0,
                    suffix: String::new(),
                });
            } else {
                orientations.push((label, offset, spec.width as usize, field.to_string()));
            }
        }
        offset += spec.width as usize;
    }

    for (label, position, width, suffix) in orientations {
        let column = columns
            .iter_mut()
            .find(|c| c.label == label)
            .ok_or_else(|| format!("orientation series for node {} has no position series", label))?;
        column.orientation = position;
        column.orientation_width = width;
        column.suffix = suffix;
    }

    Ok((columns, offset))
}

impl MotionSource for ContainerMotionSource {
    fn total_rows(&self) -> u64 {
        self.header.step_count * self.columns.len() as u64
    }

    fn angle_unit(&self) -> AngleUnit {
        AngleUnit::Radians
    }

    fn declared_nodes(&self) -> Option<Vec<(u32, String)>> {
        Some(
            self.columns
                .iter()
                .map(|c| (c.label, c.suffix.clone()))
                .collect(),
        )
    }

    fn skip_step(&mut self, _rows: usize) -> Result<bool, PlaybackError> {
        let Some(size) = self.next_record_size()? else {
            return Ok(false);
        };
        let mut record = (&mut self.reader).take(size);
        let copied = io::copy(&mut record, &mut io::sink());
        let skipped = copied.map_err(|e| self.format_error(e.to_string()))?;
        if skipped != size {
            return Err(self.format_error("container ends in the middle of a step"));
        }
        Ok(true)
    }

    fn read_step(&mut self, rows: usize) -> Result<Option<RawStep>, PlaybackError> {
        if rows != self.columns.len() {
            return Err(self.format_error(format!(
                "requested {} rows per step, container holds {} nodes",
                rows,
                self.columns.len()
            )));
        }
        let Some(size) = self.next_record_size()? else {
            return Ok(None);
        };

        let flags = self.header.flags;
        let expected = 8 + self.values.len() * flags.precision.value_size();
        if flags.compression == CompressionType::None && size != expected as u64 {
            return Err(self.format_error(format!(
                "step {} record is {} bytes, expected {}",
                self.steps_read - 1,
                size,
                expected
            )));
        }

        let mut data = Vec::new();
        let mut record = (&mut self.reader).take(size);
        let read = record.read_to_end(&mut data);
        let read = read.map_err(|e| self.format_error(e.to_string()))?;
        if read as u64 != size {
            return Err(self.format_error("container ends in the middle of a step"));
        }
        let raw = match flags.compression {
            CompressionType::None => data,
            CompressionType::Lz4 => {
                if lz4_content_size(&data) != Some(expected) {
                    return Err(self.format_error(format!(
                        "step {} decompresses to the wrong size",
                        self.steps_read - 1
                    )));
                }
                decompress_lz4(&data).map_err(|e| self.format_error(e.to_string()))?
            }
        };
        let time = decode_step(&raw, &mut self.values, flags.precision)
            .map_err(|e| self.format_error(e.to_string()))?;

        let rows = self
            .columns
            .iter()
            .map(|c| RawRow {
                node_label: c.label,
                position: Vector3::new(
                    self.values[c.position],
                    self.values[c.position + 1],
                    self.values[c.position + 2],
                ),
                fields: self.values[c.orientation..c.orientation + c.orientation_width].to_vec(),
            })
            .collect();

        Ok(Some(RawStep {
            time: Some(time),
            rows,
        }))
    }
}
