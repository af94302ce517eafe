//! Container writer for packing motion output into a binary time-series file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{info, warn};

use super::PlaybackError;
use super::format::{
    CompressionType, ContainerFlags, ContainerHeader, Precision, SeriesSpec, compress_lz4,
    encode_step,
};
use super::player::{check_slots, establish_slots, orientation_fields};
use super::source::{MotionSource, NODE_SERIES, POSITION_FIELD, TextMotionSource};
use crate::registry::EntityRegistry;
use crate::rotation::{AngleUnit, Parametrization};

/// Configuration for container writing.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterConfig {
    /// Compression applied to each step record.
    pub compression: CompressionType,
    /// Stored value width. Step times are always f64.
    pub precision: Precision,
}

/// Options for converting a text motion file.
#[derive(Debug, Clone, Copy)]
pub struct PackOptions {
    /// Simulation time of the first step.
    pub initial_time: f64,
    /// Simulation time between consecutive steps.
    pub time_step: f64,
    /// Unit of Euler angles in the text file.
    pub euler_units: AngleUnit,
    pub writer: WriterConfig,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            initial_time: 0.0,
            time_step: 1.0,
            euler_units: AngleUnit::Degrees,
            writer: WriterConfig::default(),
        }
    }
}

/// Writes step records into a time-series container.
///
/// Usage:
/// ```ignore
/// let series = vec![SeriesSpec::new("node.1.X", 3), SeriesSpec::new("node.1.Q", 4)];
/// let mut writer = ContainerWriter::new("run.mbts", series, WriterConfig::default())?;
/// writer.write_step(0.0, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])?;
/// writer.finalize()?;
/// ```
pub struct ContainerWriter {
    writer: BufWriter<File>,
    header: ContainerHeader,
    value_count: usize,
    steps_written: u64,
    data_bytes: u64,
}

impl ContainerWriter {
    /// Create a container and write its header and series table.
    pub fn new<P: AsRef<Path>>(
        path: P,
        series: Vec<SeriesSpec>,
        config: WriterConfig,
    ) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = ContainerHeader {
            series_count: series.len() as u32,
            step_count: 0, // Updated on finalize
            flags: ContainerFlags {
                compression: if cfg!(feature = "lz4") {
                    config.compression
                } else {
                    CompressionType::None
                },
                precision: config.precision,
            },
        };

        // Placeholder header
        header.write_to(&mut writer)?;
        for spec in &series {
            spec.write_to(&mut writer)?;
        }

        Ok(Self {
            writer,
            header,
            value_count: series.iter().map(|s| s.width as usize).sum(),
            steps_written: 0,
            data_bytes: 0,
        })
    }

    /// Append one step. `values` holds every series in table order.
    pub fn write_step(&mut self, time: f64, values: &[f64]) -> io::Result<()> {
        if values.len() != self.value_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Step has {} values, series table needs {}",
                    values.len(),
                    self.value_count
                ),
            ));
        }

        let raw = encode_step(time, values, self.header.flags.precision);
        let data = match self.header.flags.compression {
            CompressionType::None => raw,
            CompressionType::Lz4 => compress_lz4(&raw),
        };

        self.writer.write_all(&(data.len() as u64).to_le_bytes())?;
        self.writer.write_all(&data)?;
        self.data_bytes += data.len() as u64;
        self.steps_written += 1;
        Ok(())
    }

    /// Number of steps written so far.
    pub fn steps_written(&self) -> u64 {
        self.steps_written
    }

    /// Rewrite the header with the final step count and flush.
    pub fn finalize(mut self) -> io::Result<ContainerStats> {
        let total_bytes = self.writer.stream_position()?;

        self.header.step_count = self.steps_written;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.flush()?;

        Ok(ContainerStats {
            step_count: self.steps_written,
            series_count: self.header.series_count,
            total_bytes,
            average_step_size: if self.steps_written > 0 {
                self.data_bytes / self.steps_written
            } else {
                0
            },
            compression: self.header.flags.compression,
        })
    }

    /// Convert a text motion file into a container.
    ///
    /// Series follow the node order of the text file: `node.<label>.X` then,
    /// for oriented nodes, `node.<label>.<suffix>`. Euler angles are stored
    /// in radians.
    pub fn from_text<P: AsRef<Path>, Q: AsRef<Path>>(
        registry: &EntityRegistry,
        motion: P,
        output: Q,
        options: PackOptions,
    ) -> Result<ContainerStats, PlaybackError> {
        let motion = motion.as_ref();
        let output = output.as_ref();
        let io_err = |source: io::Error| PlaybackError::Io {
            path: output.to_path_buf(),
            source,
        };

        let node_count = registry.node_count();
        if node_count == 0 {
            return Err(PlaybackError::NodesNotFound);
        }
        let mut source = TextMotionSource::open(motion, options.euler_units)?;
        if source.total_rows() % node_count as u64 != 0 {
            return Err(PlaybackError::RowCountMismatch {
                path: motion.to_path_buf(),
                rows: source.total_rows(),
                nodes: node_count,
            });
        }

        let mut writer: Option<ContainerWriter> = None;
        let packed = Self::pack_steps(registry, &mut source, output, options, &mut writer);
        let created = writer.is_some();
        let packed = packed.and_then(|()| match writer.take() {
            Some(writer) => writer.finalize().map_err(io_err),
            None => Err(PlaybackError::MalformedRecord {
                path: motion.to_path_buf(),
                line: 0,
                reason: "no time steps".to_string(),
            }),
        });

        match packed {
            Ok(stats) => {
                info!("Packed {} into {}: {}", motion.display(), output.display(), stats);
                Ok(stats)
            }
            Err(e) => {
                // A partial container still claims zero steps; drop it.
                drop(writer);
                if created
                    && let Err(remove) = fs::remove_file(output)
                {
                    warn!("Failed to remove partial {}: {}", output.display(), remove);
                }
                Err(e)
            }
        }
    }

    /// Stream every step of `source` into a writer created on the first step.
    fn pack_steps(
        registry: &EntityRegistry,
        source: &mut TextMotionSource,
        output: &Path,
        options: PackOptions,
        writer: &mut Option<ContainerWriter>,
    ) -> Result<(), PlaybackError> {
        let io_err = |source: io::Error| PlaybackError::Io {
            path: output.to_path_buf(),
            source,
        };
        let node_count = registry.node_count();
        let mut slots: Vec<(u32, Parametrization)> = Vec::new();
        let mut values = Vec::new();
        let mut step = 0usize;

        while let Some(raw) = source.read_step(node_count)? {
            if slots.is_empty() {
                let labels = establish_slots(registry, step, raw.rows.iter().map(|r| r.node_label))?;
                slots = labels
                    .into_iter()
                    .filter_map(|label| registry.node(label).map(|n| (label, n.parametrization)))
                    .collect();
                let series = slots.iter().flat_map(|&(label, p)| node_series(label, p)).collect();
                *writer = Some(ContainerWriter::new(output, series, options.writer).map_err(io_err)?);
            } else {
                let labels: Vec<u32> = slots.iter().map(|&(label, _)| label).collect();
                check_slots(&labels, step, &raw.rows)?;
            }

            values.clear();
            for (row, &(label, parametrization)) in raw.rows.iter().zip(&slots) {
                values.extend(row.position.iter());
                let fields = orientation_fields(row, parametrization).map_err(|source| {
                    PlaybackError::Decode {
                        frame: step,
                        node: label,
                        source,
                    }
                })?;
                match parametrization {
                    Parametrization::Euler(_) => values
                        .extend(fields.iter().map(|&a| options.euler_units.to_radians(a))),
                    _ => values.extend_from_slice(fields),
                }
            }

            let time = options.initial_time + step as f64 * options.time_step;
            if let Some(writer) = writer.as_mut() {
                writer.write_step(time, &values).map_err(io_err)?;
            }
            step += 1;
        }
        Ok(())
    }
}

/// Series describing one node: position, then orientation if it has one.
pub fn node_series(label: u32, parametrization: Parametrization) -> Vec<SeriesSpec> {
    let mut series = vec![SeriesSpec::new(
        format!("{}.{}.{}", NODE_SERIES, label, POSITION_FIELD),
        3,
    )];
    if parametrization != Parametrization::None {
        series.push(SeriesSpec::new(
            format!("{}.{}.{}", NODE_SERIES, label, parametrization.series_suffix()),
            parametrization.field_count() as u16,
        ));
    }
    series
}

/// Statistics from a finished container.
#[derive(Debug, Clone)]
pub struct ContainerStats {
    pub step_count: u64,
    pub series_count: u32,
    /// Total file size in bytes.
    pub total_bytes: u64,
    /// Average stored step record size.
    pub average_step_size: u64,
    pub compression: CompressionType,
}

impl std::fmt::Display for ContainerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} steps of {} series, {} bytes total, {} bytes/step avg ({:?} compression)",
            self.step_count,
            self.series_count,
            self.total_bytes,
            self.average_step_size,
            self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{ContainerMotionSource, PlaybackEngine};
    use crate::schema::PlaybackConfig;
    use crate::rotation::encode_orientation;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::fs;
    use tempfile::tempdir;

    fn registry_with(nodes: &[(u32, &str)]) -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        for &(label, tag) in nodes {
            let p = Parametrization::parse(tag).unwrap();
            let raw = encode_orientation(&UnitQuaternion::identity(), p, AngleUnit::Degrees);
            registry
                .upsert_node(label, Vector3::zeros(), &raw, tag, AngleUnit::Degrees)
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_writer_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.mbts");

        let mut series = node_series(1, Parametrization::Quaternion);
        series.extend(node_series(2, Parametrization::None));
        let mut writer = ContainerWriter::new(&path, series, WriterConfig::default()).unwrap();

        for i in 0..10 {
            let t = i as f64 * 0.1;
            writer
                .write_step(t, &[t, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, t, 0.0])
                .unwrap();
        }
        assert!(writer.write_step(1.0, &[0.0; 3]).is_err());

        let stats = writer.finalize().unwrap();
        assert_eq!(stats.step_count, 10);
        assert_eq!(stats.series_count, 3);
        assert_eq!(stats.average_step_size, 8 + 10 * 8);
        assert_eq!(fs::metadata(&path).unwrap().len(), stats.total_bytes);

        let source = ContainerMotionSource::open(&path).unwrap();
        assert_eq!(source.header().step_count, 10);
        assert_eq!(source.node_count(), 2);
        assert_eq!(source.total_rows(), 20);
    }

    #[test]
    fn test_node_series() {
        let series = node_series(4, Parametrization::parse("euler321").unwrap());
        assert_eq!(series[0], SeriesSpec::new("node.4.X", 3));
        assert_eq!(series[1], SeriesSpec::new("node.4.E", 3));
        assert_eq!(node_series(5, Parametrization::None).len(), 1);
        assert_eq!(node_series(6, Parametrization::Matrix)[1].width, 9);
    }

    #[test]
    fn test_pack_and_play() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("run.mov");
        let packed = dir.path().join("run.mbts");
        fs::write(
            &text,
            "2 0 0 0 0 0 1\n1 0 0 0 90 0 0 9 9 9\n\
             2 1 0 0 0 0 1\n1 1 0 0 0 90 0 9 9 9\n\
             2 2 0 0 0 0 1\n1 2 0 0 0 0 90 9 9 9\n",
        )
        .unwrap();

        let registry = registry_with(&[(1, "euler123"), (2, "phi")]);
        let options = PackOptions {
            time_step: 0.5,
            ..Default::default()
        };
        let stats = ContainerWriter::from_text(&registry, &text, &packed, options).unwrap();
        assert_eq!(stats.step_count, 3);
        assert_eq!(stats.series_count, 4);

        let mut from_text = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        from_text.open(&text).unwrap();
        let mut from_container = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        from_container.open(&packed).unwrap();
        assert_eq!(from_container.slots(), &[2, 1]);

        for step in 0..3 {
            let a = from_text.advance_frame().unwrap().unwrap();
            let b = from_container.advance_frame().unwrap().unwrap();
            assert_eq!(a.time, None);
            assert_eq!(b.time, Some(step as f64 * 0.5));
            for (sa, sb) in a.samples.iter().zip(&b.samples) {
                assert_eq!(sa.node_label, sb.node_label);
                assert_eq!(sa.position, sb.position);
                assert!(sa.orientation.angle_to(&sb.orientation) < 1e-9);
            }
        }
        assert!(from_container.advance_frame().unwrap().is_none());
    }

    #[test]
    fn test_container_decimation_and_mismatch() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("run.mov");
        let packed = dir.path().join("run.mbts");
        let rows: String = (0..6).map(|s| format!("1 {} 0 0 0 0 0\n", s)).collect();
        fs::write(&text, rows).unwrap();

        let registry = registry_with(&[(1, "phi")]);
        let options = PackOptions {
            writer: WriterConfig {
                compression: CompressionType::Lz4,
                precision: Precision::F32,
            },
            ..Default::default()
        };
        let stats = ContainerWriter::from_text(&registry, &text, &packed, options).unwrap();
        let stored = if cfg!(feature = "lz4") {
            CompressionType::Lz4
        } else {
            CompressionType::None
        };
        assert_eq!(stats.compression, stored);
        let source = ContainerMotionSource::open(&packed).unwrap();
        assert_eq!(source.header().flags.compression, stored);
        assert_eq!(source.header().flags.precision, Precision::F32);
        drop(source);

        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::with_decimation(2)).unwrap();
        engine.open(&packed).unwrap();
        let steps: Vec<f64> = engine
            .frames()
            .map(|f| f.unwrap().samples[0].position.x)
            .collect();
        assert_eq!(steps, vec![0.0, 2.0, 4.0]);

        let other = registry_with(&[(1, "quat")]);
        let mut engine = PlaybackEngine::new(&other, PlaybackConfig::default()).unwrap();
        assert!(matches!(
            engine.open(&packed),
            Err(PlaybackError::SeriesMismatch { label: 1, .. })
        ));

        let bigger = registry_with(&[(1, "phi"), (2, "phi")]);
        let mut engine = PlaybackEngine::new(&bigger, PlaybackConfig::default()).unwrap();
        assert!(matches!(
            engine.open(&packed),
            Err(PlaybackError::RowCountMismatch { nodes: 2, .. })
        ));
    }

    #[test]
    fn test_failed_pack_leaves_no_file() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("desync.mov");
        let packed = dir.path().join("desync.mbts");
        fs::write(&text, "1 0 0 0 0 0 0
2 0 0 0 0 0 0
2 1 0 0 0 0 0
1 1 0 0 0 0 0
").unwrap();

        let registry = registry_with(&[(1, "phi"), (2, "phi")]);
        let result = ContainerWriter::from_text(&registry, &text, &packed, PackOptions::default());
        assert!(matches!(result, Err(PlaybackError::StreamDesync { frame: 1, .. })));
        assert!(!packed.exists());

        // A file that was never touched survives an early failure.
        fs::write(&packed, b"keep").unwrap();
        let empty = EntityRegistry::new();
        let result = ContainerWriter::from_text(&empty, &text, &packed, PackOptions::default());
        assert!(matches!(result, Err(PlaybackError::NodesNotFound)));
        assert_eq!(fs::read(&packed).unwrap(), b"keep");
    }
}
