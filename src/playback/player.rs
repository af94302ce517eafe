//! Playback engine streaming decoded node samples out of a motion file.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use nalgebra::{UnitQuaternion, Vector3};

use super::source::{
    ContainerMotionSource, MotionSource, RawRow, RawStep, TextMotionSource, is_container,
};
use crate::registry::EntityRegistry;
use crate::rotation::{AngleUnit, Parametrization, RotationError, decode_orientation};
use crate::schema::{ConfigError, DecodePolicy, PlaybackConfig};

/// Lifecycle of a playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// No file open.
    #[default]
    Unopened,
    /// File open and validated, no frame read yet.
    Ready,
    /// At least one frame read.
    Streaming,
    /// End of stream, step range or a fatal error reached. The file is released.
    Exhausted,
}

/// Cursor over the currently open motion file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub total_rows: u64,
    pub node_count: usize,
    /// `total_rows / node_count`.
    pub timestep_count: u64,
    pub decimation_frequency: usize,
    /// Number of frames emitted so far.
    pub current_frame_index: usize,
}

/// One decoded (time step, node) pair.
#[derive(Debug, Clone)]
pub struct TimeSample {
    pub node_label: u32,
    pub position: Vector3<f64>,
    /// Orientation fields as read, in the node's parametrization.
    pub orientation_raw: Vec<f64>,
    pub parametrization: Parametrization,
    pub orientation: UnitQuaternion<f64>,
}

/// A sample dropped under [`DecodePolicy::Skip`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFailure {
    pub node_label: u32,
    pub error: RotationError,
}

/// All samples of one emitted time step.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of this frame in the emitted sequence.
    pub index: usize,
    /// Solver time step the frame was read from (0-indexed).
    pub step: usize,
    /// Simulation time, when the source records it.
    pub time: Option<f64>,
    /// Samples in file order.
    pub samples: Vec<TimeSample>,
    pub failures: Vec<SampleFailure>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Playback errors. Each one ends the current pass.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Motion output file not found: {}", path.display())]
    OutputFileNotFound { path: PathBuf },
    #[error("Registry holds no nodes")]
    NodesNotFound,
    #[error("{}: {rows} rows do not split into time steps of {nodes} nodes", path.display())]
    RowCountMismatch {
        path: PathBuf,
        rows: u64,
        nodes: usize,
    },
    #[error("Step {frame}, row {slot}: expected node {expected}, found node {found}")]
    StreamDesync {
        frame: usize,
        slot: usize,
        expected: u32,
        found: u32,
    },
    #[error("Step {frame}: node {label} is not in the registry")]
    NodeNotFound { frame: usize, label: u32 },
    #[error("Step {frame}: node {label} appears more than once")]
    DuplicateNode { frame: usize, label: u32 },
    #[error("Node {label}: file stores '{found}' orientation series, registry expects '{expected}'")]
    SeriesMismatch {
        label: u32,
        expected: String,
        found: String,
    },
    #[error("Step {frame}, node {node}: {source}")]
    Decode {
        frame: usize,
        node: u32,
        #[source]
        source: RotationError,
    },
    #[error("{}:{line}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{}: invalid container: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
    #[error("Playback engine is {0:?}")]
    InvalidState(PlaybackStatus),
    #[error("Failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Node labels of one step, in file order, checked against the registry.
pub(crate) fn establish_slots(
    registry: &EntityRegistry,
    frame: usize,
    labels: impl IntoIterator<Item = u32>,
) -> Result<Vec<u32>, PlaybackError> {
    let mut seen = HashSet::new();
    let mut slots = Vec::new();
    for label in labels {
        if !registry.contains_node(label) {
            return Err(PlaybackError::NodeNotFound { frame, label });
        }
        if !seen.insert(label) {
            return Err(PlaybackError::DuplicateNode { frame, label });
        }
        slots.push(label);
    }
    Ok(slots)
}

/// Check that each row of a step carries the node established for its slot.
pub(crate) fn check_slots(slots: &[u32], frame: usize, rows: &[RawRow]) -> Result<(), PlaybackError> {
    for (slot, (row, &expected)) in rows.iter().zip(slots).enumerate() {
        if row.node_label != expected {
            return Err(PlaybackError::StreamDesync {
                frame,
                slot,
                expected,
                found: row.node_label,
            });
        }
    }
    Ok(())
}

/// Orientation fields of a row for `parametrization`, ignoring trailing fields.
pub(crate) fn orientation_fields(
    row: &RawRow,
    parametrization: Parametrization,
) -> Result<&[f64], RotationError> {
    let expected = parametrization.field_count();
    row.fields
        .get(..expected)
        .ok_or(RotationError::FieldCount {
            parametrization,
            expected,
            found: row.fields.len(),
        })
}

/// Streams decoded frames from a motion-output file against a registry.
///
/// The stream is forward-only. Restarting means `close()` then `open()`.
///
/// ```ignore
/// let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::with_decimation(2))?;
/// engine.open("run.mov")?;
/// for frame in engine.frames() {
///     let frame = frame?;
///     for sample in &frame.samples {
///         // Apply sample.position and sample.orientation...
///     }
/// }
/// ```
pub struct PlaybackEngine<'r> {
    registry: &'r EntityRegistry,
    config: PlaybackConfig,
    status: PlaybackStatus,
    state: PlaybackState,
    source: Option<Box<dyn MotionSource>>,
    path: Option<PathBuf>,
    /// Node label expected at each row of a step, fixed by the first decoded step.
    slots: Vec<u32>,
    next_step: usize,
}

impl<'r> PlaybackEngine<'r> {
    pub fn new(registry: &'r EntityRegistry, config: PlaybackConfig) -> Result<Self, PlaybackError> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            status: PlaybackStatus::Unopened,
            state: PlaybackState::default(),
            source: None,
            path: None,
            slots: Vec::new(),
            next_step: 0,
        })
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Path of the open file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Node labels in file order, once the first frame has been decoded.
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    /// Open a motion file, detecting a binary container by its magic bytes.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<&PlaybackState, PlaybackError> {
        self.close();
        if is_container(&path)? {
            self.open_container(path)
        } else {
            self.open_text(path)
        }
    }

    /// Open a whitespace-separated text motion file.
    pub fn open_text<P: AsRef<Path>>(&mut self, path: P) -> Result<&PlaybackState, PlaybackError> {
        self.close();
        let node_count = self.require_nodes()?;
        let source = TextMotionSource::open(&path, self.config.euler_units)?;
        self.start(path.as_ref(), Box::new(source), node_count)
    }

    /// Open a binary time-series container.
    pub fn open_container<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<&PlaybackState, PlaybackError> {
        self.close();
        let path = path.as_ref();
        let node_count = self.require_nodes()?;
        let source = ContainerMotionSource::open(path)?;

        if source.node_count() != node_count {
            return Err(PlaybackError::RowCountMismatch {
                path: path.to_path_buf(),
                rows: source.total_rows(),
                nodes: node_count,
            });
        }

        let declared = source.declared_nodes().unwrap_or_default();
        let slots = establish_slots(self.registry, 0, declared.iter().map(|(label, _)| *label))?;
        for (label, suffix) in &declared {
            if let Some(node) = self.registry.node(*label) {
                let expected = node.parametrization.series_suffix();
                if expected != suffix {
                    return Err(PlaybackError::SeriesMismatch {
                        label: *label,
                        expected: expected.to_string(),
                        found: suffix.clone(),
                    });
                }
            }
        }

        self.start(path, Box::new(source), node_count)?;
        self.slots = slots;
        Ok(&self.state)
    }

    fn require_nodes(&self) -> Result<usize, PlaybackError> {
        match self.registry.node_count() {
            0 => Err(PlaybackError::NodesNotFound),
            n => Ok(n),
        }
    }

    fn start(
        &mut self,
        path: &Path,
        source: Box<dyn MotionSource>,
        node_count: usize,
    ) -> Result<&PlaybackState, PlaybackError> {
        let total_rows = source.total_rows();
        if total_rows % node_count as u64 != 0 {
            return Err(PlaybackError::RowCountMismatch {
                path: path.to_path_buf(),
                rows: total_rows,
                nodes: node_count,
            });
        }

        self.state = PlaybackState {
            total_rows,
            node_count,
            timestep_count: total_rows / node_count as u64,
            decimation_frequency: self.config.decimation,
            current_frame_index: 0,
        };
        info!(
            "Opened {}: {} time steps of {} nodes",
            path.display(),
            self.state.timestep_count,
            node_count
        );

        self.source = Some(source);
        self.path = Some(path.to_path_buf());
        self.status = PlaybackStatus::Ready;
        Ok(&self.state)
    }

    /// Release the file and return to [`PlaybackStatus::Unopened`].
    pub fn close(&mut self) {
        self.source = None;
        self.path = None;
        self.slots.clear();
        self.next_step = 0;
        self.state = PlaybackState::default();
        self.status = PlaybackStatus::Unopened;
    }

    /// Release the file, keeping the state for inspection.
    fn finish(&mut self) {
        self.source = None;
        self.status = PlaybackStatus::Exhausted;
    }

    /// Decode the next emitted time step. Returns `None` once exhausted.
    ///
    /// Steps dropped by decimation or the step range are skipped without
    /// being parsed. Any error releases the file.
    pub fn advance_frame(&mut self) -> Result<Option<Frame>, PlaybackError> {
        match self.status {
            PlaybackStatus::Unopened => return Err(PlaybackError::InvalidState(self.status)),
            PlaybackStatus::Exhausted => return Ok(None),
            PlaybackStatus::Ready | PlaybackStatus::Streaming => {}
        }
        self.status = PlaybackStatus::Streaming;

        match self.next_frame() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                debug!("Playback exhausted after {} frames", self.state.current_frame_index);
                self.finish();
                Ok(None)
            }
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PlaybackError> {
        let rows = self.state.node_count;
        loop {
            let step = self.next_step;
            if self.config.last_step.is_some_and(|last| step > last) {
                return Ok(None);
            }
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };

            if !self.config.emits(step) {
                if !source.skip_step(rows)? {
                    return Ok(None);
                }
                self.next_step += 1;
                continue;
            }

            let units = source.angle_unit();
            let Some(raw) = source.read_step(rows)? else {
                return Ok(None);
            };
            self.next_step += 1;
            return self.decode_step(step, raw, units).map(Some);
        }
    }

    fn decode_step(
        &mut self,
        step: usize,
        raw: RawStep,
        units: AngleUnit,
    ) -> Result<Frame, PlaybackError> {
        if self.slots.is_empty() {
            self.slots = establish_slots(self.registry, step, raw.rows.iter().map(|r| r.node_label))?;
        } else {
            check_slots(&self.slots, step, &raw.rows)?;
        }

        let mut samples = Vec::with_capacity(raw.rows.len());
        let mut failures = Vec::new();
        for row in raw.rows {
            let node = self.registry.node(row.node_label).ok_or(PlaybackError::NodeNotFound {
                frame: step,
                label: row.node_label,
            })?;
            let parametrization = node.parametrization;

            let decoded = orientation_fields(&row, parametrization).and_then(|fields| {
                decode_orientation(fields, parametrization, units).map(|q| (fields.to_vec(), q))
            });
            match decoded {
                Ok((orientation_raw, orientation)) => samples.push(TimeSample {
                    node_label: row.node_label,
                    position: row.position,
                    orientation_raw,
                    parametrization,
                    orientation,
                }),
                Err(error) => match self.config.decode_policy {
                    DecodePolicy::Skip => {
                        warn!("Step {}, node {}: {}", step, row.node_label, error);
                        failures.push(SampleFailure {
                            node_label: row.node_label,
                            error,
                        });
                    }
                    DecodePolicy::Abort => {
                        return Err(PlaybackError::Decode {
                            frame: step,
                            node: row.node_label,
                            source: error,
                        });
                    }
                },
            }
        }

        let frame = Frame {
            index: self.state.current_frame_index,
            step,
            time: raw.time,
            samples,
            failures,
        };
        self.state.current_frame_index += 1;
        Ok(frame)
    }

    /// Iterate over the remaining frames.
    pub fn frames(&mut self) -> FrameIterator<'_, 'r> {
        FrameIterator { engine: self }
    }
}

/// Iterator over the frames of a playback engine.
pub struct FrameIterator<'a, 'r> {
    engine: &'a mut PlaybackEngine<'r>,
}

impl Iterator for FrameIterator<'_, '_> {
    type Item = Result<Frame, PlaybackError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.engine.advance_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::encode_orientation;
    use std::fmt::Write as _;
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

    /// One row per node per step; x encodes the step, y the node.
    fn motion_text(labels: &[u32], steps: usize) -> String {
        let mut text = String::new();
        for step in 0..steps {
            for &label in labels {
                writeln!(text, "{} {} {} 0 0 0 0", label, step, label).unwrap();
            }
        }
        text
    }

    #[test]
    fn test_row_count_mismatch() {
        let dir = tempdir().unwrap();
        let registry = registry_with(&[(1, "euler123"), (2, "euler123"), (3, "euler123"), (4, "euler123")]);
        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();

        let bad = dir.path().join("bad.mov");
        let mut text = motion_text(&[1, 2, 3, 4], 9);
        text.push_str("1 0 0 0 0 0 0\n");
        fs::write(&bad, text).unwrap();
        assert!(matches!(
            engine.open(&bad),
            Err(PlaybackError::RowCountMismatch { rows: 37, nodes: 4, .. })
        ));
        assert_eq!(engine.status(), PlaybackStatus::Unopened);

        let good = dir.path().join("good.mov");
        fs::write(&good, motion_text(&[1, 2, 3, 4], 10)).unwrap();
        let state = engine.open(&good).unwrap();
        assert_eq!(state.total_rows, 40);
        assert_eq!(state.timestep_count, 10);
        assert_eq!(engine.status(), PlaybackStatus::Ready);
    }

    #[test]
    fn test_decimation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.mov");
        fs::write(&path, motion_text(&[3, 1, 2], 6)).unwrap();

        let registry = registry_with(&[(1, "euler123"), (2, "euler123"), (3, "euler123")]);
        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::with_decimation(2)).unwrap();
        engine.open(&path).unwrap();

        let mut steps = Vec::new();
        while let Some(frame) = engine.advance_frame().unwrap() {
            assert_eq!(frame.len(), 3);
            for sample in &frame.samples {
                assert_eq!(sample.position.x as usize, frame.step);
            }
            steps.push(frame.step);
        }
        assert_eq!(steps, vec![0, 2, 4]);
        assert_eq!(engine.slots(), &[3, 1, 2]);
        assert_eq!(engine.state().current_frame_index, 3);
        assert_eq!(engine.status(), PlaybackStatus::Exhausted);
        assert!(engine.advance_frame().unwrap().is_none());
    }

    #[test]
    fn test_step_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.mov");
        fs::write(&path, motion_text(&[1], 10)).unwrap();

        let registry = registry_with(&[(1, "phi")]);
        let config = PlaybackConfig {
            decimation: 3,
            first_step: 2,
            last_step: Some(7),
            ..Default::default()
        };
        let mut engine = PlaybackEngine::new(&registry, config).unwrap();
        engine.open(&path).unwrap();

        let steps: Vec<usize> = engine.frames().map(|f| f.unwrap().step).collect();
        assert_eq!(steps, vec![2, 5]);
    }

    #[test]
    fn test_mixed_parametrizations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mixed.mov");
        fs::write(
            &path,
            "1 0 0 0 90 0 0 0.1 0.2 0.3\n\
             2 1 0 0 0 0 1.5707963267948966\n\
             3 2 0 0 1 0 0 0 1 0 0 0 1\n\
             4 3 0 0 0.5 0.5 0.5 0.5\n",
        )
        .unwrap();

        let registry = registry_with(&[(1, "euler123"), (2, "phi"), (3, "mat"), (4, "quat")]);
        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        engine.open(&path).unwrap();

        let frame = engine.advance_frame().unwrap().unwrap();
        assert_eq!(frame.len(), 4);
        assert!(frame.failures.is_empty());

        let x90 = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2);
        assert!(frame.samples[0].orientation.angle_to(&x90) < 1e-9);
        assert_eq!(frame.samples[0].orientation_raw, vec![90.0, 0.0, 0.0]);

        let z90 = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        assert!(frame.samples[1].orientation.angle_to(&z90) < 1e-9);
        assert!(frame.samples[2].orientation.angle() < 1e-9);
        assert_eq!(frame.samples[3].parametrization, Parametrization::Quaternion);
    }

    #[test]
    fn test_stream_desync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("desync.mov");
        fs::write(&path, "1 0 0 0 0 0 0\n2 0 0 0 0 0 0\n2 0 0 0 0 0 0\n1 0 0 0 0 0 0\n").unwrap();

        let registry = registry_with(&[(1, "euler321"), (2, "euler321")]);
        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        engine.open(&path).unwrap();

        assert!(engine.advance_frame().unwrap().is_some());
        assert!(matches!(
            engine.advance_frame(),
            Err(PlaybackError::StreamDesync { frame: 1, slot: 0, expected: 1, found: 2 })
        ));
        assert_eq!(engine.status(), PlaybackStatus::Exhausted);
        assert!(engine.advance_frame().unwrap().is_none());
    }

    #[test]
    fn test_unknown_and_duplicate_nodes() {
        let dir = tempdir().unwrap();
        let registry = registry_with(&[(1, "phi"), (2, "phi")]);
        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();

        let path = dir.path().join("unknown.mov");
        fs::write(&path, "1 0 0 0 0 0 0\n9 0 0 0 0 0 0\n").unwrap();
        engine.open(&path).unwrap();
        assert!(matches!(
            engine.advance_frame(),
            Err(PlaybackError::NodeNotFound { frame: 0, label: 9 })
        ));

        let path = dir.path().join("dup.mov");
        fs::write(&path, "1 0 0 0 0 0 0\n1 0 0 0 0 0 0\n").unwrap();
        engine.open(&path).unwrap();
        assert!(matches!(
            engine.advance_frame(),
            Err(PlaybackError::DuplicateNode { frame: 0, label: 1 })
        ));
    }

    #[test]
    fn test_decode_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("degenerate.mov");
        fs::write(&path, "1 0 0 0 0 0 0 0\n2 0 0 0 0 0 1.0\n").unwrap();
        let registry = registry_with(&[(1, "quat"), (2, "phi")]);

        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        engine.open(&path).unwrap();
        let frame = engine.advance_frame().unwrap().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.samples[0].node_label, 2);
        assert_eq!(frame.failures.len(), 1);
        assert!(matches!(
            frame.failures[0].error,
            RotationError::MalformedQuaternion { .. }
        ));

        let config = PlaybackConfig {
            decode_policy: DecodePolicy::Abort,
            ..Default::default()
        };
        let mut engine = PlaybackEngine::new(&registry, config).unwrap();
        engine.open(&path).unwrap();
        assert!(matches!(
            engine.advance_frame(),
            Err(PlaybackError::Decode { frame: 0, node: 1, .. })
        ));
    }

    #[test]
    fn test_short_row_is_decode_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.mov");
        fs::write(&path, "1 0 0 0 1 0 0 0 1 0\n").unwrap();
        let registry = registry_with(&[(1, "mat")]);

        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        engine.open(&path).unwrap();
        let frame = engine.advance_frame().unwrap().unwrap();
        assert!(frame.is_empty());
        assert!(matches!(
            frame.failures[0].error,
            RotationError::FieldCount { expected: 9, found: 6, .. }
        ));
    }

    #[test]
    fn test_lifecycle_errors() {
        let empty = EntityRegistry::new();
        let mut engine = PlaybackEngine::new(&empty, PlaybackConfig::default()).unwrap();
        assert!(matches!(
            engine.advance_frame(),
            Err(PlaybackError::InvalidState(PlaybackStatus::Unopened))
        ));

        let dir = tempdir().unwrap();
        let path = dir.path().join("any.mov");
        fs::write(&path, "1 0 0 0\n").unwrap();
        assert!(matches!(engine.open(&path), Err(PlaybackError::NodesNotFound)));

        let registry = registry_with(&[(1, "none")]);
        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        assert!(matches!(
            engine.open(dir.path().join("missing.mov")),
            Err(PlaybackError::OutputFileNotFound { .. })
        ));

        engine.open(&path).unwrap();
        let frame = engine.advance_frame().unwrap().unwrap();
        assert!(frame.samples[0].orientation_raw.is_empty());
        engine.close();
        assert_eq!(engine.status(), PlaybackStatus::Unopened);
        assert_eq!(engine.state(), &PlaybackState::default());
        assert!(engine.path().is_none());

        assert!(matches!(
            PlaybackEngine::new(&registry, PlaybackConfig::with_decimation(0)),
            Err(PlaybackError::Config(ConfigError::InvalidDecimation))
        ));
    }

    #[test]
    fn test_failed_open_resets_engine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.mov");
        fs::write(&path, motion_text(&[1], 3)).unwrap();
        let registry = registry_with(&[(1, "phi")]);

        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        engine.open(&path).unwrap();
        engine.advance_frame().unwrap().unwrap();
        assert_eq!(engine.status(), PlaybackStatus::Streaming);

        assert!(matches!(
            engine.open(dir.path().join("missing.mov")),
            Err(PlaybackError::OutputFileNotFound { .. })
        ));
        assert_eq!(engine.status(), PlaybackStatus::Unopened);
        assert!(engine.path().is_none());
        assert_eq!(engine.state(), &PlaybackState::default());
    }

    #[test]
    fn test_non_finite_orientation_is_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("diverged.mov");
        fs::write(&path, "1 0 0 0 nan 0 0
2 0 0 0 inf 0 0
3 0 0 0 0 0 0
").unwrap();
        let registry = registry_with(&[(1, "euler123"), (2, "phi"), (3, "phi")]);

        let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::default()).unwrap();
        engine.open(&path).unwrap();
        let frame = engine.advance_frame().unwrap().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.samples[0].node_label, 3);
        let failed: Vec<u32> = frame.failures.iter().map(|f| f.node_label).collect();
        assert_eq!(failed, vec![1, 2]);
        assert!(
            frame
                .failures
                .iter()
                .all(|f| matches!(f.error, RotationError::NumericDegenerate { .. }))
        );
    }
}
