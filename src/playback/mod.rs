//! Streaming playback of solver motion output.
//!
//! Motion output comes in two forms, both read strictly forward.
//!
//! # Text format
//!
//! One row per node per time step, grouped by step, same node order every
//! step. Euler angles are in degrees unless configured otherwise.
//!
//! ```text
//! <label> <x> <y> <z> <orientation fields...> [<trailing fields...>]
//! ```
//!
//! # Container format
//!
//! The `.mbts` (MBDyn time series) container stores named series with
//! optional compression. Angles are stored in radians.
//!
//! ```text
//! Header (36 bytes):
//!   Magic: "MBTS" (4 bytes)
//!   Version: u16
//!   Flags: u16 (compression, precision)
//!   Series count: u32
//!   Step count: u64
//!   Reserved: 16 bytes
//!
//! Series table (series_count entries):
//!   Name length: u16
//!   Name: "<entity_kind>.<int_label>.<field>" (UTF-8)
//!   Width: u16
//!
//! Step records (step_count entries):
//!   Record size: u64
//!   Record: time (f64) followed by every series' values in table order
//!           (f64 or f32), optionally LZ4 compressed
//! ```

mod format;
mod player;
mod recorder;
mod source;

pub use format::{
    CONTAINER_MAGIC, CONTAINER_VERSION, CompressionType, ContainerFlags, ContainerHeader,
    Precision, SeriesSpec,
};
pub use player::{
    Frame, FrameIterator, PlaybackEngine, PlaybackError, PlaybackState, PlaybackStatus,
    SampleFailure, TimeSample,
};
pub use recorder::{ContainerStats, ContainerWriter, PackOptions, WriterConfig, node_series};
pub use source::{
    ContainerMotionSource, MotionSource, RawRow, RawStep, TextMotionSource, is_container,
};
