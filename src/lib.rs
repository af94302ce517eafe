//! MBDyn playback - Import solver models and stream their motion output.
//!
//! This crate reads the text files produced by the MBDyn multibody solver
//! and replays the simulated motion frame by frame, independent of any
//! rendering host.
//!
//! # Architecture
//!
//! - `schema`: Node/element types and configuration
//! - `rotation`: Orientation encodings and their conversion to quaternions
//! - `registry`: Keyed node/element collections and reload consistency
//! - `parser`: Log-file and labels-file import
//! - `playback`: Forward-only streaming of text and binary motion output
//!
//! # Example
//!
//! ```rust,no_run
//! use mbdyn_playback::{
//!     parser::{LogParser, import_labels},
//!     playback::PlaybackEngine,
//!     registry::EntityRegistry,
//!     schema::{ImportConfig, PlaybackConfig},
//! };
//!
//! let mut registry = EntityRegistry::new();
//! let report = LogParser::new(ImportConfig::default())
//!     .import("model.log", &mut registry)
//!     .unwrap();
//! println!("{}", report);
//! let _ = import_labels("model.lab", &mut registry);
//!
//! let mut engine = PlaybackEngine::new(&registry, PlaybackConfig::with_decimation(10)).unwrap();
//! engine.open("model.mov").unwrap();
//! for frame in engine.frames() {
//!     let frame = frame.unwrap();
//!     println!("step {}: {} samples", frame.step, frame.samples.len());
//! }
//! ```

pub mod parser;
pub mod playback;
pub mod registry;
pub mod rotation;
pub mod schema;

// Re-export commonly used types
pub use parser::{ImportReport, LogParser, ParseError};
pub use playback::{Frame, PlaybackEngine, PlaybackError, TimeSample};
pub use registry::EntityRegistry;
pub use rotation::{Parametrization, RotationError, decode_orientation, encode_orientation};
pub use schema::{ImportConfig, PlaybackConfig, SessionConfig};
