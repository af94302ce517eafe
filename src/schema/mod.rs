//! Schema module - Entity and configuration types for MBDyn imports.

mod config;
mod entity;

pub use config::*;
pub use entity::*;
