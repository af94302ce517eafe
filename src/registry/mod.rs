//! Registry module - Keyed node and element collections built from a log file.

mod consistency;
mod store;

pub use consistency::*;
pub use store::*;
