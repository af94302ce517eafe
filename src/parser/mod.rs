//! Parser module - Solver log and labels files.
//!
//! The log file is read once per import. Each record starts with a keyword
//! terminated by a token ending in `:` (e.g. `structural node:`,
//! `revolute hinge:`), followed by an integer label and a fixed field layout
//! per record type:
//!
//! ```text
//! structural node: <label> <x> <y> <z> <parametrization> <orientation...>
//! rod:             <label> <node1> <f1(3)> <node2> <f2(3)>
//! revolute hinge:  <label> <node1> <f1(3)> <R1(9)> <node2> <f2(3)> <R2(9)>
//! total joint:     <label> <node1> <f1(3)> <R1p(9)> <R1r(9)> <node2> ... <flags(6)>
//! ```
//!
//! The labels file is an optional list of `set: [const] integer Node_<name> = <label>;`
//! statements that rename registry entries.

mod labels;
mod layout;
mod logfile;
mod report;

pub use labels::*;
pub use layout::*;
pub use logfile::*;
pub use report::*;
