//! Project manifest data model
//!
//! Mirrors the `project.json` document inside a packed archive. Instruction
//! graphs, variables and other runtime blobs are kept as untyped JSON and
//! passed through without interpretation.

mod config;
mod project;
mod target;

pub use config::*;
pub use project::*;
pub use target::*;
