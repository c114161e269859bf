//! sb3sync Core Library
//!
//! Transcodes packed visual-programming projects (`.sb3` / `.pmp`) to and
//! from a git-friendly directory tree:
//! - Project manifest data model
//! - Metadata allowlist shared by both directions
//! - Disassembly (archive -> directory tree)
//! - Reassembly (directory tree -> archive)
//! - Archive packing and a read-only project summary

pub mod allowlist;
pub mod archive;
pub mod assets;
pub mod disassemble;
pub mod error;
pub mod inspect;
pub mod layout;
pub mod path_utils;
pub mod reassemble;
pub mod types;

// Re-export commonly used types
pub use allowlist::ALLOWLIST_VERSION;
pub use archive::{is_project_archive, pack, read_manifest, unpack};
pub use assets::AssetTally;
pub use disassemble::{disassemble, DisassembleOptions, DisassemblyReport};
pub use error::TranscodeError;
pub use inspect::{inspect, ProjectSummary};
pub use layout::{init_structure, reset_subtrees, StructuredLayout, Subtree};
pub use path_utils::{escape_target_name, unescape_target_name};
pub use reassemble::{reassemble, ReassemblyReport};
pub use types::{
    Asset, Platform, Project, ProjectConfig, ProjectMeta, Target, TargetKind, CONFIG_FILE,
};
