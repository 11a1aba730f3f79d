//! Core types for dirstat.
//!
//! This crate provides the fundamental data structures used throughout
//! dirstat: the generic ownership [`Tree`], the [`FileEntry`] values it holds
//! for directory statistics, the rolled-up [`FileTree`], and configuration.

mod config;
mod entry;
mod error;
mod file_tree;
mod tree;

pub use config::{WalkConfig, WalkConfigBuilder};
pub use entry::{ExtensionEntry, Extensions, FileEntry, Timestamp, extension_of, timestamp};
pub use error::{TreeError, WalkError, WalkWarning, WarningKind};
pub use file_tree::{FileTree, ROOT_NAME, crop_node, path_segments};
pub use tree::Tree;
