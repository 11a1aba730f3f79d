//! Directory walking engine for dirstat.
//!
//! This crate walks a directory with jwalk and builds a rolled-up
//! [`FileTree`], or loads one back from its JSON form.
//!
//! # Overview
//!
//! `dirstat-scan` is responsible for traversing directories and building
//! the tree structure. Key features:
//!
//! - **Parallel traversal** via jwalk
//! - **Progress updates** via broadcast channels
//! - **Exclusion globs** matched against entry names
//! - **Depth limits** that truncate the tree without losing totals
//!
//! # Example
//!
//! ```rust,no_run
//! use dirstat_scan::walk;
//!
//! let tree = walk("/path/to/walk", &["target".to_string()], Some(2)).unwrap();
//!
//! println!("Total size: {} bytes", tree.total_size());
//! println!("Total files: {}", tree.total_files());
//! ```
//!
//! # Progress Monitoring
//!
//! Subscribe before spawning the walk:
//!
//! ```rust,no_run
//! use dirstat_scan::{WalkConfig, Walker};
//!
//! # async fn run() {
//! let walker = Walker::new(WalkConfig::new("/path/to/walk"));
//! let mut progress_rx = walker.subscribe();
//! let handle = walker.spawn();
//!
//! tokio::spawn(async move {
//!     while let Ok(delta) = progress_rx.recv().await {
//!         println!("+{} files", delta.files);
//!     }
//! });
//!
//! let tree = handle.finish().await.unwrap();
//! # }
//! ```

mod progress;
mod source;
mod walker;

pub use progress::{ProgressTotals, WalkProgress};
pub use source::open;
pub use walker::{WalkHandle, Walker, walk};

// Re-export core types for convenience
pub use dirstat_core::{
    ExtensionEntry, Extensions, FileEntry, FileTree, Tree, TreeError, WalkConfig, WalkError,
    WalkWarning, WarningKind,
};
