//! Display ordering for dirstat trees.
//!
//! Siblings of a directory (child nodes or extension rows) are ranked by a
//! [`SortKey`]. For size and count, a cutoff fraction below 1 keeps only the
//! leading rows that make up that share of the total and folds the rest into
//! a single `<skipped N>` row.
//!
//! ```rust,ignore
//! use dirstat_analyze::{RankConfig, Ranker, SortKey, Measured};
//! use dirstat_scan::walk;
//!
//! let tree = walk("/path/to/walk", &[], Some(1)).unwrap();
//! let config = RankConfig::builder().key(SortKey::Size).cutoff(0.9).build().unwrap();
//!
//! for row in Ranker::new(config).rank(&tree.root().children) {
//!     println!("{:>12}  {}", row.size(), row.name());
//! }
//! ```

mod rank;

pub use rank::{Measured, RankConfig, RankConfigBuilder, Ranker, Row, SkippedBucket, SortKey};

// Re-export core types
pub use dirstat_core::{ExtensionEntry, FileEntry, FileTree, Tree};
