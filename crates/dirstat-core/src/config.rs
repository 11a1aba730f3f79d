//! Walk configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::WalkError;

/// Configuration for walking a directory.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WalkConfig {
    /// Root path to walk.
    pub root: PathBuf,

    /// Glob patterns matched against entry base names. A matching directory
    /// is skipped with everything below it.
    #[builder(default)]
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Deepest level materialized as tree nodes (None = unlimited).
    /// Deeper entries still count towards their nearest kept ancestor.
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Number of threads for reading directories (0 = auto-detect, 1 = serial).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Abort on an unreadable subdirectory instead of treating it as empty.
    #[builder(default = "false")]
    #[serde(default)]
    pub strict: bool,
}

impl WalkConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        Ok(())
    }
}

impl WalkConfig {
    /// Create a new walk config builder.
    pub fn builder() -> WalkConfigBuilder {
        WalkConfigBuilder::default()
    }

    /// Create a simple config for walking a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: Vec::new(),
            max_depth: None,
            threads: 0,
            follow_symlinks: false,
            strict: false,
        }
    }

    /// Compile all exclusion patterns, failing on the first malformed one.
    pub fn compile_excludes(&self) -> Result<GlobSet, WalkError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|source| WalkError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| WalkError::InvalidGlob {
            pattern: self.exclude.join(","),
            source,
        })
    }

    /// Whether an entry at `depth` below the root becomes a tree node.
    pub fn materializes(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth <= max)
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
