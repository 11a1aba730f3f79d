//! Loading a tree from a directory or a saved JSON document.

use std::path::Path;

use tracing::debug;

use dirstat_core::{FileTree, WalkConfig, WalkError};

use crate::walker::Walker;

/// Load the tree described by `config.root`.
///
/// A directory is walked. A file with a `.json` extension is decoded as a
/// previously saved tree and cropped to `config.max_depth`; exclusion globs do
/// not apply to it.
pub fn open(config: &WalkConfig) -> Result<FileTree, WalkError> {
    let path = config.root.as_path();
    let metadata = std::fs::metadata(path).map_err(|e| WalkError::io(path, e))?;

    if metadata.is_dir() {
        return Walker::new(config.clone()).walk();
    }
    if !is_json(path) {
        return Err(WalkError::NotADirectoryOrJson {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path).map_err(|e| WalkError::io(path, e))?;
    let mut tree = FileTree::from_json(&bytes)?;
    tree.crop(config.max_depth);
    debug!(
        path = %path.display(),
        size = tree.total_size(),
        files = tree.total_files(),
        "loaded saved tree"
    );
    Ok(tree)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
