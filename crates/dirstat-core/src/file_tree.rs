//! Rolled-up file tree: aggregation, cropping, selection and JSON round-trip.

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::entry::FileEntry;
use crate::error::{TreeError, WalkWarning};
use crate::tree::Tree;

/// Name given to a deserialized root that carries none.
pub const ROOT_NAME: &str = "root";

/// A tree of [`FileEntry`] values plus its rollup state.
///
/// Serializes as its root node only; warnings are not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTree {
    root: Tree<FileEntry>,
    aggregated: bool,
    warnings: Vec<WalkWarning>,
}

impl FileTree {
    /// Wrap a freshly built, not yet rolled-up tree.
    pub fn new(root: Tree<FileEntry>) -> Self {
        Self {
            root,
            aggregated: false,
            warnings: Vec::new(),
        }
    }

    /// Wrap a tree whose values already contain their descendants' totals.
    pub fn aggregated(root: Tree<FileEntry>) -> Self {
        Self {
            root,
            aggregated: true,
            warnings: Vec::new(),
        }
    }

    /// Attach warnings collected while building the tree.
    pub fn with_warnings(mut self, warnings: Vec<WalkWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Decode a tree serialized by [`FileTree`]'s `Serialize` impl.
    ///
    /// Serialized trees are always rolled up. A root without a name is
    /// named [`ROOT_NAME`].
    pub fn from_json(bytes: &[u8]) -> Result<Self, TreeError> {
        let mut root: Tree<FileEntry> = serde_json::from_slice(bytes)?;
        if root.value.name.is_empty() {
            root.value.name = ROOT_NAME.into();
        }
        Ok(Self::aggregated(root))
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Root node.
    pub fn root(&self) -> &Tree<FileEntry> {
        &self.root
    }

    /// Root entry.
    pub fn value(&self) -> &FileEntry {
        &self.root.value
    }

    /// Whether directory totals include their descendants.
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    /// Non-fatal problems absorbed while building the tree.
    pub fn warnings(&self) -> &[WalkWarning] {
        &self.warnings
    }

    /// Total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.value.size
    }

    /// Total number of files.
    pub fn total_files(&self) -> u64 {
        self.root.value.count
    }

    /// Roll every directory's totals up into its ancestors.
    ///
    /// Runs at most once; a second call would double count and is rejected.
    pub fn aggregate(&mut self) -> Result<(), TreeError> {
        if self.aggregated {
            return Err(TreeError::AlreadyAggregated);
        }
        self.root.aggregate(FileEntry::merge_child);
        self.aggregated = true;
        Ok(())
    }

    /// Limit the tree to `max_depth` levels below the root.
    ///
    /// Root totals are the same before and after. On a rolled-up tree every
    /// kept node already holds its subtree's totals, so children are simply
    /// dropped; otherwise the dropped subtrees are folded into the nodes at
    /// the cut, and a later [`FileTree::aggregate`] completes the rollup.
    /// `None` keeps everything.
    pub fn crop(&mut self, max_depth: Option<usize>) {
        let Some(depth) = max_depth else {
            return;
        };
        debug!(depth, aggregated = self.aggregated, "cropping tree");
        crop_node(&mut self.root, depth, self.aggregated);
    }

    /// Find the node at `path`, matching names case-insensitively.
    pub fn select<S: AsRef<str>>(&self, path: &[S]) -> Result<&Tree<FileEntry>, TreeError> {
        self.root.subtree(path, name_matches)
    }

    /// Mutable variant of [`FileTree::select`].
    ///
    /// The returned node is shared with this tree; cropping it crops this tree.
    pub fn select_mut<S: AsRef<str>>(
        &mut self,
        path: &[S],
    ) -> Result<&mut Tree<FileEntry>, TreeError> {
        self.root.subtree_mut(path, name_matches)
    }

    /// Re-root at `path`, consuming this tree without copying.
    pub fn into_subtree<S: AsRef<str>>(self, path: &[S]) -> Result<FileTree, TreeError> {
        debug!(segments = path.len(), "re-rooting tree");
        let aggregated = self.aggregated;
        let warnings = self.warnings;
        let root = self.root.into_subtree(path, name_matches)?;
        Ok(Self {
            root,
            aggregated,
            warnings,
        })
    }
}

impl Serialize for FileTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.root.serialize(serializer)
    }
}

/// Crop a single node (e.g. one returned by [`FileTree::select_mut`]).
///
/// `aggregated` must reflect the state of the tree the node belongs to.
pub fn crop_node(node: &mut Tree<FileEntry>, max_depth: usize, aggregated: bool) {
    if aggregated {
        node.crop(max_depth, |_, _| {});
    } else {
        node.crop(max_depth, FileEntry::merge_child);
    }
}

/// Split a `/` or `\` separated path into selection segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

fn name_matches(entry: &FileEntry, segment: &str) -> bool {
    entry.name.to_lowercase() == segment.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root/{d/{c(5)}, a(10), b(20)} as the walker would build it.
    fn raw() -> FileTree {
        let mut root = Tree::new(FileEntry::directory("root"));
        let mut d = Tree::new(FileEntry::directory("d"));
        d.value.add_file("c", 5, None);
        d.add_child(FileEntry::file("c", 5, None));
        root.add_subtree(d);
        root.value.add_file("a", 10, None);
        root.add_child(FileEntry::file("a", 10, None));
        root.value.add_file("b", 20, None);
        root.add_child(FileEntry::file("b", 20, None));
        FileTree::new(root)
    }

    #[test]
    fn test_aggregate_once() {
        let mut tree = raw();
        tree.aggregate().unwrap();
        assert_eq!(tree.total_size(), 35);
        assert_eq!(tree.total_files(), 3);
        assert!(matches!(tree.aggregate(), Err(TreeError::AlreadyAggregated)));
        assert_eq!(tree.total_size(), 35);
    }

    #[test]
    fn test_crop_after_aggregate() {
        let mut tree = raw();
        tree.aggregate().unwrap();
        tree.crop(Some(0));
        assert!(tree.root().is_leaf());
        assert_eq!(tree.total_size(), 35);
        assert_eq!(tree.total_files(), 3);
        assert_eq!(tree.value().extensions.as_ref().unwrap()[""].count, 3);
    }

    #[test]
    fn test_crop_before_aggregate() {
        let mut tree = raw();
        tree.crop(Some(0));
        tree.aggregate().unwrap();
        assert_eq!(tree.total_size(), 35);
        assert_eq!(tree.total_files(), 3);
    }

    #[test]
    fn test_crop_none_is_noop() {
        let mut tree = raw();
        tree.aggregate().unwrap();
        let before = tree.clone();
        tree.crop(None);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_select_case_insensitive() {
        let mut tree = raw();
        tree.aggregate().unwrap();
        let d = tree.select(&["D"]).unwrap();
        assert_eq!(d.value.size, 5);
        assert!(matches!(
            tree.select(&["missing"]),
            Err(TreeError::PathSegmentNotFound { .. })
        ));
    }

    #[test]
    fn test_into_subtree_keeps_state() {
        let mut tree = raw();
        tree.aggregate().unwrap();
        let sub = tree.into_subtree(&["d"]).unwrap();
        assert!(sub.is_aggregated());
        assert_eq!(sub.total_size(), 5);
    }

    #[test]
    fn test_json_unnamed_root() {
        let tree = FileTree::from_json(br#"{"children": [], "value": {"is_dir": true}}"#).unwrap();
        assert_eq!(tree.value().name, ROOT_NAME);
        assert!(tree.is_aggregated());
    }

    #[test]
    fn test_json_invalid() {
        assert!(matches!(
            FileTree::from_json(b"{not json"),
            Err(TreeError::Json(_))
        ));
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("a/b\\c"), vec!["a", "b", "c"]);
        assert_eq!(path_segments("./a//b/"), vec!["a", "b"]);
        assert!(path_segments("").is_empty());
    }
}
