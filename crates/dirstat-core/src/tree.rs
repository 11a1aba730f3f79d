//! Generic n-ary ownership tree.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TreeError;

/// A node owning one value and an ordered list of child subtrees.
///
/// Children are owned exclusively by their parent; there are no back
/// references, so the structure is acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree<T> {
    /// Child subtrees, in insertion order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<Tree<T>>,

    /// Payload of this node.
    pub value: T,
}

impl<T> Tree<T> {
    /// Create a childless node.
    pub fn new(value: T) -> Self {
        Self {
            children: Vec::new(),
            value,
        }
    }

    /// Append a childless node holding `value`.
    pub fn add_child(&mut self, value: T) {
        self.children.push(Tree::new(value));
    }

    /// Append an existing subtree, taking ownership of it.
    pub fn add_subtree(&mut self, child: Tree<T>) {
        self.children.push(child);
    }

    /// Check whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Tree::node_count).sum::<usize>()
    }

    /// Depth of the deepest node below `self` (0 for a leaf).
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Post-order fold of every child value into its parent.
    ///
    /// Each child is aggregated first, then `merge(parent, child)` is called.
    /// Child values are never mutated by the merge itself.
    pub fn aggregate<F>(&mut self, mut merge: F)
    where
        F: FnMut(&mut T, &T),
    {
        self.aggregate_with(&mut merge);
    }

    fn aggregate_with<F>(&mut self, merge: &mut F)
    where
        F: FnMut(&mut T, &T),
    {
        for child in self.children.iter_mut() {
            child.aggregate_with(merge);
            merge(&mut self.value, &child.value);
        }
    }

    /// Prune everything deeper than `max_depth` below this node.
    ///
    /// Nodes at `max_depth` first fold their whole subtree into their own
    /// value (exactly as [`Tree::aggregate`] would), then drop their children.
    pub fn crop<F>(&mut self, max_depth: usize, mut merge: F)
    where
        F: FnMut(&mut T, &T),
    {
        self.crop_with(max_depth, &mut merge);
    }

    fn crop_with<F>(&mut self, max_depth: usize, merge: &mut F)
    where
        F: FnMut(&mut T, &T),
    {
        if max_depth == 0 {
            self.aggregate_with(merge);
            self.children.clear();
            return;
        }
        for child in self.children.iter_mut() {
            child.crop_with(max_depth - 1, merge);
        }
    }

    /// Follow `path` one segment at a time, descending into the first child
    /// for which `matches(child_value, segment)` holds.
    ///
    /// An empty path returns `self`.
    pub fn subtree<S, F>(&self, path: &[S], mut matches: F) -> Result<&Tree<T>, TreeError>
    where
        S: AsRef<str>,
        F: FnMut(&T, &str) -> bool,
    {
        let mut node = self;
        for segment in path {
            let segment = segment.as_ref();
            node = node
                .children
                .iter()
                .find(|c| matches(&c.value, segment))
                .ok_or_else(|| TreeError::segment_not_found(segment))?;
        }
        Ok(node)
    }

    /// Mutable variant of [`Tree::subtree`].
    pub fn subtree_mut<S, F>(
        &mut self,
        path: &[S],
        mut matches: F,
    ) -> Result<&mut Tree<T>, TreeError>
    where
        S: AsRef<str>,
        F: FnMut(&T, &str) -> bool,
    {
        let mut node = self;
        for segment in path {
            let segment = segment.as_ref();
            node = node
                .children
                .iter_mut()
                .find(|c| matches(&c.value, segment))
                .ok_or_else(|| TreeError::segment_not_found(segment))?;
        }
        Ok(node)
    }

    /// Consuming variant of [`Tree::subtree`]: moves the selected subtree out
    /// and drops the rest.
    pub fn into_subtree<S, F>(self, path: &[S], mut matches: F) -> Result<Tree<T>, TreeError>
    where
        S: AsRef<str>,
        F: FnMut(&T, &str) -> bool,
    {
        let mut node = self;
        for segment in path {
            let segment = segment.as_ref();
            let index = node
                .children
                .iter()
                .position(|c| matches(&c.value, segment))
                .ok_or_else(|| TreeError::segment_not_found(segment))?;
            node = node.children.swap_remove(index);
        }
        Ok(node)
    }
}

fn null_as_empty<'de, D, V>(deserializer: D) -> Result<Vec<V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    Ok(Option::<Vec<V>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree<i32> {
        let mut tree = Tree::new(1);
        let mut two = Tree::new(2);
        two.add_child(4);
        two.add_child(5);
        tree.add_subtree(two);
        tree.add_child(3);
        tree
    }

    fn sum(parent: &mut i32, child: &i32) {
        *parent += *child;
    }

    #[test]
    fn test_new_is_leaf() {
        let tree = Tree::new(1);
        assert_eq!(tree.value, 1);
        assert!(tree.is_leaf());
    }

    #[test]
    fn test_add_keeps_order() {
        let mut tree = Tree::new(1);
        tree.add_child(2);
        tree.add_subtree(Tree::new(3));

        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].value, 2);
        assert_eq!(tree.children[1].value, 3);
    }

    #[test]
    fn test_aggregate_post_order() {
        let mut tree = sample();
        tree.aggregate(sum);

        assert_eq!(tree.value, 15);
        assert_eq!(tree.children[0].value, 11);
        // leaves untouched
        assert_eq!(tree.children[0].children[0].value, 4);
        assert_eq!(tree.children[1].value, 3);
    }

    #[test]
    fn test_crop_zero_folds_everything() {
        let mut tree = sample();
        tree.crop(0, sum);

        assert_eq!(tree.value, 15);
        assert!(tree.is_leaf());
    }

    #[test]
    fn test_crop_one_folds_below() {
        let mut tree = sample();
        tree.crop(1, sum);

        assert_eq!(tree.value, 1);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].value, 11);
        assert!(tree.children[0].is_leaf());
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_crop_deeper_than_tree_is_noop() {
        let mut tree = sample();
        tree.crop(10, sum);
        assert_eq!(tree, sample());
    }

    #[test]
    fn test_subtree_lookup() {
        let tree = sample();
        let eq = |v: &i32, s: &str| v.to_string() == s;

        assert_eq!(tree.subtree(&["2", "5"], eq).unwrap().value, 5);
        assert_eq!(tree.subtree::<&str, _>(&[], eq).unwrap().value, 1);

        let err = tree.subtree(&["2", "9"], eq).unwrap_err();
        assert!(matches!(err, TreeError::PathSegmentNotFound { ref segment } if segment == "9"));
    }

    #[test]
    fn test_into_subtree_moves_out() {
        let tree = sample();
        let sub = tree
            .into_subtree(&["2"], |v, s| v.to_string() == s)
            .unwrap();
        assert_eq!(sub.value, 2);
        assert_eq!(sub.children.len(), 2);
    }

    #[test]
    fn test_depth_and_count() {
        let tree = sample();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.node_count(), 5);
    }

    #[test]
    fn test_null_children_decode() {
        let tree: Tree<i32> = serde_json::from_str(r#"{"children": null, "value": 7}"#).unwrap();
        assert_eq!(tree, Tree::new(7));
    }
}
