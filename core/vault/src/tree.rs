//! Snippet forest and the operations that reshape it.
//!
//! A [`Forest`] is the ordered list of top-level nodes. Every mutating
//! operation leaves `self` untouched and returns a new forest. Inputs are
//! assumed well formed (unique ids, consistent parent ids); the load path
//! uses [`Forest::normalize_parents`] and [`Forest::validate`] to get there.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::node::{Node, Snippet};
use sklad_common::{Error, NodeId, Result};

/// Ordered top-level sequence of nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    /// Create a forest from top-level nodes.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Top-level nodes in display order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first, pre-order walk over every node.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.nodes.iter().rev().collect(),
        }
    }

    /// Find a node anywhere in the hierarchy.
    pub fn find_by_id(&self, id: &NodeId) -> Option<&Node> {
        find_in(&self.nodes, id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Replace the node matching `id` with `f(node)`.
    ///
    /// Returns an unchanged copy when `id` is absent.
    pub fn update<F>(&self, id: &NodeId, f: F) -> Forest
    where
        F: FnOnce(Node) -> Node,
    {
        let mut nodes = self.nodes.clone();
        if let Some(slot) = find_mut(&mut nodes, id) {
            *slot = f(slot.clone());
        }
        Forest { nodes }
    }

    /// Delete the node matching `id`, wherever it sits.
    pub fn remove(&self, id: &NodeId) -> Forest {
        let mut nodes = self.nodes.clone();
        remove_in(&mut nodes, id);
        Forest { nodes }
    }

    /// Append `node` at the root (`parent` is `None`) or to a folder's children.
    ///
    /// A parent that does not exist, or that is a snippet, leaves the forest
    /// unchanged.
    pub fn insert_under_parent(&self, parent: Option<&NodeId>, node: Node) -> Forest {
        let mut nodes = self.nodes.clone();
        match parent {
            None => nodes.push(node),
            Some(parent_id) => match find_mut(&mut nodes, parent_id) {
                Some(Node::Folder(folder)) => folder.children.push(node),
                _ => {
                    debug!(parent = %parent_id, "Insert target is not a folder, ignoring");
                    return self.clone();
                }
            },
        }
        Forest { nodes }
    }

    /// True iff `node` lies in the subtree rooted at `ancestor`.
    ///
    /// A node counts as its own descendant.
    pub fn is_descendant(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        self.find_by_id(ancestor)
            .map(|root| subtree_contains(root, node))
            .unwrap_or(false)
    }

    /// Move `dragged` under `new_parent` (root when `None`), placed before
    /// the sibling `before` or at the end.
    ///
    /// Rejected moves return an unchanged copy: dropping a node onto itself
    /// or into its own subtree, a missing dragged node, or a target that
    /// is not an existing folder.
    pub fn move_node(
        &self,
        dragged: &NodeId,
        new_parent: Option<&NodeId>,
        before: Option<&NodeId>,
    ) -> Forest {
        // Checked against the forest as it is before extraction.
        if let Some(parent_id) = new_parent {
            if parent_id == dragged || self.is_descendant(dragged, parent_id) {
                debug!(node = %dragged, parent = %parent_id, "Rejecting move into own subtree");
                return self.clone();
            }
            if !matches!(self.find_by_id(parent_id), Some(Node::Folder(_))) {
                debug!(parent = %parent_id, "Move target is not a folder, ignoring");
                return self.clone();
            }
        }

        let mut nodes = self.nodes.clone();
        let Some(mut moved) = remove_in(&mut nodes, dragged) else {
            return self.clone();
        };
        moved.set_parent_id(new_parent.cloned());

        match new_parent {
            None => nodes = insert_at_position(nodes, moved, before),
            Some(parent_id) => {
                if let Some(Node::Folder(folder)) = find_mut(&mut nodes, parent_id) {
                    let children = std::mem::take(&mut folder.children);
                    folder.children = insert_at_position(children, moved, before);
                }
            }
        }

        Forest { nodes }
    }

    /// Rewrite every `parent_id` to the folder that actually contains the node.
    pub fn normalize_parents(&self) -> Forest {
        let mut nodes = self.nodes.clone();
        normalize_in(&mut nodes, None);
        Forest { nodes }
    }

    /// Check the structural invariants: unique ids and consistent parent ids.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        validate_in(&self.nodes, None, &mut seen)
    }

    /// Visit every snippet mutably in pre-order, stopping at the first error.
    ///
    /// Used by backends to seal or restore snippet values in place.
    pub fn try_for_each_snippet_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Snippet) -> Result<()>,
    {
        snippets_mut_in(&mut self.nodes, &mut f)
    }

    /// Serialize the forest to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a forest from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl From<Vec<Node>> for Forest {
    fn from(nodes: Vec<Node>) -> Self {
        Self::new(nodes)
    }
}

/// Pre-order iterator over a forest.
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Insert `node` immediately before the sibling `before`.
///
/// Appends when `before` is `None` or not among `siblings`.
pub fn insert_at_position(mut siblings: Vec<Node>, node: Node, before: Option<&NodeId>) -> Vec<Node> {
    let index = before.and_then(|id| siblings.iter().position(|sibling| sibling.id() == id));
    match index {
        Some(index) => siblings.insert(index, node),
        None => siblings.push(node),
    }
    siblings
}

fn find_in<'a>(nodes: &'a [Node], id: &NodeId) -> Option<&'a Node> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_in(node.children(), id) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(nodes: &'a mut [Node], id: &NodeId) -> Option<&'a mut Node> {
    for node in nodes.iter_mut() {
        if node.id() == id {
            return Some(node);
        }
        if let Node::Folder(folder) = node {
            if let Some(found) = find_mut(&mut folder.children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_in(nodes: &mut Vec<Node>, id: &NodeId) -> Option<Node> {
    if let Some(index) = nodes.iter().position(|node| node.id() == id) {
        return Some(nodes.remove(index));
    }
    nodes.iter_mut().find_map(|node| match node {
        Node::Folder(folder) => remove_in(&mut folder.children, id),
        Node::Snippet(_) => None,
    })
}

fn snippets_mut_in<F>(nodes: &mut [Node], f: &mut F) -> Result<()>
where
    F: FnMut(&mut Snippet) -> Result<()>,
{
    for node in nodes.iter_mut() {
        match node {
            Node::Snippet(snippet) => f(snippet)?,
            Node::Folder(folder) => snippets_mut_in(&mut folder.children, f)?,
        }
    }
    Ok(())
}

fn subtree_contains(root: &Node, id: &NodeId) -> bool {
    root.id() == id || root.children().iter().any(|child| subtree_contains(child, id))
}

fn normalize_in(nodes: &mut [Node], parent: Option<&NodeId>) {
    for node in nodes.iter_mut() {
        if node.parent_id() != parent {
            debug!(node = %node.id(), "Repairing parent id");
            node.set_parent_id(parent.cloned());
        }
        if let Node::Folder(folder) = node {
            let own_id = folder.id.clone();
            normalize_in(&mut folder.children, Some(&own_id));
        }
    }
}

fn validate_in<'a>(
    nodes: &'a [Node],
    parent: Option<&NodeId>,
    seen: &mut HashSet<&'a NodeId>,
) -> Result<()> {
    for node in nodes {
        if !seen.insert(node.id()) {
            return Err(Error::InvalidInput(format!("Duplicate node id: {}", node.id())));
        }
        if node.parent_id() != parent {
            return Err(Error::InvalidInput(format!(
                "Node {} is not listed under its parent",
                node.id()
            )));
        }
        validate_in(node.children(), Some(node.id()), seen)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Folder, Snippet};
    use proptest::prelude::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn snippet(name: &str, parent: Option<&str>) -> Node {
        let mut snippet = Snippet::new(name, parent.map(id));
        snippet.id = id(name);
        Node::Snippet(snippet)
    }

    fn folder(name: &str, parent: Option<&str>, children: Vec<Node>) -> Node {
        let mut folder = Folder::new(name, parent.map(id)).with_children(children);
        folder.id = id(name);
        Node::Folder(folder)
    }

    /// [A [S], B [T, U], C [D [E]]]
    fn sample() -> Forest {
        Forest::new(vec![
            folder("A", None, vec![snippet("S", Some("A"))]),
            folder("B", None, vec![snippet("T", Some("B")), snippet("U", Some("B"))]),
            folder(
                "C",
                None,
                vec![folder("D", Some("C"), vec![snippet("E", Some("D"))])],
            ),
        ])
    }

    fn child_ids(forest: &Forest, parent: &str) -> Vec<String> {
        forest
            .find_by_id(&id(parent))
            .unwrap()
            .children()
            .iter()
            .map(|n| n.id().to_string())
            .collect()
    }

    fn root_ids(forest: &Forest) -> Vec<String> {
        forest.nodes().iter().map(|n| n.id().to_string()).collect()
    }

    #[test]
    fn test_find_nested() {
        let forest = sample();
        assert_eq!(forest.find_by_id(&id("E")).unwrap().label(), "E");
        assert!(forest.find_by_id(&id("missing")).is_none());
        assert_eq!(forest.len(), 8);
    }

    #[test]
    fn test_iter_is_preorder() {
        let order: Vec<String> = sample().iter().map(|n| n.id().to_string()).collect();
        assert_eq!(order, ["A", "S", "B", "T", "U", "C", "D", "E"]);
    }

    #[test]
    fn test_update_leaves_input_untouched() {
        let forest = sample();
        let updated = forest.update(&id("E"), |mut node| {
            node.set_label("renamed");
            node
        });

        assert_eq!(updated.find_by_id(&id("E")).unwrap().label(), "renamed");
        assert_eq!(forest.find_by_id(&id("E")).unwrap().label(), "E");
    }

    #[test]
    fn test_update_missing_is_noop() {
        let forest = sample();
        assert_eq!(forest.update(&id("nope"), |node| node), forest);
    }

    #[test]
    fn test_remove_nested_and_missing() {
        let forest = sample();
        let removed = forest.remove(&id("D"));

        assert!(!removed.contains(&id("D")));
        assert!(!removed.contains(&id("E")));
        assert_eq!(removed.len(), 6);
        assert_eq!(forest.remove(&id("nope")), forest);
    }

    #[test]
    fn test_insert_under_parent() {
        let forest = sample();

        let at_root = forest.insert_under_parent(None, snippet("N", None));
        assert_eq!(root_ids(&at_root), ["A", "B", "C", "N"]);

        let nested = forest.insert_under_parent(Some(&id("D")), snippet("N", Some("D")));
        assert_eq!(child_ids(&nested, "D"), ["E", "N"]);
    }

    #[test]
    fn test_insert_under_missing_or_snippet_parent_is_noop() {
        let forest = sample();
        assert_eq!(forest.insert_under_parent(Some(&id("ghost")), snippet("N", None)), forest);
        assert_eq!(forest.insert_under_parent(Some(&id("S")), snippet("N", None)), forest);
    }

    #[test]
    fn test_insert_at_position() {
        let siblings = vec![snippet("x", None), snippet("y", None)];

        let before_y = insert_at_position(siblings.clone(), snippet("n", None), Some(&id("y")));
        let ids: Vec<&str> = before_y.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, ["x", "n", "y"]);

        let unknown = insert_at_position(siblings.clone(), snippet("n", None), Some(&id("zz")));
        assert_eq!(unknown.last().unwrap().id().as_str(), "n");

        let appended = insert_at_position(siblings, snippet("n", None), None);
        assert_eq!(appended.last().unwrap().id().as_str(), "n");
    }

    #[test]
    fn test_is_descendant() {
        let forest = sample();
        assert!(forest.is_descendant(&id("C"), &id("E")));
        assert!(forest.is_descendant(&id("C"), &id("C")));
        assert!(!forest.is_descendant(&id("E"), &id("C")));
        assert!(!forest.is_descendant(&id("A"), &id("T")));
        assert!(!forest.is_descendant(&id("ghost"), &id("A")));
    }

    #[test]
    fn test_move_snippet_between_folders() {
        let forest = sample();
        let moved = forest.move_node(&id("S"), Some(&id("B")), Some(&id("T")));

        assert!(child_ids(&moved, "A").is_empty());
        assert_eq!(child_ids(&moved, "B"), ["S", "T", "U"]);
        assert_eq!(moved.find_by_id(&id("S")).unwrap().parent_id(), Some(&id("B")));
        moved.validate().unwrap();
    }

    #[test]
    fn test_move_folder_into_own_child_is_rejected() {
        let forest = sample();
        assert_eq!(forest.move_node(&id("C"), Some(&id("D")), None), forest);
        assert_eq!(forest.move_node(&id("C"), Some(&id("C")), None), forest);
    }

    #[test]
    fn test_move_to_root_reorders() {
        let forest = sample();
        let moved = forest.move_node(&id("E"), None, Some(&id("A")));

        assert_eq!(root_ids(&moved), ["E", "A", "B", "C"]);
        assert_eq!(moved.find_by_id(&id("E")).unwrap().parent_id(), None);
    }

    #[test]
    fn test_reorder_within_same_folder() {
        let forest = sample();
        let moved = forest.move_node(&id("U"), Some(&id("B")), Some(&id("T")));
        assert_eq!(child_ids(&moved, "B"), ["U", "T"]);
    }

    #[test]
    fn test_move_into_snippet_or_missing_is_rejected() {
        let forest = sample();
        assert_eq!(forest.move_node(&id("T"), Some(&id("S")), None), forest);
        assert_eq!(forest.move_node(&id("T"), Some(&id("ghost")), None), forest);
        assert_eq!(forest.move_node(&id("ghost"), None, None), forest);
    }

    #[test]
    fn test_normalize_and_validate() {
        let broken = Forest::new(vec![folder("A", None, vec![snippet("S", Some("B"))])]);
        assert!(broken.validate().is_err());

        let repaired = broken.normalize_parents();
        repaired.validate().unwrap();
        assert_eq!(repaired.find_by_id(&id("S")).unwrap().parent_id(), Some(&id("A")));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let forest = Forest::new(vec![
            snippet("X", None),
            folder("F", None, vec![snippet("X", Some("F"))]),
        ]);
        assert!(matches!(forest.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_try_for_each_snippet_mut() {
        let mut forest = sample();
        forest
            .try_for_each_snippet_mut(|snippet| {
                snippet.value = format!("v-{}", snippet.id);
                Ok(())
            })
            .unwrap();

        let node = forest.find_by_id(&id("E")).unwrap();
        assert_eq!(node.as_snippet().unwrap().value, "v-E");

        let mut visited = 0;
        let result = forest.try_for_each_snippet_mut(|_| {
            visited += 1;
            Err(Error::Locked)
        });
        assert!(matches!(result, Err(Error::Locked)));
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_json_roundtrip_preserves_order() {
        let forest = sample();
        let restored = Forest::from_json(&forest.to_json().unwrap()).unwrap();
        assert_eq!(restored, forest);
    }

    /// Build a well-formed forest from a list of parent choices.
    ///
    /// Node `i` is a folder when its flag is set; its parent is the root or
    /// one of the folders created before it.
    fn build_forest(spec: &[(bool, usize)]) -> Forest {
        let mut forest = Forest::default();
        let mut folders: Vec<NodeId> = Vec::new();
        for (i, (is_folder, pick)) in spec.iter().enumerate() {
            let name = format!("n{}", i);
            let parent = match pick % (folders.len() + 1) {
                0 => None,
                k => Some(folders[k - 1].clone()),
            };
            let node = if *is_folder {
                folders.push(id(&name));
                folder(&name, parent.as_ref().map(|p| p.as_str()), Vec::new())
            } else {
                snippet(&name, parent.as_ref().map(|p| p.as_str()))
            };
            forest = forest.insert_under_parent(parent.as_ref(), node);
        }
        forest
    }

    fn forest_strategy() -> impl Strategy<Value = Forest> {
        prop::collection::vec((any::<bool>(), any::<usize>()), 1..25)
            .prop_map(|spec| build_forest(&spec))
    }

    #[test]
    fn test_fresh_nodes_survive_json_roundtrip() {
        let folder = Folder::new("Fresh", None);
        let child = Snippet::new("Child", Some(folder.id.clone())).with_value("x");
        let forest = Forest::default().insert_under_parent(None, folder.into());
        let parent = forest.nodes()[0].id().clone();
        let forest = forest.insert_under_parent(Some(&parent), child.into());

        let restored = Forest::from_json(&forest.to_json().unwrap()).unwrap();
        assert_eq!(restored, forest);
    }

    proptest! {
        #[test]
        fn prop_json_roundtrip(forest in forest_strategy()) {
            let restored = Forest::from_json(&forest.to_json().unwrap()).unwrap();
            prop_assert_eq!(restored, forest);
        }

        #[test]
        fn prop_move_into_descendant_is_noop(
            forest in forest_strategy(),
            a in any::<prop::sample::Index>(),
            b in any::<prop::sample::Index>(),
        ) {
            let ids: Vec<NodeId> = forest.iter().map(|n| n.id().clone()).collect();
            let a = a.get(&ids);
            let b = b.get(&ids);
            if forest.is_descendant(a, b) && a != b {
                prop_assert_eq!(forest.move_node(a, Some(b), None), forest.clone());
            }
        }

        #[test]
        fn prop_move_sets_parent(
            forest in forest_strategy(),
            x in any::<prop::sample::Index>(),
            p in any::<prop::sample::Index>(),
        ) {
            let ids: Vec<NodeId> = forest.iter().map(|n| n.id().clone()).collect();
            let folders: Vec<NodeId> = forest
                .iter()
                .filter(|n| n.is_folder())
                .map(|n| n.id().clone())
                .collect();
            let x = x.get(&ids);
            let target = if folders.is_empty() { None } else { Some(p.get(&folders)) };

            let moved = forest.move_node(x, target, None);
            prop_assert_eq!(moved.len(), forest.len());
            prop_assert!(moved.validate().is_ok());

            let allowed = target.map_or(true, |t| !forest.is_descendant(x, t));
            if allowed {
                prop_assert_eq!(moved.find_by_id(x).unwrap().parent_id(), target);
            }
        }
    }
}
