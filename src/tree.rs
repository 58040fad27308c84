use indextree::{Arena, NodeEdge, NodeId};
use std::collections::HashMap;

/// A node in the URL path tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// `/segment`, empty for the root
    pub name: String,
}

/// Path-segment tree stored in an arena.
///
/// Every node is addressed by its path key: the concatenated names from the
/// root down, e.g. `/docs/api` (the root's key is empty). Keys are derived on
/// demand; the tree itself only stores one name per node plus a per-parent
/// name index, so memory stays linear in the number of segments however deep
/// the paths go.
#[derive(Debug)]
pub struct UrlTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    child_index: HashMap<NodeId, HashMap<String, NodeId>>,
    live: usize,
}

impl Default for UrlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlTree {
    /// Create a tree holding only the unnamed root
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TreeNode {
            name: String::new(),
        });

        Self {
            arena,
            root,
            child_index: HashMap::new(),
            live: 1,
        }
    }

    /// Walk `segments` from the root, reusing children with matching names and
    /// appending the missing ones. The node reached by the last segment loses
    /// its children, even when a longer path attached them earlier.
    ///
    /// Returns the terminal node, or `None` when there are no segments.
    pub fn insert_path<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<NodeId> {
        if segments.is_empty() {
            return None;
        }

        let mut current = self.root;
        for segment in segments {
            let name = format!("/{}", segment.as_ref());
            current = match self.child_named(current, &name) {
                Some(existing) => existing,
                None => self.append_child(current, name),
            };
        }

        self.clear_children(current);
        Some(current)
    }

    /// Find the direct child of `parent` labelled `name`
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.child_index.get(&parent)?.get(name).copied()
    }

    fn append_child(&mut self, parent: NodeId, name: String) -> NodeId {
        let node_id = self.arena.new_node(TreeNode { name: name.clone() });
        parent.append(node_id, &mut self.arena);
        self.child_index
            .entry(parent)
            .or_default()
            .insert(name, node_id);
        self.live += 1;
        node_id
    }

    /// Drop every descendant of `node` from the arena and the name index
    pub fn clear_children(&mut self, node: NodeId) {
        if self.child_index.remove(&node).is_none() {
            return;
        }

        let children: Vec<NodeId> = node.children(&self.arena).collect();
        for child in children {
            let removed: Vec<NodeId> = child.descendants(&self.arena).collect();
            for descendant in &removed {
                self.child_index.remove(descendant);
            }
            self.live -= removed.len();
            child.remove_subtree(&mut self.arena);
        }
    }

    pub fn get_root(&self) -> NodeId {
        self.root
    }

    pub fn get_arena(&self) -> &Arena<TreeNode> {
        &self.arena
    }

    /// Look a node up by its path key (`""` is the root)
    pub fn get_node(&self, key: &str) -> Option<NodeId> {
        if key.is_empty() {
            return Some(self.root);
        }

        let mut current = self.root;
        for segment in key.strip_prefix('/')?.split('/') {
            current = self.child_named(current, &format!("/{}", segment))?;
        }
        Some(current)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena
            .get(id)
            .filter(|n| !n.is_removed())
            .map(|n| n.get())
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.name.as_str()).unwrap_or("")
    }

    /// Path key of `id`, built from its ancestors' names
    pub fn key(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = id.ancestors(&self.arena).map(|a| self.name(a)).collect();
        names.reverse();
        names.concat()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.children(id).next().is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    /// Number of edges between `id` and the root
    pub fn depth(&self, id: NodeId) -> usize {
        id.ancestors(&self.arena).count().saturating_sub(1)
    }

    /// Longest root-to-leaf edge count
    pub fn height(&self) -> usize {
        let mut open = 0usize;
        let mut deepest = 0usize;
        for edge in self.root.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(_) => {
                    open += 1;
                    deepest = deepest.max(open);
                }
                NodeEdge::End(_) => open -= 1,
            }
        }
        deepest.saturating_sub(1)
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        !self.has_children(self.root)
    }

    /// Pre-order walk from the root
    pub fn descendants(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    /// Human-readable dump: `name` before `children`, two-space indentation.
    /// Written in a single traversal so path depth never touches the stack.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        fn indent(out: &mut String, level: usize) {
            for _ in 0..level {
                out.push_str("  ");
            }
        }

        let mut out = String::new();
        let mut depth = 0usize;
        for edge in self.root.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(id) => {
                    if depth > 0 {
                        let first = self.arena[id].previous_sibling().is_none();
                        out.push_str(if first { "\n" } else { ",\n" });
                    }
                    let level = depth * 2;
                    indent(&mut out, level);
                    out.push_str("{\n");
                    indent(&mut out, level + 1);
                    out.push_str("\"name\": ");
                    out.push_str(&serde_json::to_string(self.name(id))?);
                    out.push_str(",\n");
                    indent(&mut out, level + 1);
                    out.push_str("\"children\": [");
                    if !self.has_children(id) {
                        out.push(']');
                    }
                    depth += 1;
                }
                NodeEdge::End(id) => {
                    depth -= 1;
                    let level = depth * 2;
                    if self.has_children(id) {
                        out.push('\n');
                        indent(&mut out, level + 1);
                        out.push(']');
                    }
                    out.push('\n');
                    indent(&mut out, level);
                    out.push('}');
                }
            }
        }
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn to_serialized(&self) -> SerializedNode {
        self.serialize_node(self.root)
    }

    #[cfg(test)]
    fn serialize_node(&self, id: NodeId) -> SerializedNode {
        SerializedNode {
            name: self.name(id).to_string(),
            children: self
                .children(id)
                .map(|child| self.serialize_node(child))
                .collect(),
        }
    }
}

/// Nested copy of a small tree, compared structurally in tests
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct SerializedNode {
    pub name: String,
    pub children: Vec<SerializedNode>,
}
