use glam::Vec2;
use indextree::NodeId;
use std::collections::HashMap;

use crate::tree::UrlTree;

/// Separation factor between neighbours sharing a parent
const SIBLING_SEPARATION: f32 = 1.0;
/// Separation factor between neighbours with different parents
const COUSIN_SEPARATION: f32 = 2.0;

/// One node of the visible subgraph
#[derive(Debug, Clone)]
pub struct VisibleNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub children: Vec<NodeId>,
}

/// The part of a `UrlTree` that gets drawn: nodes no deeper than the depth
/// limit whose ancestors are all expanded. The tree itself is not touched.
#[derive(Debug, Clone)]
pub struct VisibleTree {
    root: NodeId,
    /// Pre-order
    nodes: Vec<VisibleNode>,
    index: HashMap<NodeId, usize>,
}

impl VisibleTree {
    pub fn collect<F>(tree: &UrlTree, depth_limit: usize, is_collapsed: F) -> Self
    where
        F: Fn(NodeId) -> bool,
    {
        let root = tree.get_root();
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        let mut stack = vec![(root, None, 0usize)];

        while let Some((id, parent, depth)) = stack.pop() {
            let children: Vec<NodeId> = if depth < depth_limit && !is_collapsed(id) {
                tree.children(id).collect()
            } else {
                Vec::new()
            };

            for &child in children.iter().rev() {
                stack.push((child, Some(id), depth + 1));
            }

            index.insert(id, nodes.len());
            nodes.push(VisibleNode {
                id,
                parent,
                depth,
                children,
            });
        }

        Self { root, nodes, index }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&VisibleNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Pre-order walk
    pub fn iter(&self) -> impl Iterator<Item = &VisibleNode> {
        self.nodes.iter()
    }

    /// Parent-child pairs, produced on demand
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .iter()
            .filter_map(|node| node.parent.map(|parent| (parent, node.id)))
    }
}

/// Per-level horizontal extent of a laid-out subtree, relative to its root
#[derive(Debug, Default)]
struct Contour {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Contour {
    fn point() -> Self {
        Self {
            left: vec![0.0],
            right: vec![0.0],
        }
    }

    /// Smallest offset that keeps `next` clear of `self` on every shared level
    fn clearance(&self, next: &Contour, spacing: f32) -> f32 {
        let levels = self.right.len().min(next.left.len());
        (0..levels)
            .map(|level| {
                let separation = if level == 0 {
                    SIBLING_SEPARATION
                } else {
                    COUSIN_SEPARATION
                };
                self.right[level] + separation * spacing - next.left[level]
            })
            .fold(f32::NEG_INFINITY, f32::max)
    }

    fn absorb(&mut self, next: &Contour, shift: f32) {
        for level in 0..next.left.len() {
            let (l, r) = (next.left[level] + shift, next.right[level] + shift);
            if level < self.left.len() {
                self.left[level] = self.left[level].min(l);
                self.right[level] = self.right[level].max(r);
            } else {
                self.left.push(l);
                self.right.push(r);
            }
        }
    }
}

/// Computed coordinates. `x` runs across siblings, `y` runs with depth.
#[derive(Debug, Clone, Default)]
pub struct TreeLayout {
    positions: HashMap<NodeId, Vec2>,
    pub x_min: f32,
    pub x_max: f32,
}

impl TreeLayout {
    /// Layered tidy layout. `node_size.x` is the sibling spacing and
    /// `node_size.y` the distance between depth levels. The root lands on
    /// `x = 0`; every parent sits at the mean of its children.
    pub fn compute(visible: &VisibleTree, node_size: Vec2) -> Self {
        let mut offsets: HashMap<NodeId, f32> = HashMap::with_capacity(visible.len());
        Self::place(visible, visible.root(), node_size.x, &mut offsets);

        let mut positions: HashMap<NodeId, Vec2> = HashMap::with_capacity(visible.len());
        let mut x_min = f32::INFINITY;
        let mut x_max = f32::NEG_INFINITY;

        for node in visible.iter() {
            let parent_x = node
                .parent
                .and_then(|p| positions.get(&p))
                .map(|p| p.x)
                .unwrap_or(0.0);
            let x = parent_x + offsets.get(&node.id).copied().unwrap_or(0.0);
            let y = node.depth as f32 * node_size.y;
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            positions.insert(node.id, Vec2::new(x, y));
        }

        if positions.is_empty() {
            x_min = 0.0;
            x_max = 0.0;
        }

        Self {
            positions,
            x_min,
            x_max,
        }
    }

    fn place(
        visible: &VisibleTree,
        id: NodeId,
        spacing: f32,
        offsets: &mut HashMap<NodeId, f32>,
    ) -> Contour {
        let children = visible.children(id);
        if children.is_empty() {
            return Contour::point();
        }

        let mut merged = Contour::default();
        let mut slots = Vec::with_capacity(children.len());

        for &child in children {
            let sub = Self::place(visible, child, spacing, offsets);
            let shift = if slots.is_empty() {
                0.0
            } else {
                merged.clearance(&sub, spacing)
            };
            merged.absorb(&sub, shift);
            slots.push(shift);
        }

        let mean = slots.iter().sum::<f32>() / slots.len() as f32;
        for (&child, slot) in children.iter().zip(&slots) {
            offsets.insert(child, slot - mean);
        }

        let mut contour = Contour::point();
        contour.left.extend(merged.left.iter().map(|l| l - mean));
        contour.right.extend(merged.right.iter().map(|r| r - mean));
        contour
    }

    pub fn position(&self, id: NodeId) -> Option<Vec2> {
        self.positions.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Map a layout position to drawing space: depth runs left to right.
pub fn to_screen(position: Vec2) -> Vec2 {
    Vec2::new(position.y, position.x)
}

/// Control points of a smooth horizontal link between two screen points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkCurve {
    pub points: [Vec2; 4],
}

impl LinkCurve {
    pub fn horizontal(from: Vec2, to: Vec2) -> Self {
        let mid_x = (from.x + to.x) * 0.5;
        Self {
            points: [from, Vec2::new(mid_x, from.y), Vec2::new(mid_x, to.y), to],
        }
    }

    /// Point on the cubic Bezier at `t` in `[0, 1]`
    pub fn point_at(&self, t: f32) -> Vec2 {
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }

    pub fn sample(&self, segments: usize) -> Vec<Vec2> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f32 / segments as f32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn example_tree() -> UrlTree {
        let mut tree = UrlTree::new();
        tree.insert_path(&["x", "y"]);
        tree.insert_path(&["x", "z"]);
        tree.insert_path(&["w"]);
        tree
    }

    fn keys(tree: &UrlTree, visible: &VisibleTree) -> Vec<String> {
        visible.iter().map(|n| tree.key(n.id)).collect()
    }

    #[test]
    fn test_visible_respects_depth_limit() {
        let tree = example_tree();
        let visible = VisibleTree::collect(&tree, 1, |_| false);
        assert_eq!(keys(&tree, &visible), vec!["", "/x", "/w"]);
        assert_eq!(visible.links().count(), 2);

        let visible = VisibleTree::collect(&tree, 0, |_| false);
        assert_eq!(keys(&tree, &visible), vec![""]);
        assert_eq!(visible.links().count(), 0);
    }

    #[test]
    fn test_visible_skips_collapsed_subtrees() {
        let tree = example_tree();
        let x = tree.get_node("/x").unwrap();
        let visible = VisibleTree::collect(&tree, 8, |id| id == x);
        assert_eq!(keys(&tree, &visible), vec!["", "/x", "/w"]);
    }

    #[test]
    fn test_parent_centered_over_children() {
        let tree = example_tree();
        let visible = VisibleTree::collect(&tree, 8, |_| false);
        let layout = TreeLayout::compute(&visible, Vec2::new(20.0, 100.0));

        let pos = |key: &str| layout.position(tree.get_node(key).unwrap()).unwrap();
        assert_eq!(pos("").x, 0.0);
        assert!((pos("/x").x - (pos("/x/y").x + pos("/x/z").x) / 2.0).abs() < 1e-4);
        assert!((pos("").x - (pos("/x").x + pos("/w").x) / 2.0).abs() < 1e-4);
        assert!(pos("/x").x < pos("/w").x);
        assert!(pos("/x/y").x < pos("/x/z").x);
        assert_eq!(pos("/x/y").y, 200.0);
        assert!((pos("/x/z").x - pos("/x/y").x - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_cousins_get_double_spacing() {
        let mut tree = UrlTree::new();
        tree.insert_path(&["a", "a1"]);
        tree.insert_path(&["b", "b1"]);
        let visible = VisibleTree::collect(&tree, 8, |_| false);
        let layout = TreeLayout::compute(&visible, Vec2::new(10.0, 50.0));

        let a1 = layout.position(tree.get_node("/a/a1").unwrap()).unwrap();
        let b1 = layout.position(tree.get_node("/b/b1").unwrap()).unwrap();
        assert!((b1.x - a1.x - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_single_root_layout() {
        let tree = UrlTree::new();
        let visible = VisibleTree::collect(&tree, 8, |_| false);
        let layout = TreeLayout::compute(&visible, Vec2::new(20.0, 100.0));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.x_min, 0.0);
        assert_eq!(layout.x_max, 0.0);
    }

    #[test]
    fn test_link_curve_endpoints() {
        let curve = LinkCurve::horizontal(Vec2::new(0.0, 0.0), Vec2::new(100.0, 40.0));
        assert_eq!(curve.points[1], Vec2::new(50.0, 0.0));
        assert_eq!(curve.points[2], Vec2::new(50.0, 40.0));
        assert!((curve.point_at(0.5) - Vec2::new(50.0, 20.0)).length() < 1e-4);
        assert_eq!(curve.sample(4).len(), 5);
    }

    fn random_tree() -> impl Strategy<Value = UrlTree> {
        let path = prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 1..5);
        prop::collection::vec(path, 0..30).prop_map(|paths| {
            let mut tree = UrlTree::new();
            for path in paths {
                tree.insert_path(&path);
            }
            tree
        })
    }

    proptest! {
        #[test]
        fn depth_filter_is_exact(tree in random_tree(), limit in 0usize..6) {
            let visible = VisibleTree::collect(&tree, limit, |_| false);
            for id in tree.descendants() {
                prop_assert_eq!(visible.contains(id), tree.depth(id) <= limit);
            }
            for (parent, child) in visible.links() {
                prop_assert!(visible.get(parent).unwrap().depth <= limit);
                prop_assert!(visible.get(child).unwrap().depth <= limit);
            }
            prop_assert_eq!(visible.links().count(), visible.len() - 1);
        }

        #[test]
        fn nodes_never_overlap(tree in random_tree(), spacing in 1.0f32..40.0) {
            let visible = VisibleTree::collect(&tree, 10, |_| false);
            let layout = TreeLayout::compute(&visible, Vec2::new(spacing, 80.0));

            let mut levels: HashMap<usize, Vec<f32>> = HashMap::new();
            for node in visible.iter() {
                levels.entry(node.depth).or_default().push(layout.position(node.id).unwrap().x);
            }
            for xs in levels.values_mut() {
                xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
                for pair in xs.windows(2) {
                    prop_assert!(pair[1] - pair[0] >= spacing - 1e-3);
                }
            }
        }

        #[test]
        fn parents_sit_at_child_mean(tree in random_tree()) {
            let visible = VisibleTree::collect(&tree, 10, |_| false);
            let layout = TreeLayout::compute(&visible, Vec2::new(12.0, 80.0));
            for node in visible.iter().filter(|n| !n.children.is_empty()) {
                let mean = node.children.iter()
                    .map(|&c| layout.position(c).unwrap().x)
                    .sum::<f32>() / node.children.len() as f32;
                prop_assert!((layout.position(node.id).unwrap().x - mean).abs() < 1e-2);
            }
        }
    }
}
