use glam::Vec2;
use indextree::NodeId;
use std::collections::{HashMap, HashSet};

use crate::animation::{LayoutAnimator, LinkVisual, NodeVisual, Tween};
use crate::config::ViewParams;
use crate::expand_state::CollapseState;
use crate::layout::{to_screen, LinkCurve, TreeLayout, VisibleTree};
use crate::tree::UrlTree;

/// Stable identity of a node across render passes
pub type Token = u64;

/// Reconciliation category of an element in the current pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Update,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSide {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct NodeElement {
    pub token: Token,
    pub node: NodeId,
    pub key: String,
    pub label: String,
    pub depth: usize,
    pub phase: Phase,
    pub tween: Tween<NodeVisual>,
    /// The node holds collapsed children (drawn with a dark marker)
    pub has_hidden_children: bool,
    pub label_side: LabelSide,
}

#[derive(Debug, Clone)]
pub struct LinkElement {
    /// Token of the child node
    pub token: Token,
    pub source: NodeId,
    pub target: NodeId,
    pub phase: Phase,
    pub tween: Tween<LinkVisual>,
}

/// Region of drawing space the surface should show
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub origin: Vec2,
    pub size: Vec2,
}

/// Everything currently on the visual surface
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: Vec<NodeElement>,
    pub links: Vec<LinkElement>,
    pub viewport: Viewport,
    progress: f32,
}

impl Scene {
    /// Eased progress of the running transition
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn node_visual(&self, element: &NodeElement) -> NodeVisual {
        element.tween.at(self.progress)
    }

    pub fn link_visual(&self, element: &LinkElement) -> LinkVisual {
        element.tween.at(self.progress)
    }

    pub fn link_curve(&self, element: &LinkElement) -> LinkCurve {
        let visual = self.link_visual(element);
        LinkCurve::horizontal(visual.source, visual.target)
    }

    /// Elements that are entering or staying
    pub fn live_nodes(&self) -> impl Iterator<Item = &NodeElement> {
        self.nodes.iter().filter(|n| n.phase != Phase::Exit)
    }

    pub fn live_links(&self) -> impl Iterator<Item = &LinkElement> {
        self.links.iter().filter(|l| l.phase != Phase::Exit)
    }

    pub fn find(&self, key: &str) -> Option<&NodeElement> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Closest live node within `slop` of its marker edge
    pub fn hit_test(&self, point: Vec2, slop: f32) -> Option<NodeId> {
        self.live_nodes()
            .map(|node| {
                let visual = self.node_visual(node);
                (node.node, visual.position.distance(point) - visual.radius)
            })
            .filter(|&(_, distance)| distance <= slop)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn drop_exited(&mut self) {
        self.nodes.retain(|n| n.phase != Phase::Exit);
        self.links.retain(|l| l.phase != Phase::Exit);
    }
}

/// Memory kept between render passes
#[derive(Debug, Default)]
pub struct RenderState {
    tokens: HashMap<String, Token>,
    next_token: Token,
    /// Drawing-space position from the last pass that showed the node
    previous: HashMap<String, Vec2>,
    pub collapse: CollapseState,
}

impl RenderState {
    fn token_for(&mut self, key: &str) -> Token {
        if let Some(&token) = self.tokens.get(key) {
            return token;
        }
        self.next_token += 1;
        self.tokens.insert(key.to_string(), self.next_token);
        self.next_token
    }

    pub fn token(&self, key: &str) -> Option<Token> {
        self.tokens.get(key).copied()
    }

    pub fn previous_position(&self, key: &str) -> Option<Vec2> {
        self.previous.get(key).copied()
    }
}

/// Incremental tree renderer.
///
/// Each pass lays out the visible part of the tree and reconciles it with
/// what is already on the surface: new nodes grow out of the source node's
/// old position, surviving nodes move, vanished nodes shrink into the source
/// node's new position.
#[derive(Default)]
pub struct TreeRenderer {
    state: RenderState,
    scene: Scene,
    animator: LayoutAnimator,
}

impl TreeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating
    }

    /// Lay out and reconcile. `source` is the node whose interaction caused
    /// the pass; `None` means the root.
    pub fn render(
        &mut self,
        tree: &UrlTree,
        params: &ViewParams,
        canvas_width: f32,
        source: Option<NodeId>,
    ) -> &Scene {
        let spacing = params.node_spacing;
        let depth_step = canvas_width.max(0.0) / (tree.height() + 1) as f32;

        let collapse = &self.state.collapse;
        let visible = VisibleTree::collect(tree, params.depth_limit as usize, |id| {
            collapse.is_collapsed(&tree.key(id))
        });
        let layout = TreeLayout::compute(&visible, Vec2::new(spacing, depth_step));

        let source = source
            .filter(|&id| visible.contains(id))
            .unwrap_or_else(|| tree.get_root());
        let source_key = tree.key(source);
        let source_before = self
            .state
            .previous_position(&source_key)
            .unwrap_or_else(|| to_screen(Vec2::new(spacing / 2.0, 0.0)));
        let source_after = layout
            .position(source)
            .map(to_screen)
            .unwrap_or(source_before);

        let shown_nodes: HashMap<Token, NodeVisual> = self
            .scene
            .nodes
            .iter()
            .map(|n| (n.token, self.scene.node_visual(n)))
            .collect();
        let shown_links: HashMap<Token, LinkVisual> = self
            .scene
            .links
            .iter()
            .map(|l| (l.token, self.scene.link_visual(l)))
            .collect();

        let mut nodes = Vec::with_capacity(visible.len());
        let mut present = HashSet::with_capacity(visible.len());

        for entry in visible.iter() {
            let key = tree.key(entry.id);
            let token = self.state.token_for(&key);
            present.insert(token);

            let target = layout
                .position(entry.id)
                .map(to_screen)
                .unwrap_or(source_after);
            let (phase, from) = match shown_nodes.get(&token) {
                Some(&shown) => (Phase::Update, shown),
                None => (Phase::Enter, NodeVisual::vanished(source_before)),
            };

            nodes.push(NodeElement {
                token,
                node: entry.id,
                label: tree.name(entry.id).to_string(),
                depth: entry.depth,
                phase,
                tween: Tween::new(from, NodeVisual::settled(target)),
                has_hidden_children: self.state.collapse.is_collapsed(&key)
                    && tree.has_children(entry.id),
                label_side: if entry.children.is_empty() {
                    LabelSide::Right
                } else {
                    LabelSide::Left
                },
                key,
            });
        }

        for old in &self.scene.nodes {
            if present.contains(&old.token) {
                continue;
            }
            let from = shown_nodes
                .get(&old.token)
                .copied()
                .unwrap_or_else(|| NodeVisual::settled(source_after));
            nodes.push(NodeElement {
                phase: Phase::Exit,
                tween: Tween::new(from, NodeVisual::vanished(source_after)),
                ..old.clone()
            });
        }

        let mut links = Vec::with_capacity(visible.len());
        for (parent, child) in visible.links() {
            let token = self.state.token_for(&tree.key(child));
            let to = LinkVisual {
                source: layout.position(parent).map(to_screen).unwrap_or(source_after),
                target: layout.position(child).map(to_screen).unwrap_or(source_after),
            };
            let (phase, from) = match shown_links.get(&token) {
                Some(&shown) => (Phase::Update, shown),
                None => (Phase::Enter, LinkVisual::collapsed(source_before)),
            };
            links.push(LinkElement {
                token,
                source: parent,
                target: child,
                phase,
                tween: Tween::new(from, to),
            });
        }

        for old in &self.scene.links {
            if present.contains(&old.token) {
                continue;
            }
            let from = shown_links
                .get(&old.token)
                .copied()
                .unwrap_or_else(|| LinkVisual::collapsed(source_after));
            links.push(LinkElement {
                phase: Phase::Exit,
                tween: Tween::new(from, LinkVisual::collapsed(source_after)),
                ..old.clone()
            });
        }

        for entry in visible.iter() {
            if let Some(position) = layout.position(entry.id) {
                self.state
                    .previous
                    .insert(tree.key(entry.id), to_screen(position));
            }
        }

        let height = layout.x_max - layout.x_min + spacing * 3.0;
        let viewport = Viewport {
            origin: Vec2::new(-depth_step / 3.0, layout.x_min - spacing * 2.0),
            size: Vec2::new(canvas_width, height),
        };

        let entering = nodes.iter().filter(|n| n.phase == Phase::Enter).count();
        let exiting = nodes.iter().filter(|n| n.phase == Phase::Exit).count();
        log::debug!(
            "Render pass from {:?}: {} visible, {} entering, {} exiting",
            if source_key.is_empty() { "/" } else { source_key.as_str() },
            visible.len(),
            entering,
            exiting
        );

        self.animator.start(nodes.len() + links.len());
        self.scene = Scene {
            nodes,
            links,
            viewport,
            progress: self.animator.progress(),
        };
        if !self.animator.is_animating {
            self.scene.drop_exited();
        }

        &self.scene
    }

    /// Collapse or expand `node`, then re-render with it as the source.
    /// Returns false for nodes that never had children.
    pub fn toggle(
        &mut self,
        tree: &UrlTree,
        node: NodeId,
        params: &ViewParams,
        canvas_width: f32,
    ) -> bool {
        if !tree.has_children(node) {
            log::trace!("Ignoring toggle on leaf {}", tree.name(node));
            return false;
        }

        let key = tree.key(node);
        let collapsed = self.state.collapse.toggle(&key);
        log::debug!(
            "{} {}",
            if collapsed { "Collapsed" } else { "Expanded" },
            if key.is_empty() { "/" } else { key.as_str() }
        );

        self.render(tree, params, canvas_width, Some(node));
        true
    }

    /// Expand `node` and everything collapsed below it, then re-render with it
    /// as the source. Returns false when nothing there was collapsed.
    pub fn expand_subtree(
        &mut self,
        tree: &UrlTree,
        node: NodeId,
        params: &ViewParams,
        canvas_width: f32,
    ) -> bool {
        let before = self.state.collapse.collapsed_count();
        if node == tree.get_root() {
            self.state.collapse.expand_all();
        } else {
            self.state.collapse.expand_recursive(&tree.key(node));
        }
        if self.state.collapse.collapsed_count() == before {
            return false;
        }

        self.render(tree, params, canvas_width, Some(node));
        true
    }

    /// Advance running transitions. Returns true while still animating.
    pub fn tick(&mut self, dt: f32) -> bool {
        let animating = self.animator.update(dt);
        self.scene.progress = self.animator.progress();
        if !animating {
            self.scene.drop_exited();
        }
        animating
    }

    /// Jump every element to its end state
    pub fn finish(&mut self) {
        self.animator.finish_immediately();
        self.scene.progress = self.animator.progress();
        self.scene.drop_exited();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;

    const WIDTH: f32 = 900.0;

    fn example_tree() -> UrlTree {
        TreeBuilder::build(&[
            "https://a.com/x/y",
            "https://a.com/x/z",
            "not a url",
            "https://a.com/w",
        ])
        .tree
    }

    fn live_keys(scene: &Scene) -> Vec<String> {
        scene.live_nodes().map(|n| n.key.clone()).collect()
    }

    fn params(depth: u32) -> ViewParams {
        ViewParams::new(depth, 20.0)
    }

    #[test]
    fn test_depth_limit_one() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        let scene = renderer.render(&tree, &params(1), WIDTH, None);

        assert_eq!(live_keys(scene), vec!["", "/x", "/w"]);
        assert_eq!(scene.live_links().count(), 2);
    }

    #[test]
    fn test_first_render_enters_from_root_origin() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        let scene = renderer.render(&tree, &params(8), WIDTH, None);

        assert!(scene.nodes.iter().all(|n| n.phase == Phase::Enter));
        assert!(scene.links.iter().all(|l| l.phase == Phase::Enter));
        for node in &scene.nodes {
            assert_eq!(node.tween.from.position, Vec2::new(0.0, 10.0));
        }
        assert_eq!(scene.progress(), 0.0);
    }

    #[test]
    fn test_tokens_are_stable_and_unique() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        let first: Vec<Token> = renderer.scene().nodes.iter().map(|n| n.token).collect();

        renderer.render(&tree, &params(8), WIDTH, None);
        let second: Vec<Token> = renderer.scene().nodes.iter().map(|n| n.token).collect();

        assert_eq!(first, second);
        let unique: HashSet<Token> = first.iter().copied().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn test_second_render_updates_from_previous_positions() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();
        let before = renderer.state().previous_position("/x/y").unwrap();

        let scene = renderer.render(&tree, &ViewParams::new(8, 40.0), WIDTH, None);
        let y = scene.find("/x/y").unwrap();
        assert_eq!(y.phase, Phase::Update);
        assert_eq!(y.tween.from.position, before);
        assert_ne!(y.tween.to.position, before);
        let to = y.tween.to.position;
        assert_eq!(renderer.state().previous_position("/x/y"), Some(to));
    }

    #[test]
    fn test_depth_decrease_exits_into_root() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();

        let scene = renderer.render(&tree, &params(1), WIDTH, None);
        let root_now = scene.find("").unwrap().tween.to.position;
        let exiting: Vec<&NodeElement> =
            scene.nodes.iter().filter(|n| n.phase == Phase::Exit).collect();

        assert_eq!(exiting.len(), 2);
        for node in exiting {
            assert_eq!(node.tween.to.position, root_now);
            assert!(node.tween.to.radius < 1e-3);
        }
        assert_eq!(scene.links.iter().filter(|l| l.phase == Phase::Exit).count(), 2);

        renderer.finish();
        assert_eq!(live_keys(renderer.scene()), vec!["", "/x", "/w"]);
        assert_eq!(renderer.scene().nodes.len(), 3);
        assert_eq!(renderer.scene().links.len(), 2);
    }

    #[test]
    fn test_toggle_hides_only_subtree_and_round_trips() {
        let tree = example_tree();
        let x = tree.get_node("/x").unwrap();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();
        let full = live_keys(renderer.scene());

        assert!(renderer.toggle(&tree, x, &params(8), WIDTH));
        let collapsed = live_keys(renderer.scene());
        assert_eq!(collapsed, vec!["", "/x", "/w"]);
        let x_element = renderer.scene().find("/x").unwrap();
        assert!(x_element.has_hidden_children);
        assert_eq!(x_element.label_side, LabelSide::Right);

        let x_after = x_element.tween.to.position;
        for node in renderer.scene().nodes.iter().filter(|n| n.phase == Phase::Exit) {
            assert_eq!(node.tween.to.position, x_after);
        }
        let exiting_links: Vec<&LinkElement> = renderer
            .scene()
            .links
            .iter()
            .filter(|l| l.phase == Phase::Exit)
            .collect();
        assert_eq!(exiting_links.len(), 2);
        for link in exiting_links {
            assert_eq!(link.source, x);
            assert_eq!(link.tween.to, LinkVisual::collapsed(x_after));
        }

        renderer.finish();
        assert!(renderer.toggle(&tree, x, &params(8), WIDTH));
        assert_eq!(live_keys(renderer.scene()), full);

        let entering: Vec<&NodeElement> = renderer
            .scene()
            .nodes
            .iter()
            .filter(|n| n.phase == Phase::Enter)
            .collect();
        assert_eq!(entering.len(), 2);
        for node in entering {
            assert!(node.key.starts_with("/x/"));
            assert_eq!(node.tween.from.position, x_after);
        }

        let scene = renderer.scene();
        let entering_links: Vec<&LinkElement> =
            scene.links.iter().filter(|l| l.phase == Phase::Enter).collect();
        assert_eq!(entering_links.len(), 2);
        let x_expanded = scene.find("/x").unwrap().tween.to.position;
        for link in entering_links {
            assert_eq!(link.source, x);
            assert_eq!(link.tween.from, LinkVisual::collapsed(x_after));
            let child = scene.find(&tree.key(link.target)).unwrap();
            assert_eq!(link.tween.to.source, x_expanded);
            assert_eq!(link.tween.to.target, child.tween.to.position);
        }
        assert!(!scene.find("/x").unwrap().has_hidden_children);
    }

    #[test]
    fn test_toggle_leaf_is_noop() {
        let tree = example_tree();
        let w = tree.get_node("/w").unwrap();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();
        let before = live_keys(renderer.scene());

        assert!(!renderer.toggle(&tree, w, &params(8), WIDTH));
        assert!(!renderer.is_animating());
        assert_eq!(live_keys(renderer.scene()), before);
        assert_eq!(renderer.state().collapse.collapsed_count(), 0);
    }

    #[test]
    fn test_expand_subtree_restores_nested_collapses() {
        let tree = TreeBuilder::build(&["https://a.com/x/y/z", "https://a.com/w"]).tree;
        let x = tree.get_node("/x").unwrap();
        let y = tree.get_node("/x/y").unwrap();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();
        let full = live_keys(renderer.scene());

        renderer.toggle(&tree, y, &params(8), WIDTH);
        renderer.toggle(&tree, x, &params(8), WIDTH);
        renderer.finish();
        assert_eq!(live_keys(renderer.scene()), vec!["", "/x", "/w"]);

        assert!(renderer.expand_subtree(&tree, tree.get_root(), &params(8), WIDTH));
        renderer.finish();
        assert_eq!(live_keys(renderer.scene()), full);
        assert!(!renderer.expand_subtree(&tree, x, &params(8), WIDTH));
    }

    #[test]
    fn test_deep_tree_renders_to_depth_limit() {
        let row = format!("https://a.com/{}", "a/".repeat(20_000));
        let tree = TreeBuilder::build(&[row]).tree;
        let mut renderer = TreeRenderer::new();
        let scene = renderer.render(&tree, &params(8), WIDTH, None);

        assert_eq!(scene.live_nodes().count(), 9);
        assert_eq!(scene.live_links().count(), 8);
        let deepest = scene.find(&"/a".repeat(8)).unwrap();
        assert_eq!(deepest.depth, 8);
        assert_eq!(deepest.label_side, LabelSide::Right);
    }

    #[test]
    fn test_empty_tree_renders_root_only() {
        let tree = TreeBuilder::build(&["not a url"]).tree;
        let mut renderer = TreeRenderer::new();
        let scene = renderer.render(&tree, &params(8), WIDTH, None);

        assert_eq!(live_keys(scene), vec![""]);
        assert!(scene.links.is_empty());
        assert_eq!(scene.viewport.size, Vec2::new(WIDTH, 60.0));
    }

    #[test]
    fn test_viewport_covers_visible_extent() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        let scene = renderer.render(&tree, &params(8), WIDTH, None);

        let depth_step = WIDTH / 3.0;
        assert!((scene.viewport.origin.x + depth_step / 3.0).abs() < 1e-3);
        for node in scene.live_nodes() {
            let y = node.tween.to.position.y;
            assert!(y >= scene.viewport.origin.y + 20.0);
            assert!(y <= scene.viewport.origin.y + scene.viewport.size.y);
        }
    }

    #[test]
    fn test_tick_completes_and_drops_exits() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();
        renderer.render(&tree, &params(0), WIDTH, None);
        assert!(renderer.is_animating());

        let mut steps = 0;
        while renderer.tick(0.05) {
            steps += 1;
            assert!(steps < 10);
        }
        assert_eq!(renderer.scene().progress(), 1.0);
        assert_eq!(live_keys(renderer.scene()), vec![""]);
        assert_eq!(renderer.scene().nodes.len(), 1);
    }

    #[test]
    fn test_interrupted_transition_starts_from_current_visual() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.tick(0.1);

        let shown = {
            let scene = renderer.scene();
            scene.node_visual(scene.find("/x/y").unwrap())
        };
        let scene = renderer.render(&tree, &params(8), WIDTH, None);
        let y = scene.find("/x/y").unwrap();
        assert_eq!(y.phase, Phase::Update);
        assert_eq!(y.tween.from, shown);
    }

    #[test]
    fn test_hit_test_finds_nearest_live_node() {
        let tree = example_tree();
        let mut renderer = TreeRenderer::new();
        renderer.render(&tree, &params(8), WIDTH, None);
        renderer.finish();

        let scene = renderer.scene();
        let w = scene.find("/w").unwrap();
        let at = scene.node_visual(w).position + Vec2::new(3.0, 0.0);
        assert_eq!(scene.hit_test(at, 2.0), Some(w.node));
        assert_eq!(scene.hit_test(Vec2::new(-500.0, -500.0), 2.0), None);
    }
}
