use indextree::NodeId;
use std::path::PathBuf;

use crate::builder::{SkippedRow, TreeBuilder};
use crate::config::ViewParams;
use crate::error::SourceError;
use crate::render::{Scene, TreeRenderer};
use crate::tree::UrlTree;

/// Default drawing width until a front end reports its real canvas size
pub const DEFAULT_CANVAS_WIDTH: f32 = 960.0;

/// Inputs the application reacts to, independent of how they were produced
#[derive(Debug)]
pub enum Command {
    /// Rows extracted from a file, or the reason extraction failed
    FileLoaded {
        path: Option<PathBuf>,
        rows: Result<Vec<String>, SourceError>,
    },
    ParamsChanged(ViewParams),
    NodeToggled(NodeId),
    /// Expand a node and every collapsed node below it
    ExpandSubtree(NodeId),
    CanvasResized(f32),
}

/// What a command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// A new tree replaced the old one
    Reloaded { nodes: usize, skipped: usize },
    /// The current tree was drawn again
    Rerendered,
    /// Nothing changed
    Unchanged,
    /// The load failed and the previous state was kept
    LoadFailed(String),
}

/// Application state owned by the front end and passed to every handler
pub struct AppContext {
    tree: Option<UrlTree>,
    renderer: TreeRenderer,
    params: ViewParams,
    canvas_width: f32,
    source_path: Option<PathBuf>,
    skipped: Vec<SkippedRow>,
    dump: String,
}

impl AppContext {
    pub fn new(params: ViewParams) -> Self {
        Self {
            tree: None,
            renderer: TreeRenderer::new(),
            params: params.clamped(),
            canvas_width: DEFAULT_CANVAS_WIDTH,
            source_path: None,
            skipped: Vec::new(),
            dump: String::new(),
        }
    }

    pub fn handle(&mut self, command: Command) -> Handled {
        match command {
            Command::FileLoaded { path, rows } => self.on_file_loaded(path, rows),
            Command::ParamsChanged(params) => self.on_params_changed(params),
            Command::NodeToggled(node) => self.on_node_toggled(node),
            Command::ExpandSubtree(node) => self.on_expand_subtree(node),
            Command::CanvasResized(width) => self.on_canvas_resized(width),
        }
    }

    fn on_file_loaded(
        &mut self,
        path: Option<PathBuf>,
        rows: Result<Vec<String>, SourceError>,
    ) -> Handled {
        let rows = match rows {
            Ok(rows) => rows,
            Err(err) => {
                log::error!("Failed to load URL list: {}", err);
                return Handled::LoadFailed(err.to_string());
            }
        };

        let outcome = TreeBuilder::build(&rows);
        self.dump = outcome.tree.to_json_pretty().unwrap_or_else(|err| {
            log::warn!("Failed to serialize tree: {}", err);
            String::new()
        });
        let handled = Handled::Reloaded {
            nodes: outcome.tree.len(),
            skipped: outcome.skipped.len(),
        };

        self.skipped = outcome.skipped;
        self.source_path = path;
        self.renderer = TreeRenderer::new();
        self.renderer
            .render(&outcome.tree, &self.params, self.canvas_width, None);
        self.tree = Some(outcome.tree);

        handled
    }

    fn on_params_changed(&mut self, params: ViewParams) -> Handled {
        let params = params.clamped();
        if params == self.params {
            return Handled::Unchanged;
        }
        log::debug!("Parameters changed: {:?}", params);
        self.params = params;
        self.rerender()
    }

    fn on_node_toggled(&mut self, node: NodeId) -> Handled {
        let Some(tree) = self.tree.as_ref() else {
            return Handled::Unchanged;
        };
        if tree.node(node).is_none() {
            log::warn!("Toggle for unknown node {:?}", node);
            return Handled::Unchanged;
        }

        if self
            .renderer
            .toggle(tree, node, &self.params, self.canvas_width)
        {
            Handled::Rerendered
        } else {
            Handled::Unchanged
        }
    }

    fn on_expand_subtree(&mut self, node: NodeId) -> Handled {
        let Some(tree) = self.tree.as_ref() else {
            return Handled::Unchanged;
        };
        if tree.node(node).is_some()
            && self
                .renderer
                .expand_subtree(tree, node, &self.params, self.canvas_width)
        {
            Handled::Rerendered
        } else {
            Handled::Unchanged
        }
    }

    fn on_canvas_resized(&mut self, width: f32) -> Handled {
        if !width.is_finite() || width <= 0.0 || (width - self.canvas_width).abs() < 0.5 {
            return Handled::Unchanged;
        }
        self.canvas_width = width;
        self.rerender()
    }

    fn rerender(&mut self) -> Handled {
        match self.tree.as_ref() {
            Some(tree) => {
                self.renderer
                    .render(tree, &self.params, self.canvas_width, None);
                Handled::Rerendered
            }
            None => Handled::Unchanged,
        }
    }

    /// Advance animations by `dt` seconds. Returns true while animating.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.renderer.tick(dt)
    }

    pub fn finish_animations(&mut self) {
        self.renderer.finish();
    }

    pub fn is_animating(&self) -> bool {
        self.renderer.is_animating()
    }

    pub fn tree(&self) -> Option<&UrlTree> {
        self.tree.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        self.renderer.scene()
    }

    pub fn renderer(&self) -> &TreeRenderer {
        &self.renderer
    }

    pub fn params(&self) -> ViewParams {
        self.params
    }

    pub fn canvas_width(&self) -> f32 {
        self.canvas_width
    }

    pub fn source_path(&self) -> Option<&PathBuf> {
        self.source_path.as_ref()
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    /// Pretty JSON of the current tree, empty before the first load
    pub fn dump(&self) -> &str {
        &self.dump
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_rows() -> Vec<String> {
        [
            "https://a.com/x/y",
            "https://a.com/x/z",
            "not a url",
            "https://a.com/w",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn loaded_context() -> AppContext {
        let mut ctx = AppContext::new(ViewParams::default());
        let handled = ctx.handle(Command::FileLoaded {
            path: None,
            rows: Ok(example_rows()),
        });
        assert_eq!(
            handled,
            Handled::Reloaded {
                nodes: 5,
                skipped: 1
            }
        );
        ctx.finish_animations();
        ctx
    }

    fn live_keys(ctx: &AppContext) -> Vec<String> {
        ctx.scene().live_nodes().map(|n| n.key.clone()).collect()
    }

    #[test]
    fn test_file_loaded_builds_and_renders() {
        let ctx = loaded_context();
        assert_eq!(live_keys(&ctx), vec!["", "/x", "/x/y", "/x/z", "/w"]);
        assert_eq!(ctx.skipped().len(), 1);
        assert!(ctx.dump().contains("\"name\": \"/x\""));
    }

    #[test]
    fn test_failed_load_keeps_previous_tree() {
        let mut ctx = loaded_context();
        let before = live_keys(&ctx);

        let handled = ctx.handle(Command::FileLoaded {
            path: Some(PathBuf::from("broken.csv")),
            rows: Err(SourceError::Disconnected),
        });

        assert!(matches!(handled, Handled::LoadFailed(_)));
        assert_eq!(live_keys(&ctx), before);
        assert_eq!(ctx.tree().map(|t| t.len()), Some(5));
        assert!(ctx.source_path().is_none());
    }

    #[test]
    fn test_params_change_keeps_collapse_state() {
        let mut ctx = loaded_context();
        let x = ctx.tree().unwrap().get_node("/x").unwrap();
        assert_eq!(ctx.handle(Command::NodeToggled(x)), Handled::Rerendered);
        ctx.finish_animations();

        let handled = ctx.handle(Command::ParamsChanged(ViewParams::new(8, 30.0)));
        assert_eq!(handled, Handled::Rerendered);
        ctx.finish_animations();
        assert_eq!(live_keys(&ctx), vec!["", "/x", "/w"]);
    }

    #[test]
    fn test_depth_param_limits_scene() {
        let mut ctx = loaded_context();
        ctx.handle(Command::ParamsChanged(ViewParams::new(1, 20.0)));
        ctx.finish_animations();
        assert_eq!(live_keys(&ctx), vec!["", "/x", "/w"]);
    }

    #[test]
    fn test_unchanged_params_do_nothing() {
        let mut ctx = loaded_context();
        assert_eq!(
            ctx.handle(Command::ParamsChanged(ViewParams::default())),
            Handled::Unchanged
        );
    }

    #[test]
    fn test_reload_resets_render_state() {
        let mut ctx = loaded_context();
        let x = ctx.tree().unwrap().get_node("/x").unwrap();
        ctx.handle(Command::NodeToggled(x));
        ctx.finish_animations();

        ctx.handle(Command::FileLoaded {
            path: None,
            rows: Ok(example_rows()),
        });
        ctx.finish_animations();
        assert_eq!(live_keys(&ctx), vec!["", "/x", "/x/y", "/x/z", "/w"]);
        assert_eq!(ctx.renderer().state().collapse.collapsed_count(), 0);
    }

    #[test]
    fn test_commands_before_load_are_ignored() {
        let mut ctx = AppContext::new(ViewParams::default());
        assert_eq!(
            ctx.handle(Command::ParamsChanged(ViewParams::new(2, 5.0))),
            Handled::Unchanged
        );
        assert_eq!(ctx.handle(Command::CanvasResized(1200.0)), Handled::Unchanged);
        assert!(ctx.scene().nodes.is_empty());
        assert_eq!(ctx.params(), ViewParams::new(2, 5.0));
        assert_eq!(ctx.canvas_width(), 1200.0);
    }

    #[test]
    fn test_expand_subtree_from_root() {
        let mut ctx = loaded_context();
        let root = ctx.tree().unwrap().get_root();
        assert_eq!(ctx.handle(Command::ExpandSubtree(root)), Handled::Unchanged);

        let x = ctx.tree().unwrap().get_node("/x").unwrap();
        ctx.handle(Command::NodeToggled(x));
        assert_eq!(ctx.handle(Command::ExpandSubtree(root)), Handled::Rerendered);
        ctx.finish_animations();
        assert_eq!(live_keys(&ctx), vec!["", "/x", "/x/y", "/x/z", "/w"]);
    }

    #[test]
    fn test_leaf_toggle_is_unchanged() {
        let mut ctx = loaded_context();
        let w = ctx.tree().unwrap().get_node("/w").unwrap();
        assert_eq!(ctx.handle(Command::NodeToggled(w)), Handled::Unchanged);
    }
}
