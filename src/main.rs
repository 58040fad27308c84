use anyhow::Context as _;
use clap::Parser;
use eframe::egui;
use egui::epaint::CubicBezierShape;
use glam::Vec2;
use log::{debug, info};
use std::path::PathBuf;

use urltree::app::{AppContext, Command, Handled};
use urltree::builder::TreeBuilder;
use urltree::canvas::{InfiniteCanvas, Rect};
use urltree::cli::{init_logging, Args};
use urltree::config::{ViewParams, DEPTH_RANGE, SPACING_RANGE, SPACING_STEP};
use urltree::render::{LabelSide, Phase, Scene};
use urltree::source::{load_rows, RowLoader};

const LABEL_GAP: f32 = 6.0;
const CLICK_SLOP: f32 = 4.0;
const BACKGROUND: egui::Color32 = egui::Color32::WHITE;
const COLLAPSED_FILL: egui::Color32 = egui::Color32::BLACK;
const NODE_FILL: egui::Color32 = egui::Color32::from_rgb(0x99, 0x99, 0x99);
const LINK_COLOR: egui::Color32 = egui::Color32::from_rgb(0x55, 0x55, 0x55);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args, true).context("failed to open log file")?;
    debug!("Command-line args: {:?}", args);

    let params = args.view_params()?;

    if args.dump {
        let path = args
            .file_path
            .as_ref()
            .context("--dump needs an input FILE")?;
        let rows = load_rows(path)?;
        let outcome = TreeBuilder::build(&rows);
        println!("{}", outcome.tree.to_json_pretty()?);
        return Ok(());
    }

    let mut app = UrlTreeApp::new(params, args.file_path.clone());
    if args.watch {
        match &args.file_path {
            Some(path) => app.loader.watch(path)?,
            None => log::warn!("--watch ignored: no input file given"),
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("urltree - URL Path Tree"),
        ..Default::default()
    };

    eframe::run_native(
        "urltree",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Box::new(app)
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to start window: {}", err))
}

struct UrlTreeApp {
    ctx: AppContext,
    loader: RowLoader,
    canvas: InfiniteCanvas,
    path_input: String,
    status: String,
    /// Slider state; pushed to the context when it differs
    params: ViewParams,
    needs_fit: bool,
    show_dump: bool,
}

impl UrlTreeApp {
    fn new(params: ViewParams, file_path: Option<PathBuf>) -> Self {
        let mut app = Self {
            ctx: AppContext::new(params),
            loader: RowLoader::default(),
            canvas: InfiniteCanvas::new(Rect::new(0.0, 0.0, 0.0, 0.0)),
            path_input: String::new(),
            status: String::from("Open a CSV file with one URL per row"),
            params: params.clamped(),
            needs_fit: false,
            show_dump: true,
        };
        if let Some(path) = file_path {
            app.path_input = path.display().to_string();
            app.start_load();
        }
        app
    }

    fn start_load(&mut self) {
        let path = self.path_input.trim();
        if path.is_empty() {
            self.status = "Enter a file path first".to_string();
            return;
        }
        self.status = format!("Loading {} ...", path);
        self.loader.load(PathBuf::from(path));
    }

    fn poll_loader(&mut self) {
        let Some((path, rows)) = self.loader.poll() else {
            return;
        };

        let shown = path.display().to_string();
        match self.ctx.handle(Command::FileLoaded {
            path: Some(path),
            rows,
        }) {
            Handled::Reloaded { nodes, skipped } => {
                info!("Loaded {}: {} nodes, {} rows skipped", shown, nodes, skipped);
                self.status = format!("{}: {} nodes, {} rows skipped", shown, nodes, skipped);
                self.needs_fit = true;
            }
            Handled::LoadFailed(err) => self.status = err,
            Handled::Rerendered | Handled::Unchanged => {}
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("urltree");
            ui.separator();

            ui.label("File:");
            let response = ui.text_edit_singleline(&mut self.path_input);
            let submitted =
                response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Load").clicked() || submitted {
                self.start_load();
            }
            if self.loader.is_loading() {
                ui.spinner();
            }

            ui.separator();
            ui.add(egui::Slider::new(&mut self.params.depth_limit, DEPTH_RANGE).text("Depth"));
            ui.add(
                egui::Slider::new(&mut self.params.node_spacing, SPACING_RANGE)
                    .step_by(SPACING_STEP as f64)
                    .text("Spacing"),
            );

            ui.separator();
            if ui.button("Fit").clicked() {
                self.needs_fit = true;
            }
            ui.checkbox(&mut self.show_dump, "JSON");
        });

        ui.horizontal(|ui| {
            ui.label(&self.status);
            if self.loader.is_watching() {
                ui.separator();
                ui.label("watching for changes");
            }
        });

        if self.params != self.ctx.params() {
            self.ctx.handle(Command::ParamsChanged(self.params));
        }
    }

    fn draw_dump(&self, ui: &mut egui::Ui) {
        ui.heading("Tree JSON");
        if !self.ctx.skipped().is_empty() {
            ui.collapsing(format!("{} skipped rows", self.ctx.skipped().len()), |ui| {
                for skipped in self.ctx.skipped() {
                    ui.label(format!("line {}: {}", skipped.line, skipped.reason));
                }
            });
        }
        ui.separator();
        egui::ScrollArea::both().show(ui, |ui| {
            ui.add(egui::Label::new(egui::RichText::new(self.ctx.dump()).monospace()).wrap(false));
        });
    }

    fn draw_tree(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        painter.rect_filled(rect, 0.0, BACKGROUND);

        self.canvas
            .update_screen_rect(Rect::new(rect.min.x, rect.min.y, rect.width(), rect.height()));
        self.ctx.handle(Command::CanvasResized(rect.width()));
        if self.needs_fit {
            self.canvas.fit(&self.ctx.scene().viewport);
            self.needs_fit = false;
        }

        if response.dragged() {
            let delta = response.drag_delta();
            self.canvas.pan(Vec2::new(delta.x, delta.y));
        }
        if let Some(pointer) = response.hover_pos() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                self.canvas
                    .zoom((scroll * 0.002).exp(), Vec2::new(pointer.x, pointer.y));
            }
        }

        if response.clicked() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let world = self.canvas.screen_to_world(Vec2::new(pointer.x, pointer.y));
                let slop = CLICK_SLOP / self.canvas.zoom_level;
                if let Some(node) = self.ctx.scene().hit_test(world, slop) {
                    self.ctx.handle(Command::NodeToggled(node));
                }
            }
        }

        let dt = ui.input(|i| i.stable_dt);
        if self.ctx.tick(dt) {
            ui.ctx().request_repaint();
        }

        paint_scene(&painter, self.ctx.scene(), &self.canvas);
    }
}

fn to_pos(v: Vec2) -> egui::Pos2 {
    egui::pos2(v.x, v.y)
}

fn paint_scene(painter: &egui::Painter, scene: &Scene, canvas: &InfiniteCanvas) {
    let zoom = canvas.zoom_level;

    for link in &scene.links {
        let curve = scene.link_curve(link);
        let points = curve.points.map(|p| to_pos(canvas.world_to_screen(p)));
        let alpha = if link.phase == Phase::Exit { 1.0 - scene.progress() } else { 0.4 };
        painter.add(CubicBezierShape::from_points_stroke(
            points,
            false,
            egui::Color32::TRANSPARENT,
            egui::Stroke::new(1.5 * zoom, LINK_COLOR.gamma_multiply(alpha.max(0.0))),
        ));
    }

    let font = egui::FontId::proportional(11.0 * zoom.clamp(0.5, 3.0));
    for node in &scene.nodes {
        let visual = scene.node_visual(node);
        if !canvas.is_in_viewport(visual.position, 200.0) {
            continue;
        }

        let center = to_pos(canvas.world_to_screen(visual.position));
        let fill = if node.has_hidden_children { COLLAPSED_FILL } else { NODE_FILL };
        painter.circle_filled(center, visual.radius * zoom, fill.gamma_multiply(visual.opacity));

        let (offset, align) = match node.label_side {
            LabelSide::Left => (-LABEL_GAP * zoom, egui::Align2::RIGHT_CENTER),
            LabelSide::Right => (LABEL_GAP * zoom, egui::Align2::LEFT_CENTER),
        };
        let anchor = center + egui::vec2(offset, 0.0);
        let halo = BACKGROUND.gamma_multiply(visual.opacity);
        for (dx, dy) in [(-1.0, 0.0), (1.0, 0.0), (0.0, -1.0), (0.0, 1.0)] {
            painter.text(anchor + egui::vec2(dx, dy), align, &node.label, font.clone(), halo);
        }
        painter.text(
            anchor,
            align,
            &node.label,
            font.clone(),
            egui::Color32::BLACK.gamma_multiply(visual.opacity),
        );
    }
}

impl eframe::App for UrlTreeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader();
        if self.loader.is_loading() || self.loader.is_watching() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            self.draw_controls(ui);
        });

        if self.show_dump {
            egui::SidePanel::right("dump")
                .default_width(320.0)
                .resizable(true)
                .show(ctx, |ui| {
                    self.draw_dump(ui);
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                if self.ctx.tree().is_none() {
                    ui.centered_and_justified(|ui| {
                        ui.label("No tree yet. Enter a file path and press Load.");
                    });
                    return;
                }
                self.draw_tree(ui);
            });
    }
}
