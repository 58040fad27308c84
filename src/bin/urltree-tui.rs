use anyhow::Context as _;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use glam::Vec2;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use ratatui::{Frame, Terminal};
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use urltree::animation::NODE_RADIUS;
use urltree::app::{AppContext, Command, Handled};
use urltree::builder::TreeBuilder;
use urltree::cli::{init_logging, Args};
use urltree::config::{ViewParams, SPACING_STEP};
use urltree::render::{LabelSide, Phase, Scene};
use urltree::source::{load_rows, RowLoader};

/// Drawing-space size of one terminal cell
const CELL_WIDTH: f32 = 5.0;
const CELL_HEIGHT: f32 = 10.0;
const SPACING_KEY_STEP: f32 = SPACING_STEP * 10.0;

const BACKGROUND: Color = Color::Rgb(18, 18, 20);
const LINK_COLOR: Color = Color::Rgb(85, 85, 85);
const SELECTED_COLOR: Color = Color::Rgb(246, 211, 101);

/// Maps drawing space onto the character grid of the tree panel
#[derive(Debug, Clone, Copy)]
struct GridMapping {
    area: UiRect,
    origin: Vec2,
    scroll: u16,
}

impl GridMapping {
    fn to_cell(&self, world: Vec2) -> Option<(u16, u16)> {
        let col = ((world.x - self.origin.x) / CELL_WIDTH).round();
        let row = ((world.y - self.origin.y) / CELL_HEIGHT).round() - self.scroll as f32;
        if col < 0.0 || row < 0.0 || col >= self.area.width as f32 || row >= self.area.height as f32 {
            return None;
        }
        Some((self.area.x + col as u16, self.area.y + row as u16))
    }

    fn to_world(&self, x: u16, y: u16) -> Vec2 {
        let col = x.saturating_sub(self.area.x) as f32;
        let row = y.saturating_sub(self.area.y).saturating_add(self.scroll) as f32;
        Vec2::new(
            col * CELL_WIDTH + self.origin.x,
            row * CELL_HEIGHT + self.origin.y,
        )
    }

    /// Unscrolled grid row of a drawing-space point
    fn row_of(&self, world: Vec2) -> i32 {
        ((world.y - self.origin.y) / CELL_HEIGHT).round() as i32
    }
}

struct App {
    ctx: AppContext,
    loader: RowLoader,
    status: String,
    selected_key: Option<String>,
    scroll: u16,
    tree_area: Option<UiRect>,
    last_frame: Instant,
    should_quit: bool,
}

impl App {
    fn new(params: ViewParams) -> Self {
        Self {
            ctx: AppContext::new(params),
            loader: RowLoader::default(),
            status: String::from("No file loaded"),
            selected_key: None,
            scroll: 0,
            tree_area: None,
            last_frame: Instant::now(),
            should_quit: false,
        }
    }

    fn start_load(&mut self, path: PathBuf) {
        self.status = format!("Loading {} ...", path.display());
        self.loader.load(path);
    }

    fn reload(&mut self) {
        match self.ctx.source_path().cloned() {
            Some(path) => self.start_load(path),
            None => self.status = "Nothing to reload".to_string(),
        }
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
                self.status = format!("{}: {} nodes, {} rows skipped", shown, nodes, skipped);
                self.selected_key = Some(String::new());
                self.scroll = 0;
            }
            Handled::LoadFailed(err) => self.status = format!("Load failed: {}", err),
            Handled::Rerendered | Handled::Unchanged => {}
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.ctx.tick(dt);
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        let params = self.ctx.params();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('e') => self.expand_selected(),
            KeyCode::Char('E') => self.expand_all(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.set_params(ViewParams::new(
                params.depth_limit.saturating_add(1),
                params.node_spacing,
            )),
            KeyCode::Char('-') => self.set_params(ViewParams::new(
                params.depth_limit.saturating_sub(1),
                params.node_spacing,
            )),
            KeyCode::Char(']') => self.set_params(ViewParams::new(
                params.depth_limit,
                params.node_spacing + SPACING_KEY_STEP,
            )),
            KeyCode::Char('[') => self.set_params(ViewParams::new(
                params.depth_limit,
                params.node_spacing - SPACING_KEY_STEP,
            )),
            KeyCode::Char('r') => self.reload(),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(mapping) = self.mapping() else {
                    return;
                };
                if !point_in_rect(mapping.area, event.column, event.row) {
                    return;
                }
                let world = mapping.to_world(event.column, event.row);
                if let Some(node) = self.ctx.scene().hit_test(world, CELL_HEIGHT / 2.0) {
                    self.selected_key = self.ctx.tree().map(|t| t.key(node));
                    self.ctx.handle(Command::NodeToggled(node));
                }
            }
            MouseEventKind::ScrollUp => self.scroll = self.scroll.saturating_sub(3),
            MouseEventKind::ScrollDown => self.scroll = self.scroll.saturating_add(3),
            _ => {}
        }
    }

    fn set_params(&mut self, params: ViewParams) {
        if self.ctx.handle(Command::ParamsChanged(params)) == Handled::Rerendered {
            self.keep_selection_live();
        }
    }

    fn live_keys(&self) -> Vec<String> {
        self.ctx.scene().live_nodes().map(|n| n.key.clone()).collect()
    }

    fn move_selection(&mut self, step: i32) {
        let keys = self.live_keys();
        if keys.is_empty() {
            return;
        }
        let current = self
            .selected_key
            .as_ref()
            .and_then(|key| keys.iter().position(|k| k == key))
            .unwrap_or(0) as i32;
        let next = (current + step).clamp(0, keys.len() as i32 - 1) as usize;
        self.selected_key = Some(keys[next].clone());
        self.scroll_to_selection();
    }

    /// Fall back to the root when the selected node left the view
    fn keep_selection_live(&mut self) {
        let keys = self.live_keys();
        let live = self
            .selected_key
            .as_ref()
            .map(|key| keys.contains(key))
            .unwrap_or(false);
        if !live {
            self.selected_key = keys.first().cloned();
        }
    }

    fn selected_node(&self) -> Option<indextree::NodeId> {
        let key = self.selected_key.as_ref()?;
        self.ctx.tree()?.get_node(key)
    }

    fn toggle_selected(&mut self) {
        if let Some(node) = self.selected_node() {
            if self.ctx.handle(Command::NodeToggled(node)) == Handled::Unchanged {
                self.status = "Leaf nodes have nothing to collapse".to_string();
            }
        }
    }

    fn expand_selected(&mut self) {
        if let Some(node) = self.selected_node() {
            self.ctx.handle(Command::ExpandSubtree(node));
        }
    }

    fn expand_all(&mut self) {
        if let Some(root) = self.ctx.tree().map(|t| t.get_root()) {
            self.ctx.handle(Command::ExpandSubtree(root));
        }
    }

    fn mapping(&self) -> Option<GridMapping> {
        let area = self.tree_area?;
        Some(GridMapping {
            area,
            origin: self.ctx.scene().viewport.origin,
            scroll: self.scroll,
        })
    }

    fn scroll_to_selection(&mut self) {
        let Some(mapping) = self.mapping() else {
            return;
        };
        let Some(element) = self
            .selected_key
            .as_ref()
            .and_then(|key| self.ctx.scene().find(key))
        else {
            return;
        };

        let row = mapping.row_of(element.tween.to.position).max(0) as u16;
        let height = mapping.area.height.max(1);
        if row < self.scroll {
            self.scroll = row;
        } else if row >= self.scroll.saturating_add(height) {
            self.scroll = row.saturating_sub(height - 1);
        }
    }

    fn resize_tree_area(&mut self, area: UiRect) {
        self.tree_area = Some(area);
        self.ctx
            .handle(Command::CanvasResized(area.width.max(1) as f32 * CELL_WIDTH));
    }
}

fn point_in_rect(rect: UiRect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

struct TreeWidget<'a> {
    scene: &'a Scene,
    mapping: GridMapping,
    selected_key: Option<&'a str>,
}

impl Widget for TreeWidget<'_> {
    fn render(self, area: UiRect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        for y in area.y..area.y.saturating_add(area.height) {
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)]
                    .set_char(' ')
                    .set_style(Style::default().bg(BACKGROUND));
            }
        }

        for link in &self.scene.links {
            let curve = self.scene.link_curve(link);
            let [start, .., end] = curve.points;
            let span = ((end - start).abs() / Vec2::new(CELL_WIDTH, CELL_HEIGHT)).max_element();
            let color = if link.phase == Phase::Exit { Color::Rgb(50, 50, 50) } else { LINK_COLOR };
            for point in curve.sample((span.ceil() as usize * 2).max(2)) {
                if let Some((x, y)) = self.mapping.to_cell(point) {
                    buf[(x, y)]
                        .set_char('·')
                        .set_style(Style::default().fg(color).bg(BACKGROUND));
                }
            }
        }

        for node in &self.scene.nodes {
            let visual = self.scene.node_visual(node);
            let Some((x, y)) = self.mapping.to_cell(visual.position) else {
                continue;
            };

            let is_selected = self.selected_key == Some(node.key.as_str());
            let marker = if visual.radius < NODE_RADIUS / 2.0 {
                '·'
            } else if node.has_hidden_children {
                '●'
            } else {
                '○'
            };
            let fg = if is_selected {
                SELECTED_COLOR
            } else if node.has_hidden_children {
                Color::White
            } else {
                Color::Rgb(153, 153, 153)
            };
            buf[(x, y)]
                .set_char(marker)
                .set_style(Style::default().fg(fg).bg(BACKGROUND));

            if visual.opacity < 0.5 {
                continue;
            }
            let label = if node.label.is_empty() { "/" } else { node.label.as_str() };
            let width = label.chars().count() as u16;
            let start = match node.label_side {
                LabelSide::Left => x.saturating_sub(width + 1).max(area.x),
                LabelSide::Right => x.saturating_add(2),
            };
            let mut style = Style::default().fg(Color::Rgb(224, 224, 224)).bg(BACKGROUND);
            if is_selected {
                style = style.fg(SELECTED_COLOR).add_modifier(Modifier::BOLD);
            }
            for (i, ch) in label.chars().enumerate() {
                let cx = start.saturating_add(i as u16);
                if cx >= area.x.saturating_add(area.width) || (node.label_side == LabelSide::Left && cx >= x) {
                    break;
                }
                buf[(cx, y)].set_char(ch).set_style(style);
            }
        }
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let root = frame.area();
    let split = Layout::horizontal([Constraint::Length(38), Constraint::Min(30)]).split(root);
    let left = split[0];
    let right = split[1];

    let left_block = Block::default().title(" urltree ").borders(Borders::ALL);
    let left_inner = left_block.inner(left);
    frame.render_widget(left_block, left);

    let left_rows = Layout::vertical([
        Constraint::Length(5),
        Constraint::Length(4),
        Constraint::Min(6),
        Constraint::Length(7),
    ])
    .split(left_inner);

    let mut status = app.status.clone();
    if app.loader.is_loading() {
        status.push_str(" (loading)");
    }
    if app.loader.is_watching() {
        status.push_str("\nWatching for changes");
    }
    frame.render_widget(
        Paragraph::new(status).block(Block::default().title(" Status ").borders(Borders::ALL)),
        left_rows[0],
    );

    let params = app.ctx.params();
    let params_lines = vec![
        Line::from(vec![
            Span::styled("Depth: ", Style::default().fg(Color::Gray)),
            Span::raw(params.depth_limit.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Spacing: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:.1}", params.node_spacing)),
        ]),
    ];
    frame.render_widget(
        Paragraph::new(params_lines)
            .block(Block::default().title(" Parameters ").borders(Borders::ALL)),
        left_rows[1],
    );

    let mut selection_lines = Vec::new();
    match app.selected_key.as_deref() {
        Some(key) => {
            selection_lines.push(Line::from(vec![
                Span::styled("Path: ", Style::default().fg(Color::Gray)),
                Span::raw(if key.is_empty() { "/" } else { key }),
            ]));
            if let Some(element) = app.ctx.scene().find(key) {
                selection_lines.push(Line::from(vec![
                    Span::styled("Depth: ", Style::default().fg(Color::Gray)),
                    Span::raw(element.depth.to_string()),
                    Span::raw("  "),
                    Span::raw(if element.has_hidden_children { "collapsed" } else { "" }),
                ]));
            }
        }
        None => selection_lines.push(Line::from("Selected: (none)")),
    }
    let skipped = app.ctx.skipped();
    if !skipped.is_empty() {
        selection_lines.push(Line::from(""));
        selection_lines.push(Line::styled(
            format!("{} skipped rows:", skipped.len()),
            Style::default().fg(Color::Yellow),
        ));
        for row in skipped.iter().take(5) {
            selection_lines.push(Line::from(format!("  line {}: {}", row.line, row.reason)));
        }
    }
    frame.render_widget(
        Paragraph::new(selection_lines)
            .block(Block::default().title(" Selection ").borders(Borders::ALL)),
        left_rows[2],
    );

    let help_lines = vec![
        Line::from("↑/↓: select   Enter/space: toggle"),
        Line::from("e: expand subtree   E: expand all"),
        Line::from("+/-: depth   [/]: spacing"),
        Line::from("PgUp/PgDn: scroll   click: toggle"),
        Line::from("r: reload   q: quit"),
    ];
    frame.render_widget(
        Paragraph::new(help_lines).block(Block::default().title(" Controls ").borders(Borders::ALL)),
        left_rows[3],
    );

    let tree_block = Block::default().title(" Tree ").borders(Borders::ALL);
    let tree_inner = tree_block.inner(right);
    frame.render_widget(tree_block, right);
    app.resize_tree_area(tree_inner);

    if app.ctx.tree().is_none() {
        frame.render_widget(
            Paragraph::new("No tree yet. Pass a CSV file with one URL per row.")
                .style(Style::default().fg(Color::Gray)),
            tree_inner,
        );
        return;
    }

    if let Some(mapping) = app.mapping() {
        frame.render_widget(
            TreeWidget {
                scene: app.ctx.scene(),
                mapping,
                selected_key: app.selected_key.as_deref(),
            },
            tree_inner,
        );
    }
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> std::io::Result<()> {
    loop {
        app.poll_loader();
        app.tick();

        terminal.draw(|frame| {
            draw_ui(frame, app);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    // The terminal is busy drawing; only log when a file is given
    init_logging(&args, false).context("failed to open log file")?;

    let params = args.view_params()?;
    if args.dump {
        let path = args
            .file_path
            .as_ref()
            .context("--dump needs an input FILE")?;
        let outcome = TreeBuilder::build(&load_rows(path)?);
        println!("{}", outcome.tree.to_json_pretty()?);
        return Ok(());
    }

    let mut app = App::new(params);
    if let Some(path) = &args.file_path {
        app.start_load(path.clone());
        if args.watch {
            app.loader.watch(path)?;
        }
    }

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app_result.map_err(Into::into)
}
