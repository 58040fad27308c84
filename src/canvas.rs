use glam::Vec2;

use crate::render::Viewport;

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 10.0;

/// Pan and zoom state mapping drawing space onto a screen rectangle
#[derive(Debug, Clone)]
pub struct InfiniteCanvas {
    /// Drawing-space point shown at the top-left corner of the screen rect
    pub pan_offset: Vec2,
    /// Zoom level (0.1x to 10x)
    pub zoom_level: f32,
    /// Screen rectangle the canvas paints into
    pub screen_rect: Rect,
}

impl InfiniteCanvas {
    pub fn new(screen_rect: Rect) -> Self {
        Self {
            pan_offset: Vec2::ZERO,
            zoom_level: 1.0,
            screen_rect,
        }
    }

    pub fn update_screen_rect(&mut self, rect: Rect) {
        self.screen_rect = rect;
    }

    /// Show the renderer's viewport at 1:1, origin in the top-left corner
    pub fn fit(&mut self, viewport: &Viewport) {
        self.pan_offset = viewport.origin;
        self.zoom_level = 1.0;
    }

    /// Move by a screen-space delta
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.pan_offset -= screen_delta / self.zoom_level;
    }

    /// Multiply the zoom by `factor`, keeping the drawing point under `pivot` fixed
    pub fn zoom(&mut self, factor: f32, pivot: Vec2) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchored = self.screen_to_world(pivot);
        self.zoom_level = (self.zoom_level * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan_offset = anchored - (pivot - self.screen_rect.min()) / self.zoom_level;
    }

    pub fn world_to_screen(&self, world_pos: Vec2) -> Vec2 {
        (world_pos - self.pan_offset) * self.zoom_level + self.screen_rect.min()
    }

    pub fn screen_to_world(&self, screen_pos: Vec2) -> Vec2 {
        (screen_pos - self.screen_rect.min()) / self.zoom_level + self.pan_offset
    }

    /// Check if a drawing-space position lands on screen (with margin)
    pub fn is_in_viewport(&self, world_pos: Vec2, margin: f32) -> bool {
        let screen_pos = self.world_to_screen(world_pos);
        let rect = &self.screen_rect;

        screen_pos.x >= rect.x - margin
            && screen_pos.x <= rect.x + rect.width + margin
            && screen_pos.y >= rect.y - margin
            && screen_pos.y <= rect.y + rect.height + margin
    }
}

/// Rectangle helper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}
