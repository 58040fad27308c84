use glam::Vec2;

/// Length of every enter/update/exit transition, in seconds
pub const TRANSITION_DURATION: f32 = 0.2;

/// Radius of a settled node marker
pub const NODE_RADIUS: f32 = 5.0;

/// Stand-in for zero on radii and opacities so shapes stay drawable
pub const VANISHING: f32 = 1e-6;

/// Things that can be blended between two states
pub trait Interpolate: Copy {
    fn lerp(&self, to: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Interpolate for Vec2 {
    fn lerp(&self, to: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *to, t)
    }
}

/// Drawable state of a node marker and its label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeVisual {
    /// Screen-space centre
    pub position: Vec2,
    pub radius: f32,
    pub opacity: f32,
}

impl NodeVisual {
    pub fn settled(position: Vec2) -> Self {
        Self {
            position,
            radius: NODE_RADIUS,
            opacity: 1.0,
        }
    }

    /// Collapsed onto a point, used for entering and exiting nodes
    pub fn vanished(position: Vec2) -> Self {
        Self {
            position,
            radius: VANISHING,
            opacity: VANISHING,
        }
    }
}

impl Interpolate for NodeVisual {
    fn lerp(&self, to: &Self, t: f32) -> Self {
        Self {
            position: Interpolate::lerp(&self.position, &to.position, t),
            radius: Interpolate::lerp(&self.radius, &to.radius, t),
            opacity: Interpolate::lerp(&self.opacity, &to.opacity, t),
        }
    }
}

/// Drawable state of a link: both screen-space endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkVisual {
    pub source: Vec2,
    pub target: Vec2,
}

impl LinkVisual {
    /// Degenerate link sitting on a single point
    pub fn collapsed(at: Vec2) -> Self {
        Self {
            source: at,
            target: at,
        }
    }
}

impl Interpolate for LinkVisual {
    fn lerp(&self, to: &Self, t: f32) -> Self {
        Self {
            source: Interpolate::lerp(&self.source, &to.source, t),
            target: Interpolate::lerp(&self.target, &to.target, t),
        }
    }
}

/// Start and end of one element's transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween<T> {
    pub from: T,
    pub to: T,
}

impl<T: Interpolate> Tween<T> {
    pub fn new(from: T, to: T) -> Self {
        Self { from, to }
    }

    pub fn at(&self, progress: f32) -> T {
        if progress <= 0.0 {
            self.from
        } else if progress >= 1.0 {
            self.to
        } else {
            self.from.lerp(&self.to, progress)
        }
    }
}

/// Performance tier based on element count
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationTier {
    /// Up to 1000 elements: timed transitions
    Full,
    /// More than 1000 elements: no animation (instant snap)
    Skip,
}

impl AnimationTier {
    pub fn from_item_count(count: usize) -> Self {
        if count > 1000 {
            Self::Skip
        } else {
            Self::Full
        }
    }
}

/// d3's default transition easing
pub fn ease_cubic_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// Clock shared by every element of a render pass
pub struct LayoutAnimator {
    elapsed: f32,
    duration: f32,
    pub is_animating: bool,
    pub tier: AnimationTier,
}

impl Default for LayoutAnimator {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            duration: TRANSITION_DURATION,
            is_animating: false,
            tier: AnimationTier::Full,
        }
    }
}

impl LayoutAnimator {
    /// Restart the clock for a new pass. Large passes snap immediately.
    pub fn start(&mut self, item_count: usize) {
        self.tier = AnimationTier::from_item_count(item_count);
        self.elapsed = 0.0;
        self.is_animating = self.tier == AnimationTier::Full && item_count > 0;
        if !self.is_animating {
            self.elapsed = self.duration;
        }
    }

    /// Advance by `dt` seconds. Returns true while still animating.
    pub fn update(&mut self, dt: f32) -> bool {
        if !self.is_animating {
            return false;
        }

        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        if self.elapsed >= self.duration {
            self.is_animating = false;
        }

        self.is_animating
    }

    /// Eased progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ease_cubic_in_out(self.elapsed / self.duration)
    }

    /// Snap to the end state (for user interaction during animation)
    pub fn finish_immediately(&mut self) {
        self.elapsed = self.duration;
        self.is_animating = false;
    }
}
