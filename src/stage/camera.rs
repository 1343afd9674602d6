//! Camera and world bounds

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::actor::ActorId;

/// Axis-aligned world rectangle (y grows downward, like the scene graph)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Inclusive point containment
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

/// Scrolling 2D camera
#[derive(Debug, Clone)]
pub struct StageCamera {
    /// Top-left corner of the view in world space
    pub scroll: Vec2,
    pub viewport: Vec2,
    pub zoom: f32,
    /// Scroll limits (None = unbounded)
    pub bounds: Option<WorldBounds>,
    /// Actor the camera keeps centred horizontally
    pub follow: Option<ActorId>,
    /// Fade overlay opacity: 0 = clear, 1 = fully faded out
    pub fade: f32,
}

impl StageCamera {
    pub fn new(viewport: Vec2) -> Self {
        Self {
            scroll: Vec2::ZERO,
            viewport,
            zoom: 1.0,
            bounds: None,
            follow: None,
            fade: 0.0,
        }
    }

    /// World-space size of what the camera shows
    pub fn view_size(&self) -> Vec2 {
        self.viewport / self.zoom.max(0.01)
    }

    pub fn left(&self) -> f32 {
        self.scroll.x
    }

    pub fn right_edge(&self) -> f32 {
        self.scroll.x + self.view_size().x
    }

    pub fn center(&self) -> Vec2 {
        self.scroll + self.view_size() / 2.0
    }

    /// Scroll that centres the view on `center`, clamped to the bounds
    pub fn scroll_for_center(&self, center: Vec2) -> Vec2 {
        self.clamped(center - self.view_size() / 2.0)
    }

    pub fn clamp_scroll(&mut self) {
        self.scroll = self.clamped(self.scroll);
    }

    fn clamped(&self, scroll: Vec2) -> Vec2 {
        let Some(bounds) = self.bounds else {
            return scroll;
        };
        let view = self.view_size();
        let max_x = (bounds.right() - view.x).max(bounds.x);
        let max_y = (bounds.bottom() - view.y).max(bounds.y);
        Vec2::new(scroll.x.clamp(bounds.x, max_x), scroll.y.clamp(bounds.y, max_y))
    }

    /// Whether a world x lies within the view widened by `margin` on each side
    pub fn is_visible_x(&self, x: f32, margin: f32) -> bool {
        x >= self.left() - margin && x <= self.right_edge() + margin
    }
}
