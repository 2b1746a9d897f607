// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coordinate transforms between the three spaces the editor works in:
//
//   Display  — screen pixels, moved by pan and zoom
//   Raster   — pixels of the fixed-DPI page bitmap
//   Document — resolution-independent page units (PDF points)
//
// Raster is the hub: Display maps to it through the viewport matrix and
// Document maps to it through one fixed DPI ratio. Both mappings are affine
// with a strictly positive scale, so every conversion is invertible.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{InteractionConfig, RenderConfig};
use crate::error::{PagewerkError, Result};
use crate::geometry::{Point, Rect};

/// One of the three coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    Display,
    Raster,
    Document,
}

/// Pan and zoom of the page bitmap inside the view.
///
/// `display = raster * scale + pan`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: f64,
    pan: Point,
    min_scale: f64,
    max_scale: f64,
}

impl Viewport {
    pub fn new(min_scale: f64, max_scale: f64) -> Self {
        Self {
            scale: 1.0,
            pan: Point::default(),
            min_scale,
            max_scale,
        }
    }

    pub fn from_config(config: &InteractionConfig) -> Self {
        Self::new(config.min_scale, config.max_scale)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn scale_limits(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    /// Replace the matrix. Zero, negative and non-finite scales are rejected
    /// so that the mapping always stays invertible.
    pub fn set(&mut self, scale: f64, pan: Point) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PagewerkError::InvalidTransform(format!(
                "scale must be finite and positive, got {scale}"
            )));
        }
        if !pan.is_finite() {
            return Err(PagewerkError::InvalidTransform(format!(
                "pan must be finite, got ({}, {})",
                pan.x, pan.y
            )));
        }
        self.scale = scale;
        self.pan = pan;
        Ok(())
    }

    /// Multiply the scale by `factor`, keeping the display point `focus`
    /// fixed. The resulting scale is clamped to the configured limits.
    /// Returns `false` when nothing changed.
    pub fn zoom_about(&mut self, factor: f64, focus: Point) -> bool {
        if !(factor.is_finite() && factor > 0.0) || !focus.is_finite() {
            return false;
        }
        let target = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        if (target - self.scale).abs() < f64::EPSILON {
            return false;
        }
        let effective = target / self.scale;
        self.pan = Point::new(
            focus.x - (focus.x - self.pan.x) * effective,
            focus.y - (focus.y - self.pan.y) * effective,
        );
        self.scale = target;
        true
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.pan = Point::new(self.pan.x + dx, self.pan.y + dy);
        }
    }

    /// Scale a `content_w`×`content_h` bitmap to fit a `view_w`×`view_h`
    /// view, centred. A zero-sized view or bitmap leaves the viewport
    /// untouched and returns `false`.
    pub fn fit(&mut self, content_w: f64, content_h: f64, view_w: f64, view_h: f64) -> bool {
        if !(content_w > 0.0 && content_h > 0.0 && view_w > 0.0 && view_h > 0.0) {
            return false;
        }
        let scale = (view_w / content_w).min(view_h / content_h);
        let pan = Point::new(
            (view_w - content_w * scale) / 2.0,
            (view_h - content_h * scale) / 2.0,
        );
        debug!(scale, pan_x = pan.x, pan_y = pan.y, "viewport fitted");
        self.set(scale, pan).is_ok()
    }

    pub fn display_to_raster(&self, p: Point) -> Point {
        Point::new((p.x - self.pan.x) / self.scale, (p.y - self.pan.y) / self.scale)
    }

    pub fn raster_to_display(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.pan.x, p.y * self.scale + self.pan.y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_config(&InteractionConfig::default())
    }
}

/// Converts points, rects and lengths between [`Space`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    /// Document units per raster pixel.
    raster_to_document: f64,
    viewport: Viewport,
}

impl CoordinateTransform {
    pub fn new(raster_to_document: f64, viewport: Viewport) -> Result<Self> {
        if !(raster_to_document.is_finite() && raster_to_document > 0.0) {
            return Err(PagewerkError::InvalidTransform(format!(
                "raster to document factor must be finite and positive, got {raster_to_document}"
            )));
        }
        Ok(Self {
            raster_to_document,
            viewport,
        })
    }

    pub fn from_config(render: &RenderConfig, interaction: &InteractionConfig) -> Result<Self> {
        Self::new(render.raster_to_document(), Viewport::from_config(interaction))
    }

    pub fn raster_to_document(&self) -> f64 {
        self.raster_to_document
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn convert_point(&self, p: Point, from: Space, to: Space) -> Point {
        if from == to {
            return p;
        }
        let raster = match from {
            Space::Raster => p,
            Space::Display => self.viewport.display_to_raster(p),
            Space::Document => Point::new(p.x / self.raster_to_document, p.y / self.raster_to_document),
        };
        match to {
            Space::Raster => raster,
            Space::Display => self.viewport.raster_to_display(raster),
            Space::Document => Point::new(
                raster.x * self.raster_to_document,
                raster.y * self.raster_to_document,
            ),
        }
    }

    /// Convert both corners and re-normalise.
    pub fn convert_rect(&self, r: Rect, from: Space, to: Space) -> Rect {
        Rect::from_points(
            self.convert_point(r.top_left(), from, to),
            self.convert_point(r.bottom_right(), from, to),
        )
    }

    /// Convert a distance (stroke width, font size).
    pub fn convert_length(&self, len: f64, from: Space, to: Space) -> f64 {
        len * self.unit(to) / self.unit(from)
    }

    /// Size of one raster pixel expressed in `space`.
    fn unit(&self, space: Space) -> f64 {
        match space {
            Space::Raster => 1.0,
            Space::Display => self.viewport.scale,
            Space::Document => self.raster_to_document,
        }
    }
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            raster_to_document: RenderConfig::default().raster_to_document(),
            viewport: Viewport::default(),
        }
    }
}
