// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagewerk editor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationId(pub Uuid);

impl AnnotationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnnotationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 8-bit sRGB colour with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Channels scaled to `0.0..=1.0`, as PDF colour operators expect.
    pub fn rgb_unit(&self) -> [f64; 3] {
        [
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        ]
    }
}

/// Size of a page in document units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Authoring tools selectable in the editor.
///
/// `None` means navigation: pan, zoom, fling and double-tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    None,
    Highlight,
    Underline,
    Strikeout,
    Pen,
    RedactBlack,
    RedactWhite,
    Text,
    Signature,
}

impl Tool {
    /// Whether pointer input draws instead of navigating.
    pub fn is_drawing(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Freehand tools accumulate points rather than a rect.
    pub fn is_freehand(&self) -> bool {
        matches!(self, Self::Pen)
    }

    /// Tools whose finalize defers to a collaborator for content.
    pub fn needs_content(&self) -> bool {
        matches!(self, Self::Text | Self::Signature)
    }
}

/// Active tool, colour and stroke width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    pub tool: Tool,
    pub color: Color,
    /// Pen width in raster pixels.
    pub stroke_width: f64,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: Tool::None,
            color: Color::BLACK,
            stroke_width: 4.0,
        }
    }
}
