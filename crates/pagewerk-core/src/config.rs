// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration. Every section has defaults matching the behaviour of
// the shipped viewer, so a missing or partial JSON file is always valid.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{PagewerkError, Result};
use crate::types::Color;

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub render: RenderConfig,
    pub interaction: InteractionConfig,
    pub bake: BakeConfig,
}

/// PDF user space units per inch. Raster scale and the raster to document
/// factor are both derived from it.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Resolution of the page bitmap.
    pub raster_dpi: f64,
    /// Colour the page is cleared to before content is painted.
    pub background: Color,
}

impl RenderConfig {
    /// Factor converting raster pixels to document units (0.48 at 150 DPI).
    pub fn raster_to_document(&self) -> f64 {
        POINTS_PER_INCH / self.raster_dpi
    }

    /// Raster pixels per document unit; the inverse of
    /// [`raster_to_document`](Self::raster_to_document).
    pub fn pixels_per_point(&self) -> f64 {
        self.raster_dpi / POINTS_PER_INCH
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            raster_dpi: 150.0,
            background: Color::WHITE,
        }
    }
}

/// Gesture and finalize policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Minimum width (document units) of markup and redaction rects.
    pub min_markup_width: f64,
    /// Minimum width and height of a text box.
    pub min_text_width: f64,
    pub min_text_height: f64,
    /// Minimum width and height of a signature box.
    pub min_signature_width: f64,
    pub min_signature_height: f64,
    /// Minimum number of raw pointer samples for a pen stroke.
    pub min_ink_samples: usize,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Horizontal velocity (display px/s) above which a fling changes page.
    pub fling_velocity: f64,
    /// Maximum gap between two taps of a double-tap.
    pub double_tap_window_ms: u64,
    /// Maximum distance (display px) between two taps of a double-tap.
    pub double_tap_slop: f64,
    /// Intermediate points emitted per quadratic smoothing segment.
    pub smoothing_steps: usize,
    /// Default pen width in raster pixels.
    pub default_stroke_width: f64,
    /// Default font size of text annotations, in document units.
    pub default_font_size: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_markup_width: 2.0,
            min_text_width: 2.0,
            min_text_height: 2.0,
            min_signature_width: 10.0,
            min_signature_height: 5.0,
            min_ink_samples: 3,
            min_scale: 0.5,
            max_scale: 5.0,
            fling_velocity: 1000.0,
            double_tap_window_ms: 300,
            double_tap_slop: 30.0,
            smoothing_steps: 4,
            default_stroke_width: 4.0,
            default_font_size: 14.0,
        }
    }
}

/// Document bake settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Fill alpha of highlights (80/255 in the on-screen preview).
    pub highlight_alpha: f64,
    /// Line width of underline and strikeout, in document units.
    pub markup_line_width: f64,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            highlight_alpha: 80.0 / 255.0,
            markup_line_width: 1.0,
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file and validate them.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!("configuration loaded");
        Ok(config)
    }

    /// Check the numeric invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        let r = &self.render;
        if !(r.raster_dpi.is_finite() && r.raster_dpi > 0.0) {
            return Err(PagewerkError::Config(format!(
                "raster_dpi must be positive, got {}",
                r.raster_dpi
            )));
        }
        let i = &self.interaction;
        if !(i.min_scale > 0.0 && i.min_scale <= i.max_scale && i.max_scale.is_finite()) {
            return Err(PagewerkError::Config(format!(
                "scale limits must satisfy 0 < min <= max, got {}..{}",
                i.min_scale, i.max_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.bake.highlight_alpha) {
            return Err(PagewerkError::Config(format!(
                "highlight_alpha must be within 0..=1, got {}",
                self.bake.highlight_alpha
            )));
        }
        debug!("configuration valid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_scale_factor_is_048() {
        let cfg = AppConfig::default();
        assert!((cfg.render.raster_to_document() - 0.48).abs() < 1e-12);
    }

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().expect("defaults are valid");
    }

    /// Partial files fill the rest from defaults.
    #[test]
    fn load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "render": {{ "raster_dpi": 300.0 }} }}"#).expect("write");

        let cfg = AppConfig::load(file.path()).expect("load");
        assert_eq!(cfg.render.raster_dpi, 300.0);
        assert!((cfg.render.raster_to_document() - 0.24).abs() < 1e-12);
        assert_eq!(cfg.interaction, InteractionConfig::default());
    }

    /// Files written before the document resolution was fixed at 72 still
    /// load; the old key has no effect.
    #[test]
    fn legacy_document_dpi_key_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "render": {{ "document_dpi": 96.0 }} }}"#).expect("write");

        let cfg = AppConfig::load(file.path()).expect("load");
        assert_eq!(cfg.render, RenderConfig::default());
        assert!((cfg.render.raster_to_document() * cfg.render.pixels_per_point() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_scale_limits_rejected() {
        let mut cfg = AppConfig::default();
        cfg.interaction.min_scale = 6.0;
        assert!(matches!(cfg.validate(), Err(PagewerkError::Config(_))));
    }

    #[test]
    fn zero_dpi_rejected() {
        let mut cfg = AppConfig::default();
        cfg.render.raster_dpi = 0.0;
        assert!(matches!(cfg.validate(), Err(PagewerkError::Config(_))));
    }
}
