// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signature pad — pointer-driven ink capture on a transparent canvas,
// exported as a PNG cropped to the ink with a fixed margin.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{Color, ImageRef, Point, StrokeSmoother};
use tracing::{debug, instrument};

use crate::canvas::{self, LineCap};

/// Transparent margin kept around the ink on export, in pixels.
pub const EXPORT_PADDING: u32 = 10;

/// Freehand signature capture surface.
#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    color: Color,
    stroke_width: f64,
    smoothing_steps: usize,
    strokes: Vec<Vec<Point>>,
    current: Option<StrokeSmoother>,
}

impl SignaturePad {
    /// A `width` × `height` pad drawing 4 px black ink.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: Color::BLACK,
            stroke_width: 4.0,
            smoothing_steps: 4,
            strokes: Vec::new(),
            current: None,
        }
    }

    pub fn with_ink(mut self, color: Color, stroke_width: f64) -> Self {
        self.color = color;
        self.stroke_width = stroke_width;
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    // -- Pointer input --------------------------------------------------------

    pub fn pointer_down(&mut self, at: Point) {
        self.end_stroke();
        let mut smoother = StrokeSmoother::new(self.smoothing_steps);
        smoother.push(at);
        self.current = Some(smoother);
    }

    pub fn pointer_move(&mut self, at: Point) {
        if let Some(smoother) = self.current.as_mut() {
            smoother.push(at);
        }
    }

    pub fn pointer_up(&mut self, at: Point) {
        self.pointer_move(at);
        self.end_stroke();
    }

    fn end_stroke(&mut self) {
        if let Some(smoother) = self.current.take() {
            let points = smoother.finish();
            if !points.is_empty() {
                self.strokes.push(points);
            }
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.current = None;
    }

    pub fn has_signature(&self) -> bool {
        !self.strokes.is_empty()
            || self
                .current
                .as_ref()
                .is_some_and(|s| s.sample_count() > 0)
    }

    // -- Output ---------------------------------------------------------------

    /// The full pad, ink on a transparent background.
    pub fn render(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        let in_progress = self.current.as_ref().map(StrokeSmoother::points);
        for stroke in self.strokes.iter().map(Vec::as_slice).chain(in_progress) {
            canvas::stroke_polyline(
                &mut image,
                stroke,
                self.color,
                1.0,
                self.stroke_width,
                LineCap::Round,
            );
        }
        image
    }

    /// PNG of the ink cropped to its bounds plus [`EXPORT_PADDING`], or
    /// `None` when nothing has been drawn.
    #[instrument(skip(self))]
    pub fn export_png(&self) -> Result<Option<Vec<u8>>> {
        let image = self.render();
        let Some((x0, y0, x1, y1)) = ink_bounds(&image) else {
            return Ok(None);
        };

        let left = x0.saturating_sub(EXPORT_PADDING);
        let top = y0.saturating_sub(EXPORT_PADDING);
        let right = (x1 + EXPORT_PADDING).min(image.width() - 1);
        let bottom = (y1 + EXPORT_PADDING).min(image.height() - 1);
        let cropped =
            image::imageops::crop_imm(&image, left, top, right - left + 1, bottom - top + 1)
                .to_image();

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(cropped)
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|err| PagewerkError::ImageError(format!("PNG encode failed: {}", err)))?;
        let bytes = out.into_inner();
        debug!(bytes_len = bytes.len(), "signature exported");
        Ok(Some(bytes))
    }

    /// [`export_png`](Self::export_png) wrapped as an in-memory image reference.
    pub fn export_image_ref(&self) -> Result<Option<ImageRef>> {
        Ok(self.export_png()?.map(ImageRef::encoded))
    }
}

/// Inclusive pixel bounds of every non-transparent pixel.
fn ink_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    image
        .enumerate_pixels()
        .filter(|(_, _, px)| px.0[3] > 0)
        .fold(None, |acc, (x, y, _)| match acc {
            None => Some((x, y, x, y)),
            Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scribble(pad: &mut SignaturePad) {
        pad.pointer_down(Point::new(50.0, 50.0));
        pad.pointer_move(Point::new(70.0, 60.0));
        pad.pointer_move(Point::new(90.0, 55.0));
        pad.pointer_up(Point::new(110.0, 70.0));
    }

    #[test]
    fn empty_pad_exports_nothing() {
        let pad = SignaturePad::new(200, 100);
        assert!(!pad.has_signature());
        assert!(pad.export_png().expect("export").is_none());
    }

    #[test]
    fn export_is_cropped_with_padding() {
        let mut pad = SignaturePad::new(300, 200);
        scribble(&mut pad);
        assert!(pad.has_signature());

        let png = pad.export_png().expect("export").expect("ink present");
        let img = image::load_from_memory(&png).expect("decode").to_rgba8();
        let (ink_x0, ink_y0, ink_x1, ink_y1) = ink_bounds(&pad.render()).expect("ink");
        assert_eq!(img.width(), ink_x1 - ink_x0 + 1 + 2 * EXPORT_PADDING);
        assert_eq!(img.height(), ink_y1 - ink_y0 + 1 + 2 * EXPORT_PADDING);
        // Corners are transparent margin.
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(img.width() - 1, img.height() - 1).0[3], 0);
    }

    #[test]
    fn padding_is_clamped_at_pad_edges() {
        let mut pad = SignaturePad::new(100, 100);
        pad.pointer_down(Point::new(2.0, 2.0));
        pad.pointer_up(Point::new(30.0, 2.0));
        let png = pad.export_png().expect("export").expect("ink");
        let img = image::load_from_memory(&png).expect("decode");
        assert!(img.width() <= 100 && img.height() <= 100);
    }

    #[test]
    fn clear_discards_ink() {
        let mut pad = SignaturePad::new(200, 100);
        scribble(&mut pad);
        pad.clear();
        assert!(!pad.has_signature());
        assert!(pad.export_image_ref().expect("export").is_none());
    }

    #[test]
    fn background_stays_transparent() {
        let mut pad = SignaturePad::new(200, 100).with_ink(Color::BLUE, 6.0);
        scribble(&mut pad);
        let img = pad.render();
        assert_eq!(img.get_pixel(5, 95).0[3], 0);
        assert_eq!(img.get_pixel(50, 50).0, [0, 0, 255, 255]);
    }
}
