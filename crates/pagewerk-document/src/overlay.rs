// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paint pass — composites a page's annotations (converted Document → Raster)
// and the in-progress shape (already in Raster space) over the page bitmap.
//
// Signature images are decoded once per annotation and kept until the cache
// is cleared; an annotation's image never changes after it is created.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use pagewerk_core::config::AppConfig;
use pagewerk_core::{
    Annotation, AnnotationId, AnnotationKind, Color, CoordinateTransform, ImageRef, MarkupStyle,
    Point, Rect, RedactionFill, Space,
};
use tracing::{debug, warn};

use crate::canvas::{self, LineCap};

/// Shape being drawn, in raster pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Markup { rect: Rect, style: MarkupStyle },
    Redaction { rect: Rect, fill: RedactionFill },
    /// Placement box for a text or signature annotation.
    Frame { rect: Rect },
    Stroke {
        points: Vec<Point>,
        color: Color,
        /// Width in raster pixels.
        width: f64,
    },
}

const FRAME_COLOR: Color = Color::rgb(0x33, 0x66, 0xcc);

/// Text leading as a multiple of the font size, as in the baked document.
const LINE_SPACING: f64 = 1.2;

/// Decoded signature images by annotation. `None` records an image that
/// could not be read, so the failure is logged once.
type SignatureCache = HashMap<AnnotationId, Option<Arc<RgbaImage>>>;

/// Paints annotations onto a copy of the page bitmap.
///
/// Clones share the signature cache.
#[derive(Debug, Clone)]
pub struct OverlayPainter {
    highlight_alpha: f64,
    /// Underline and strikeout thickness in raster pixels.
    markup_line_px: f64,
    signatures: Arc<Mutex<SignatureCache>>,
}

impl Default for OverlayPainter {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl OverlayPainter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            highlight_alpha: config.bake.highlight_alpha,
            markup_line_px: 2.0,
            signatures: Arc::default(),
        }
    }

    /// Forget decoded signature images, e.g. when a new document is opened.
    pub fn clear_cache(&self) {
        self.signatures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of signature images currently decoded.
    pub fn cached_signatures(&self) -> usize {
        self.signatures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|image| image.is_some())
            .count()
    }

    /// Composite `annotations` and `preview` over `base`.
    pub fn paint(
        &self,
        base: &RgbaImage,
        annotations: &[Annotation],
        preview: Option<&Preview>,
        transform: &CoordinateTransform,
    ) -> RgbaImage {
        let mut canvas = base.clone();
        for annotation in annotations {
            self.paint_annotation(&mut canvas, annotation, transform);
        }
        if let Some(preview) = preview {
            self.paint_preview(&mut canvas, preview);
        }
        canvas
    }

    fn paint_annotation(
        &self,
        canvas: &mut RgbaImage,
        annotation: &Annotation,
        transform: &CoordinateTransform,
    ) {
        let to_raster = |r: &Rect| transform.convert_rect(*r, Space::Document, Space::Raster);
        match annotation.kind() {
            AnnotationKind::Markup { rect, style, color } => {
                self.paint_markup(canvas, to_raster(rect), *style, *color);
            }
            AnnotationKind::Ink {
                strokes,
                color,
                width,
            } => {
                let px = transform.convert_length(*width, Space::Document, Space::Raster);
                for stroke in strokes {
                    let points: Vec<Point> = stroke
                        .iter()
                        .map(|p| transform.convert_point(*p, Space::Document, Space::Raster))
                        .collect();
                    canvas::stroke_polyline(canvas, &points, *color, 1.0, px, LineCap::Round);
                }
            }
            AnnotationKind::Redaction { rect, fill } => {
                canvas::fill_rect(canvas, to_raster(rect), fill.color(), 1.0);
            }
            AnnotationKind::Text {
                rect,
                text,
                font_size,
                color,
            } => {
                let r = to_raster(rect);
                let size = transform.convert_length(*font_size, Space::Document, Space::Raster);
                for (i, line) in text.lines().enumerate() {
                    let origin = Point::new(r.left, r.top + i as f64 * size * LINE_SPACING);
                    canvas::draw_text(canvas, line, origin, size, *color, 1.0);
                }
            }
            AnnotationKind::Signature { rect, image } => {
                let r = to_raster(rect);
                match self.signature(annotation.id(), image) {
                    Some(img) => canvas::draw_image_in_rect(canvas, &img, r),
                    None => canvas::stroke_rect(canvas, r, FRAME_COLOR, 1.0),
                }
            }
        }
    }

    fn signature(&self, id: AnnotationId, image: &ImageRef) -> Option<Arc<RgbaImage>> {
        let mut cache = self.signatures.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(id)
            .or_insert_with(|| {
                let decoded = image
                    .read()
                    .ok()
                    .and_then(|bytes| image::load_from_memory(&bytes).ok())
                    .map(|img| Arc::new(img.to_rgba8()));
                match &decoded {
                    Some(img) => debug!(%id, width = img.width(), height = img.height(), "signature decoded"),
                    None => warn!(%id, "signature image unavailable for preview"),
                }
                decoded
            })
            .clone()
    }

    fn paint_preview(&self, canvas: &mut RgbaImage, preview: &Preview) {
        match preview {
            Preview::Markup { rect, style } => {
                self.paint_markup(canvas, *rect, *style, style.default_color());
            }
            Preview::Redaction { rect, fill } => {
                canvas::fill_rect(canvas, *rect, fill.color(), 1.0);
            }
            Preview::Frame { rect } => {
                canvas::stroke_rect(canvas, *rect, FRAME_COLOR, 2.0);
            }
            Preview::Stroke {
                points,
                color,
                width,
            } => {
                canvas::stroke_polyline(canvas, points, *color, 1.0, *width, LineCap::Round);
            }
        }
    }

    fn paint_markup(&self, canvas: &mut RgbaImage, rect: Rect, style: MarkupStyle, color: Color) {
        match style {
            MarkupStyle::Highlight => {
                canvas::fill_rect(canvas, rect, color, self.highlight_alpha);
            }
            MarkupStyle::Underline | MarkupStyle::Strikeout => {
                let y = if style == MarkupStyle::Underline {
                    rect.bottom
                } else {
                    rect.center().y
                };
                let line = [Point::new(rect.left, y), Point::new(rect.right, y)];
                canvas::stroke_polyline(canvas, &line, color, 1.0, self.markup_line_px, LineCap::Butt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(300, 300, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn redaction_is_opaque_at_raster_position() {
        let t = CoordinateTransform::default();
        let ann = Annotation::new(
            0,
            AnnotationKind::Redaction {
                rect: Rect::new(10.0, 10.0, 110.0, 40.0),
                fill: RedactionFill::Black,
            },
        );
        let out = OverlayPainter::default().paint(&blank(), &[ann], None, &t);
        // Document (60, 25) is raster (125, 52.08).
        assert_eq!(out.get_pixel(125, 52).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(10, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn highlight_is_translucent_yellow() {
        let t = CoordinateTransform::default();
        let ann = Annotation::new(
            0,
            AnnotationKind::Markup {
                rect: Rect::new(10.0, 10.0, 110.0, 40.0),
                style: MarkupStyle::Highlight,
                color: Color::YELLOW,
            },
        );
        let out = OverlayPainter::default().paint(&blank(), &[ann], None, &t);
        let px = out.get_pixel(125, 52).0;
        assert_eq!(px[0], 255);
        assert_eq!(px[1], 255);
        assert!(px[2] > 150 && px[2] < 200, "blue channel {}", px[2]);
    }

    #[test]
    fn base_bitmap_is_not_modified() {
        let base = blank();
        let preview = Preview::Redaction {
            rect: Rect::new(0.0, 0.0, 50.0, 50.0),
            fill: RedactionFill::Black,
        };
        let out = OverlayPainter::default().paint(&base, &[], Some(&preview), &CoordinateTransform::default());
        assert_eq!(out.get_pixel(25, 25).0, [0, 0, 0, 255]);
        assert_eq!(base.get_pixel(25, 25).0, [255, 255, 255, 255]);
    }

    #[test]
    fn stroke_preview_in_raster_space() {
        let preview = Preview::Stroke {
            points: vec![Point::new(20.0, 100.0), Point::new(200.0, 100.0)],
            color: Color::RED,
            width: 4.0,
        };
        let out = OverlayPainter::default().paint(&blank(), &[], Some(&preview), &CoordinateTransform::default());
        assert_eq!(out.get_pixel(100, 100).0, [255, 0, 0, 255]);
    }

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(4, 4, Rgba(color))
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn text_is_drawn_as_glyphs_in_its_colour() {
        let t = CoordinateTransform::default();
        let ann = Annotation::new(
            0,
            AnnotationKind::Text {
                rect: Rect::new(10.0, 10.0, 130.0, 60.0),
                text: "HI\nHI".into(),
                font_size: 20.0,
                color: Color::BLUE,
            },
        );
        let out = OverlayPainter::default().paint(&blank(), &[ann], None, &t);
        let blue = |x0: u32, x1: u32, y0: u32, y1: u32| {
            (x0..x1).any(|x| (y0..y1).any(|y| out.get_pixel(x, y).0 == [0, 0, 255, 255]))
        };
        // 20 document units are 41.7 raster px; the box starts at raster (20.8, 20.8).
        assert!(blue(20, 80, 20, 62), "first line");
        assert!(blue(20, 80, 71, 112), "second line");
        assert!(!blue(0, 300, 0, 20), "nothing above the box");
        // Glyph strokes leave gaps: the box is not filled.
        assert_ne!(out.get_pixel(30, 24).0, [0, 0, 255, 255]);
    }

    #[test]
    fn signature_is_decoded_once_and_reused() {
        let t = CoordinateTransform::default();
        let ann = Annotation::new(
            0,
            AnnotationKind::Signature {
                rect: Rect::new(10.0, 10.0, 60.0, 40.0),
                image: ImageRef::encoded(png([255, 0, 0, 255])),
            },
        );
        let painter = OverlayPainter::default();
        let shared = painter.clone();
        let first = painter.paint(&blank(), std::slice::from_ref(&ann), None, &t);
        assert_eq!(painter.cached_signatures(), 1);
        let second = shared.paint(&blank(), std::slice::from_ref(&ann), None, &t);
        assert_eq!(shared.cached_signatures(), 1);
        assert_eq!(first, second);
        assert_eq!(first.get_pixel(70, 50).0, [255, 0, 0, 255]);

        painter.clear_cache();
        assert_eq!(shared.cached_signatures(), 0);
    }

    #[test]
    fn unreadable_signature_shows_frame() {
        let ann = Annotation::new(
            0,
            AnnotationKind::Signature {
                rect: Rect::new(10.0, 10.0, 60.0, 40.0),
                image: ImageRef::encoded(vec![1u8, 2, 3]),
            },
        );
        let painter = OverlayPainter::default();
        let out = painter.paint(&blank(), &[ann], None, &CoordinateTransform::default());
        assert_eq!(out.get_pixel(70, 50).0, [255, 255, 255, 255]);
        assert_eq!(painter.cached_signatures(), 0);
    }
}
