// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drawing primitives on RGBA bitmaps: source-over blending, polygon fill by
// scanline, thick polylines through an `imageproc` coverage mask, and
// affine image placement, and text in a built-in 8x8 bitmap face. Shared by
// the content-stream rasterizer, the annotation overlay and the signature pad.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as IPoint;
use pagewerk_core::{Color, Point, Rect};

/// Fill rule for [`fill_polygon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// Line end style for [`stroke_polyline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
}

/// Source-over blend of `color` at `opacity` onto one pixel.
pub fn blend_pixel(canvas: &mut RgbaImage, x: u32, y: u32, color: Color, opacity: f64) {
    let alpha = (color.a as f64 / 255.0) * opacity.clamp(0.0, 1.0);
    if alpha <= 0.0 || x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let dst = canvas.get_pixel_mut(x, y);
    let dst_a = dst.0[3] as f64 / 255.0;
    let out_a = alpha + dst_a * (1.0 - alpha);
    let mix = |src: u8, dst: u8| -> u8 {
        if out_a <= 0.0 {
            return 0;
        }
        let v = (src as f64 * alpha + dst as f64 * dst_a * (1.0 - alpha)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        mix(color.r, dst.0[0]),
        mix(color.g, dst.0[1]),
        mix(color.b, dst.0[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// Fill an axis-aligned rect (pixel centres inside the rect are painted).
pub fn fill_rect(canvas: &mut RgbaImage, rect: Rect, color: Color, opacity: f64) {
    let Some((x0, y0, x1, y1)) = pixel_span(canvas, rect) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(canvas, x, y, color, opacity);
        }
    }
}

/// Outline an axis-aligned rect with a line of `width` pixels.
pub fn stroke_rect(canvas: &mut RgbaImage, rect: Rect, color: Color, width: f64) {
    let corners = [
        rect.top_left(),
        Point::new(rect.right, rect.top),
        rect.bottom_right(),
        Point::new(rect.left, rect.bottom),
        rect.top_left(),
    ];
    stroke_polyline(canvas, &corners, color, 1.0, width, LineCap::Butt);
}

/// Fill a set of closed polygons with scanline coverage at pixel centres.
///
/// Every pixel is painted at most once, so translucent fills do not
/// double-blend where subpaths overlap.
pub fn fill_polygon(
    canvas: &mut RgbaImage,
    subpaths: &[Vec<Point>],
    rule: FillRule,
    color: Color,
    opacity: f64,
) {
    let Some(bounds) = Rect::bounding(subpaths.iter().flatten().copied()) else {
        return;
    };
    let Some((x0, y0, x1, y1)) = pixel_span(canvas, bounds.inflate(1.0)) else {
        return;
    };

    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for y in y0..y1 {
        let sy = y as f64 + 0.5;
        crossings.clear();
        for path in subpaths.iter().filter(|p| p.len() >= 2) {
            let closing = (path[path.len() - 1], path[0]);
            let edges = path.windows(2).map(|w| (w[0], w[1])).chain(std::iter::once(closing));
            for (a, b) in edges {
                if a.y == b.y {
                    continue;
                }
                let (lo, hi, dir) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
                if sy < lo.y || sy >= hi.y {
                    continue;
                }
                let t = (sy - lo.y) / (hi.y - lo.y);
                crossings.push((lo.x + t * (hi.x - lo.x), dir));
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            let inside = match rule {
                FillRule::NonZero => winding != 0,
                FillRule::EvenOdd => winding % 2 != 0,
            };
            if !inside {
                continue;
            }
            let start = (pair[0].0 - 0.5).ceil().max(x0 as f64) as u32;
            let end = ((pair[1].0 - 0.5).ceil().max(0.0) as u32).min(x1);
            for x in start..end {
                blend_pixel(canvas, x, y, color, opacity);
            }
        }
    }
}

/// Stroke a polyline `width` pixels wide with round joins.
///
/// Segments are rasterized into a coverage mask first and composited once,
/// so translucent strokes stay uniform where segments overlap.
pub fn stroke_polyline(
    canvas: &mut RgbaImage,
    points: &[Point],
    color: Color,
    opacity: f64,
    width: f64,
    cap: LineCap,
) {
    let Some(bounds) = Rect::bounding(points.iter().copied()) else {
        return;
    };
    let half = (width / 2.0).max(0.5);
    let Some((x0, y0, x1, y1)) = pixel_span(canvas, bounds.inflate(half + 1.0)) else {
        return;
    };

    // Mask covers only the stroke's pixel span; points are shifted into it.
    let mut mask = GrayImage::new(x1 - x0, y1 - y0);
    let shift = |p: Point| Point::new(p.x - x0 as f64, p.y - y0 as f64);
    let on = Luma([255u8]);
    let radius = half.round() as i32;

    if points.len() == 1 {
        if cap == LineCap::Round {
            draw_filled_circle_mut(&mut mask, ipoint_tuple(shift(points[0])), radius.max(1), on);
        }
    } else {
        for (i, seg) in points.windows(2).enumerate() {
            let (a, b) = (shift(seg[0]), shift(seg[1]));
            stroke_segment(&mut mask, a, b, half);
            let is_end = i == 0 || i + 2 == points.len();
            if radius >= 1 && (!is_end || cap == LineCap::Round) {
                draw_filled_circle_mut(&mut mask, ipoint_tuple(b), radius, on);
                if i == 0 && cap == LineCap::Round {
                    draw_filled_circle_mut(&mut mask, ipoint_tuple(a), radius, on);
                }
            }
        }
    }

    composite_mask(canvas, &mask, (x0, y0, x1, y1), color, opacity);
}

/// Draw `image` into the parallelogram spanned by `origin`, `x_axis` and
/// `y_axis` (the positions of image pixel (0,0), (w,0) and (0,h) on the
/// canvas), nearest-neighbour, honouring the image's own alpha.
pub fn draw_image(
    canvas: &mut RgbaImage,
    image: &RgbaImage,
    origin: Point,
    x_axis: Point,
    y_axis: Point,
    opacity: f64,
) {
    let (iw, ih) = (image.width() as f64, image.height() as f64);
    if iw == 0.0 || ih == 0.0 {
        return;
    }
    let ux = Point::new(x_axis.x - origin.x, x_axis.y - origin.y);
    let uy = Point::new(y_axis.x - origin.x, y_axis.y - origin.y);
    let det = ux.x * uy.y - ux.y * uy.x;
    if det.abs() < 1e-9 {
        return;
    }
    let far = Point::new(origin.x + ux.x + uy.x, origin.y + ux.y + uy.y);
    let Some(bounds) = Rect::bounding([origin, x_axis, y_axis, far]) else {
        return;
    };
    let Some((x0, y0, x1, y1)) = pixel_span(canvas, bounds) else {
        return;
    };

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - origin.x;
            let dy = y as f64 + 0.5 - origin.y;
            let u = (dx * uy.y - dy * uy.x) / det;
            let v = (ux.x * dy - ux.y * dx) / det;
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let px = image.get_pixel((u * iw) as u32, (v * ih) as u32);
            let color = Color {
                r: px.0[0],
                g: px.0[1],
                b: px.0[2],
                a: px.0[3],
            };
            blend_pixel(canvas, x, y, color, opacity);
        }
    }
}

/// Draw `image` stretched over an axis-aligned rect.
pub fn draw_image_in_rect(canvas: &mut RgbaImage, image: &RgbaImage, rect: Rect) {
    draw_image(
        canvas,
        image,
        rect.top_left(),
        Point::new(rect.right, rect.top),
        Point::new(rect.left, rect.bottom),
        1.0,
    );
}

// -- Text ---------------------------------------------------------------------

/// Horizontal advance of one glyph of the built-in face, per unit of size.
pub const GLYPH_ADVANCE: f64 = 0.6;

/// Cells `(column, row)` set in the 8x8 bitmap of `ch`, row 0 on top.
/// Characters the face lacks are drawn as `?`.
pub fn glyph_cells(ch: char) -> impl Iterator<Item = (u32, u32)> {
    let rows = BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8]);
    (0..8u32).flat_map(move |row| {
        let bits = rows[row as usize];
        (0..8u32)
            .filter(move |col| (bits >> col) & 1 == 1)
            .map(move |col| (col, row))
    })
}

/// Draw one line of `text` with its top-left corner at `origin`, glyphs
/// `size` pixels tall. Returns the pen position after the last glyph.
pub fn draw_text(
    canvas: &mut RgbaImage,
    text: &str,
    origin: Point,
    size: f64,
    color: Color,
    opacity: f64,
) -> f64 {
    let (cell_w, cell_h) = (size * GLYPH_ADVANCE / 8.0, size / 8.0);
    let mut pen = origin.x;
    for ch in text.chars() {
        for (col, row) in glyph_cells(ch) {
            let left = pen + col as f64 * cell_w;
            let top = origin.y + row as f64 * cell_h;
            fill_rect(canvas, Rect::new(left, top, left + cell_w, top + cell_h), color, opacity);
        }
        pen += size * GLYPH_ADVANCE;
    }
    pen
}

// -- Helpers ------------------------------------------------------------------

/// Clamp a rect to whole pixel bounds `[x0, x1) × [y0, y1)` inside the canvas.
fn pixel_span(canvas: &RgbaImage, rect: Rect) -> Option<(u32, u32, u32, u32)> {
    if !rect.is_finite() {
        return None;
    }
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let x0 = (rect.left - 0.5).ceil().clamp(0.0, w) as u32;
    let y0 = (rect.top - 0.5).ceil().clamp(0.0, h) as u32;
    let x1 = (rect.right - 0.5).ceil().clamp(0.0, w) as u32;
    let y1 = (rect.bottom - 0.5).ceil().clamp(0.0, h) as u32;
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

fn stroke_segment(mask: &mut GrayImage, a: Point, b: Point, half: f64) {
    let len = a.distance(b);
    let on = Luma([255u8]);
    if len < f64::EPSILON {
        return;
    }
    if half <= 0.75 {
        draw_line_segment_mut(
            mask,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            on,
        );
        return;
    }
    let (nx, ny) = (-(b.y - a.y) / len * half, (b.x - a.x) / len * half);
    let mut quad: Vec<IPoint<i32>> = Vec::with_capacity(4);
    for p in [
        Point::new(a.x + nx, a.y + ny),
        Point::new(b.x + nx, b.y + ny),
        Point::new(b.x - nx, b.y - ny),
        Point::new(a.x - nx, a.y - ny),
    ] {
        let ip = IPoint::new(p.x.round() as i32, p.y.round() as i32);
        if quad.last() != Some(&ip) {
            quad.push(ip);
        }
    }
    while quad.len() > 1 && quad.first() == quad.last() {
        quad.pop();
    }
    if quad.len() >= 3 {
        draw_polygon_mut(mask, &quad, on);
    } else {
        draw_line_segment_mut(
            mask,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            on,
        );
    }
}

fn composite_mask(
    canvas: &mut RgbaImage,
    mask: &GrayImage,
    (x0, y0, x1, y1): (u32, u32, u32, u32),
    color: Color,
    opacity: f64,
) {
    for y in y0..y1 {
        for x in x0..x1 {
            if mask.get_pixel(x - x0, y - y0).0[0] > 0 {
                blend_pixel(canvas, x, y, color, opacity);
            }
        }
    }
}

fn ipoint_tuple(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn opaque_blend_replaces_pixel() {
        let mut c = white(2, 2);
        blend_pixel(&mut c, 1, 1, Color::RED, 1.0);
        assert_eq!(c.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(c.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn half_alpha_blend_mixes() {
        let mut c = white(1, 1);
        blend_pixel(&mut c, 0, 0, Color::BLACK, 0.5);
        let px = c.get_pixel(0, 0).0;
        assert!((127..=128).contains(&px[0]), "got {px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn fill_rect_covers_pixel_centres() {
        let mut c = white(10, 10);
        fill_rect(&mut c, Rect::new(2.0, 2.0, 5.0, 4.0), Color::BLACK, 1.0);
        assert_eq!(c.get_pixel(2, 2).0, [0, 0, 0, 255]);
        assert_eq!(c.get_pixel(4, 3).0, [0, 0, 0, 255]);
        assert_eq!(c.get_pixel(5, 3).0, [255, 255, 255, 255]);
        assert_eq!(c.get_pixel(2, 4).0, [255, 255, 255, 255]);
    }

    /// Even-odd leaves the hole of a nested square unpainted; non-zero with
    /// the same winding fills it.
    #[test]
    fn fill_rules_differ_on_nested_squares() {
        let square = |a: f64, b: f64| {
            vec![
                Point::new(a, a),
                Point::new(b, a),
                Point::new(b, b),
                Point::new(a, b),
            ]
        };
        let paths = vec![square(0.0, 20.0), square(5.0, 15.0)];

        let mut eo = white(20, 20);
        fill_polygon(&mut eo, &paths, FillRule::EvenOdd, Color::BLACK, 1.0);
        assert_eq!(eo.get_pixel(10, 10).0, [255, 255, 255, 255]);
        assert_eq!(eo.get_pixel(2, 10).0, [0, 0, 0, 255]);

        let mut nz = white(20, 20);
        fill_polygon(&mut nz, &paths, FillRule::NonZero, Color::BLACK, 1.0);
        assert_eq!(nz.get_pixel(10, 10).0, [0, 0, 0, 255]);
    }

    #[test]
    fn thick_stroke_paints_along_line() {
        let mut c = white(40, 20);
        let line = [Point::new(5.0, 10.0), Point::new(35.0, 10.0)];
        stroke_polyline(&mut c, &line, Color::BLUE, 1.0, 6.0, LineCap::Round);
        assert_eq!(c.get_pixel(20, 10).0, [0, 0, 255, 255]);
        assert_eq!(c.get_pixel(20, 12).0, [0, 0, 255, 255]);
        assert_eq!(c.get_pixel(20, 18).0, [255, 255, 255, 255]);
    }

    #[test]
    fn translucent_stroke_does_not_double_blend_at_joins() {
        let mut c = white(40, 40);
        let path = [
            Point::new(5.0, 20.0),
            Point::new(20.0, 20.0),
            Point::new(35.0, 20.0),
        ];
        stroke_polyline(&mut c, &path, Color::BLACK, 0.5, 8.0, LineCap::Round);
        assert_eq!(c.get_pixel(20, 20), c.get_pixel(12, 20));
    }

    #[test]
    fn text_is_drawn_left_to_right() {
        let mut c = white(60, 20);
        let end = draw_text(&mut c, "HH", Point::new(2.0, 2.0), 16.0, Color::BLACK, 1.0);
        assert!((end - (2.0 + 2.0 * 16.0 * GLYPH_ADVANCE)).abs() < 1e-9);
        let inked = |x0: u32, x1: u32| {
            (x0..x1).any(|x| (0..20).any(|y| c.get_pixel(x, y).0 == [0, 0, 0, 255]))
        };
        assert!(inked(2, 12), "first glyph");
        assert!(inked(12, 22), "second glyph");
        assert!(!inked(24, 60));
    }

    #[test]
    fn space_has_no_cells_and_unknown_falls_back() {
        assert_eq!(glyph_cells(' ').count(), 0);
        let fallback: Vec<_> = glyph_cells('?').collect();
        assert!(!fallback.is_empty());
        assert_eq!(glyph_cells('\u{2713}').collect::<Vec<_>>(), fallback);
    }

    #[test]
    fn image_stretched_into_rect() {
        let mut c = white(20, 20);
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([0, 0, 0, 0]));
        draw_image_in_rect(&mut c, &img, Rect::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(c.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(c.get_pixel(15, 15).0, [255, 255, 255, 255]);
    }
}
