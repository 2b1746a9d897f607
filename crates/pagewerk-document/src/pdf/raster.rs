// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterizer — interprets a page's content stream into an RGBA bitmap.
//
// Supported: graphics state (q Q cm w J gs), path construction (m l c v y h
// re), painting (f F f* S s B B* b b* n), device colours (g G rg RG k K and
// numeric sc/scn), ExtGState alpha (ca CA), image XObjects (8-bit Gray, RGB
// or CMYK, Flate or DCT, with SMask), form XObjects, and text showing (Tj TJ
// ' ") with positioning (Td TD Tm T* TL Tc Tw Tf Tr). Glyphs come from the
// built-in bitmap face rather than the document's fonts. Clipping operators
// are skipped.

use image::{imageops, GrayImage, ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{Color, Point};
use tracing::{debug, instrument, warn};

use super::source::{as_dict, as_number, inherited, resolve, PageBox, PdfSource};
use crate::canvas::{self, FillRule, LineCap, GLYPH_ADVANCE};

/// Upper bound on bitmap size, in pixels.
pub(crate) const MAX_BITMAP_PIXELS: u64 = 64_000_000;

/// Produces a bitmap for one page of a document.
///
/// `scale` is raster pixels per document unit, as given by
/// `RenderConfig::pixels_per_point`. The built-in [`ContentRasterizer`]
/// needs no native code; with the `pdfium` feature a PDFium-backed
/// rasterizer with full font support is available behind the same trait.
pub trait Rasterizer: Send + Sync {
    fn rasterize(
        &self,
        source: &PdfSource,
        page_index: usize,
        scale: f64,
        background: Color,
    ) -> Result<RgbaImage>;
}

/// Pixel dimensions of `page_box` at `scale`, or an error when the page is
/// empty or the bitmap would exceed `max_pixels`.
pub(crate) fn bitmap_size(page_box: PageBox, scale: f64, max_pixels: u64) -> Result<(u32, u32)> {
    let (width, height) = (page_box.width() * scale, page_box.height() * scale);
    if !(width >= 1.0 && height >= 1.0) {
        return Err(PagewerkError::ZeroSizedTarget {
            width: page_box.width(),
            height: page_box.height(),
        });
    }
    let (w, h) = (width.round() as u32, height.round() as u32);
    if w as u64 * h as u64 > max_pixels {
        return Err(PagewerkError::ImageError(format!(
            "page bitmap {w}x{h} exceeds the {max_pixels} pixel limit"
        )));
    }
    Ok((w, h))
}

/// Pure-Rust content stream interpreter.
#[derive(Debug, Clone)]
pub struct ContentRasterizer {
    /// Nesting limit for form XObjects.
    max_form_depth: usize,
    max_pixels: u64,
}

impl Default for ContentRasterizer {
    fn default() -> Self {
        Self {
            max_form_depth: 8,
            max_pixels: MAX_BITMAP_PIXELS,
        }
    }
}

impl ContentRasterizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rasterizer for ContentRasterizer {
    #[instrument(skip(self, source, background))]
    fn rasterize(
        &self,
        source: &PdfSource,
        page_index: usize,
        scale: f64,
        background: Color,
    ) -> Result<RgbaImage> {
        let page_box = source.page_box(page_index)?;
        let (w, h) = bitmap_size(page_box, scale, self.max_pixels)?;

        let doc = source.document();
        let page_id = source.page_id(page_index)?;
        let content = doc.get_page_content(page_id).map_err(|err| {
            PagewerkError::SourceUnavailable(format!(
                "cannot read content of page {}: {}",
                page_index, err
            ))
        })?;
        let operations = Content::decode(&content)
            .map_err(|err| {
                PagewerkError::SourceUnavailable(format!(
                    "cannot decode content of page {}: {}",
                    page_index, err
                ))
            })?
            .operations;
        let resources = inherited(doc, page_id, b"Resources").and_then(|o| as_dict(doc, o));

        let mut bitmap = RgbaImage::from_pixel(
            w,
            h,
            Rgba([background.r, background.g, background.b, background.a]),
        );
        let base = Matrix {
            a: scale,
            b: 0.0,
            c: 0.0,
            d: -scale,
            e: -page_box.llx * scale,
            f: page_box.ury * scale,
        };

        let mut painter = Painter {
            doc,
            canvas: &mut bitmap,
            max_depth: self.max_form_depth,
            skipped: 0,
        };
        painter.run(&operations, resources, GraphicsState::new(base), 0);
        debug!(
            width = w,
            height = h,
            operations = operations.len(),
            skipped = painter.skipped,
            "page rasterized"
        );
        Ok(bitmap)
    }
}

// -- Interpreter --------------------------------------------------------------

/// Affine matrix in PDF row-vector convention: `[x y 1] × M`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f64, ty: f64) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    fn from_operands(nums: &[f64]) -> Option<Matrix> {
        match nums {
            [a, b, c, d, e, f] => Some(Matrix {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }

    /// `self` applied first, then `next`.
    fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    fn apply(&self, x: f64, y: f64) -> Point {
        Point::new(
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Geometric mean scale, used for line widths.
    fn scale(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    stroke: Color,
    fill_alpha: f64,
    stroke_alpha: f64,
    line_width: f64,
    cap: LineCap,
    text: TextState,
}

/// Text parameters that persist across `BT … ET` blocks.
#[derive(Debug, Clone)]
struct TextState {
    size: f64,
    leading: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Render modes 3 and 7 paint nothing.
    invisible: bool,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            invisible: false,
        }
    }
}

/// Text and line matrices of the current `BT … ET` block.
#[derive(Debug, Clone, Copy)]
struct TextObject {
    matrix: Matrix,
    line: Matrix,
}

impl TextObject {
    const START: TextObject = TextObject {
        matrix: Matrix::IDENTITY,
        line: Matrix::IDENTITY,
    };

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line = Matrix::translate(tx, ty).then(&self.line);
        self.matrix = self.line;
    }
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            cap: LineCap::Butt,
            text: TextState::default(),
        }
    }
}

/// Path under construction, already in device space.
#[derive(Debug, Default)]
struct PathBuilder {
    subpaths: Vec<Vec<Point>>,
}

impl PathBuilder {
    fn current(&self) -> Option<Point> {
        self.subpaths.last().and_then(|s| s.last().copied())
    }

    fn move_to(&mut self, p: Point) {
        self.subpaths.push(vec![p]);
    }

    fn line_to(&mut self, p: Point) {
        match self.subpaths.last_mut() {
            Some(sub) => sub.push(p),
            None => self.move_to(p),
        }
    }

    fn curve_to(&mut self, c1: Point, c2: Point, end: Point) {
        let Some(start) = self.current() else {
            self.move_to(end);
            return;
        };
        let approx_len = start.distance(c1) + c1.distance(c2) + c2.distance(end);
        let steps = ((approx_len / 2.0).ceil() as usize).clamp(4, 64);
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            let u = 1.0 - t;
            let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            self.line_to(Point::new(
                w0 * start.x + w1 * c1.x + w2 * c2.x + w3 * end.x,
                w0 * start.y + w1 * c1.y + w2 * c2.y + w3 * end.y,
            ));
        }
    }

    fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            match (sub.first().copied(), sub.last().copied()) {
                (Some(first), Some(last)) if first != last => sub.push(first),
                _ => {}
            }
        }
    }

    fn take(&mut self) -> Vec<Vec<Point>> {
        std::mem::take(&mut self.subpaths)
    }
}

struct Painter<'a> {
    doc: &'a Document,
    canvas: &'a mut RgbaImage,
    max_depth: usize,
    skipped: usize,
}

impl<'a> Painter<'a> {
    fn run(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) {
        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut path = PathBuilder::default();
        let mut text = TextObject::START;

        for op in operations {
            let nums: Vec<f64> = op
                .operands
                .iter()
                .filter_map(|o| as_number(self.doc, o))
                .collect();

            match op.operator.as_str() {
                // -- Graphics state --
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&nums) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "w" => {
                    if let Some(w) = nums.first() {
                        gs.line_width = *w;
                    }
                }
                "J" => {
                    gs.cap = if nums.first() == Some(&1.0) {
                        LineCap::Round
                    } else {
                        LineCap::Butt
                    };
                }
                "gs" => self.apply_ext_gstate(op, resources, &mut gs),

                // -- Colour --
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(c) = device_color(&nums) {
                        gs.fill = c;
                    }
                }
                "G" | "RG" | "K" | "SC" | "SCN" => {
                    if let Some(c) = device_color(&nums) {
                        gs.stroke = c;
                    }
                }
                "cs" => gs.fill = Color::BLACK,
                "CS" => gs.stroke = Color::BLACK,

                // -- Path construction --
                "m" => {
                    if let [x, y] = nums[..] {
                        path.move_to(gs.ctm.apply(x, y));
                    }
                }
                "l" => {
                    if let [x, y] = nums[..] {
                        path.line_to(gs.ctm.apply(x, y));
                    }
                }
                "c" => {
                    if let [x1, y1, x2, y2, x3, y3] = nums[..] {
                        path.curve_to(
                            gs.ctm.apply(x1, y1),
                            gs.ctm.apply(x2, y2),
                            gs.ctm.apply(x3, y3),
                        );
                    }
                }
                "v" => {
                    if let ([x2, y2, x3, y3], Some(current)) = (&nums[..], path.current()) {
                        path.curve_to(current, gs.ctm.apply(*x2, *y2), gs.ctm.apply(*x3, *y3));
                    }
                }
                "y" => {
                    if let [x1, y1, x3, y3] = nums[..] {
                        let end = gs.ctm.apply(x3, y3);
                        path.curve_to(gs.ctm.apply(x1, y1), end, end);
                    }
                }
                "h" => path.close(),
                "re" => {
                    if let [x, y, w, h] = nums[..] {
                        path.move_to(gs.ctm.apply(x, y));
                        path.line_to(gs.ctm.apply(x + w, y));
                        path.line_to(gs.ctm.apply(x + w, y + h));
                        path.line_to(gs.ctm.apply(x, y + h));
                        path.close();
                    }
                }

                // -- Painting --
                "f" | "F" => self.fill(&path.take(), FillRule::NonZero, &gs),
                "f*" => self.fill(&path.take(), FillRule::EvenOdd, &gs),
                "S" => self.stroke(&path.take(), &gs),
                "s" => {
                    path.close();
                    self.stroke(&path.take(), &gs);
                }
                "B" | "B*" | "b" | "b*" => {
                    if op.operator.starts_with('b') {
                        path.close();
                    }
                    let rule = if op.operator.ends_with('*') {
                        FillRule::EvenOdd
                    } else {
                        FillRule::NonZero
                    };
                    let subpaths = path.take();
                    self.fill(&subpaths, rule, &gs);
                    self.stroke(&subpaths, &gs);
                }
                "n" => {
                    path.take();
                }

                // -- Text --
                "BT" => text = TextObject::START,
                "ET" => {}
                "Tf" => {
                    if let Some(size) = nums.last() {
                        gs.text.size = *size;
                    }
                }
                "TL" => {
                    if let Some(leading) = nums.first() {
                        gs.text.leading = *leading;
                    }
                }
                "Tc" => {
                    if let Some(spacing) = nums.first() {
                        gs.text.char_spacing = *spacing;
                    }
                }
                "Tw" => {
                    if let Some(spacing) = nums.first() {
                        gs.text.word_spacing = *spacing;
                    }
                }
                "Tr" => gs.text.invisible = matches!(nums.first(), Some(m) if *m == 3.0 || *m == 7.0),
                "Td" => {
                    if let [tx, ty] = nums[..] {
                        text.next_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = nums[..] {
                        gs.text.leading = -ty;
                        text.next_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&nums) {
                        text.line = m;
                        text.matrix = m;
                    }
                }
                "T*" => text.next_line(0.0, -gs.text.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show_text(bytes, &mut text, &gs);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        if let [aw, ac, ..] = nums[..] {
                            gs.text.word_spacing = aw;
                            gs.text.char_spacing = ac;
                        }
                    }
                    text.next_line(0.0, -gs.text.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        self.show_text(bytes, &mut text, &gs);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show_text(bytes, &mut text, &gs),
                                other => {
                                    if let Some(adjust) = as_number(self.doc, other) {
                                        let tx = -adjust / 1000.0 * gs.text.size;
                                        text.matrix = Matrix::translate(tx, 0.0).then(&text.matrix);
                                    }
                                }
                            }
                        }
                    }
                }

                // -- XObjects --
                "Do" => self.draw_xobject(op, resources, &gs, depth),

                _ => self.skipped += 1,
            }
        }
    }

    fn fill(&mut self, subpaths: &[Vec<Point>], rule: FillRule, gs: &GraphicsState) {
        canvas::fill_polygon(self.canvas, subpaths, rule, gs.fill, gs.fill_alpha);
    }

    fn stroke(&mut self, subpaths: &[Vec<Point>], gs: &GraphicsState) {
        let width = (gs.line_width * gs.ctm.scale()).max(1.0);
        for sub in subpaths {
            canvas::stroke_polyline(self.canvas, sub, gs.stroke, gs.stroke_alpha, width, gs.cap);
        }
    }

    /// Paint `bytes` (one byte per character) with the built-in face and
    /// advance the text matrix past them.
    fn show_text(&mut self, bytes: &[u8], text: &mut TextObject, gs: &GraphicsState) {
        let size = gs.text.size;
        let (cell_w, cell_h) = (size * GLYPH_ADVANCE / 8.0, size / 8.0);
        let mut cells: Vec<Vec<Point>> = Vec::new();
        for &byte in bytes {
            let device = text.matrix.then(&gs.ctm);
            if !gs.text.invisible {
                // Row 0 is the top of the glyph; row 7 sits below the baseline.
                for (col, row) in canvas::glyph_cells(char::from(byte)) {
                    let x = col as f64 * cell_w;
                    let y = (6.0 - row as f64) * cell_h;
                    cells.push(vec![
                        device.apply(x, y),
                        device.apply(x + cell_w, y),
                        device.apply(x + cell_w, y + cell_h),
                        device.apply(x, y + cell_h),
                    ]);
                }
            }
            let mut advance = size * GLYPH_ADVANCE + gs.text.char_spacing;
            if byte == b' ' {
                advance += gs.text.word_spacing;
            }
            text.matrix = Matrix::translate(advance, 0.0).then(&text.matrix);
        }
        canvas::fill_polygon(self.canvas, &cells, FillRule::NonZero, gs.fill, gs.fill_alpha);
    }

    fn apply_ext_gstate(
        &mut self,
        op: &Operation,
        resources: Option<&'a Dictionary>,
        gs: &mut GraphicsState,
    ) {
        let Some(state) = named_resource(self.doc, resources, b"ExtGState", op) else {
            return;
        };
        let get = |key: &[u8]| state.get(key).ok().and_then(|o| as_number(self.doc, o));
        if let Some(ca) = get(b"ca") {
            gs.fill_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(ca) = get(b"CA") {
            gs.stroke_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(lw) = get(b"LW") {
            gs.line_width = lw;
        }
    }

    fn draw_xobject(
        &mut self,
        op: &Operation,
        resources: Option<&'a Dictionary>,
        gs: &GraphicsState,
        depth: usize,
    ) {
        let Some(name) = op.operands.first() else {
            return;
        };
        let Some(stream) = xobject_stream(self.doc, resources, name) else {
            debug!("XObject not found in resources");
            return;
        };
        let subtype = match stream.dict.get(b"Subtype") {
            Ok(Object::Name(n)) => n.as_slice(),
            _ => b"",
        };

        match subtype {
            b"Image" => {
                let Some(image) = decode_image(self.doc, stream) else {
                    return;
                };
                let ctm = &gs.ctm;
                canvas::draw_image(
                    self.canvas,
                    &image,
                    ctm.apply(0.0, 1.0),
                    ctm.apply(1.0, 1.0),
                    ctm.apply(0.0, 0.0),
                    gs.fill_alpha,
                );
            }
            b"Form" => {
                if depth >= self.max_depth {
                    warn!(depth, "form XObject nesting limit reached");
                    return;
                }
                let Some(ops) = stream_bytes(stream)
                    .and_then(|bytes| Content::decode(&bytes).ok())
                    .map(|content| content.operations)
                else {
                    warn!("undecodable form XObject skipped");
                    return;
                };
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| match resolve(self.doc, m) {
                        Object::Array(values) => {
                            let n: Vec<f64> =
                                values.iter().filter_map(|v| as_number(self.doc, v)).collect();
                            Matrix::from_operands(&n)
                        }
                        _ => None,
                    })
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| as_dict(self.doc, o))
                    .or(resources);
                let mut inner = gs.clone();
                inner.ctm = matrix.then(&gs.ctm);
                self.run(&ops, form_resources, inner, depth + 1);
            }
            _ => {}
        }
    }
}

// -- Resource helpers ---------------------------------------------------------

fn named_resource<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    op: &Operation,
) -> Option<&'a Dictionary> {
    let Some(Object::Name(name)) = op.operands.first() else {
        return None;
    };
    let table = as_dict(doc, resources?.get(category).ok()?)?;
    as_dict(doc, table.get(name).ok()?)
}

fn xobject_stream<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    name: &Object,
) -> Option<&'a Stream> {
    let Object::Name(name) = name else {
        return None;
    };
    let table = as_dict(doc, resources?.get(b"XObject").ok()?)?;
    match resolve(doc, table.get(name).ok()?) {
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

/// Stream payload with filters removed.
pub(crate) fn stream_bytes(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

fn device_color(nums: &[f64]) -> Option<Color> {
    let unit = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match nums {
        [g] => Some(Color::rgb(unit(*g), unit(*g), unit(*g))),
        [r, g, b] => Some(Color::rgb(unit(*r), unit(*g), unit(*b))),
        [c, m, y, k] => Some(Color::rgb(
            unit((1.0 - c) * (1.0 - k)),
            unit((1.0 - m) * (1.0 - k)),
            unit((1.0 - y) * (1.0 - k)),
        )),
        _ => None,
    }
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter").map(|f| resolve(doc, f)) {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|i| match resolve(doc, i) {
                Object::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Components per pixel of an image colour space we can decode.
fn color_components(doc: &Document, space: &Object) -> Option<usize> {
    match resolve(doc, space) {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => match items.first().map(|i| resolve(doc, i)) {
            Some(Object::Name(n)) if n.as_slice() == b"ICCBased" => {
                let profile = as_dict(doc, items.get(1)?)?;
                profile
                    .get(b"N")
                    .ok()
                    .and_then(|n| as_number(doc, n))
                    .map(|n| n as usize)
            }
            Some(Object::Name(n)) if n.as_slice() == b"CalRGB" => Some(3),
            Some(Object::Name(n)) if n.as_slice() == b"CalGray" => Some(1),
            _ => None,
        },
        _ => None,
    }
}

/// Decode an image XObject into straight-alpha RGBA.
fn decode_image(doc: &Document, stream: &Stream) -> Option<RgbaImage> {
    let dict = &stream.dict;
    let dim = |key: &[u8]| dict.get(key).ok().and_then(|o| as_number(doc, o)).map(|v| v as u32);
    let (w, h) = (dim(b"Width")?, dim(b"Height")?);
    if w == 0 || h == 0 {
        return None;
    }

    let filters = filter_names(doc, dict);
    let mut image = if filters.iter().any(|f| f.as_slice() == b"DCTDecode") {
        if filters.len() != 1 {
            warn!("chained DCT filters are not supported");
            return None;
        }
        image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .ok()?
            .to_rgba8()
    } else {
        let bpc = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| as_number(doc, o))
            .unwrap_or(8.0);
        if bpc != 8.0 {
            debug!(bpc, "unsupported image bit depth");
            return None;
        }
        let comps = color_components(doc, dict.get(b"ColorSpace").ok()?)?;
        let data = stream_bytes(stream)?;
        if data.len() < (w as usize) * (h as usize) * comps {
            warn!(w, h, comps, len = data.len(), "image data truncated");
            return None;
        }
        RgbaImage::from_fn(w, h, |x, y| {
            let i = ((y * w + x) as usize) * comps;
            let px = &data[i..i + comps];
            let c = match px {
                [g] => Color::rgb(*g, *g, *g),
                [r, g, b] => Color::rgb(*r, *g, *b),
                [c, m, y, k] => device_color(&[
                    *c as f64 / 255.0,
                    *m as f64 / 255.0,
                    *y as f64 / 255.0,
                    *k as f64 / 255.0,
                ])
                .unwrap_or(Color::BLACK),
                _ => Color::BLACK,
            };
            Rgba([c.r, c.g, c.b, 255])
        })
    };

    if let Some(mask) = dict
        .get(b"SMask")
        .ok()
        .and_then(|o| match resolve(doc, o) {
            Object::Stream(s) => decode_soft_mask(doc, s),
            _ => None,
        })
    {
        let mask = if mask.dimensions() == image.dimensions() {
            mask
        } else {
            imageops::resize(&mask, image.width(), image.height(), imageops::FilterType::Nearest)
        };
        for (px, m) in image.pixels_mut().zip(mask.pixels()) {
            px.0[3] = m.0[0];
        }
    }
    Some(image)
}

fn decode_soft_mask(doc: &Document, stream: &Stream) -> Option<GrayImage> {
    let dict = &stream.dict;
    let dim = |key: &[u8]| dict.get(key).ok().and_then(|o| as_number(doc, o)).map(|v| v as u32);
    let (w, h) = (dim(b"Width")?, dim(b"Height")?);
    let data = stream_bytes(stream)?;
    if data.len() < (w as usize) * (h as usize) {
        return None;
    }
    GrayImage::from_raw(w, h, data[..(w as usize) * (h as usize)].to_vec())
}
