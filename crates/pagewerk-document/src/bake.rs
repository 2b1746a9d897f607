// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bake engine — flatten an annotation set into the page content of a fresh
// copy of the original PDF.
//
// Every bake parses the pristine bytes again; output of a previous bake is
// never an input. Per touched page the existing content streams are wrapped
// in `q … Q` and one overlay stream is appended, holding one `/PwAnnot BMC …
// EMC` section per annotation in insertion order. Overlay resources (a
// translucent ExtGState, Helvetica, signature images) are merged into an
// inline copy of the page's resource dictionary.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pagewerk_core::config::BakeConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{Annotation, AnnotationKind, Color, ImageRef, MarkupStyle, Point, Rect};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::pdf::source::{as_dict, inherited, resolve, PageBox, PdfSource};

/// Marked-content tag wrapping each baked annotation.
pub const ANNOTATION_TAG: &str = "PwAnnot";

/// Text leading as a multiple of the font size.
const LINE_SPACING: f64 = 1.2;

/// Outcome of a successful [`BakeEngine::bake_to_path`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BakeReport {
    pub output_path: PathBuf,
    pub annotations_applied: usize,
    pub pages_touched: usize,
    pub output_bytes: u64,
    /// SHA-256 of the untouched source, lowercase hex.
    pub source_sha256: String,
}

/// Stateless annotation flattener.
#[derive(Debug, Clone, Default)]
pub struct BakeEngine {
    config: BakeConfig,
}

impl BakeEngine {
    pub fn new(config: BakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    // -- In-memory bake -------------------------------------------------------

    /// Bake `annotations` into a copy of `original` and return the new PDF.
    #[instrument(skip_all, fields(bytes_len = original.len(), annotations = annotations.len()))]
    pub fn bake(&self, original: &[u8], annotations: &[Annotation]) -> Result<Vec<u8>> {
        let source = PdfSource::from_bytes(original.to_vec()).inspect_err(|err| {
            if matches!(err, PagewerkError::Encrypted) {
                warn!("refusing to bake onto an encrypted document");
            }
        })?;

        // Group by page, keeping insertion order within each page.
        let mut by_page: BTreeMap<usize, Vec<&Annotation>> = BTreeMap::new();
        for annotation in annotations {
            source.page_id(annotation.page_index())?;
            by_page.entry(annotation.page_index()).or_default().push(annotation);
        }
        let targets = by_page
            .keys()
            .map(|&index| Ok((index, source.page_id(index)?, source.page_box(index)?)))
            .collect::<Result<Vec<(usize, ObjectId, PageBox)>>>()?;

        let mut doc = source.into_document();
        for (index, page_id, page_box) in targets {
            let page_annotations = by_page.get(&index).map(Vec::as_slice).unwrap_or_default();
            self.bake_page(&mut doc, page_id, page_box, page_annotations)?;
            debug!(page = index, count = page_annotations.len(), "page baked");
        }

        doc.compress();
        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| PagewerkError::BakeFailed(format!("failed to serialise PDF: {}", err)))?;

        info!(output_len = output.len(), "bake complete");
        Ok(output)
    }

    // -- File output ----------------------------------------------------------

    /// Bake the PDF at `original_path` and write the result to `output_path`.
    ///
    /// `output_path` must not name the source file: a baked file read back
    /// as a source would have its annotations applied twice. To save over
    /// the source, bake the bytes the document was opened from with
    /// [`bake_bytes_to_path`](Self::bake_bytes_to_path).
    #[instrument(skip_all, fields(
        original = %original_path.as_ref().display(),
        output = %output_path.as_ref().display(),
    ))]
    pub fn bake_to_path(
        &self,
        original_path: impl AsRef<Path>,
        annotations: &[Annotation],
        output_path: impl AsRef<Path>,
    ) -> Result<BakeReport> {
        let original_path = original_path.as_ref();
        let output_path = output_path.as_ref();

        if same_file(original_path, output_path) {
            return Err(PagewerkError::BakeFailed(format!(
                "output {} is the source document; bake from its original bytes instead",
                output_path.display()
            )));
        }
        let original = std::fs::read(original_path).map_err(|err| {
            PagewerkError::SourceUnavailable(format!(
                "cannot read {}: {}",
                original_path.display(),
                err
            ))
        })?;
        self.bake_bytes_to_path(&original, annotations, output_path)
    }

    /// Bake `original` and write the result to `output_path`, which may be
    /// the file `original` was read from.
    ///
    /// The output is written to a temporary file next to the target and
    /// renamed into place, so a failed bake never leaves a partial file.
    #[instrument(skip_all, fields(output = %output_path.as_ref().display()))]
    pub fn bake_bytes_to_path(
        &self,
        original: &[u8],
        annotations: &[Annotation],
        output_path: impl AsRef<Path>,
    ) -> Result<BakeReport> {
        let output_path = output_path.as_ref();
        let source_sha256 = hash_bytes(original);
        let baked = self.bake(original, annotations)?;

        let parent = match output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let mut staged = tempfile::NamedTempFile::new_in(&parent)?;
        staged.write_all(&baked)?;
        staged.as_file().sync_all()?;
        staged.persist(output_path).map_err(|err| {
            PagewerkError::BakeFailed(format!(
                "cannot move output into place at {}: {}",
                output_path.display(),
                err.error
            ))
        })?;

        let report = BakeReport {
            output_path: output_path.to_path_buf(),
            annotations_applied: annotations.len(),
            pages_touched: distinct_pages(annotations),
            output_bytes: baked.len() as u64,
            source_sha256,
        };
        info!(
            annotations = report.annotations_applied,
            pages = report.pages_touched,
            "wrote {}",
            output_path.display()
        );
        Ok(report)
    }

    // -- Per-page overlay -----------------------------------------------------

    fn bake_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        page_box: PageBox,
        annotations: &[&Annotation],
    ) -> Result<()> {
        let mut resources = OverlayResources::from_page(doc, page_id);
        let mut ops = Vec::new();

        for annotation in annotations {
            ops.push(Operation::new(
                "BMC",
                vec![Object::Name(ANNOTATION_TAG.as_bytes().to_vec())],
            ));
            ops.push(Operation::new("q", vec![]));
            self.annotation_ops(doc, &mut resources, page_box, annotation, &mut ops)?;
            ops.push(Operation::new("Q", vec![]));
            ops.push(Operation::new("EMC", vec![]));
        }

        let overlay = Content { operations: ops }
            .encode()
            .map_err(|err| PagewerkError::BakeFailed(format!("cannot encode overlay: {}", err)))?;

        let existing = doc.get_page_contents(page_id);
        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let close_id = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
        let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(open_id));
        contents.extend(existing.into_iter().map(Object::Reference));
        contents.push(Object::Reference(close_id));
        contents.push(Object::Reference(overlay_id));

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PagewerkError::BakeFailed(format!("page dictionary missing: {}", err)))?;
        page.set("Contents", contents);
        page.set("Resources", resources.into_dictionary());
        Ok(())
    }

    fn annotation_ops(
        &self,
        doc: &mut Document,
        resources: &mut OverlayResources,
        page_box: PageBox,
        annotation: &Annotation,
        ops: &mut Vec<Operation>,
    ) -> Result<()> {
        let native = |p: Point| page_box.to_native(p.x, p.y);
        // Native-space `re` operands for a top-left-origin rect.
        let native_rect = |r: &Rect| {
            let (x, y) = page_box.to_native(r.left, r.bottom);
            vec![num(x), num(y), num(r.width()), num(r.height())]
        };

        match annotation.kind() {
            AnnotationKind::Markup { rect, style, color } => match style {
                MarkupStyle::Highlight => {
                    let gs = resources.highlight_state(self.config.highlight_alpha);
                    ops.push(Operation::new("gs", vec![Object::Name(gs)]));
                    ops.push(fill_color(*color));
                    ops.push(Operation::new("re", native_rect(rect)));
                    ops.push(Operation::new("f", vec![]));
                }
                MarkupStyle::Underline | MarkupStyle::Strikeout => {
                    let y = if *style == MarkupStyle::Underline {
                        rect.bottom
                    } else {
                        rect.center().y
                    };
                    let (x0, y0) = native(Point::new(rect.left, y));
                    let (x1, y1) = native(Point::new(rect.right, y));
                    ops.push(stroke_color(*color));
                    ops.push(Operation::new("w", vec![num(self.config.markup_line_width)]));
                    ops.push(Operation::new("m", vec![num(x0), num(y0)]));
                    ops.push(Operation::new("l", vec![num(x1), num(y1)]));
                    ops.push(Operation::new("S", vec![]));
                }
            },
            AnnotationKind::Ink {
                strokes,
                color,
                width,
            } => {
                ops.push(stroke_color(*color));
                ops.push(Operation::new("w", vec![num(*width)]));
                ops.push(Operation::new("J", vec![Object::Integer(1)]));
                ops.push(Operation::new("j", vec![Object::Integer(1)]));
                for stroke in strokes {
                    let Some((first, rest)) = stroke.split_first() else {
                        continue;
                    };
                    let (x, y) = native(*first);
                    ops.push(Operation::new("m", vec![num(x), num(y)]));
                    if rest.is_empty() {
                        // A lone sample still leaves a round dot.
                        ops.push(Operation::new("l", vec![num(x), num(y)]));
                    }
                    for point in rest {
                        let (x, y) = native(*point);
                        ops.push(Operation::new("l", vec![num(x), num(y)]));
                    }
                    ops.push(Operation::new("S", vec![]));
                }
            }
            AnnotationKind::Redaction { rect, fill } => {
                ops.push(fill_color(fill.color()));
                ops.push(Operation::new("re", native_rect(rect)));
                ops.push(Operation::new("f", vec![]));
            }
            AnnotationKind::Text {
                rect,
                text,
                font_size,
                color,
            } => {
                let font = resources.font(doc);
                let (x, y) = page_box.to_native(rect.left, rect.top + font_size);
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![Object::Name(font), num(*font_size)]));
                ops.push(Operation::new("TL", vec![num(font_size * LINE_SPACING)]));
                ops.push(fill_color(*color));
                ops.push(Operation::new("Td", vec![num(x), num(y)]));
                for (i, line) in text.lines().enumerate() {
                    if i > 0 {
                        ops.push(Operation::new("T*", vec![]));
                    }
                    ops.push(Operation::new(
                        "Tj",
                        vec![Object::String(win_ansi(line), StringFormat::Literal)],
                    ));
                }
                ops.push(Operation::new("ET", vec![]));
            }
            AnnotationKind::Signature { rect, image } => {
                let name = resources.image(doc, image)?;
                let (x, y) = page_box.to_native(rect.left, rect.bottom);
                ops.push(Operation::new(
                    "cm",
                    vec![
                        num(rect.width()),
                        num(0.0),
                        num(0.0),
                        num(rect.height()),
                        num(x),
                        num(y),
                    ],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(name)]));
            }
        }
        Ok(())
    }
}

// -- Resources ----------------------------------------------------------------

/// Inline copy of a page's resources, extended with overlay entries.
struct OverlayResources {
    resources: Dictionary,
    ext_gstates: Dictionary,
    fonts: Dictionary,
    xobjects: Dictionary,
    highlight: Option<Vec<u8>>,
    font: Option<Vec<u8>>,
    images: usize,
}

impl OverlayResources {
    fn from_page(doc: &Document, page_id: ObjectId) -> Self {
        let resources = inherited(doc, page_id, b"Resources")
            .and_then(|obj| as_dict(doc, obj))
            .cloned()
            .unwrap_or_default();
        let table = |key: &[u8]| {
            resources
                .get(key)
                .ok()
                .and_then(|obj| as_dict(doc, obj))
                .cloned()
                .unwrap_or_default()
        };
        Self {
            ext_gstates: table(b"ExtGState"),
            fonts: table(b"Font"),
            xobjects: table(b"XObject"),
            resources,
            highlight: None,
            font: None,
            images: 0,
        }
    }

    /// ExtGState with the highlight fill alpha.
    fn highlight_state(&mut self, alpha: f64) -> Vec<u8> {
        if let Some(name) = &self.highlight {
            return name.clone();
        }
        let name = fresh_name(&self.ext_gstates, "PwGsHi");
        self.ext_gstates.set(
            name.clone(),
            dictionary! {
                "Type" => "ExtGState",
                "ca" => alpha as f32,
            },
        );
        self.highlight = Some(name.clone());
        name
    }

    /// Standard Helvetica with WinAnsi encoding.
    fn font(&mut self, doc: &mut Document) -> Vec<u8> {
        if let Some(name) = &self.font {
            return name.clone();
        }
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let name = fresh_name(&self.fonts, "PwHelv");
        self.fonts.set(name.clone(), Object::Reference(font_id));
        self.font = Some(name.clone());
        name
    }

    /// Embed a signature image as an RGB XObject with an SMask for alpha.
    fn image(&mut self, doc: &mut Document, image: &ImageRef) -> Result<Vec<u8>> {
        let bytes = image
            .read()
            .map_err(|err| PagewerkError::BakeFailed(format!("signature image unavailable: {}", err)))?;
        let rgba = image::load_from_memory(&bytes)
            .map_err(|err| PagewerkError::BakeFailed(format!("signature image unreadable: {}", err)))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
            },
            alpha,
        ));
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "SMask" => mask_id,
            },
            rgb,
        ));

        let name = fresh_name(&self.xobjects, &format!("PwSig{}", self.images));
        self.images += 1;
        self.xobjects.set(name.clone(), Object::Reference(image_id));
        debug!(width, height, "signature image embedded");
        Ok(name)
    }

    fn into_dictionary(mut self) -> Dictionary {
        for (key, table) in [
            ("ExtGState", self.ext_gstates),
            ("Font", self.fonts),
            ("XObject", self.xobjects),
        ] {
            if !table.is_empty() {
                self.resources.set(key, table);
            }
        }
        self.resources
    }
}

/// `stem`, or `stem` with a numeric suffix if the name is taken.
fn fresh_name(table: &Dictionary, stem: &str) -> Vec<u8> {
    let mut name = stem.as_bytes().to_vec();
    let mut n = 1;
    while table.has(&name) {
        name = format!("{stem}_{n}").into_bytes();
        n += 1;
    }
    name
}

// -- Helpers ------------------------------------------------------------------

fn num(v: f64) -> Object {
    Object::Real(v as f32)
}

fn fill_color(color: Color) -> Operation {
    let [r, g, b] = color.rgb_unit();
    Operation::new("rg", vec![num(r), num(g), num(b)])
}

fn stroke_color(color: Color) -> Operation {
    let [r, g, b] = color.rgb_unit();
    Operation::new("RG", vec![num(r), num(g), num(b)])
}

/// Encode text for a WinAnsi simple font. Characters outside the encoding
/// become `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

/// SHA-256 of `data` as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn distinct_pages(annotations: &[Annotation]) -> usize {
    let mut pages: Vec<usize> = annotations.iter().map(Annotation::page_index).collect();
    pages.sort_unstable();
    pages.dedup();
    pages.len()
}

/// Number of annotation sections in a page's content. Used to verify bakes.
pub fn count_annotation_sections(doc: &Document, page_id: ObjectId) -> Result<usize> {
    let content = doc
        .get_page_content(page_id)
        .map_err(|err| PagewerkError::SourceUnavailable(format!("cannot read page content: {}", err)))?;
    let operations = Content::decode(&content)
        .map_err(|err| PagewerkError::SourceUnavailable(format!("cannot decode page content: {}", err)))?
        .operations;
    Ok(operations
        .iter()
        .filter(|op| {
            op.operator == "BMC"
                && matches!(
                    op.operands.first().map(|o| resolve(doc, o)),
                    Some(Object::Name(tag)) if tag.as_slice() == ANNOTATION_TAG.as_bytes()
                )
        })
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::raster::{ContentRasterizer, Rasterizer};
    use crate::pdf::source::fixtures::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use pagewerk_core::RedactionFill;
    use std::io::Cursor;

    fn engine() -> BakeEngine {
        BakeEngine::new(BakeConfig::default())
    }

    fn redaction(page: usize, rect: Rect, fill: RedactionFill) -> Annotation {
        Annotation::new(page, AnnotationKind::Redaction { rect, fill })
    }

    fn sample_set() -> Vec<Annotation> {
        vec![
            Annotation::new(
                0,
                AnnotationKind::Markup {
                    rect: Rect::new(50.0, 50.0, 200.0, 70.0),
                    style: MarkupStyle::Highlight,
                    color: Color::YELLOW,
                },
            ),
            Annotation::new(
                0,
                AnnotationKind::Ink {
                    strokes: vec![vec![
                        Point::new(10.0, 10.0),
                        Point::new(40.0, 30.0),
                        Point::new(80.0, 20.0),
                    ]],
                    color: Color::BLACK,
                    width: 2.0,
                },
            ),
            Annotation::new(
                1,
                AnnotationKind::Text {
                    rect: Rect::new(100.0, 100.0, 300.0, 140.0),
                    text: "Approved\nby me".into(),
                    font_size: 14.0,
                    color: Color::BLUE,
                },
            ),
            redaction(1, Rect::new(300.0, 400.0, 400.0, 450.0), RedactionFill::White),
        ]
    }

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode png");
        out.into_inner()
    }

    fn sections(bytes: &[u8]) -> Vec<usize> {
        let src = PdfSource::from_bytes(bytes.to_vec()).expect("reload");
        (0..src.page_count())
            .map(|i| {
                let id = src.page_id(i).expect("page");
                count_annotation_sections(src.document(), id).expect("count")
            })
            .collect()
    }

    #[test]
    fn baking_twice_yields_same_section_count() {
        let original = blank_pdf(2);
        let set = sample_set();
        let first = engine().bake(&original, &set).expect("first bake");
        let second = engine().bake(&original, &set).expect("second bake");
        assert_eq!(sections(&first), vec![2, 2]);
        assert_eq!(sections(&second), vec![2, 2]);
    }

    #[test]
    fn black_redaction_covers_prior_content() {
        // Red page content underneath the redaction.
        let original = pdf_with_pages(&[(
            [0.0, 0.0, 612.0, 792.0],
            filled_rect([1.0, 0.0, 0.0], 0.0, 0.0, 612.0, 792.0),
        )]);
        let set = [redaction(0, Rect::new(100.0, 100.0, 200.0, 150.0), RedactionFill::Black)];
        let baked = engine().bake(&original, &set).expect("bake");

        let src = PdfSource::from_bytes(baked).expect("reload");
        let bmp = ContentRasterizer::new()
            .rasterize(&src, 0, 1.0, Color::WHITE)
            .expect("raster");
        assert_eq!(bmp.get_pixel(150, 125).0, [0, 0, 0, 255]);
        assert_eq!(bmp.get_pixel(20, 20).0, [255, 0, 0, 255]);
    }

    #[test]
    fn overlay_survives_unbalanced_original_state() {
        use lopdf::content::Operation as Op;
        let ops = vec![
            Op::new("q", vec![]),
            Op::new(
                "cm",
                [1.0, 0.0, 0.0, 1.0, 300.0, 300.0]
                    .iter()
                    .map(|v| Object::Real(*v))
                    .collect(),
            ),
        ];
        let original = pdf_with_pages(&[([0.0, 0.0, 612.0, 792.0], ops)]);
        let set = [redaction(0, Rect::new(0.0, 0.0, 20.0, 20.0), RedactionFill::Black)];
        let baked = engine().bake(&original, &set).expect("bake");

        let src = PdfSource::from_bytes(baked).expect("reload");
        let bmp = ContentRasterizer::new()
            .rasterize(&src, 0, 1.0, Color::WHITE)
            .expect("raster");
        assert_eq!(bmp.get_pixel(10, 10).0, [0, 0, 0, 255]);
    }

    #[test]
    fn highlight_is_translucent() {
        let set = [Annotation::new(
            0,
            AnnotationKind::Markup {
                rect: Rect::new(100.0, 100.0, 200.0, 120.0),
                style: MarkupStyle::Highlight,
                color: Color::YELLOW,
            },
        )];
        let baked = engine().bake(&blank_pdf(1), &set).expect("bake");
        let src = PdfSource::from_bytes(baked).expect("reload");
        let px = ContentRasterizer::new()
            .rasterize(&src, 0, 1.0, Color::WHITE)
            .expect("raster")
            .get_pixel(150, 110)
            .0;
        assert_eq!(&px[..2], &[255, 255]);
        assert!(px[2] > 150 && px[2] < 200, "blue channel {}", px[2]);
    }

    #[test]
    fn signature_is_composited_into_rect() {
        let image = ImageRef::encoded(png_bytes(40, 20, [0, 0, 255, 255]));
        let set = [Annotation::new(
            0,
            AnnotationKind::Signature {
                rect: Rect::new(200.0, 300.0, 280.0, 340.0),
                image,
            },
        )];
        let baked = engine().bake(&blank_pdf(1), &set).expect("bake");
        let src = PdfSource::from_bytes(baked).expect("reload");
        let bmp = ContentRasterizer::new()
            .rasterize(&src, 0, 1.0, Color::WHITE)
            .expect("raster");
        assert_eq!(bmp.get_pixel(240, 320).0, [0, 0, 255, 255]);
        assert_eq!(bmp.get_pixel(190, 320).0, [255, 255, 255, 255]);
    }

    #[test]
    fn encrypted_source_is_refused() {
        let err = engine().bake(&encrypted_pdf(), &sample_set()).expect_err("encrypted");
        assert!(matches!(err, PagewerkError::Encrypted));
    }

    #[test]
    fn encrypt_token_in_content_bakes_normally() {
        let set = [redaction(0, Rect::new(10.0, 10.0, 60.0, 30.0), RedactionFill::Black)];
        let baked = engine().bake(&pdf_mentioning_encrypt(), &set).expect("plain document bakes");
        assert_eq!(sections(&baked), vec![1]);
    }

    #[test]
    fn baking_onto_the_source_path_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.pdf");
        let original = blank_pdf(1);
        std::fs::write(&input, &original).expect("write input");
        let set = [redaction(0, Rect::new(0.0, 0.0, 20.0, 20.0), RedactionFill::Black)];

        let same = dir.path().join(".").join("in.pdf");
        let err = engine().bake_to_path(&input, &set, &same).expect_err("same file");
        assert!(matches!(err, PagewerkError::BakeFailed(_)));
        assert_eq!(std::fs::read(&input).expect("input"), original, "source untouched");
    }

    /// Saving over the source twice from the bytes it was opened from
    /// leaves one section per annotation.
    #[test]
    fn repeated_save_over_source_applies_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.pdf");
        let pristine = blank_pdf(1);
        std::fs::write(&path, &pristine).expect("write input");
        let set = [redaction(0, Rect::new(0.0, 0.0, 20.0, 20.0), RedactionFill::Black)];

        engine().bake_bytes_to_path(&pristine, &set, &path).expect("first save");
        let report = engine().bake_bytes_to_path(&pristine, &set, &path).expect("second save");
        assert_eq!(report.source_sha256, hash_bytes(&pristine));
        assert_eq!(sections(&std::fs::read(&path).expect("saved")), vec![1]);
    }

    #[test]
    fn annotation_on_missing_page_is_rejected() {
        let set = [redaction(4, Rect::new(0.0, 0.0, 10.0, 10.0), RedactionFill::Black)];
        let err = engine().bake(&blank_pdf(2), &set).expect_err("page 4");
        assert!(matches!(err, PagewerkError::PageOutOfRange { index: 4, page_count: 2 }));
    }

    #[test]
    fn bake_to_path_writes_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.pdf");
        let original = blank_pdf(2);
        std::fs::write(&input, &original).expect("write input");
        let output = dir.path().join("nested/out/baked.pdf");

        let report = engine()
            .bake_to_path(&input, &sample_set(), &output)
            .expect("bake to path");
        assert_eq!(report.annotations_applied, 4);
        assert_eq!(report.pages_touched, 2);
        assert_eq!(report.source_sha256, hash_bytes(&original));
        let written = std::fs::read(&output).expect("output exists");
        assert_eq!(written.len() as u64, report.output_bytes);
        assert_eq!(std::fs::read(&input).expect("input"), original, "source untouched");
    }

    #[test]
    fn missing_signature_leaves_no_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, blank_pdf(1)).expect("write input");
        let output = dir.path().join("out.pdf");
        let set = [Annotation::new(
            0,
            AnnotationKind::Signature {
                rect: Rect::new(10.0, 10.0, 60.0, 30.0),
                image: ImageRef::Path(dir.path().join("no-such-signature.png")),
            },
        )];

        let err = engine().bake_to_path(&input, &set, &output).expect_err("missing image");
        assert!(matches!(err, PagewerkError::BakeFailed(_)));
        assert!(!output.exists());
        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 1, "only the input remains");
    }

    #[test]
    fn win_ansi_replaces_unmappable_characters() {
        assert_eq!(win_ansi("Grüße €5"), b"Gr\xfc\xdfe \x805".to_vec());
        assert_eq!(win_ansi("✓ ok"), b"? ok".to_vec());
    }
}
