// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDFium rasterizer — renders pages through the PDFium library, with the
// document's own fonts and images. Built with the `pdfium` feature; the
// shared library is looked up next to the executable, in the working
// directory, then on the system library path.

use image::{imageops, RgbaImage};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::Color;
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::raster::{bitmap_size, ContentRasterizer, Rasterizer, MAX_BITMAP_PIXELS};
use super::source::PdfSource;

pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl std::fmt::Debug for PdfiumRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumRasterizer").finish_non_exhaustive()
    }
}

impl PdfiumRasterizer {
    /// Bind to the PDFium shared library.
    pub fn bind() -> Result<Self> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        if let Some(dir) = &exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                info!(dir = %dir.display(), "PDFium bound next to executable");
                return Ok(Self {
                    pdfium: Pdfium::new(bindings),
                });
            }
        }

        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| PagewerkError::ImageError(format!("PDFium library unavailable: {}", err)))?;
        info!("PDFium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl Rasterizer for PdfiumRasterizer {
    #[instrument(skip(self, source, background))]
    fn rasterize(
        &self,
        source: &PdfSource,
        page_index: usize,
        scale: f64,
        background: Color,
    ) -> Result<RgbaImage> {
        let page_box = source.page_box(page_index)?;
        let (w, h) = bitmap_size(page_box, scale, MAX_BITMAP_PIXELS)?;

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&source.bytes()[..], None)
            .map_err(|err| PagewerkError::SourceUnavailable(format!("PDFium cannot load document: {}", err)))?;
        let index = u16::try_from(page_index).map_err(|_| PagewerkError::PageOutOfRange {
            index: page_index,
            page_count: source.page_count(),
        })?;
        let page = document
            .pages()
            .get(index)
            .map_err(|err| PagewerkError::SourceUnavailable(format!("PDFium cannot open page {}: {}", page_index, err)))?;

        let config = PdfRenderConfig::new()
            .set_target_width(w as i32)
            .set_target_height(h as i32)
            .set_clear_color(PdfColor::new(background.r, background.g, background.b, background.a));
        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| PagewerkError::ImageError(format!("PDFium render failed: {}", err)))?;

        let (bw, bh) = (bitmap.width() as u32, bitmap.height() as u32);
        let rendered = RgbaImage::from_raw(bw, bh, bitmap.as_rgba_bytes().to_vec())
            .ok_or_else(|| PagewerkError::ImageError("PDFium returned a short bitmap".into()))?;
        debug!(width = bw, height = bh, "page rendered by PDFium");

        // PDFium keeps the aspect ratio; rounding can leave it a pixel off.
        if (bw, bh) == (w, h) {
            Ok(rendered)
        } else {
            Ok(imageops::resize(&rendered, w, h, imageops::FilterType::Triangle))
        }
    }
}

/// The best rasterizer available: PDFium when it binds, the built-in
/// interpreter otherwise.
pub fn preferred_rasterizer() -> Box<dyn Rasterizer> {
    match PdfiumRasterizer::bind() {
        Ok(pdfium) => Box::new(pdfium),
        Err(err) => {
            warn!(%err, "falling back to the built-in rasterizer");
            Box::new(ContentRasterizer::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::source::fixtures::*;
    use lopdf::content::Operation;
    use lopdf::Object;

    /// Runs only where the PDFium library can be bound.
    #[test]
    fn renders_page_at_requested_size() {
        let Ok(rasterizer) = PdfiumRasterizer::bind() else {
            return;
        };
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 72.into()]),
            Operation::new("Td", vec![20.into(), 100.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hi")]),
            Operation::new("ET", vec![]),
        ];
        let src = PdfSource::from_bytes(pdf_with_pages(&[([0.0, 0.0, 200.0, 200.0], ops)])).expect("load");
        let img = rasterizer.rasterize(&src, 0, 1.0, Color::WHITE).expect("render");
        assert_eq!(img.dimensions(), (200, 200));
    }
}
