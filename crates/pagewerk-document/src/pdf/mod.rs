// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — source loading and page rasterization.

#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod raster;
pub mod source;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;
pub use raster::{ContentRasterizer, Rasterizer};
pub use source::{PageBox, PdfSource};

/// The rasterizer a renderer uses unless told otherwise.
pub fn default_rasterizer() -> Box<dyn Rasterizer> {
    #[cfg(feature = "pdfium")]
    {
        pdfium::preferred_rasterizer()
    }
    #[cfg(not(feature = "pdfium"))]
    {
        Box::new(ContentRasterizer::new())
    }
}
