// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagewerk-document — Document handling for the Pagewerk annotation editor.
//
// Loads PDFs (refusing encrypted ones), rasterizes pages at a fixed DPI,
// paints annotations over the page bitmap, captures signatures, and bakes an
// annotation set into a fresh copy of the original document.

pub mod bake;
pub mod canvas;
pub mod overlay;
pub mod pdf;
pub mod render;
pub mod signature;

// Re-export the primary structs so callers can use `pagewerk_document::PageRenderer` etc.
pub use bake::{BakeEngine, BakeReport};
pub use overlay::{OverlayPainter, Preview};
pub use pdf::raster::{ContentRasterizer, Rasterizer};
pub use pdf::source::{PageBox, PdfSource};
pub use render::PageRenderer;
pub use signature::SignaturePad;
