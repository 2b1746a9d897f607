// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page renderer — owns the open document, the single resident page bitmap and
// the view transform.
//
// Lifecycle: Closed → Open(page) → Open(page′) on navigation → Closed. The
// previous bitmap is released before the next one is rasterized, so at most
// one page is resident. A failed navigation or open never leaves the renderer
// on a page it could not draw: the previous page is restored first.

use image::RgbaImage;
use pagewerk_core::config::{AppConfig, InteractionConfig, RenderConfig};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{CoordinateTransform, PageSize};
use tracing::{debug, info, instrument, warn};

use crate::pdf::default_rasterizer;
use crate::pdf::raster::Rasterizer;
use crate::pdf::source::{PageBox, PdfSource};

/// The page currently on screen.
#[derive(Debug)]
struct OpenPage {
    index: usize,
    page_box: PageBox,
    bitmap: Option<RgbaImage>,
}

#[derive(Debug)]
enum RendererState {
    Closed,
    Open { source: PdfSource, page: OpenPage },
}

/// Renders one page at a time and keeps the view fitted to it.
pub struct PageRenderer {
    rasterizer: Box<dyn Rasterizer>,
    render: RenderConfig,
    interaction: InteractionConfig,
    transform: CoordinateTransform,
    view_size: (f64, f64),
    state: RendererState,
}

impl PageRenderer {
    // -- Construction ---------------------------------------------------------

    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_rasterizer(config, default_rasterizer())
    }

    /// Use a custom rasterization backend.
    pub fn with_rasterizer(config: &AppConfig, rasterizer: Box<dyn Rasterizer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rasterizer,
            render: config.render.clone(),
            interaction: config.interaction.clone(),
            transform: CoordinateTransform::from_config(&config.render, &config.interaction)?,
            view_size: (0.0, 0.0),
            state: RendererState::Closed,
        })
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Open `source` on its first page, replacing any open document.
    ///
    /// If the first page cannot be drawn, the document that was open stays
    /// open on the page it was showing.
    #[instrument(skip_all, fields(pages = source.page_count()))]
    pub fn open(&mut self, source: PdfSource) -> Result<()> {
        let page_box = source.page_box(0)?;

        if let RendererState::Open { page, .. } = &mut self.state {
            page.bitmap = None;
        }
        let bitmap = match self.rasterize(&source, 0) {
            Ok(bitmap) => bitmap,
            Err(err) => {
                warn!(%err, "document failed to render, keeping the current one");
                self.restore_bitmap();
                return Err(err);
            }
        };

        self.close();
        self.state = RendererState::Open {
            source,
            page: OpenPage {
                index: 0,
                page_box,
                bitmap: Some(bitmap),
            },
        };
        self.transform = CoordinateTransform::from_config(&self.render, &self.interaction)?;
        self.fit_to_view();
        info!("document opened");
        Ok(())
    }

    /// Release the document and bitmap. Safe to call repeatedly.
    pub fn close(&mut self) {
        if matches!(self.state, RendererState::Open { .. }) {
            info!("document closed");
        }
        self.state = RendererState::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, RendererState::Open { .. })
    }

    // -- Navigation -----------------------------------------------------------

    /// Show page `index`.
    ///
    /// Out-of-range indices are rejected before anything changes. If the new
    /// page fails to rasterize, the previous page is re-rendered and the
    /// error is returned.
    #[instrument(skip(self))]
    pub fn go_to(&mut self, index: usize) -> Result<()> {
        let RendererState::Open { source, page } = &mut self.state else {
            return Err(PagewerkError::NoDocument);
        };
        let page_box = source.page_box(index)?;
        let previous = page.index;

        // Release the old bitmap before allocating the next.
        page.bitmap = None;
        match self
            .rasterizer
            .rasterize(source, index, self.render.pixels_per_point(), self.render.background)
        {
            Ok(bitmap) => {
                *page = OpenPage {
                    index,
                    page_box,
                    bitmap: Some(bitmap),
                };
                debug!(index, "page shown");
            }
            Err(err) => {
                warn!(index, previous, %err, "page failed to render, restoring previous page");
                page.bitmap = self
                    .rasterizer
                    .rasterize(source, previous, self.render.pixels_per_point(), self.render.background)
                    .ok();
                return Err(err);
            }
        }
        self.fit_to_view();
        Ok(())
    }

    /// Advance one page. Returns `false` (and does nothing) on the last page.
    pub fn next_page(&mut self) -> Result<bool> {
        let (index, count) = self.position()?;
        if index + 1 >= count {
            return Ok(false);
        }
        self.go_to(index + 1)?;
        Ok(true)
    }

    /// Go back one page. Returns `false` (and does nothing) on the first page.
    pub fn previous_page(&mut self) -> Result<bool> {
        let (index, _) = self.position()?;
        if index == 0 {
            return Ok(false);
        }
        self.go_to(index - 1)?;
        Ok(true)
    }

    /// Re-rasterize the current page.
    pub fn reload(&mut self) -> Result<()> {
        let (index, _) = self.position()?;
        self.go_to(index)
    }

    // -- Inspection -----------------------------------------------------------

    /// Current page index and page count.
    pub fn position(&self) -> Result<(usize, usize)> {
        match &self.state {
            RendererState::Open { source, page } => Ok((page.index, source.page_count())),
            RendererState::Closed => Err(PagewerkError::NoDocument),
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.position().ok().map(|(index, _)| index)
    }

    pub fn page_count(&self) -> Option<usize> {
        self.position().ok().map(|(_, count)| count)
    }

    pub fn source(&self) -> Option<&PdfSource> {
        match &self.state {
            RendererState::Open { source, .. } => Some(source),
            RendererState::Closed => None,
        }
    }

    pub fn bitmap(&self) -> Option<&RgbaImage> {
        match &self.state {
            RendererState::Open { page, .. } => page.bitmap.as_ref(),
            RendererState::Closed => None,
        }
    }

    /// Size of the current page in document units.
    pub fn page_size(&self) -> Option<PageSize> {
        match &self.state {
            RendererState::Open { page, .. } => Some(page.page_box.size()),
            RendererState::Closed => None,
        }
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut CoordinateTransform {
        &mut self.transform
    }

    // -- View -----------------------------------------------------------------

    /// Record a new view size and refit. A zero size is remembered but leaves
    /// the viewport untouched.
    pub fn set_view_size(&mut self, width: f64, height: f64) -> bool {
        self.view_size = (width, height);
        self.fit_to_view()
    }

    pub fn view_size(&self) -> (f64, f64) {
        self.view_size
    }

    /// Scale and centre the current bitmap in the view.
    pub fn fit_to_view(&mut self) -> bool {
        let Some((bw, bh)) = self.bitmap().map(|b| (b.width() as f64, b.height() as f64)) else {
            return false;
        };
        let (vw, vh) = self.view_size;
        self.transform.viewport_mut().fit(bw, bh, vw, vh)
    }

    fn rasterize(&self, source: &PdfSource, index: usize) -> Result<RgbaImage> {
        self.rasterizer
            .rasterize(source, index, self.render.pixels_per_point(), self.render.background)
    }

    /// Re-rasterize the open page after its bitmap was released.
    fn restore_bitmap(&mut self) {
        let restored = match &self.state {
            RendererState::Open { source, page } => self.rasterize(source, page.index).ok(),
            RendererState::Closed => return,
        };
        if let RendererState::Open { page, .. } = &mut self.state {
            page.bitmap = restored;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::raster::ContentRasterizer;
    use crate::pdf::source::fixtures::*;
    use pagewerk_core::Color;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn three_pages() -> PdfSource {
        PdfSource::from_bytes(blank_pdf(3)).expect("load")
    }

    fn renderer() -> PageRenderer {
        PageRenderer::new(&AppConfig::default()).expect("renderer")
    }

    /// Fails on one page index, counts every call.
    struct FlakyRasterizer {
        fail_on: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Rasterizer for FlakyRasterizer {
        fn rasterize(
            &self,
            source: &PdfSource,
            page_index: usize,
            scale: f64,
            background: Color,
        ) -> Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if page_index == self.fail_on {
                return Err(PagewerkError::SourceUnavailable("corrupt page".into()));
            }
            ContentRasterizer::new().rasterize(source, page_index, scale, background)
        }
    }

    #[test]
    fn open_renders_first_page_at_150_dpi() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        assert_eq!(r.position().expect("open"), (0, 3));
        let bmp = r.bitmap().expect("bitmap");
        assert_eq!(bmp.dimensions(), (1275, 1650));
        assert_eq!(r.page_size(), Some(PageSize::new(612.0, 792.0)));
    }

    #[test]
    fn forward_twice_back_once() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        assert!(r.next_page().expect("next"));
        assert!(r.next_page().expect("next"));
        assert!(r.previous_page().expect("prev"));
        assert_eq!(r.current_index(), Some(1));
    }

    #[test]
    fn navigation_stops_at_ends() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        assert!(!r.previous_page().expect("prev at start"));
        r.go_to(2).expect("last");
        assert!(!r.next_page().expect("next at end"));
        assert_eq!(r.current_index(), Some(2));
    }

    #[test]
    fn out_of_range_leaves_state_unchanged() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        r.go_to(1).expect("page 1");
        let err = r.go_to(7).expect_err("out of range");
        assert!(matches!(err, PagewerkError::PageOutOfRange { index: 7, page_count: 3 }));
        assert_eq!(r.current_index(), Some(1));
        assert!(r.bitmap().is_some());
    }

    #[test]
    fn failed_render_restores_previous_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let raster = FlakyRasterizer {
            fail_on: 2,
            calls: Arc::clone(&calls),
        };
        let mut r =
            PageRenderer::with_rasterizer(&AppConfig::default(), Box::new(raster)).expect("new");
        r.open(three_pages()).expect("open");
        r.go_to(1).expect("page 1");

        assert!(r.go_to(2).is_err());
        assert_eq!(r.current_index(), Some(1));
        assert!(r.bitmap().is_some(), "previous page re-rendered");
        // open, page 1, failed page 2, restore page 1.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    /// A document whose first page cannot be drawn does not replace the one
    /// on screen.
    #[test]
    fn failed_open_keeps_current_document() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        r.go_to(1).expect("page 1");

        let empty_page = PdfSource::from_bytes(pdf_with_pages(&[([0.0, 0.0, 0.0, 0.0], vec![])]))
            .expect("parses");
        let err = r.open(empty_page).expect_err("zero-sized page");
        assert!(matches!(err, PagewerkError::ZeroSizedTarget { .. }));
        assert!(r.is_open());
        assert_eq!(r.position().expect("still open"), (1, 3));
        assert_eq!(r.bitmap().expect("bitmap restored").dimensions(), (1275, 1650));
    }

    #[test]
    fn close_is_idempotent() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        r.close();
        r.close();
        assert!(!r.is_open());
        assert!(matches!(r.next_page(), Err(PagewerkError::NoDocument)));
    }

    #[test]
    fn view_size_fits_page() {
        let mut r = renderer();
        r.open(three_pages()).expect("open");
        assert!(r.set_view_size(637.5, 1650.0));
        assert!((r.transform().viewport().scale() - 0.5).abs() < 1e-12);
        assert!(!r.set_view_size(0.0, 0.0));
        assert!((r.transform().viewport().scale() - 0.5).abs() < 1e-12);
    }
}
