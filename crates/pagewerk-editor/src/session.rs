// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editing session — one open document with its renderer, annotation store,
// interaction controller and paint pass.
//
// The session is `Send` but not meant for concurrent mutation; hosts that
// drive it from several tasks share it as `Arc<Mutex<EditorSession>>`.
//
// Every change to the annotation history bumps a revision counter. A save
// records the revision it baked, so the session is dirty exactly when the
// history moved since the last successful save.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use pagewerk_bridge::{DocumentSource, PlatformBridge};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::human_errors::humanize_error;
use pagewerk_core::{Annotation, AnnotationSet, AppConfig};
use pagewerk_document::{BakeReport, OverlayPainter, PageRenderer, PdfSource};
use tracing::{info, instrument, warn};

use crate::bake_service::BakeService;
use crate::controller::{EditorCommand, EditorEvent, InteractionController, InteractionState};

/// Session shared between tasks.
pub type SharedSession = Arc<Mutex<EditorSession>>;

/// Everything a save needs, taken under the session lock so the bake itself
/// can run without it.
#[derive(Debug, Clone)]
pub struct BakeSnapshot {
    /// Bytes the document was opened from.
    pub original: Arc<[u8]>,
    pub annotations: Vec<Annotation>,
    pub revision: u64,
}

pub struct EditorSession {
    config: AppConfig,
    renderer: PageRenderer,
    annotations: AnnotationSet,
    controller: InteractionController,
    painter: OverlayPainter,
    revision: u64,
    saved_revision: u64,
}

impl EditorSession {
    pub fn new(config: AppConfig) -> Result<Self> {
        let renderer = PageRenderer::new(&config)?;
        Ok(Self {
            controller: InteractionController::new(&config.interaction),
            painter: OverlayPainter::from_config(&config),
            annotations: AnnotationSet::new(0),
            renderer,
            config,
            revision: 0,
            saved_revision: 0,
        })
    }

    /// Wrap the session for sharing across tasks.
    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Lock a shared session. A poisoned lock is recovered: every mutation
    /// leaves the session consistent before it can panic.
    pub fn lock(shared: &SharedSession) -> MutexGuard<'_, EditorSession> {
        shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Document lifecycle ---------------------------------------------------

    /// Open `source` on its first page with an empty annotation history.
    #[instrument(skip_all, fields(pages = source.page_count()))]
    pub fn open(&mut self, source: PdfSource) -> Result<Vec<EditorEvent>> {
        let total = source.page_count();
        self.renderer.open(source)?;
        self.annotations = AnnotationSet::new(total);
        self.controller.reset();
        self.reset_history();
        info!("editing session started");
        Ok(vec![
            EditorEvent::PageChanged { index: 0, total },
            EditorEvent::HistoryChanged {
                can_undo: false,
                can_redo: false,
            },
        ])
    }

    /// Resolve `locator` through `source` and open the result.
    pub fn open_from(&mut self, source: &dyn DocumentSource, locator: &str) -> Result<Vec<EditorEvent>> {
        let pdf = source.open_document(locator)?;
        self.open(pdf)
    }

    /// Close the document and forget its annotations.
    pub fn close(&mut self) {
        self.renderer.close();
        self.annotations = AnnotationSet::new(0);
        self.controller.reset();
        self.reset_history();
    }

    fn reset_history(&mut self) {
        self.revision = 0;
        self.saved_revision = 0;
        self.painter.clear_cache();
    }

    // -- Commands -------------------------------------------------------------

    pub fn enqueue(&mut self, command: EditorCommand) {
        self.controller.enqueue(command);
    }

    /// Apply every queued command.
    pub fn process(&mut self) -> Vec<EditorEvent> {
        let events = self.controller.process(&mut self.renderer, &mut self.annotations);
        let changes = events
            .iter()
            .filter(|e| matches!(e, EditorEvent::HistoryChanged { .. }))
            .count() as u64;
        self.revision += changes;
        events
    }

    /// Enqueue `commands` and process them.
    pub fn dispatch(&mut self, commands: impl IntoIterator<Item = EditorCommand>) -> Vec<EditorEvent> {
        for command in commands {
            self.enqueue(command);
        }
        self.process()
    }

    /// Answer the content requests in `events` through `bridge`.
    ///
    /// Each text or signature box is submitted with what the bridge returns,
    /// or cancelled when the user dismisses the prompt or the bridge fails.
    /// Returns the events raised while applying the answers.
    pub fn resolve_with(&mut self, bridge: &dyn PlatformBridge, events: &[EditorEvent]) -> Vec<EditorEvent> {
        let mut failures = Vec::new();
        for event in events {
            let answer = match event {
                EditorEvent::TextRectSelected { rect } => bridge
                    .request_text(*rect)
                    .map(|text| text.map(|text| EditorCommand::SubmitText { text })),
                EditorEvent::SignatureRectSelected { .. } => bridge
                    .capture_signature()
                    .map(|image| image.map(|image| EditorCommand::SubmitSignature { image })),
                _ => continue,
            };
            match answer {
                Ok(Some(command)) => self.enqueue(command),
                Ok(None) => self.enqueue(EditorCommand::CancelPending),
                Err(err) => {
                    warn!(platform = bridge.platform_name(), %err, "content request failed");
                    failures.push(EditorEvent::Failed {
                        error: humanize_error(&err),
                    });
                    self.enqueue(EditorCommand::CancelPending);
                }
            }
        }
        failures.extend(self.process());
        failures
    }

    // -- Output ---------------------------------------------------------------

    /// The current page with its annotations and the shape in progress.
    pub fn paint(&self) -> Option<RgbaImage> {
        let base = self.renderer.bitmap()?;
        let index = self.renderer.current_index()?;
        let preview = self.controller.preview(&self.renderer);
        Some(self.painter.paint(
            base,
            &self.annotations.query(index),
            preview.as_ref(),
            self.renderer.transform(),
        ))
    }

    /// Bytes of the open document, as loaded.
    pub fn original_bytes(&self) -> Option<Arc<[u8]>> {
        self.renderer.source().map(|source| Arc::clone(source.bytes()))
    }

    // -- Saving ---------------------------------------------------------------

    /// Whether the annotation history changed since the last save (or since
    /// the document was opened).
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The open document's original bytes and current annotations.
    pub fn bake_snapshot(&self) -> Option<BakeSnapshot> {
        Some(BakeSnapshot {
            original: self.original_bytes()?,
            annotations: self.annotations.all(),
            revision: self.revision,
        })
    }

    /// Record that the state at `revision` has been written. Edits made
    /// after the snapshot was taken keep the session dirty.
    pub fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = revision;
    }

    /// Bake the shared session's annotations onto its original bytes and
    /// write the result to `output_path`, which may be the file the
    /// document was opened from. The lock is held only to take the snapshot
    /// and to record the save.
    pub async fn save(
        shared: &SharedSession,
        service: &BakeService,
        output_path: PathBuf,
    ) -> Result<BakeReport> {
        let snapshot = Self::lock(shared)
            .bake_snapshot()
            .ok_or(PagewerkError::NoDocument)?;
        let revision = snapshot.revision;
        let report = service
            .bake_bytes(snapshot.original, snapshot.annotations, output_path)
            .await?;
        Self::lock(shared).mark_saved(revision);
        Ok(report)
    }

    // -- Accessors ------------------------------------------------------------

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn renderer(&self) -> &PageRenderer {
        &self.renderer
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn state(&self) -> InteractionState {
        self.controller.state(&self.renderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::blank_pdf;
    use pagewerk_bridge::{FileSystemSource, ShareTarget, SignatureCapture, StubBridge, TextEntry};
    use pagewerk_core::error::PagewerkError;
    use pagewerk_core::{AnnotationKind, ImageRef, Rect, Tool};
    use pagewerk_document::bake::count_annotation_sections;
    use std::path::Path;

    /// Bridge with canned answers.
    struct Scripted {
        text: Option<String>,
    }

    impl TextEntry for Scripted {
        fn request_text(&self, _rect: Rect) -> Result<Option<String>> {
            Ok(self.text.clone())
        }
    }

    impl SignatureCapture for Scripted {
        fn capture_signature(&self) -> Result<Option<ImageRef>> {
            Ok(Some(ImageRef::encoded(vec![1u8, 2, 3])))
        }
    }

    impl ShareTarget for Scripted {
        fn share_file(&self, _path: &Path, _mime_type: &str) -> Result<()> {
            Ok(())
        }
    }

    impl PlatformBridge for Scripted {
        fn platform_name(&self) -> &str {
            "scripted"
        }
    }

    fn session(pages: usize) -> EditorSession {
        let mut s = EditorSession::new(AppConfig::default()).expect("session");
        s.open(PdfSource::from_bytes(blank_pdf(pages)).expect("pdf"))
            .expect("open");
        s
    }

    fn draw(tool: Tool) -> Vec<EditorCommand> {
        vec![
            EditorCommand::SelectTool { tool },
            EditorCommand::PointerDown { id: 1, x: 100.0, y: 100.0, time_ms: 0 },
            EditorCommand::PointerMove { id: 1, x: 300.0, y: 160.0, time_ms: 10 },
            EditorCommand::PointerUp { id: 1, x: 300.0, y: 160.0, time_ms: 20 },
        ]
    }

    #[test]
    fn open_reports_first_page_and_empty_history() {
        let mut s = EditorSession::new(AppConfig::default()).expect("session");
        assert_eq!(s.state(), InteractionState::Idle);
        let events = s
            .open(PdfSource::from_bytes(blank_pdf(2)).expect("pdf"))
            .expect("open");
        assert_eq!(events[0], EditorEvent::PageChanged { index: 0, total: 2 });
        assert_eq!(s.state(), InteractionState::Navigating);
        assert_eq!(s.annotations().page_count(), 2);
    }

    #[test]
    fn text_box_is_filled_through_bridge() {
        let mut s = session(1);
        let events = s.dispatch(draw(Tool::Text));
        let bridge = Scripted {
            text: Some("Checked".into()),
        };
        let events = s.resolve_with(&bridge, &events);
        assert!(events
            .iter()
            .any(|e| matches!(e, EditorEvent::AnnotationAdded { .. })));
        let all = s.annotations().all();
        assert!(matches!(all[0].kind(), AnnotationKind::Text { text, .. } if text == "Checked"));
    }

    #[test]
    fn dismissed_prompt_cancels_box() {
        let mut s = session(1);
        let events = s.dispatch(draw(Tool::Text));
        let events = s.resolve_with(&Scripted { text: None }, &events);
        assert!(events.contains(&EditorEvent::ToolChanged { tool: Tool::None }));
        assert!(s.annotations().is_empty());
        assert!(!s.controller().awaiting_content());
    }

    #[test]
    fn signature_box_is_filled_through_bridge() {
        let mut s = session(1);
        let events = s.dispatch(draw(Tool::Signature));
        s.resolve_with(&Scripted { text: None }, &events);
        let all = s.annotations().all();
        assert!(matches!(all[0].kind(), AnnotationKind::Signature { .. }));
    }

    #[test]
    fn unavailable_bridge_reports_failure() {
        let mut s = session(1);
        let events = s.dispatch(draw(Tool::Signature));
        let events = s.resolve_with(&StubBridge, &events);
        assert!(events
            .iter()
            .any(|e| matches!(e, EditorEvent::Failed { .. })));
        assert!(s.annotations().is_empty());
    }

    #[test]
    fn paint_shows_annotations_of_current_page_only() {
        let mut s = session(2);
        s.dispatch(draw(Tool::RedactBlack));
        let painted = s.paint().expect("page open");
        assert_eq!(painted.get_pixel(200, 130).0, [0, 0, 0, 255]);

        s.dispatch([EditorCommand::NextPage]);
        let painted = s.paint().expect("page open");
        assert_eq!(painted.get_pixel(200, 130).0, [255, 255, 255, 255]);
    }

    #[test]
    fn open_from_file_system_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("doc.pdf"), blank_pdf(3)).expect("write");
        let mut s = EditorSession::new(AppConfig::default()).expect("session");
        let events = s
            .open_from(&FileSystemSource::with_root(dir.path()), "doc.pdf")
            .expect("open");
        assert_eq!(events[0], EditorEvent::PageChanged { index: 0, total: 3 });
        assert!(matches!(
            s.open_from(&FileSystemSource::with_root(dir.path()), "missing.pdf"),
            Err(PagewerkError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn close_clears_annotations() {
        let mut s = session(1);
        s.dispatch(draw(Tool::RedactWhite));
        assert_eq!(s.annotations().len(), 1);
        s.close();
        assert!(s.annotations().is_empty());
        assert!(s.paint().is_none());
        assert!(s.original_bytes().is_none());
    }

    #[test]
    fn edits_undo_and_redo_mark_the_session_dirty() {
        let mut s = session(1);
        assert!(!s.is_dirty());

        s.dispatch(draw(Tool::RedactBlack));
        assert!(s.is_dirty());
        let snapshot = s.bake_snapshot().expect("open");
        assert_eq!(snapshot.annotations.len(), 1);
        s.mark_saved(snapshot.revision);
        assert!(!s.is_dirty());

        s.dispatch([EditorCommand::Undo]);
        assert!(s.is_dirty());
        s.dispatch([EditorCommand::Redo]);
        assert!(s.is_dirty(), "redo after a save is still a change");

        // Nothing to redo: history unchanged.
        let before = s.revision();
        s.dispatch([EditorCommand::Redo]);
        assert_eq!(s.revision(), before);

        s.close();
        assert!(!s.is_dirty());
        assert!(s.bake_snapshot().is_none());
    }

    #[test]
    fn navigation_does_not_dirty_the_session() {
        let mut s = session(2);
        s.dispatch([EditorCommand::NextPage, EditorCommand::PreviousPage]);
        assert!(!s.is_dirty());
    }

    #[tokio::test]
    async fn save_over_source_twice_applies_annotations_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, blank_pdf(1)).expect("write");
        let mut s = EditorSession::new(AppConfig::default()).expect("session");
        s.open(PdfSource::open(&path).expect("pdf")).expect("open");
        s.dispatch(draw(Tool::RedactBlack));
        let shared = s.shared();
        let service = BakeService::default();

        EditorSession::save(&shared, &service, path.clone()).await.expect("first save");
        assert!(!EditorSession::lock(&shared).is_dirty());
        EditorSession::save(&shared, &service, path.clone()).await.expect("second save");

        let saved = PdfSource::open(&path).expect("saved document");
        let page = saved.page_id(0).expect("page");
        assert_eq!(count_annotation_sections(saved.document(), page).expect("count"), 1);
    }

    #[tokio::test]
    async fn edits_during_save_keep_the_session_dirty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut s = session(1);
        s.dispatch(draw(Tool::RedactBlack));
        let snapshot = s.bake_snapshot().expect("open");
        s.dispatch(draw(Tool::RedactWhite));
        let shared = s.shared();

        let report = BakeService::default()
            .bake_bytes(snapshot.original, snapshot.annotations, dir.path().join("out.pdf"))
            .await
            .expect("bake");
        assert_eq!(report.annotations_applied, 1);
        EditorSession::lock(&shared).mark_saved(snapshot.revision);
        assert!(EditorSession::lock(&shared).is_dirty());
    }

    #[test]
    fn shared_session_survives_poisoned_lock() {
        let shared = session(1).shared();
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = EditorSession::lock(&clone);
            panic!("poison the lock");
        })
        .join();
        assert!(EditorSession::lock(&shared).renderer().is_open());
    }
}
