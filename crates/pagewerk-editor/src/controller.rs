// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interaction controller — turns pointer and UI commands into navigation,
// view changes and finalized annotations.
//
// Commands are queued and processed synchronously in enqueue order; each
// `process` call returns the events it produced, in order. Pointer positions
// arrive in display space and are converted to raster space on arrival. The
// single conversion to document space happens when a shape is finalized.
//
// States: Idle (no document), Navigating (tool NONE: pan, pinch, fling,
// double-tap) and Drawing (any other tool; pan and zoom suppressed).

use std::collections::VecDeque;

use pagewerk_core::config::InteractionConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::human_errors::{humanize_error, HumanError};
use pagewerk_core::types::AnnotationId;
use pagewerk_core::{
    Annotation, AnnotationKind, AnnotationSet, Color, CoordinateTransform, ImageRef, MarkupStyle,
    Point, Rect, RedactionFill, Space, StrokeSmoother, Tool, ToolState,
};
use pagewerk_document::{PageRenderer, Preview};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Identifies one finger or mouse button across down/move/up.
pub type PointerId = u64;

/// Input accepted by the controller. Pointer coordinates are display pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    SelectTool { tool: Tool },
    SetColor { color: Color },
    SetStrokeWidth { width: f64 },
    PointerDown { id: PointerId, x: f64, y: f64, #[serde(default)] time_ms: u64 },
    PointerMove { id: PointerId, x: f64, y: f64, #[serde(default)] time_ms: u64 },
    PointerUp { id: PointerId, x: f64, y: f64, #[serde(default)] time_ms: u64 },
    /// Release velocity of a drag, display px/s.
    Fling { vx: f64, vy: f64 },
    SubmitText { text: String },
    SubmitSignature { image: ImageRef },
    CancelPending,
    Undo,
    Redo,
    NextPage,
    PreviousPage,
    GoToPage { index: usize },
    /// Re-rasterize the current page.
    Reload,
    Resize { width: f64, height: f64 },
}

impl EditorCommand {
    fn label(&self) -> &'static str {
        match self {
            Self::SelectTool { .. } => "select_tool",
            Self::SetColor { .. } => "set_color",
            Self::SetStrokeWidth { .. } => "set_stroke_width",
            Self::PointerDown { .. } => "pointer_down",
            Self::PointerMove { .. } => "pointer_move",
            Self::PointerUp { .. } => "pointer_up",
            Self::Fling { .. } => "fling",
            Self::SubmitText { .. } => "submit_text",
            Self::SubmitSignature { .. } => "submit_signature",
            Self::CancelPending => "cancel_pending",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::NextPage => "next_page",
            Self::PreviousPage => "previous_page",
            Self::GoToPage { .. } => "go_to_page",
            Self::Reload => "reload",
            Self::Resize { .. } => "resize",
        }
    }
}

/// Notifications raised while processing commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    PageChanged { index: usize, total: usize },
    AnnotationAdded { id: AnnotationId },
    /// A text box was drawn; the host should answer with `SubmitText` or
    /// `CancelPending`. `rect` is in document units.
    TextRectSelected { rect: Rect },
    /// A signature box was drawn; answer with `SubmitSignature` or
    /// `CancelPending`.
    SignatureRectSelected { rect: Rect },
    HistoryChanged { can_undo: bool, can_redo: bool },
    ToolChanged { tool: Tool },
    ViewChanged { scale: f64, pan: Point },
    /// A command could not be carried out.
    Failed { error: HumanError },
}

/// Coarse controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Navigating,
    Drawing,
}

// -- Internal state -----------------------------------------------------------

/// Shape under construction, in raster pixels.
#[derive(Debug, Clone)]
enum Draft {
    Shape {
        pointer: PointerId,
        anchor: Point,
        rect: Rect,
    },
    Stroke {
        pointer: PointerId,
        smoother: StrokeSmoother,
    },
}

impl Draft {
    fn pointer(&self) -> PointerId {
        match self {
            Self::Shape { pointer, .. } | Self::Stroke { pointer, .. } => *pointer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Text,
    Signature,
}

/// Finalized box waiting for its text or signature, in document units.
#[derive(Debug, Clone, Copy)]
struct Parked {
    kind: ContentKind,
    rect: Rect,
    page_index: usize,
}

#[derive(Debug, Clone, Copy)]
struct Tap {
    at: Point,
    time_ms: u64,
}

/// Pointers down while navigating, in display pixels.
#[derive(Debug, Clone, Default)]
struct Gesture {
    pointers: Vec<(PointerId, Point)>,
    /// Set once a second pointer lands; cleared when all pointers lift.
    scaling: bool,
    /// Down position of a single-pointer press that may still be a tap.
    tap: Option<Tap>,
}

/// Command-queue state machine over navigation and drawing.
#[derive(Debug, Clone)]
pub struct InteractionController {
    config: InteractionConfig,
    tool: ToolState,
    draft: Option<Draft>,
    parked: Option<Parked>,
    gesture: Gesture,
    last_tap: Option<Tap>,
    queue: VecDeque<EditorCommand>,
}

impl InteractionController {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            config: config.clone(),
            tool: default_tool(config),
            draft: None,
            parked: None,
            gesture: Gesture::default(),
            last_tap: None,
            queue: VecDeque::new(),
        }
    }

    /// Drop all transient state. Called when a document is opened or closed.
    pub fn reset(&mut self) {
        *self = Self::new(&self.config);
    }

    pub fn tool(&self) -> ToolState {
        self.tool
    }

    pub fn state(&self, renderer: &PageRenderer) -> InteractionState {
        if !renderer.is_open() {
            InteractionState::Idle
        } else if self.tool.tool.is_drawing() {
            InteractionState::Drawing
        } else {
            InteractionState::Navigating
        }
    }

    /// Whether a text or signature box is waiting for content.
    pub fn awaiting_content(&self) -> bool {
        self.parked.is_some()
    }

    // -- Queue ----------------------------------------------------------------

    pub fn enqueue(&mut self, command: EditorCommand) {
        self.queue.push_back(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue, applying every command in order.
    ///
    /// Shapes below the finalize thresholds are dropped without an event.
    /// Any other failure is reported as `Failed` and processing continues
    /// with the next command.
    pub fn process(
        &mut self,
        renderer: &mut PageRenderer,
        annotations: &mut AnnotationSet,
    ) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        while let Some(command) = self.queue.pop_front() {
            let label = command.label();
            match self.apply(command, renderer, annotations, &mut events) {
                Ok(()) => {}
                Err(PagewerkError::DegenerateGeometry) => {
                    debug!(command = label, "shape below threshold dropped");
                }
                Err(err) => {
                    warn!(command = label, %err, "command failed");
                    events.push(EditorEvent::Failed {
                        error: humanize_error(&err),
                    });
                }
            }
        }
        events
    }

    fn apply(
        &mut self,
        command: EditorCommand,
        renderer: &mut PageRenderer,
        annotations: &mut AnnotationSet,
        events: &mut Vec<EditorEvent>,
    ) -> Result<()> {
        match command {
            EditorCommand::SelectTool { tool } => self.select_tool(tool, events),
            EditorCommand::SetColor { color } => self.tool.color = color,
            EditorCommand::SetStrokeWidth { width } => {
                if !(width.is_finite() && width > 0.0) {
                    return Err(PagewerkError::Config(format!(
                        "stroke width must be positive, got {width}"
                    )));
                }
                self.tool.stroke_width = width;
            }
            EditorCommand::PointerDown { id, x, y, time_ms } => {
                if !renderer.is_open() {
                    return Ok(());
                }
                let at = Point::new(x, y);
                if self.tool.tool.is_drawing() {
                    self.draw_down(id, at, renderer.transform());
                } else {
                    self.nav_down(id, at, time_ms);
                }
            }
            EditorCommand::PointerMove { id, x, y, .. } => {
                if !renderer.is_open() {
                    return Ok(());
                }
                let at = Point::new(x, y);
                if self.tool.tool.is_drawing() {
                    self.draw_move(id, at, renderer.transform());
                } else {
                    self.nav_move(id, at, renderer, events);
                }
            }
            EditorCommand::PointerUp { id, x, y, time_ms } => {
                if !renderer.is_open() {
                    return Ok(());
                }
                let at = Point::new(x, y);
                if self.tool.tool.is_drawing() {
                    return self.draw_up(id, at, renderer, annotations, events);
                }
                self.nav_up(id, at, time_ms, renderer, events);
            }
            EditorCommand::Fling { vx, vy } => return self.fling(vx, vy, renderer, events),
            EditorCommand::SubmitText { text } => {
                return self.submit_text(&text, annotations, events);
            }
            EditorCommand::SubmitSignature { image } => {
                return self.submit_signature(image, annotations, events);
            }
            EditorCommand::CancelPending => self.cancel(events),
            EditorCommand::Undo => {
                if annotations.undo().is_some() {
                    events.push(history(annotations));
                }
            }
            EditorCommand::Redo => {
                if annotations.redo().is_some() {
                    events.push(history(annotations));
                }
            }
            EditorCommand::NextPage => {
                if renderer.next_page()? {
                    self.page_changed(renderer, events)?;
                }
            }
            EditorCommand::PreviousPage => {
                if renderer.previous_page()? {
                    self.page_changed(renderer, events)?;
                }
            }
            EditorCommand::GoToPage { index } => {
                renderer.go_to(index)?;
                self.page_changed(renderer, events)?;
            }
            EditorCommand::Reload => {
                renderer.reload()?;
                self.page_changed(renderer, events)?;
            }
            EditorCommand::Resize { width, height } => {
                if renderer.set_view_size(width, height) {
                    events.push(view_changed(renderer.transform()));
                }
            }
        }
        Ok(())
    }

    // -- Tool state -----------------------------------------------------------

    fn select_tool(&mut self, tool: Tool, events: &mut Vec<EditorEvent>) {
        self.draft = None;
        self.parked = None;
        self.gesture = Gesture::default();
        self.set_tool(tool, events);
    }

    fn set_tool(&mut self, tool: Tool, events: &mut Vec<EditorEvent>) {
        if self.tool.tool != tool {
            self.tool.tool = tool;
            events.push(EditorEvent::ToolChanged { tool });
        }
    }

    /// Discard the shape in progress and any parked box; back to NONE.
    fn cancel(&mut self, events: &mut Vec<EditorEvent>) {
        if self.draft.take().is_some() || self.parked.take().is_some() {
            debug!("pending shape cancelled");
        }
        self.set_tool(Tool::None, events);
    }

    fn page_changed(&mut self, renderer: &PageRenderer, events: &mut Vec<EditorEvent>) -> Result<()> {
        let (index, total) = renderer.position()?;
        events.push(EditorEvent::PageChanged { index, total });
        // Raster geometry belongs to the page it was drawn on.
        self.draft = None;
        self.gesture = Gesture::default();
        if self.parked.take().is_some() {
            self.set_tool(Tool::None, events);
        }
        Ok(())
    }

    // -- Drawing --------------------------------------------------------------

    fn draw_down(&mut self, id: PointerId, at: Point, transform: &CoordinateTransform) {
        if self.draft.is_some() || self.parked.is_some() {
            return;
        }
        let p = transform.convert_point(at, Space::Display, Space::Raster);
        self.draft = Some(if self.tool.tool.is_freehand() {
            let mut smoother = StrokeSmoother::new(self.config.smoothing_steps);
            smoother.push(p);
            Draft::Stroke {
                pointer: id,
                smoother,
            }
        } else {
            Draft::Shape {
                pointer: id,
                anchor: p,
                rect: Rect::at(p),
            }
        });
    }

    fn draw_move(&mut self, id: PointerId, at: Point, transform: &CoordinateTransform) {
        let p = transform.convert_point(at, Space::Display, Space::Raster);
        match &mut self.draft {
            Some(Draft::Shape {
                pointer,
                anchor,
                rect,
            }) if *pointer == id => *rect = Rect::from_points(*anchor, p),
            Some(Draft::Stroke { pointer, smoother }) if *pointer == id => smoother.push(p),
            _ => {}
        }
    }

    fn draw_up(
        &mut self,
        id: PointerId,
        at: Point,
        renderer: &PageRenderer,
        annotations: &mut AnnotationSet,
        events: &mut Vec<EditorEvent>,
    ) -> Result<()> {
        if self.draft.as_ref().map(Draft::pointer) != Some(id) {
            return Ok(());
        }
        self.draw_move(id, at, renderer.transform());
        match self.draft.take() {
            Some(draft) => self.finalize(draft, renderer, annotations, events),
            None => Ok(()),
        }
    }

    /// Convert a finished draft to document space and apply the per-tool
    /// acceptance policy.
    fn finalize(
        &mut self,
        draft: Draft,
        renderer: &PageRenderer,
        annotations: &mut AnnotationSet,
        events: &mut Vec<EditorEvent>,
    ) -> Result<()> {
        let page_index = renderer.current_index().ok_or(PagewerkError::NoDocument)?;
        let transform = renderer.transform();
        let tool = self.tool;

        let kind = match draft {
            Draft::Stroke { smoother, .. } => {
                if smoother.sample_count() < self.config.min_ink_samples {
                    return Err(PagewerkError::DegenerateGeometry);
                }
                let points = smoother
                    .finish()
                    .into_iter()
                    .map(|p| transform.convert_point(p, Space::Raster, Space::Document))
                    .collect();
                AnnotationKind::Ink {
                    strokes: vec![points],
                    color: tool.color,
                    width: transform.convert_length(tool.stroke_width, Space::Raster, Space::Document),
                }
            }
            Draft::Shape { rect, .. } => {
                let rect = transform.convert_rect(rect, Space::Raster, Space::Document);
                debug!(
                    left = rect.left,
                    top = rect.top,
                    width = rect.width(),
                    height = rect.height(),
                    "shape finalized"
                );
                match tool.tool {
                    Tool::Highlight | Tool::Underline | Tool::Strikeout => {
                        self.require(rect.width() > self.config.min_markup_width)?;
                        let style = markup_style(tool.tool).ok_or(PagewerkError::DegenerateGeometry)?;
                        AnnotationKind::Markup {
                            rect,
                            style,
                            color: style.default_color(),
                        }
                    }
                    Tool::RedactBlack | Tool::RedactWhite => {
                        self.require(rect.width() > self.config.min_markup_width)?;
                        let fill = if tool.tool == Tool::RedactBlack {
                            RedactionFill::Black
                        } else {
                            RedactionFill::White
                        };
                        AnnotationKind::Redaction { rect, fill }
                    }
                    Tool::Text => {
                        self.require(
                            rect.width() > self.config.min_text_width
                                && rect.height() > self.config.min_text_height,
                        )?;
                        self.park(ContentKind::Text, rect, page_index);
                        events.push(EditorEvent::TextRectSelected { rect });
                        return Ok(());
                    }
                    Tool::Signature => {
                        self.require(
                            rect.width() > self.config.min_signature_width
                                && rect.height() > self.config.min_signature_height,
                        )?;
                        self.park(ContentKind::Signature, rect, page_index);
                        events.push(EditorEvent::SignatureRectSelected { rect });
                        return Ok(());
                    }
                    Tool::None | Tool::Pen => return Ok(()),
                }
            }
        };

        commit(Annotation::new(page_index, kind), annotations, events)
    }

    fn require(&self, accepted: bool) -> Result<()> {
        if accepted {
            Ok(())
        } else {
            Err(PagewerkError::DegenerateGeometry)
        }
    }

    fn park(&mut self, kind: ContentKind, rect: Rect, page_index: usize) {
        self.parked = Some(Parked {
            kind,
            rect,
            page_index,
        });
    }

    /// Take the parked box if it is waiting for `kind`. Either way the tool
    /// returns to NONE once content is submitted.
    fn take_parked(&mut self, kind: ContentKind, events: &mut Vec<EditorEvent>) -> Option<Parked> {
        let parked = self.parked.take_if(|p| p.kind == kind);
        if parked.is_none() {
            debug!(?kind, "no box is waiting for this content");
            return None;
        }
        self.set_tool(Tool::None, events);
        parked
    }

    fn submit_text(
        &mut self,
        text: &str,
        annotations: &mut AnnotationSet,
        events: &mut Vec<EditorEvent>,
    ) -> Result<()> {
        let Some(parked) = self.take_parked(ContentKind::Text, events) else {
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let kind = AnnotationKind::Text {
            rect: parked.rect,
            text: text.to_string(),
            font_size: self.config.default_font_size,
            color: self.tool.color,
        };
        commit(Annotation::new(parked.page_index, kind), annotations, events)
    }

    fn submit_signature(
        &mut self,
        image: ImageRef,
        annotations: &mut AnnotationSet,
        events: &mut Vec<EditorEvent>,
    ) -> Result<()> {
        let Some(parked) = self.take_parked(ContentKind::Signature, events) else {
            return Ok(());
        };
        let kind = AnnotationKind::Signature {
            rect: parked.rect,
            image,
        };
        commit(Annotation::new(parked.page_index, kind), annotations, events)
    }

    // -- Navigation -----------------------------------------------------------

    fn nav_down(&mut self, id: PointerId, at: Point, time_ms: u64) {
        let g = &mut self.gesture;
        if g.pointers.len() >= 2 || g.pointers.iter().any(|(pid, _)| *pid == id) {
            return;
        }
        g.pointers.push((id, at));
        if g.pointers.len() == 2 {
            g.scaling = true;
            g.tap = None;
        } else {
            g.tap = Some(Tap { at, time_ms });
        }
    }

    fn nav_move(
        &mut self,
        id: PointerId,
        at: Point,
        renderer: &mut PageRenderer,
        events: &mut Vec<EditorEvent>,
    ) {
        let slop = self.config.double_tap_slop;
        let g = &mut self.gesture;
        let Some(slot) = g.pointers.iter().position(|(pid, _)| *pid == id) else {
            return;
        };
        let viewport = renderer.transform_mut().viewport_mut();

        if g.pointers.len() == 1 {
            let last = g.pointers[0].1;
            g.pointers[0].1 = at;
            if g.tap.is_some_and(|tap| tap.at.distance(at) > slop) {
                g.tap = None;
            }
            viewport.pan_by(at.x - last.x, at.y - last.y);
        } else {
            let (a0, b0) = (g.pointers[0].1, g.pointers[1].1);
            g.pointers[slot].1 = at;
            let (a1, b1) = (g.pointers[0].1, g.pointers[1].1);

            let (m0, m1) = (a0.midpoint(b0), a1.midpoint(b1));
            viewport.pan_by(m1.x - m0.x, m1.y - m0.y);
            let (d0, d1) = (a0.distance(b0), a1.distance(b1));
            if d0 > f64::EPSILON && d1 > f64::EPSILON {
                viewport.zoom_about(d1 / d0, m1);
            }
        }
        events.push(view_changed(renderer.transform()));
    }

    fn nav_up(
        &mut self,
        id: PointerId,
        at: Point,
        time_ms: u64,
        renderer: &mut PageRenderer,
        events: &mut Vec<EditorEvent>,
    ) {
        let g = &mut self.gesture;
        let before = g.pointers.len();
        g.pointers.retain(|(pid, _)| *pid != id);
        if g.pointers.len() == before || !g.pointers.is_empty() {
            return;
        }
        g.scaling = false;

        let Some(tap) = g.tap.take().filter(|t| t.at.distance(at) <= self.config.double_tap_slop) else {
            return;
        };
        let is_double = self.last_tap.take().is_some_and(|prev| {
            time_ms.saturating_sub(prev.time_ms) <= self.config.double_tap_window_ms
                && prev.at.distance(tap.at) <= self.config.double_tap_slop
        });
        if is_double {
            debug!("double tap, fitting page to view");
            if renderer.fit_to_view() {
                events.push(view_changed(renderer.transform()));
            }
        } else {
            self.last_tap = Some(Tap { at: tap.at, time_ms });
        }
    }

    fn fling(
        &mut self,
        vx: f64,
        vy: f64,
        renderer: &mut PageRenderer,
        events: &mut Vec<EditorEvent>,
    ) -> Result<()> {
        if self.tool.tool.is_drawing() || self.gesture.scaling || !renderer.is_open() {
            return Ok(());
        }
        if vx.abs() <= vy.abs() || vx.abs() <= self.config.fling_velocity {
            return Ok(());
        }
        let moved = if vx < 0.0 {
            renderer.next_page()?
        } else {
            renderer.previous_page()?
        };
        if moved {
            self.page_changed(renderer, events)?;
        }
        Ok(())
    }

    // -- Preview --------------------------------------------------------------

    /// The shape to draw over the current page, in raster pixels.
    pub fn preview(&self, renderer: &PageRenderer) -> Option<Preview> {
        if let Some(draft) = &self.draft {
            return Some(match draft {
                Draft::Stroke { smoother, .. } => Preview::Stroke {
                    points: smoother.points().to_vec(),
                    color: self.tool.color,
                    width: self.tool.stroke_width,
                },
                Draft::Shape { rect, .. } => match self.tool.tool {
                    Tool::RedactBlack => Preview::Redaction {
                        rect: *rect,
                        fill: RedactionFill::Black,
                    },
                    Tool::RedactWhite => Preview::Redaction {
                        rect: *rect,
                        fill: RedactionFill::White,
                    },
                    tool => match markup_style(tool) {
                        Some(style) => Preview::Markup { rect: *rect, style },
                        None => Preview::Frame { rect: *rect },
                    },
                },
            });
        }
        let parked = self.parked?;
        (renderer.current_index() == Some(parked.page_index)).then(|| Preview::Frame {
            rect: renderer
                .transform()
                .convert_rect(parked.rect, Space::Document, Space::Raster),
        })
    }
}

// -- Helpers ------------------------------------------------------------------

fn default_tool(config: &InteractionConfig) -> ToolState {
    ToolState {
        stroke_width: config.default_stroke_width,
        ..ToolState::default()
    }
}

fn markup_style(tool: Tool) -> Option<MarkupStyle> {
    match tool {
        Tool::Highlight => Some(MarkupStyle::Highlight),
        Tool::Underline => Some(MarkupStyle::Underline),
        Tool::Strikeout => Some(MarkupStyle::Strikeout),
        _ => None,
    }
}

fn commit(
    annotation: Annotation,
    annotations: &mut AnnotationSet,
    events: &mut Vec<EditorEvent>,
) -> Result<()> {
    let id = annotation.id();
    annotations.add(annotation)?;
    events.push(EditorEvent::AnnotationAdded { id });
    events.push(history(annotations));
    Ok(())
}

fn history(annotations: &AnnotationSet) -> EditorEvent {
    EditorEvent::HistoryChanged {
        can_undo: annotations.can_undo(),
        can_redo: annotations.can_redo(),
    }
}

fn view_changed(transform: &CoordinateTransform) -> EditorEvent {
    let viewport = transform.viewport();
    EditorEvent::ViewChanged {
        scale: viewport.scale(),
        pan: viewport.pan(),
    }
}
