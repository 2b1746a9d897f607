// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The annotation model. All geometry is held in document units with a
// top-left origin; flipping into a page's native coordinate system is the
// bake engine's concern.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::types::{AnnotationId, Color};

/// Visual style of a markup annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupStyle {
    Highlight,
    Underline,
    Strikeout,
}

impl MarkupStyle {
    /// Fixed colour each style is created with.
    pub fn default_color(&self) -> Color {
        match self {
            Self::Highlight => Color::YELLOW,
            Self::Underline => Color::BLUE,
            Self::Strikeout => Color::RED,
        }
    }
}

/// Fill of a redaction box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionFill {
    Black,
    White,
}

impl RedactionFill {
    pub fn is_black(&self) -> bool {
        matches!(self, Self::Black)
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Black => Color::BLACK,
            Self::White => Color::WHITE,
        }
    }
}

/// Reference to an encoded (PNG or JPEG) signature image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRef {
    /// Image file on disk, read when the annotation is painted or baked.
    Path(PathBuf),
    /// Image bytes already in memory.
    Encoded(Arc<[u8]>),
}

impl ImageRef {
    pub fn encoded(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Encoded(bytes.into())
    }

    /// Encoded image bytes.
    pub fn read(&self) -> Result<Arc<[u8]>> {
        match self {
            Self::Path(path) => Ok(std::fs::read(path)?.into()),
            Self::Encoded(bytes) => Ok(Arc::clone(bytes)),
        }
    }
}

/// Variant payload of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Markup {
        rect: Rect,
        style: MarkupStyle,
        color: Color,
    },
    Ink {
        /// Each stroke is an ordered polyline.
        strokes: Vec<Vec<Point>>,
        color: Color,
        /// Line width in document units.
        width: f64,
    },
    Redaction {
        rect: Rect,
        fill: RedactionFill,
    },
    Text {
        rect: Rect,
        text: String,
        font_size: f64,
        color: Color,
    },
    Signature {
        rect: Rect,
        image: ImageRef,
    },
}

impl AnnotationKind {
    /// Short lowercase label, used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Markup { style, .. } => match style {
                MarkupStyle::Highlight => "highlight",
                MarkupStyle::Underline => "underline",
                MarkupStyle::Strikeout => "strikeout",
            },
            Self::Ink { .. } => "ink",
            Self::Redaction { .. } => "redaction",
            Self::Text { .. } => "text",
            Self::Signature { .. } => "signature",
        }
    }
}

/// A finalized annotation. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    page_index: usize,
    created_at: DateTime<Utc>,
    kind: AnnotationKind,
}

impl Annotation {
    pub fn new(page_index: usize, kind: AnnotationKind) -> Self {
        Self {
            id: AnnotationId::new(),
            page_index,
            created_at: Utc::now(),
            kind,
        }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// Zero-based page index.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    /// Area the annotation covers on its page, in document units.
    pub fn bounds(&self) -> Rect {
        match &self.kind {
            AnnotationKind::Markup { rect, .. }
            | AnnotationKind::Redaction { rect, .. }
            | AnnotationKind::Text { rect, .. }
            | AnnotationKind::Signature { rect, .. } => *rect,
            AnnotationKind::Ink { strokes, width, .. } => {
                Rect::bounding(strokes.iter().flatten().copied())
                    .map(|r| r.inflate(width / 2.0))
                    .unwrap_or_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let a = Annotation::new(0, AnnotationKind::Redaction { rect, fill: RedactionFill::Black });
        let b = Annotation::new(0, AnnotationKind::Redaction { rect, fill: RedactionFill::Black });
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn ink_bounds_include_half_width() {
        let ann = Annotation::new(
            1,
            AnnotationKind::Ink {
                strokes: vec![vec![Point::new(10.0, 10.0), Point::new(20.0, 30.0)]],
                color: Color::BLACK,
                width: 2.0,
            },
        );
        assert_eq!(ann.bounds(), Rect::new(9.0, 9.0, 21.0, 31.0));
        assert_eq!(ann.page_index(), 1);
    }

    #[test]
    fn markup_default_colours() {
        assert_eq!(MarkupStyle::Highlight.default_color(), Color::YELLOW);
        assert_eq!(MarkupStyle::Underline.default_color(), Color::BLUE);
        assert_eq!(MarkupStyle::Strikeout.default_color(), Color::RED);
    }

    #[test]
    fn encoded_image_reads_back_shared_bytes() {
        let img = ImageRef::encoded(vec![1u8, 2, 3]);
        let bytes = img.read().expect("in-memory read");
        assert_eq!(&*bytes, &[1, 2, 3]);
    }

    #[test]
    fn missing_image_path_is_io_error() {
        let img = ImageRef::Path(PathBuf::from("/nonexistent/pagewerk/sig.png"));
        assert!(matches!(img.read(), Err(crate::PagewerkError::Io(_))));
    }
}
