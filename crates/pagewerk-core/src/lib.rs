// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk — Core geometry, annotation model, coordinate transforms, history
// store and error definitions shared across all crates.

pub mod annotation;
pub mod config;
pub mod error;
pub mod geometry;
pub mod human_errors;
pub mod store;
pub mod transform;
pub mod types;

pub use annotation::{Annotation, AnnotationKind, ImageRef, MarkupStyle, RedactionFill};
pub use config::AppConfig;
pub use error::PagewerkError;
pub use geometry::{Point, Rect, StrokeSmoother};
pub use store::AnnotationSet;
pub use transform::{CoordinateTransform, Space, Viewport};
pub use types::*;
