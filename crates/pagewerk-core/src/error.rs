// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagewerk.

use thiserror::Error;

/// Top-level error type for all Pagewerk operations.
#[derive(Debug, Error)]
pub enum PagewerkError {
    // -- Source errors --
    #[error("document source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("document is encrypted")]
    Encrypted,

    #[error("page {index} out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    #[error("no document is open")]
    NoDocument,

    // -- Geometry errors --
    #[error("shape is too small to become an annotation")]
    DegenerateGeometry,

    #[error("invalid view transform: {0}")]
    InvalidTransform(String),

    #[error("page has zero-sized target ({width}x{height})")]
    ZeroSizedTarget { width: f64, height: f64 },

    // -- Bake errors --
    #[error("a bake is already in progress")]
    BakeInProgress,

    #[error("bake failed: {0}")]
    BakeFailed(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagewerkError>;
