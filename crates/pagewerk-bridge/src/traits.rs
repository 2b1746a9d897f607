// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator traits consumed by the editor.
//
// The editor never talks to a file picker, keyboard or share sheet directly.
// Each capability sits behind one of these traits so a host (desktop shell,
// mobile wrapper, CLI, test harness) can supply its own implementation.

use std::path::Path;

use pagewerk_core::error::Result;
use pagewerk_core::{ImageRef, Rect};
use pagewerk_document::PdfSource;

/// Supplies original documents by path or identifier.
pub trait DocumentSource {
    /// Load and parse the document named by `locator`.
    ///
    /// A missing or corrupt document is `SourceUnavailable`; an encrypted
    /// one is `Encrypted`.
    fn open_document(&self, locator: &str) -> Result<PdfSource>;
}

/// Asks the user for the contents of a text annotation.
pub trait TextEntry {
    /// `rect` is the chosen box in document units.
    /// Returns `Ok(None)` if the user cancelled.
    fn request_text(&self, rect: Rect) -> Result<Option<String>>;
}

/// Captures a handwritten signature.
pub trait SignatureCapture {
    /// Returns the captured image (transparent background, cropped to the
    /// ink with a fixed margin) or `Ok(None)` if nothing was drawn.
    fn capture_signature(&self) -> Result<Option<ImageRef>>;
}

/// Hands a finished document to the platform share mechanism.
pub trait ShareTarget {
    fn share_file(&self, path: &Path, mime_type: &str) -> Result<()>;
}

/// Every interactive capability a host provides.
pub trait PlatformBridge: TextEntry + SignatureCapture + ShareTarget + Send + Sync {
    /// Human-readable platform name (e.g. "Desktop (stub)").
    fn platform_name(&self) -> &str;
}
