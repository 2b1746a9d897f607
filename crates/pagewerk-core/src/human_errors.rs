// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the editor UI.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The taxonomy uses three severity levels that drive UI presentation.

use serde::Serialize;

use crate::error::PagewerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Busy or interrupted. Trying again is likely to work.
    Transient,
    /// User must do something (pick another file, choose another page).
    ActionRequired,
    /// Cannot be fixed by retrying. Wrong file type, protected file.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the same action may simply be repeated.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert a `PagewerkError` into a `HumanError` suitable for a dialog.
pub fn humanize_error(err: &PagewerkError) -> HumanError {
    match err {
        // -- Source errors --
        PagewerkError::SourceUnavailable(_) => HumanError::new(
            "This document couldn't be opened.",
            "The file may be missing or damaged. Try opening it again, or choose a different file.",
            false,
            Severity::ActionRequired,
        ),

        PagewerkError::Encrypted => HumanError::new(
            "This document is password protected.",
            "Protected documents can't be edited. Remove the password in another app, then open the copy.",
            false,
            Severity::Permanent,
        ),

        PagewerkError::PageOutOfRange { index, page_count } => HumanError::new(
            "That page doesn't exist.",
            format!(
                "This document has {page_count} pages; page {} is past the end.",
                index + 1
            ),
            false,
            Severity::ActionRequired,
        ),

        PagewerkError::NoDocument => HumanError::new(
            "No document is open.",
            "Open a PDF first.",
            false,
            Severity::ActionRequired,
        ),

        // -- Geometry --
        PagewerkError::DegenerateGeometry => HumanError::new(
            "That mark was too small.",
            "Drag a little further to make a bigger box.",
            true,
            Severity::ActionRequired,
        ),

        PagewerkError::InvalidTransform(_) => HumanError::new(
            "The view got into a bad state.",
            "Double-tap the page to reset the zoom.",
            true,
            Severity::Transient,
        ),

        PagewerkError::ZeroSizedTarget { .. } => HumanError::new(
            "This page is empty and can't be shown.",
            "The document may be damaged. Try another page or another file.",
            false,
            Severity::Permanent,
        ),

        // -- Bake --
        PagewerkError::BakeInProgress => HumanError::new(
            "Your document is still being saved.",
            "Wait for the current save to finish, then try again.",
            true,
            Severity::Transient,
        ),

        PagewerkError::BakeFailed(detail) => {
            if detail.contains("signature") {
                HumanError::new(
                    "A signature couldn't be added to the document.",
                    "The signature image may have been removed. Sign again, then save.",
                    false,
                    Severity::ActionRequired,
                )
            } else {
                HumanError::new(
                    "The document couldn't be saved.",
                    "Your edits are still here. Try saving again, or save to a different folder.",
                    true,
                    Severity::Transient,
                )
            }
        }

        PagewerkError::ImageError(_) => HumanError::new(
            "There's a problem with this image.",
            "The image may be damaged or in an unusual format. Try saving it as a PNG first.",
            false,
            Severity::Permanent,
        ),

        // -- Configuration / persistence --
        PagewerkError::Config(detail) => HumanError::new(
            "The settings file has a mistake in it.",
            format!("Fix or delete the settings file. ({detail})"),
            false,
            Severity::ActionRequired,
        ),

        PagewerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "The file couldn't be found.",
                "It may have been moved or deleted. Try choosing the file again.",
                false,
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "The app doesn't have permission to use that file.",
                "Check the file permissions, or save to a different location.",
                false,
                Severity::ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, your device's storage may be full.",
                true,
                Severity::Transient,
            ),
        },

        PagewerkError::Serialization(_) => HumanError::new(
            "The app had an internal data problem.",
            "Try again. If this keeps happening, please report it.",
            true,
            Severity::Transient,
        ),

        // -- Platform --
        PagewerkError::Bridge(_) => HumanError::new(
            "A device-specific feature didn't work.",
            "Try again. Some features may not be available on all devices.",
            true,
            Severity::Transient,
        ),

        PagewerkError::PlatformUnavailable => HumanError::new(
            "This feature isn't available on your device.",
            "Some features require a specific type of phone or tablet.",
            false,
            Severity::Permanent,
        ),
    }
}
