// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for headless and CI builds where no interactive host exists.
//
// Every interactive method returns `PlatformUnavailable`.

use std::path::Path;

use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{ImageRef, Rect};

use crate::traits::*;

/// No-op bridge returned when no host integration is available.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl TextEntry for StubBridge {
    fn request_text(&self, _rect: Rect) -> Result<Option<String>> {
        tracing::warn!("TextEntry::request_text called on stub bridge");
        Err(PagewerkError::PlatformUnavailable)
    }
}

impl SignatureCapture for StubBridge {
    fn capture_signature(&self) -> Result<Option<ImageRef>> {
        tracing::warn!("SignatureCapture::capture_signature called on stub bridge");
        Err(PagewerkError::PlatformUnavailable)
    }
}

impl ShareTarget for StubBridge {
    fn share_file(&self, _path: &Path, _mime_type: &str) -> Result<()> {
        tracing::warn!("ShareTarget::share_file called on stub bridge");
        Err(PagewerkError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_platform_unavailable() {
        let bridge = StubBridge;
        assert!(matches!(
            bridge.request_text(Rect::new(0.0, 0.0, 10.0, 10.0)),
            Err(PagewerkError::PlatformUnavailable)
        ));
        assert!(matches!(
            bridge.capture_signature(),
            Err(PagewerkError::PlatformUnavailable)
        ));
        assert!(matches!(
            bridge.share_file(Path::new("/tmp/out.pdf"), "application/pdf"),
            Err(PagewerkError::PlatformUnavailable)
        ));
    }
}
