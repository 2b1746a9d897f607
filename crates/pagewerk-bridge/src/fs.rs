// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem document source.

use std::path::{Path, PathBuf};

use pagewerk_core::error::Result;
use pagewerk_document::PdfSource;
use tracing::debug;

use crate::traits::DocumentSource;

/// Resolves locators as filesystem paths, optionally under a root directory.
#[derive(Debug, Clone, Default)]
pub struct FileSystemSource {
    root: Option<PathBuf>,
}

impl FileSystemSource {
    /// Locators are used as given (absolute or relative to the working directory).
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative locators resolve under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl DocumentSource for FileSystemSource {
    fn open_document(&self, locator: &str) -> Result<PdfSource> {
        let path = self.resolve(locator);
        debug!(path = %path.display(), "opening document from filesystem");
        PdfSource::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewerk_core::PagewerkError;

    #[test]
    fn missing_and_encrypted_are_distinct() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FileSystemSource::with_root(dir.path());

        let missing = source.open_document("nope.pdf").expect_err("missing");
        assert!(matches!(missing, PagewerkError::SourceUnavailable(_)));

        std::fs::write(
            dir.path().join("locked.pdf"),
            b"%PDF-1.7\n1 0 obj << /Encrypt 2 0 R >> endobj\n%%EOF\n",
        )
        .expect("write");
        let locked = source.open_document("locked.pdf").expect_err("encrypted");
        assert!(matches!(locked, PagewerkError::Encrypted));
    }

    #[test]
    fn absolute_locators_ignore_root() {
        let source = FileSystemSource::with_root("/srv/docs");
        assert_eq!(source.resolve("/tmp/a.pdf"), PathBuf::from("/tmp/a.pdf"));
        assert_eq!(source.resolve("b.pdf"), PathBuf::from("/srv/docs/b.pdf"));
    }
}
