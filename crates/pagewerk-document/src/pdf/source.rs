// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF source — load a document with `lopdf`, refuse encrypted files, and
// expose page geometry in document units. The pristine bytes are kept
// alongside the parsed document so the bake engine can always start over
// from an untouched copy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::PageSize;
use tracing::{debug, info, instrument, warn};

/// US Letter, used when a page has no usable MediaBox.
const FALLBACK_MEDIA_BOX: PageBox = PageBox {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// Depth limit when following `/Parent` links.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A page's MediaBox in its native bottom-left-origin coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.width(), self.height())
    }

    /// Map a top-left-origin document point to native page space.
    pub fn to_native(&self, x: f64, y: f64) -> (f64, f64) {
        (self.llx + x, self.ury - y)
    }
}

/// An opened, unencrypted PDF.
pub struct PdfSource {
    document: Document,
    bytes: Arc<[u8]>,
    page_ids: Vec<ObjectId>,
    source_path: Option<PathBuf>,
}

impl std::fmt::Debug for PdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfSource")
            .field("pages", &self.page_ids.len())
            .field("bytes", &self.bytes.len())
            .field("source_path", &self.source_path)
            .finish()
    }
}

impl PdfSource {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let bytes = std::fs::read(path_ref).map_err(|err| {
            PagewerkError::SourceUnavailable(format!("cannot read {}: {}", path_ref.display(), err))
        })?;

        let mut source = Self::from_bytes(bytes)?;
        source.source_path = Some(path_ref.to_path_buf());
        Ok(source)
    }

    /// Parse a PDF already in memory.
    #[instrument(skip_all)]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        debug!(bytes_len = bytes.len(), "parsing PDF");

        let document = Document::load_mem(&bytes).map_err(|err| {
            PagewerkError::SourceUnavailable(format!("failed to parse PDF: {}", err))
        })?;
        if is_encrypted(&document) {
            warn!("refusing encrypted PDF");
            return Err(PagewerkError::Encrypted);
        }

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PagewerkError::SourceUnavailable(
                "document has no pages".to_string(),
            ));
        }
        debug!(pages = page_ids.len(), "PDF loaded");

        Ok(Self {
            document,
            bytes,
            page_ids,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// The untouched bytes the document was parsed from.
    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Take the parsed document for mutation.
    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Object id of the page at zero-based `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PagewerkError::PageOutOfRange {
                index,
                page_count: self.page_ids.len(),
            })
    }

    pub fn page_box(&self, index: usize) -> Result<PageBox> {
        let id = self.page_id(index)?;
        Ok(page_box(&self.document, id))
    }

    pub fn page_size(&self, index: usize) -> Result<PageSize> {
        Ok(self.page_box(index)?.size())
    }
}

// -- Page tree helpers --------------------------------------------------------

/// Whether the trailer names an encryption dictionary. Documents that
/// open with the empty user password count as encrypted too.
pub fn is_encrypted(document: &Document) -> bool {
    document.trailer.has(b"Encrypt") || document.encryption_state.is_some()
}

/// Follow a reference to its target. Non-references are returned as-is.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Resolve an object to a dictionary, looking through references and
/// stream dictionaries.
pub(crate) fn as_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Numeric value of an object (integer or real), resolving references.
pub(crate) fn as_number(doc: &Document, object: &Object) -> Option<f64> {
    match resolve(doc, object) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Look up a page attribute, walking `/Parent` for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        dict = as_dict(doc, dict.get(b"Parent").ok()?)?;
    }
    None
}

fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let parsed = inherited(doc, page_id, b"MediaBox").and_then(|obj| match resolve(doc, obj) {
        Object::Array(values) if values.len() == 4 => {
            let n: Vec<f64> = values.iter().filter_map(|v| as_number(doc, v)).collect();
            (n.len() == 4).then(|| PageBox {
                llx: n[0].min(n[2]),
                lly: n[1].min(n[3]),
                urx: n[0].max(n[2]),
                ury: n[1].max(n[3]),
            })
        }
        _ => None,
    });
    parsed.unwrap_or_else(|| {
        warn!(?page_id, "page has no usable MediaBox, assuming US Letter");
        FALLBACK_MEDIA_BOX
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn page_count_and_size() {
        let bytes = pdf_with_pages(&[
            ([0.0, 0.0, 612.0, 792.0], vec![]),
            ([0.0, 0.0, 200.0, 100.0], vec![]),
        ]);
        let src = PdfSource::from_bytes(bytes).expect("load");
        assert_eq!(src.page_count(), 2);
        assert_eq!(src.page_size(1).expect("size"), PageSize::new(200.0, 100.0));
    }

    #[test]
    fn out_of_range_page_reported() {
        let src = PdfSource::from_bytes(blank_pdf(1)).expect("load");
        assert!(matches!(
            src.page_box(3),
            Err(PagewerkError::PageOutOfRange { index: 3, page_count: 1 })
        ));
    }

    #[test]
    fn non_zero_origin_media_box() {
        let bytes = pdf_with_pages(&[([10.0, 20.0, 110.0, 220.0], vec![])]);
        let src = PdfSource::from_bytes(bytes).expect("load");
        let pb = src.page_box(0).expect("box");
        assert_eq!(pb.size(), PageSize::new(100.0, 200.0));
        assert_eq!(pb.to_native(5.0, 5.0), (15.0, 215.0));
    }

    #[test]
    fn trailer_encrypt_entry_rejected() {
        assert!(matches!(
            PdfSource::from_bytes(encrypted_pdf()),
            Err(PagewerkError::Encrypted)
        ));
    }

    #[test]
    fn encrypt_token_in_page_content_is_not_encryption() {
        let bytes = pdf_mentioning_encrypt();
        assert!(bytes.windows(8).any(|w| w == b"/Encrypt"), "token present in file");
        let src = PdfSource::from_bytes(bytes).expect("plain document opens");
        assert_eq!(src.page_count(), 1);
    }

    #[test]
    fn garbage_is_source_unavailable() {
        let err = PdfSource::from_bytes(b"not a pdf".to_vec()).expect_err("garbage");
        assert!(matches!(err, PagewerkError::SourceUnavailable(_)));
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = PdfSource::open("/nonexistent/pagewerk/missing.pdf").expect_err("missing");
        assert!(matches!(err, PagewerkError::SourceUnavailable(_)));
    }
}
