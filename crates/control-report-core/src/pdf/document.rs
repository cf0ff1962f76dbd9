use lopdf::Document;

use crate::error::{Error, Result};

/// A serialized report for one case, before attachments are appended.
///
/// Produced and consumed within a single generation call.
#[derive(Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    case_id: u32,
    bytes: Vec<u8>,
    page_count: usize,
    /// MD5 hex of the bytes, computed once
    digest: String,
}

impl ComposedDocument {
    pub(crate) fn new(case_id: u32, bytes: Vec<u8>, page_count: usize) -> Self {
        let digest = format!("{:x}", md5::compute(&bytes));
        Self {
            case_id,
            bytes,
            page_count,
            digest,
        }
    }

    /// Wrap bytes produced elsewhere, counting their pages.
    pub fn from_bytes(case_id: u32, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let page_count = page_count(&bytes)?;
        Ok(Self::new(case_id, bytes, page_count))
    }

    pub const fn case_id(&self) -> u32 {
        self.case_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Content digest (MD5 hex), handy for logs and idempotence checks.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl std::fmt::Debug for ComposedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedDocument")
            .field("case_id", &self.case_id)
            .field("page_count", &self.page_count)
            .field("bytes_len", &self.bytes.len())
            .field("digest", &self.digest)
            .finish()
    }
}

/// Number of pages of a serialized PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| Error::Lopdf(format!("Failed to parse PDF: {e}")))?;
    Ok(doc.get_pages().len())
}
