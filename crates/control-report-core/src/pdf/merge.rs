//! Attachment Merger: appends the pages of eligible PDF attachments after the
//! composed report.
//!
//! Nothing in here fails the caller. Unusable attachments are skipped with a
//! [`SkipReason`], and if the merge step itself breaks (scratch area, writer,
//! a panic inside lopdf) the composed bytes are handed back unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::MergeConfig;
use crate::error::{Error, Result};
use crate::model::Attachment;
use super::document::ComposedDocument;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page trees deeper than this are treated as cyclic
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when neither a page nor its ancestors declare a MediaBox
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

const SCRATCH_PREFIX: &str = "control-report-";

/// Why an attachment contributed no pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file name does not end in `.pdf`
    NotPdf,
    /// Larger than the configured limit
    TooLarge { size: u64, limit: u64 },
    /// lopdf could not parse the content
    Unreadable(String),
    Encrypted,
    /// Parsed, but the page tree is empty
    NoPages,
    /// The merge step failed as a whole and the report fell back to the
    /// composed document
    MergeFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPdf => write!(f, "not a PDF file"),
            Self::TooLarge { size, limit } => {
                write!(f, "{size} bytes exceeds the {limit} byte limit")
            }
            Self::Unreadable(reason) => write!(f, "unreadable PDF: {reason}"),
            Self::Encrypted => write!(f, "encrypted PDF"),
            Self::NoPages => write!(f, "PDF has no pages"),
            Self::MergeFailed => write!(f, "merge aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentStatus {
    Merged { pages: usize },
    Skipped(SkipReason),
}

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOutcome {
    /// Position in the supplied list
    pub index: usize,
    pub filename: String,
    /// MD5 hex of the content
    pub digest: String,
    pub status: AttachmentStatus,
}

impl AttachmentOutcome {
    pub const fn merged_pages(&self) -> usize {
        match self.status {
            AttachmentStatus::Merged { pages } => pages,
            AttachmentStatus::Skipped(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No attachment was eligible; the composed bytes are returned as is
    NoAttachments,
    Merged,
    /// The merge step failed; the composed bytes are returned as is
    FallbackToComposed(String),
}

/// Per-call merge report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub outcome: MergeOutcome,
    pub attachments: Vec<AttachmentOutcome>,
    /// Pages in the returned document
    pub total_pages: usize,
}

impl MergeSummary {
    pub fn merged_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| matches!(a.status, AttachmentStatus::Merged { .. }))
            .count()
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self.outcome, MergeOutcome::FallbackToComposed(_))
    }

    /// Human-readable problems worth surfacing to the caller.
    ///
    /// Non-PDF attachments are expected and not reported.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .attachments
            .iter()
            .filter_map(|a| match &a.status {
                AttachmentStatus::Skipped(SkipReason::NotPdf | SkipReason::MergeFailed)
                | AttachmentStatus::Merged { .. } => None,
                AttachmentStatus::Skipped(reason) => {
                    Some(format!("Attachment '{}' skipped: {reason}", a.filename))
                }
            })
            .collect();
        if let MergeOutcome::FallbackToComposed(reason) = &self.outcome {
            warnings.push(format!(
                "Attachments could not be merged, report contains only the composed pages: {reason}"
            ));
        }
        warnings
    }
}

/// Appends eligible attachments to composed reports.
#[derive(Debug, Clone, Default)]
pub struct AttachmentMerger {
    max_attachment_bytes: Option<u64>,
    scratch_dir: Option<PathBuf>,
}

impl AttachmentMerger {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            max_attachment_bytes: config.max_attachment_bytes,
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    /// Merge `attachments` (in order) after the composed pages.
    ///
    /// Always returns a document: the merged one, or the composed bytes when
    /// there is nothing to merge or the merge failed.
    pub fn merge(
        &self,
        composed: &ComposedDocument,
        attachments: &[Attachment],
    ) -> (Vec<u8>, MergeSummary) {
        let mut outcomes: Vec<AttachmentOutcome> = attachments
            .iter()
            .enumerate()
            .map(|(index, attachment)| AttachmentOutcome {
                index,
                filename: attachment.filename.clone(),
                digest: format!("{:x}", md5::compute(&attachment.content)),
                status: self.screen(attachment),
            })
            .collect();

        let candidates: Vec<usize> = outcomes
            .iter()
            .filter(|o| matches!(o.status, AttachmentStatus::Merged { .. }))
            .map(|o| o.index)
            .collect();
        for outcome in &outcomes {
            log_skip(outcome);
        }

        if candidates.is_empty() {
            return unchanged(composed, outcomes, MergeOutcome::NoAttachments);
        }

        let merged = guarded(|| {
            self.merge_candidates(composed, attachments, &candidates, &mut outcomes)
        });

        match merged {
            Ok(Some((bytes, total_pages))) => {
                debug!(
                    case_id = composed.case_id(),
                    total_pages, "Merged attachments into report"
                );
                let summary = MergeSummary {
                    outcome: MergeOutcome::Merged,
                    attachments: outcomes,
                    total_pages,
                };
                (bytes, summary)
            }
            Ok(None) => unchanged(composed, outcomes, MergeOutcome::NoAttachments),
            Err(e) => {
                let reason = e.to_string();
                warn!(case_id = composed.case_id(), "Falling back to composed report: {reason}");
                for outcome in &mut outcomes {
                    if matches!(outcome.status, AttachmentStatus::Merged { .. }) {
                        outcome.status = AttachmentStatus::Skipped(SkipReason::MergeFailed);
                    }
                }
                unchanged(composed, outcomes, MergeOutcome::FallbackToComposed(reason))
            }
        }
    }

    /// Checks that need no parsing. Eligible attachments are provisionally
    /// marked merged with zero pages.
    fn screen(&self, attachment: &Attachment) -> AttachmentStatus {
        if !attachment.is_pdf() {
            return AttachmentStatus::Skipped(SkipReason::NotPdf);
        }
        let size = u64::try_from(attachment.content.len()).unwrap_or(u64::MAX);
        if let Some(limit) = self.max_attachment_bytes
            && size > limit
        {
            return AttachmentStatus::Skipped(SkipReason::TooLarge { size, limit });
        }
        AttachmentStatus::Merged { pages: 0 }
    }

    /// Returns `None` when every candidate turned out unusable.
    fn merge_candidates(
        &self,
        composed: &ComposedDocument,
        attachments: &[Attachment],
        candidates: &[usize],
        outcomes: &mut [AttachmentOutcome],
    ) -> Result<Option<(Vec<u8>, usize)>> {
        let scratch = Scratch::create(self.scratch_dir.as_deref())
            .map_err(|e| Error::Merge(format!("cannot create scratch directory: {e}")))?;

        let base = Document::load_mem(composed.bytes())
            .map_err(|e| Error::Merge(format!("cannot re-read composed report: {e}")))?;
        let mut builder = MergeBuilder::new(base)?;

        let mut appended = 0;
        for &index in candidates {
            let status = match scratch.write(index, &attachments[index].content) {
                Ok(file) => Self::append(&mut builder, &file),
                Err(e) => return Err(Error::Merge(format!("cannot write scratch file: {e}"))),
            };
            if let AttachmentStatus::Merged { .. } = status {
                appended += 1;
            }
            outcomes[index].status = status;
            log_skip(&outcomes[index]);
        }

        if appended == 0 {
            return Ok(None);
        }
        let total_pages = builder.page_count();
        builder.finish().map(|bytes| Some((bytes, total_pages)))
    }

    fn append(builder: &mut MergeBuilder, file: &ScratchFile) -> AttachmentStatus {
        let loaded = catch_unwind(AssertUnwindSafe(|| Document::load(file.path())))
            .map_err(|payload| panic_message(payload.as_ref()))
            .and_then(|result| result.map_err(|e| e.to_string()));
        let doc = match loaded {
            Ok(doc) => doc,
            Err(reason) => return AttachmentStatus::Skipped(SkipReason::Unreadable(reason)),
        };
        if doc.is_encrypted() {
            return AttachmentStatus::Skipped(SkipReason::Encrypted);
        }

        match catch_unwind(AssertUnwindSafe(|| builder.append(doc))) {
            Ok(0) => AttachmentStatus::Skipped(SkipReason::NoPages),
            Ok(pages) => AttachmentStatus::Merged { pages },
            Err(payload) => {
                AttachmentStatus::Skipped(SkipReason::Unreadable(panic_message(payload.as_ref())))
            }
        }
    }
}

fn unchanged(
    composed: &ComposedDocument,
    attachments: Vec<AttachmentOutcome>,
    outcome: MergeOutcome,
) -> (Vec<u8>, MergeSummary) {
    let summary = MergeSummary {
        outcome,
        attachments,
        total_pages: composed.page_count(),
    };
    (composed.bytes().to_vec(), summary)
}

fn log_skip(outcome: &AttachmentOutcome) {
    match &outcome.status {
        AttachmentStatus::Skipped(SkipReason::NotPdf) => {
            debug!(index = outcome.index, "Ignoring non-PDF attachment '{}'", outcome.filename);
        }
        AttachmentStatus::Skipped(reason) => {
            warn!(
                index = outcome.index,
                digest = %outcome.digest,
                "Skipping attachment '{}': {reason}",
                outcome.filename
            );
        }
        AttachmentStatus::Merged { .. } => {}
    }
}

/// Run `f`, turning a panic inside it into [`Error::Merge`].
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::Merge(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "PDF library panicked".to_string(),
            |msg| format!("PDF library panicked: {msg}"),
        )
}

// =============================================================================
// Scratch files
// =============================================================================

/// Per-call scratch directory, removed with everything in it on drop.
struct Scratch {
    dir: TempDir,
}

impl Scratch {
    fn create(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    fn write(&self, index: usize, content: &[u8]) -> io::Result<ScratchFile> {
        let path = self.dir.path().join(format!("attachment_{index}.pdf"));
        std::fs::write(&path, content)?;
        Ok(ScratchFile { path })
    }
}

/// One attachment on disk, deleted as soon as it has been read.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove scratch file {}: {e}", self.path.display());
        }
    }
}

// =============================================================================
// Document assembly
// =============================================================================

/// Accumulates pages from several documents into one.
struct MergeBuilder {
    document: Document,
    /// Page objects, in output order
    pages: Vec<(ObjectId, Dictionary)>,
    info: Option<ObjectId>,
    next_id: u32,
}

impl MergeBuilder {
    /// Start from the composed report, whose pages come first.
    fn new(base: Document) -> Result<Self> {
        let mut builder = Self {
            document: Document::with_version("1.5"),
            pages: Vec::new(),
            info: None,
            next_id: 1,
        };
        let info = builder.import(base, true);
        if builder.pages.is_empty() {
            return Err(Error::Merge("composed report has no pages".to_string()));
        }
        builder.info = info;
        Ok(builder)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append every page of `doc`, returning how many were added.
    fn append(&mut self, doc: Document) -> usize {
        let before = self.pages.len();
        self.import(doc, false);
        self.pages.len() - before
    }

    /// Nothing is committed until all of `doc` has been read, so a panic
    /// inside lopdf leaves the builder untouched.
    fn import(&mut self, mut doc: Document, keep_info: bool) -> Option<ObjectId> {
        doc.renumber_objects_with(self.next_id);
        let next_id = doc.max_id + 1;

        let pages: Vec<(ObjectId, Dictionary)> = doc
            .get_pages()
            .into_values()
            .filter_map(|page_id| materialize_page(&doc, page_id).map(|page| (page_id, page)))
            .collect();
        if pages.is_empty() {
            return None;
        }

        let info = doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok();
        let objects: BTreeMap<ObjectId, Object> = doc
            .objects
            .into_iter()
            .filter(|(id, object)| {
                (keep_info || Some(*id) != info)
                    && !matches!(
                        object.type_name().unwrap_or(b""),
                        b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline"
                    )
            })
            .collect();

        self.document.objects.extend(objects);
        self.pages.extend(pages);
        self.next_id = next_id;
        info
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let pages_id = (self.next_id, 0);
        let catalog_id = (self.next_id + 1, 0);

        let count = i64::try_from(self.pages.len())
            .map_err(|_| Error::Merge("too many pages".to_string()))?;
        let mut kids = Vec::with_capacity(self.pages.len());
        for (page_id, mut page) in self.pages {
            page.set("Parent", Object::Reference(pages_id));
            self.document.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }

        self.document.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );
        self.document.objects.insert(
            catalog_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Catalog".to_vec())),
                ("Pages", Object::Reference(pages_id)),
            ])),
        );
        self.document.trailer.set("Root", Object::Reference(catalog_id));
        if let Some(info) = self.info {
            self.document.trailer.set("Info", Object::Reference(info));
        }
        self.document.max_id = catalog_id.0;

        self.document.renumber_objects();
        self.document.compress();

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|e| Error::Merge(format!("failed to save merged PDF: {e}")))?;
        Ok(output)
    }
}

/// Copy of a page dictionary carrying every inherited attribute itself, so
/// it no longer depends on its original page tree.
fn materialize_page(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut page = doc.get_dictionary(page_id).ok()?.clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key, value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    if !page.has(b"MediaBox") {
        page.set(
            "MediaBox",
            Object::Array(DEFAULT_MEDIA_BOX.iter().map(|v| Object::Integer(*v)).collect()),
        );
    }
    page.remove(b"Parent");
    Some(page)
}
