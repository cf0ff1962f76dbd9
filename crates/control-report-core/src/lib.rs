//! Control Report Core Library
//!
//! Generates the PDF report of a legal-aid clinic "operational control" case:
//! - Composition of the six-section legal-size form from a case record
//! - An identifier stamp on every page
//! - Appending the pages of the case's PDF attachments
//! - Collaborator traits and an async pipeline for callers that fetch data

pub mod assets;
pub mod config;
pub mod error;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod provider;
pub mod util;

pub use assets::{AssetLocator, AssetLookup, LogoImage};
pub use config::{AssetConfig, MergeConfig, ReportConfig, ASSET_ROOT_ENV};
pub use error::{Error, Result};
pub use model::{Attachment, CaseRecord, DocumentType, Sex};
pub use pdf::{
    AttachmentMerger, AttachmentOutcome, AttachmentStatus, ComposedDocument, Composer,
    IdentifierStamp, MergeOutcome, MergeSummary, PageGeometry, SkipReason,
};
pub use pipeline::{RenderedReport, ReportPipeline};
pub use provider::{AttachmentStore, CaseProvider, NoAttachments};
pub use util::report_filename;

use tracing::{debug, info, warn};

/// Report bytes together with what happened to each attachment.
#[derive(Debug, Clone)]
pub struct MergedReport {
    pub bytes: Vec<u8>,
    pub summary: MergeSummary,
}

impl MergedReport {
    pub fn warnings(&self) -> Vec<String> {
        self.summary.warnings()
    }
}

/// Report generation service.
///
/// Built once at startup and shared; every call owns its own buffers and
/// scratch files, so concurrent calls never interfere.
#[derive(Debug)]
pub struct ReportGenerator {
    config: ReportConfig,
    assets: AssetLocator,
    composer: Composer,
    merger: AttachmentMerger,
}

impl ReportGenerator {
    /// Create a generator for legal-size reports. The logo is resolved here,
    /// once.
    pub fn new(config: ReportConfig) -> Result<Self> {
        Self::with_geometry(config, PageGeometry::LEGAL)
    }

    /// Create a generator with a custom page geometry
    pub fn with_geometry(config: ReportConfig, geometry: PageGeometry) -> Result<Self> {
        let assets = AssetLocator::new(&config.assets);
        let logo = assets.load_logo();
        let composer = Composer::new(geometry, logo)?;
        let merger = AttachmentMerger::new(&config.merge);

        debug!(logo = composer.has_logo(), "Report generator ready");
        Ok(Self {
            config,
            assets,
            composer,
            merger,
        })
    }

    /// Compose the report without attachments, keeping page count and digest.
    pub fn compose(&self, case: &CaseRecord) -> Result<ComposedDocument> {
        self.composer.compose(case)
    }

    /// Generate the report for a case, without attachments.
    pub fn generate(&self, case: &CaseRecord) -> Result<Vec<u8>> {
        let composed = self.compose(case)?;
        info!(
            case_id = case.id,
            pages = composed.page_count(),
            digest = composed.digest(),
            "Generated report"
        );
        Ok(composed.into_bytes())
    }

    /// Generate the report and append the case's PDF attachments.
    ///
    /// Only composition failures are errors; attachment problems degrade the
    /// output instead.
    pub fn generate_with_attachments(
        &self,
        case: &CaseRecord,
        attachments: &[Attachment],
    ) -> Result<Vec<u8>> {
        self.generate_with_summary(case, attachments)
            .map(|report| report.bytes)
    }

    /// Like [`Self::generate_with_attachments`], also reporting the outcome
    /// for each attachment.
    pub fn generate_with_summary(
        &self,
        case: &CaseRecord,
        attachments: &[Attachment],
    ) -> Result<MergedReport> {
        let composed = self.compose(case)?;
        let (bytes, summary) = self.merger.merge(&composed, attachments);

        match &summary.outcome {
            MergeOutcome::NoAttachments => info!(
                case_id = case.id,
                pages = summary.total_pages,
                "Generated report, no attachments merged"
            ),
            MergeOutcome::Merged => info!(
                case_id = case.id,
                pages = summary.total_pages,
                merged = summary.merged_count(),
                "Generated report with attachments"
            ),
            MergeOutcome::FallbackToComposed(reason) => warn!(
                case_id = case.id,
                pages = summary.total_pages,
                "Generated report without attachments: {reason}"
            ),
        }

        Ok(MergedReport { bytes, summary })
    }

    pub const fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub const fn assets(&self) -> &AssetLocator {
        &self.assets
    }

    pub const fn has_logo(&self) -> bool {
        self.composer.has_logo()
    }
}
