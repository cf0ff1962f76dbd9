//! Async report pipeline: fetch a case and its attachments, then generate
//! the report on the blocking pool.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::pdf::MergeSummary;
use crate::provider::{AttachmentStore, CaseProvider};
use crate::util::report_filename;
use crate::ReportGenerator;

/// A finished report, ready to be written or served.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub case_id: u32,
    /// Download file name, `control_operativo_<id>_<YYYYMMDD>.pdf`
    pub filename: String,
    pub bytes: Vec<u8>,
    pub summary: MergeSummary,
    /// Problems that did not prevent the report, including attachment-store failures
    pub warnings: Vec<String>,
}

/// Connects the collaborators to a shared [`ReportGenerator`].
#[derive(Clone)]
pub struct ReportPipeline {
    generator: Arc<ReportGenerator>,
    cases: Arc<dyn CaseProvider>,
    attachments: Arc<dyn AttachmentStore>,
}

impl ReportPipeline {
    pub fn new(
        generator: Arc<ReportGenerator>,
        cases: Arc<dyn CaseProvider>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            generator,
            cases,
            attachments,
        }
    }

    pub fn generator(&self) -> &ReportGenerator {
        &self.generator
    }

    /// Render the report for one case.
    ///
    /// Fails only when the case cannot be fetched or composed. A failing
    /// attachment store yields a report without attachments and a warning.
    pub async fn render(&self, case_id: u32) -> Result<RenderedReport> {
        let case = self.cases.fetch_case(case_id).await?;

        let mut warnings = Vec::new();
        let attachments = match self.attachments.active_attachments(case_id).await {
            Ok(attachments) => attachments,
            Err(e) => {
                warn!(
                    case_id,
                    store = self.attachments.name(),
                    "Attachment lookup failed, rendering without attachments: {e}"
                );
                warnings.push(format!("Attachments unavailable: {e}"));
                Vec::new()
            }
        };

        let filename = report_filename(&case);
        let generator = Arc::clone(&self.generator);
        let report = tokio::task::spawn_blocking(move || {
            generator.generate_with_summary(&case, &attachments)
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))??;

        warnings.extend(report.warnings());
        info!(
            case_id,
            filename = %filename,
            bytes = report.bytes.len(),
            warnings = warnings.len(),
            "Rendered report"
        );

        Ok(RenderedReport {
            case_id,
            filename,
            bytes: report.bytes,
            summary: report.summary,
            warnings,
        })
    }
}

impl std::fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("cases", &self.cases.name())
            .field("attachments", &self.attachments.name())
            .finish_non_exhaustive()
    }
}
