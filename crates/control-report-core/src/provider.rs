//! Collaborators that supply case records and their attachments.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Attachment, CaseRecord};

/// Source of case records.
#[async_trait]
pub trait CaseProvider: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;

    /// Fetch one case record.
    ///
    /// Returns [`crate::Error::CaseNotFound`] when no record has this id.
    async fn fetch_case(&self, id: u32) -> Result<CaseRecord>;
}

/// Source of the files attached to a case.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Active attachments of a case, in the order they should be appended.
    ///
    /// Implementations filter out inactive records themselves.
    async fn active_attachments(&self, case_id: u32) -> Result<Vec<Attachment>>;
}

/// A store for callers that never merge attachments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAttachments;

#[async_trait]
impl AttachmentStore for NoAttachments {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn active_attachments(&self, _case_id: u32) -> Result<Vec<Attachment>> {
        Ok(Vec::new())
    }
}
