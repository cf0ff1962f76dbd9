//! Directory-backed case provider and attachment store.
//!
//! Layout:
//! - `<cases-dir>/<id>.json` holds one case record
//! - `<attachments-dir>/<id>/` holds the case's attachments; hidden files are
//!   treated as inactive

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use control_report_core::{Attachment, AttachmentStore, CaseProvider, CaseRecord, Error, Result};
use tracing::debug;

const CASES_SOURCE: &str = "case directory";
const ATTACHMENTS_SOURCE: &str = "attachment directory";

/// Reads case records from JSON files.
#[derive(Debug, Clone)]
pub struct DirectoryCases {
    dir: PathBuf,
}

impl DirectoryCases {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: u32) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl CaseProvider for DirectoryCases {
    fn name(&self) -> &'static str {
        CASES_SOURCE
    }

    async fn fetch_case(&self, id: u32) -> Result<CaseRecord> {
        let path = self.path_for(id);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::CaseNotFound(id)),
            Err(e) => {
                return Err(Error::Provider {
                    source_name: CASES_SOURCE,
                    reason: format!("{}: {e}", path.display()),
                });
            }
        };

        let case = CaseRecord::from_json(&json)?;
        if case.id != id {
            return Err(Error::MalformedRecord(format!(
                "{} holds case {}, expected {id}",
                path.display(),
                case.id
            )));
        }
        debug!("Loaded case {id} from {}", path.display());
        Ok(case)
    }
}

/// Reads attachments from one folder per case, ordered by file name.
#[derive(Debug, Clone)]
pub struct DirectoryAttachments {
    dir: PathBuf,
}

impl DirectoryAttachments {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AttachmentStore for DirectoryAttachments {
    fn name(&self) -> &'static str {
        ATTACHMENTS_SOURCE
    }

    async fn active_attachments(&self, case_id: u32) -> Result<Vec<Attachment>> {
        let folder = self.dir.join(case_id.to_string());
        let mut entries = match tokio::fs::read_dir(&folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_error(&folder, &e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| store_error(&folder, &e))?
        {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut attachments = Vec::with_capacity(paths.len());
        for path in paths {
            let content = tokio::fs::read(&path)
                .await
                .map_err(|e| store_error(&path, &e))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            attachments.push(Attachment::new(filename, content_type, content));
        }

        debug!(case_id, count = attachments.len(), "Loaded attachments");
        Ok(attachments)
    }
}

fn store_error(path: &Path, e: &std::io::Error) -> Error {
    Error::Provider {
        source_name: ATTACHMENTS_SOURCE,
        reason: format!("{}: {e}", path.display()),
    }
}
