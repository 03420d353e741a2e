//! Document archive access
//!
//! The archive is reached through capability traits so the audit can run
//! against Paperless in production and against memory in tests.

use crate::models::{AuditPeriod, OriginalFile, StatementDocument};
use crate::Result;
use async_trait::async_trait;

pub mod memory;
pub mod paperless;

pub use memory::InMemoryArchive;
pub use paperless::PaperlessClient;

/// Source of bank statement documents and their content.
#[async_trait]
pub trait StatementSource: Send + Sync {
    /// Statements tagged `tag_id` created within the period.
    async fn list_statements(
        &self,
        tag_id: u64,
        period: AuditPeriod,
    ) -> Result<Vec<StatementDocument>>;

    /// The file as originally uploaded.
    async fn download_original(&self, doc_id: u64) -> Result<OriginalFile>;

    /// The archive's own text rendition (OCR) of the document.
    async fn document_content(&self, doc_id: u64) -> Result<String>;
}
