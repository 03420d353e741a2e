//! Bank Statement Audit
//!
//! Cross-references bank statement transactions with the documents archived
//! in Paperless-ngx:
//! - Extracts transactions from statement documents (tabular original or OCR text)
//! - Finds the invoice or receipt behind each transaction with tiered searches
//! - Caches extracted transactions and matches per month
//! - Writes an audit note back onto every statement (opt-in)
//!
//! MONTHLY LOOP:
//! STATEMENTS → EXTRACT / CACHE → MATCH → NOTE → COVERAGE

pub mod archive;
pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod extraction;
pub mod matcher;
pub mod models;
pub mod notes;
pub mod references;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use audit::{AuditOrchestrator, AuditReport};
pub use config::AuditConfig;
