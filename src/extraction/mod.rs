//! Statement transaction extraction
//!
//! Statement text comes from the original file when it is tabular, otherwise
//! from the archive's OCR content. The text is handed to a language model that
//! returns the line items as JSON.

use crate::archive::StatementSource;
use crate::error::AuditError;
use crate::models::{ExtractedTransaction, StatementDocument};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

pub mod openai;
pub mod tabular;

pub use openai::OpenAiExtractor;

/// Turns raw statement text into transactions.
#[async_trait]
pub trait TransactionExtractor: Send + Sync {
    async fn extract(&self, statement_text: &str) -> Result<Vec<ExtractedTransaction>>;
}

/// Where the statement text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Original { filename: String },
    Ocr,
}

/// Fetch the best available text for a statement.
///
/// A failed download or an unreadable original falls back to OCR content.
/// Empty content is reported as [`AuditError::EmptyContent`].
pub async fn load_statement_text(
    source: &dyn StatementSource,
    statement: &StatementDocument,
) -> Result<(String, TextSource)> {
    match source.download_original(statement.id).await {
        Ok(original) => match tabular::tabulate(&original) {
            Ok(Some(text)) => {
                info!(doc_id = statement.id, filename = %original.filename, "Parsed tabular original");
                return Ok((
                    text,
                    TextSource::Original {
                        filename: original.filename,
                    },
                ));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(doc_id = statement.id, error = %e, "Could not parse original");
            }
        },
        Err(e) => {
            warn!(doc_id = statement.id, error = %e, "Could not download original");
        }
    }

    info!(doc_id = statement.id, "Using OCR text content");
    let content = source.document_content(statement.id).await?;
    if content.trim().is_empty() {
        return Err(AuditError::EmptyContent);
    }
    Ok((content, TextSource::Ocr))
}

/// Parse the model's reply into transactions.
///
/// Accepts a bare JSON array or an object with a `transactions` array,
/// optionally wrapped in a markdown code fence. `null` text fields read as
/// empty and non-ISO dates are kept verbatim. An entry without a usable
/// amount rejects the whole reply, so the statement is skipped and retried
/// instead of being audited with fewer transactions than it has.
pub fn parse_extraction_response(response: &str) -> Result<Vec<ExtractedTransaction>> {
    let cleaned = strip_code_fence(response);

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        AuditError::MalformedResponse(format!(
            "Failed to parse extraction response: {} | raw={}",
            e, response
        ))
    })?;

    let items = match json {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AuditError::MalformedResponse(
                    "Expected a JSON array of transactions".to_string(),
                ))
            }
        },
        _ => {
            return Err(AuditError::MalformedResponse(
                "Expected a JSON array of transactions".to_string(),
            ))
        }
    };

    let mut transactions = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let tx = serde_json::from_value::<ExtractedTransaction>(item).map_err(|e| {
            AuditError::MalformedResponse(format!("Transaction {} is unusable: {}", index, e))
        })?;
        if tx.date.as_date().is_none() {
            warn!(
                index,
                date = %tx.date,
                "Transaction date is not ISO, searching without date filter"
            );
        }
        transactions.push(tx);
    }

    Ok(transactions)
}

fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = trimmed.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    body.rsplit_once("```")
        .map(|(inner, _)| inner)
        .unwrap_or(body)
        .trim()
}

/// Fixed extractor for development & testing
///
/// Returns the same transactions for any text, or fails every call.
pub struct FixedExtractor {
    transactions: Vec<ExtractedTransaction>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FixedExtractor {
    pub fn new(transactions: Vec<ExtractedTransaction>) -> Self {
        Self {
            transactions,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            transactions: Vec::new(),
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionExtractor for FixedExtractor {
    async fn extract(&self, _statement_text: &str) -> Result<Vec<ExtractedTransaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(AuditError::MalformedResponse(message.clone())),
            None => Ok(self.transactions.clone()),
        }
    }
}
