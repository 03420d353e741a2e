//! Audit note rendering and synchronization
//!
//! Each statement document carries at most one note starting with
//! [`AUDIT_NOTE_PREFIX`]. It is replaced by delete-then-create: the archive has
//! no atomic replace, so a reader polling between the two calls sees no audit
//! note. Only this tool writes audit notes, so the window is tolerated.

use crate::models::{format_amount, Note, Transaction};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const AUDIT_NOTE_PREFIX: &str = "[AUDIT]";

const MISSING_SYMBOL: &str = "✗";
const MATCHED_SYMBOL: &str = "✓";

/// Notes attached to archive documents.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_notes(&self, doc_id: u64) -> Result<Vec<Note>>;
    async fn create_note(&self, doc_id: u64, text: &str) -> Result<()>;
    async fn delete_note(&self, doc_id: u64, note_id: u64) -> Result<()>;
}

/// What happened to the audit note of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSync {
    Created,
    Replaced,
    Unchanged,
}

/// Render the audit note for a statement's transactions.
pub fn render_audit_note(transactions: &[Transaction]) -> String {
    let (matched, missing): (Vec<&Transaction>, Vec<&Transaction>) =
        transactions.iter().partition(|tx| tx.is_matched());
    let total = transactions.len();

    let mut parts = vec![format!("{} {}/{}", AUDIT_NOTE_PREFIX, matched.len(), total)];

    if !missing.is_empty() {
        parts.push(format!("\n[MISSING][{}/{}]", missing.len(), total));
        parts.extend(missing.iter().map(|tx| format_block(tx, MISSING_SYMBOL)));
    }

    if !matched.is_empty() {
        parts.push(format!("\n[MATCHED][{}/{}]", matched.len(), total));
        parts.extend(matched.iter().map(|tx| format_block(tx, MATCHED_SYMBOL)));
    }

    parts.join("\n\n")
}

fn format_block(tx: &Transaction, symbol: &str) -> String {
    let mut lines = vec![
        format!("{} {} / {}", symbol, tx.date, format_amount(tx.amount)),
        tx.counterparty.clone(),
    ];
    if !tx.description.is_empty() {
        lines.push(tx.description.clone());
    }
    if let Some(matched) = &tx.matched {
        lines.push(format!("→ #{} {}", matched.id, matched.title));
    }
    lines.join("\n")
}

pub struct NoteSynchronizer {
    store: Arc<dyn NoteStore>,
}

impl NoteSynchronizer {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    /// Replace the audit note on a statement document with a fresh rendering.
    pub async fn write_audit_note(
        &self,
        doc_id: u64,
        transactions: &[Transaction],
    ) -> Result<NoteSync> {
        let text = render_audit_note(transactions);

        let existing: Vec<Note> = self
            .store
            .list_notes(doc_id)
            .await?
            .into_iter()
            .filter(|note| note.note.starts_with(AUDIT_NOTE_PREFIX))
            .collect();

        if let [only] = existing.as_slice() {
            if only.note == text {
                debug!(doc_id, "Audit note already up to date");
                return Ok(NoteSync::Unchanged);
            }
        }

        for note in &existing {
            self.store.delete_note(doc_id, note.id).await?;
        }
        self.store.create_note(doc_id, &text).await?;

        info!(doc_id, replaced = existing.len(), "Audit note written");

        Ok(if existing.is_empty() {
            NoteSync::Created
        } else {
            NoteSync::Replaced
        })
    }
}
