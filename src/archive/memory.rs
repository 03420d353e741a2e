//! In-memory archive for development & testing
//!
//! Search responses are canned per (query, window); every search call is
//! recorded so callers can assert on what was asked.

use crate::archive::StatementSource;
use crate::error::AuditError;
use crate::matcher::{DateWindow, DocumentSearch};
use crate::models::{AuditPeriod, MatchCandidate, Note, OriginalFile, StatementDocument};
use crate::notes::NoteStore;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One recorded call to [`DocumentSearch::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub window: Option<DateWindow>,
}

#[derive(Default)]
struct ArchiveState {
    search_results: HashMap<(String, Option<DateWindow>), Vec<MatchCandidate>>,
    searches: Vec<SearchCall>,
    fail_searches: bool,
    statements: Vec<(StatementDocument, NaiveDate)>,
    originals: HashMap<u64, OriginalFile>,
    contents: HashMap<u64, String>,
    notes: HashMap<u64, Vec<Note>>,
    next_note_id: u64,
}

pub struct InMemoryArchive {
    state: Arc<RwLock<ArchiveState>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ArchiveState::default())),
        }
    }

    /// Answer `query` searched over exactly `[from, to]` with `results`.
    pub async fn add_search_result(
        &self,
        query: &str,
        from: NaiveDate,
        to: NaiveDate,
        results: Vec<MatchCandidate>,
    ) {
        let window = Some(DateWindow { from, to });
        let mut state = self.state.write().await;
        state
            .search_results
            .insert((query.to_string(), window), results);
    }

    /// Answer `query` searched without a date filter with `results`.
    pub async fn add_unbounded_search_result(&self, query: &str, results: Vec<MatchCandidate>) {
        let mut state = self.state.write().await;
        state.search_results.insert((query.to_string(), None), results);
    }

    pub async fn searches(&self) -> Vec<SearchCall> {
        self.state.read().await.searches.clone()
    }

    pub async fn fail_searches(&self, fail: bool) {
        self.state.write().await.fail_searches = fail;
    }

    pub async fn add_statement(&self, doc: StatementDocument, created: NaiveDate) {
        self.state.write().await.statements.push((doc, created));
    }

    pub async fn add_original(&self, doc_id: u64, filename: &str, bytes: &[u8]) {
        self.state.write().await.originals.insert(
            doc_id,
            OriginalFile {
                bytes: bytes.to_vec(),
                filename: filename.to_string(),
            },
        );
    }

    pub async fn set_content(&self, doc_id: u64, content: &str) {
        self.state
            .write()
            .await
            .contents
            .insert(doc_id, content.to_string());
    }

    pub async fn add_note(&self, doc_id: u64, text: &str) {
        let mut state = self.state.write().await;
        state.next_note_id += 1;
        let id = state.next_note_id;
        state.notes.entry(doc_id).or_default().push(Note {
            id,
            note: text.to_string(),
        });
    }

    pub async fn notes(&self, doc_id: u64) -> Vec<Note> {
        self.state
            .read()
            .await
            .notes
            .get(&doc_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSearch for InMemoryArchive {
    async fn search(&self, query: &str, window: Option<DateWindow>) -> Result<Vec<MatchCandidate>> {
        let mut state = self.state.write().await;

        state.searches.push(SearchCall {
            query: query.to_string(),
            window,
        });

        if state.fail_searches {
            return Err(AuditError::DocumentStore(format!(
                "search for '{}' failed",
                query
            )));
        }

        Ok(state
            .search_results
            .get(&(query.to_string(), window))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl StatementSource for InMemoryArchive {
    async fn list_statements(
        &self,
        _tag_id: u64,
        period: AuditPeriod,
    ) -> Result<Vec<StatementDocument>> {
        let state = self.state.read().await;
        let from = period.first_day();
        let until = period.next_month_first_day();

        Ok(state
            .statements
            .iter()
            .filter(|(_, created)| *created >= from && *created < until)
            .map(|(doc, _)| doc.clone())
            .collect())
    }

    async fn download_original(&self, doc_id: u64) -> Result<OriginalFile> {
        self.state
            .read()
            .await
            .originals
            .get(&doc_id)
            .cloned()
            .ok_or_else(|| {
                AuditError::DocumentStore(format!("no original for document {}", doc_id))
            })
    }

    async fn document_content(&self, doc_id: u64) -> Result<String> {
        Ok(self
            .state
            .read()
            .await
            .contents
            .get(&doc_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl NoteStore for InMemoryArchive {
    async fn list_notes(&self, doc_id: u64) -> Result<Vec<Note>> {
        Ok(self.notes(doc_id).await)
    }

    async fn create_note(&self, doc_id: u64, text: &str) -> Result<()> {
        self.add_note(doc_id, text).await;
        Ok(())
    }

    async fn delete_note(&self, doc_id: u64, note_id: u64) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(notes) = state.notes.get_mut(&doc_id) {
            notes.retain(|note| note.id != note_id);
        }
        Ok(())
    }
}
