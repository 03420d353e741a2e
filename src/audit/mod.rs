//! Monthly audit orchestrator - implements the statement loop
//!
//! LIST STATEMENTS → CACHE OR EXTRACT → RESOLVE MATCHES → NOTE? → SAVE CACHE
//!
//! Statements and transactions are processed strictly one after another. A
//! failure on one statement is recorded in the report and the run moves on;
//! the cache is written once, after the last statement. A failed cache write
//! is attached to the report rather than discarding the finished work.

use crate::archive::{PaperlessClient, StatementSource};
use crate::cache::{JsonFileCache, MonthCacheStore};
use crate::config::{AuditConfig, MatchWindows};
use crate::extraction::{load_statement_text, OpenAiExtractor, TextSource, TransactionExtractor};
use crate::matcher::{DocumentSearch, MatchResolver, MatchTier, Resolution};
use crate::models::{AuditPeriod, MatchedDocument, StatementDocument, StatementRecord, Transaction};
use crate::notes::{NoteStore, NoteSync, NoteSynchronizer};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// External collaborators of a run.
pub struct Collaborators {
    pub statements: Arc<dyn StatementSource>,
    pub search: Arc<dyn DocumentSearch>,
    pub notes: Arc<dyn NoteStore>,
    pub extractor: Arc<dyn TransactionExtractor>,
    pub cache: Arc<dyn MonthCacheStore>,
}

//
// ================= Report =================
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOrigin {
    Cached,
    Extracted(TextSource),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOutcome {
    /// Matched on an earlier run.
    AlreadyMatched,
    NewlyMatched(MatchTier),
    Unmatched,
    /// A search call failed; the transaction stays unmatched until the next run.
    SearchFailed(String),
}

impl TransactionOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(
            self,
            TransactionOutcome::AlreadyMatched | TransactionOutcome::NewlyMatched(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReport {
    pub transaction: Transaction,
    pub outcome: TransactionOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoteOutcome {
    Written(NoteSync),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementReport {
    pub doc_id: u64,
    pub title: String,
    pub origin: TransactionOrigin,
    pub transactions: Vec<TransactionReport>,
    /// `None` when note writing is disabled.
    pub note: Option<NoteOutcome>,
}

/// A statement that could not be processed this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStatement {
    pub doc_id: u64,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub period: AuditPeriod,
    pub statements: Vec<StatementReport>,
    pub skipped: Vec<SkippedStatement>,
    /// Set when the month cache could not be written at the end of the run.
    pub cache_error: Option<String>,
}

impl AuditReport {
    fn outcomes(&self) -> impl Iterator<Item = &TransactionOutcome> {
        self.statements
            .iter()
            .flat_map(|s| s.transactions.iter())
            .map(|t| &t.outcome)
    }

    pub fn matched(&self) -> usize {
        self.outcomes().filter(|o| o.is_matched()).count()
    }

    pub fn unmatched(&self) -> usize {
        self.outcomes().filter(|o| !o.is_matched()).count()
    }

    pub fn total(&self) -> usize {
        self.matched() + self.unmatched()
    }

    pub fn coverage_percent(&self) -> u32 {
        coverage_percent(self.matched(), self.total())
    }
}

/// `matched / total * 100`, rounded; 0 when there is nothing to cover.
pub fn coverage_percent(matched: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (matched as f64 / total as f64 * 100.0).round_ties_even() as u32
}

//
// ================= Orchestrator =================
//

pub struct AuditOrchestrator {
    statements: Arc<dyn StatementSource>,
    extractor: Arc<dyn TransactionExtractor>,
    cache: Arc<dyn MonthCacheStore>,
    resolver: MatchResolver,
    notes: Option<NoteSynchronizer>,
    statement_tag_id: u64,
}

impl AuditOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        statement_tag_id: u64,
        windows: MatchWindows,
        write_notes: bool,
    ) -> Self {
        let Collaborators {
            statements,
            search,
            notes,
            extractor,
            cache,
        } = collaborators;

        Self {
            statements,
            extractor,
            cache,
            resolver: MatchResolver::new(search, statement_tag_id, windows),
            notes: write_notes.then(|| NoteSynchronizer::new(notes)),
            statement_tag_id,
        }
    }

    /// Wire the production collaborators: Paperless, OpenAI and the JSON file cache.
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        let paperless = Arc::new(PaperlessClient::new(&config.paperless)?);
        let extractor = Arc::new(OpenAiExtractor::new(&config.openai)?);
        let cache = Arc::new(JsonFileCache::new(config.cache_dir.clone()));

        Ok(Self::new(
            Collaborators {
                statements: paperless.clone(),
                search: paperless.clone(),
                notes: paperless,
                extractor,
                cache,
            },
            config.statement_tag_id,
            config.windows,
            config.write_notes,
        ))
    }

    pub async fn run(&self, period: AuditPeriod) -> Result<AuditReport> {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, period = %period, "Auditing bank statements");

        let mut report = AuditReport {
            run_id,
            period,
            statements: Vec::new(),
            skipped: Vec::new(),
            cache_error: None,
        };

        let statements = self
            .statements
            .list_statements(self.statement_tag_id, period)
            .await?;

        if statements.is_empty() {
            info!(run_id = %run_id, "No bank statements found for this month");
            return Ok(report);
        }
        info!(run_id = %run_id, count = statements.len(), "Found statements");

        let mut cache = self.cache.load(period).await?;

        for statement in &statements {
            let key = statement.cache_key();
            let title = statement.display_title();

            let origin = if cache.statements.contains_key(&key) {
                info!(doc_id = statement.id, title = %title, "Using cached transactions");
                TransactionOrigin::Cached
            } else {
                match self.extract_statement(statement).await {
                    Ok((record, text_source)) => {
                        info!(
                            doc_id = statement.id,
                            title = %title,
                            transactions = record.transactions.len(),
                            "Extracted transactions"
                        );
                        cache.statements.insert(key.clone(), record);
                        TransactionOrigin::Extracted(text_source)
                    }
                    Err(e) => {
                        warn!(doc_id = statement.id, title = %title, error = %e, "Skipping statement");
                        report.skipped.push(SkippedStatement {
                            doc_id: statement.id,
                            title,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                }
            };

            let Some(record) = cache.statements.get_mut(&key) else {
                continue;
            };

            let transactions = self.resolve_all(&mut record.transactions).await;

            let note = match &self.notes {
                Some(sync) => Some(
                    match sync.write_audit_note(statement.id, &record.transactions).await {
                        Ok(outcome) => NoteOutcome::Written(outcome),
                        Err(e) => {
                            warn!(doc_id = statement.id, title = %title, error = %e, "Audit note not written");
                            NoteOutcome::Failed(e.to_string())
                        }
                    },
                ),
                None => None,
            };

            report.statements.push(StatementReport {
                doc_id: statement.id,
                title,
                origin,
                transactions,
                note,
            });
        }

        if let Err(e) = self.cache.save(period, &cache).await {
            warn!(run_id = %run_id, error = %e, "Cache not saved");
            report.cache_error = Some(e.to_string());
        }

        info!(
            run_id = %run_id,
            matched = report.matched(),
            unmatched = report.unmatched(),
            skipped = report.skipped.len(),
            coverage = report.coverage_percent(),
            "Audit complete"
        );

        Ok(report)
    }

    async fn extract_statement(
        &self,
        statement: &StatementDocument,
    ) -> Result<(StatementRecord, TextSource)> {
        let (text, source) = load_statement_text(self.statements.as_ref(), statement).await?;
        let extracted = self.extractor.extract(&text).await?;

        let record = StatementRecord {
            transactions: extracted.into_iter().map(Transaction::from).collect(),
        };
        Ok((record, source))
    }

    /// Resolve every transaction in order, recording new matches in place.
    async fn resolve_all(&self, transactions: &mut [Transaction]) -> Vec<TransactionReport> {
        let mut reports = Vec::with_capacity(transactions.len());

        for tx in transactions.iter_mut() {
            let outcome = match self.resolver.resolve(tx).await {
                Ok(Resolution::AlreadyMatched(_)) => TransactionOutcome::AlreadyMatched,
                Ok(Resolution::Matched { tier, candidate }) => {
                    info!(
                        date = %tx.date,
                        counterparty = %tx.counterparty,
                        doc_id = candidate.id,
                        tier = %tier,
                        "Matched transaction"
                    );
                    tx.matched = Some(MatchedDocument::from(&candidate));
                    TransactionOutcome::NewlyMatched(tier)
                }
                Ok(Resolution::Unmatched) => TransactionOutcome::Unmatched,
                Err(e) => {
                    warn!(date = %tx.date, counterparty = %tx.counterparty, error = %e, "Search failed");
                    TransactionOutcome::SearchFailed(e.to_string())
                }
            };

            reports.push(TransactionReport {
                transaction: tx.clone(),
                outcome,
            });
        }

        reports
    }
}
