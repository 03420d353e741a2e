//! Tiered transaction matching
//!
//! Each unmatched transaction is searched in the archive from the most
//! specific query to the least specific one:
//!
//! REFERENCE → COUNTERPARTY + AMOUNT → AMOUNT ONLY
//!
//! The first tier yielding a document that is not itself a bank statement wins.
//! Transactions without a usable booking date are searched without a date filter.

use crate::config::MatchWindows;
use crate::models::{MatchCandidate, MatchedDocument, Transaction};
use crate::references::extract_refs;
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Full-text search over the document archive, optionally limited to a
/// creation-date window.
///
/// Results come back in the archive's ranking order.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    async fn search(&self, query: &str, window: Option<DateWindow>) -> Result<Vec<MatchCandidate>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Reference,
    CounterpartyAmount,
    AmountOnly,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchTier::Reference => "reference",
            MatchTier::CounterpartyAmount => "counterparty+amount",
            MatchTier::AmountOnly => "amount",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of resolving one transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The transaction was matched on an earlier run; no search was made.
    AlreadyMatched(MatchedDocument),
    Matched {
        tier: MatchTier,
        candidate: MatchCandidate,
    },
    Unmatched,
}

/// Inclusive date range handed to the archive search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn around(date: NaiveDate, days_before: i64, days_after: i64) -> Self {
        Self {
            from: date - Duration::days(days_before),
            to: date + Duration::days(days_after),
        }
    }
}

/// Return the first result that is not a bank statement.
pub fn find_non_statement(
    results: Vec<MatchCandidate>,
    statement_tag_id: u64,
) -> Option<MatchCandidate> {
    results
        .into_iter()
        .find(|doc| !doc.has_tag(statement_tag_id))
}

pub struct MatchResolver {
    search: Arc<dyn DocumentSearch>,
    statement_tag_id: u64,
    windows: MatchWindows,
}

impl MatchResolver {
    pub fn new(
        search: Arc<dyn DocumentSearch>,
        statement_tag_id: u64,
        windows: MatchWindows,
    ) -> Self {
        Self {
            search,
            statement_tag_id,
            windows,
        }
    }

    /// Window for the reference and counterparty tiers.
    pub fn search_window(&self, tx: &Transaction) -> Option<DateWindow> {
        let lookback = if tx.is_credit() {
            self.windows.credit_lookback_days
        } else {
            self.windows.debit_lookback_days
        };
        let date = tx.date.as_date()?;
        Some(DateWindow::around(date, lookback, self.windows.lookahead_days))
    }

    /// Narrow window for the amount-only tier.
    pub fn amount_window(&self, tx: &Transaction) -> Option<DateWindow> {
        let radius = self.windows.amount_only_radius_days;
        let date = tx.date.as_date()?;
        Some(DateWindow::around(date, radius, radius))
    }

    /// Resolve a transaction, keeping any earlier match.
    pub async fn resolve(&self, tx: &Transaction) -> Result<Resolution> {
        if let Some(existing) = &tx.matched {
            return Ok(Resolution::AlreadyMatched(existing.clone()));
        }

        Ok(match self.match_transaction(tx).await? {
            Some((tier, candidate)) => Resolution::Matched { tier, candidate },
            None => Resolution::Unmatched,
        })
    }

    /// Run the search tiers in order and return the first acceptable document.
    pub async fn match_transaction(
        &self,
        tx: &Transaction,
    ) -> Result<Option<(MatchTier, MatchCandidate)>> {
        let window = self.search_window(tx);
        let amount = tx.search_amount();

        for reference in extract_refs(tx) {
            if let Some(doc) = self.first_acceptable(&reference, window).await? {
                return Ok(Some((MatchTier::Reference, doc)));
            }
        }

        let query = format!("{} {}", tx.counterparty, amount);
        if let Some(doc) = self.first_acceptable(&query, window).await? {
            return Ok(Some((MatchTier::CounterpartyAmount, doc)));
        }

        // Bare amounts collide often, so only look close to the booking date.
        if let Some(doc) = self.first_acceptable(&amount, self.amount_window(tx)).await? {
            return Ok(Some((MatchTier::AmountOnly, doc)));
        }

        Ok(None)
    }

    async fn first_acceptable(
        &self,
        query: &str,
        window: Option<DateWindow>,
    ) -> Result<Option<MatchCandidate>> {
        let results = self.search.search(query, window).await?;

        debug!(
            query = %query,
            window = ?window,
            hits = results.len(),
            "Archive search"
        );

        Ok(find_non_statement(results, self.statement_tag_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::memory::InMemoryArchive;
    use crate::models::TransactionDate;
    use rust_decimal::Decimal;

    const STATEMENT_TAG: u64 = 9;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn candidate(id: u64, title: &str, tags: &[u64]) -> MatchCandidate {
        MatchCandidate {
            id,
            title: title.to_string(),
            tags: tags.iter().copied().collect(),
        }
    }

    fn acme_debit() -> Transaction {
        Transaction {
            date: date(2025, 3, 10).into(),
            amount: Decimal::new(-12050, 2),
            counterparty: "Acme Ltd".to_string(),
            description: "Nr. 55231".to_string(),
            reference: None,
            matched: None,
        }
    }

    fn resolver(archive: &Arc<InMemoryArchive>) -> MatchResolver {
        MatchResolver::new(archive.clone(), STATEMENT_TAG, MatchWindows::default())
    }

    #[test]
    fn test_windows_depend_on_direction() {
        let archive = Arc::new(InMemoryArchive::new());
        let resolver = resolver(&archive);

        let debit = acme_debit();
        assert_eq!(
            resolver.search_window(&debit),
            Some(DateWindow { from: date(2025, 2, 8), to: date(2025, 3, 24) })
        );

        let mut credit = acme_debit();
        credit.amount = Decimal::new(12050, 2);
        assert_eq!(
            resolver.search_window(&credit),
            Some(DateWindow { from: date(2024, 3, 10), to: date(2025, 3, 24) })
        );

        assert_eq!(
            resolver.amount_window(&debit),
            Some(DateWindow { from: date(2025, 3, 5), to: date(2025, 3, 15) })
        );

        let mut undated = acme_debit();
        undated.date = TransactionDate::parse("10.03.2025");
        assert_eq!(resolver.search_window(&undated), None);
        assert_eq!(resolver.amount_window(&undated), None);
    }

    #[test]
    fn test_find_non_statement_skips_statements() {
        let results = vec![
            candidate(1, "Statement", &[STATEMENT_TAG, 3]),
            candidate(2, "Invoice", &[3]),
            candidate(3, "Receipt", &[]),
        ];
        assert_eq!(find_non_statement(results, STATEMENT_TAG).map(|c| c.id), Some(2));

        let only_statements = vec![candidate(1, "Statement", &[STATEMENT_TAG])];
        assert_eq!(find_non_statement(only_statements, STATEMENT_TAG), None);
        assert_eq!(find_non_statement(Vec::new(), STATEMENT_TAG), None);
    }

    #[tokio::test]
    async fn test_counterparty_amount_tier_matches_outbound_payment() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .add_search_result(
                "Acme Ltd 120.50",
                date(2025, 2, 8),
                date(2025, 3, 24),
                vec![candidate(42, "Acme Invoice 55231", &[])],
            )
            .await;
        let resolver = resolver(&archive);

        let resolution = resolver.resolve(&acme_debit()).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Matched {
                tier: MatchTier::CounterpartyAmount,
                candidate: candidate(42, "Acme Invoice 55231", &[]),
            }
        );

        let queries: Vec<String> = archive
            .searches()
            .await
            .into_iter()
            .map(|s| s.query)
            .collect();
        assert_eq!(queries, vec!["55231", "Acme Ltd 120.50"]);
    }

    #[tokio::test]
    async fn test_reference_tier_wins_and_stops_early() {
        let archive = Arc::new(InMemoryArchive::new());
        let mut tx = acme_debit();
        tx.reference = Some("INV-7".to_string());
        archive
            .add_search_result(
                "INV-7",
                date(2025, 2, 8),
                date(2025, 3, 24),
                vec![candidate(5, "Invoice INV-7", &[])],
            )
            .await;
        let resolver = resolver(&archive);

        let resolution = resolver.resolve(&tx).await.unwrap();
        assert!(matches!(
            resolution,
            Resolution::Matched { tier: MatchTier::Reference, ref candidate } if candidate.id == 5
        ));
        assert_eq!(archive.searches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_amount_only_tier_uses_narrow_window() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .add_search_result(
                "120.50",
                date(2025, 3, 5),
                date(2025, 3, 15),
                vec![candidate(77, "Receipt", &[])],
            )
            .await;
        let resolver = resolver(&archive);

        let resolution = resolver.resolve(&acme_debit()).await.unwrap();
        assert!(matches!(
            resolution,
            Resolution::Matched { tier: MatchTier::AmountOnly, ref candidate } if candidate.id == 77
        ));

        let last = archive.searches().await.pop().unwrap();
        assert_eq!(
            last.window,
            Some(DateWindow { from: date(2025, 3, 5), to: date(2025, 3, 15) })
        );
    }

    #[tokio::test]
    async fn test_incoming_payment_searches_a_year_back() {
        let archive = Arc::new(InMemoryArchive::new());
        let mut credit = acme_debit();
        credit.amount = Decimal::new(12050, 2);
        archive
            .add_search_result(
                "Acme Ltd 120.50",
                date(2024, 3, 10),
                date(2025, 3, 24),
                vec![candidate(61, "Acme Invoice 2024-117", &[])],
            )
            .await;
        let resolver = resolver(&archive);

        let resolution = resolver.resolve(&credit).await.unwrap();
        assert!(matches!(
            resolution,
            Resolution::Matched { tier: MatchTier::CounterpartyAmount, ref candidate }
                if candidate.id == 61
        ));

        let year_back = Some(DateWindow { from: date(2024, 3, 10), to: date(2025, 3, 24) });
        let searches = archive.searches().await;
        assert_eq!(searches.len(), 2);
        assert_eq!(searches[0].query, "55231");
        assert!(searches.iter().all(|s| s.window == year_back));
    }

    #[tokio::test]
    async fn test_undated_transaction_searches_without_window() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .add_unbounded_search_result("120.50", vec![candidate(8, "Receipt", &[])])
            .await;
        let resolver = resolver(&archive);

        let mut tx = acme_debit();
        tx.date = TransactionDate::parse("10.03.2025");

        let resolution = resolver.resolve(&tx).await.unwrap();
        assert!(matches!(
            resolution,
            Resolution::Matched { tier: MatchTier::AmountOnly, ref candidate } if candidate.id == 8
        ));

        let searches = archive.searches().await;
        assert_eq!(searches.len(), 3);
        assert!(searches.iter().all(|s| s.window.is_none()));
    }

    #[tokio::test]
    async fn test_statements_never_match_in_any_tier() {
        let archive = Arc::new(InMemoryArchive::new());
        let statement = vec![candidate(1, "March statement", &[STATEMENT_TAG])];
        archive
            .add_search_result("55231", date(2025, 2, 8), date(2025, 3, 24), statement.clone())
            .await;
        archive
            .add_search_result(
                "Acme Ltd 120.50",
                date(2025, 2, 8),
                date(2025, 3, 24),
                statement.clone(),
            )
            .await;
        archive
            .add_search_result("120.50", date(2025, 3, 5), date(2025, 3, 15), statement)
            .await;
        let resolver = resolver(&archive);

        let resolution = resolver.resolve(&acme_debit()).await.unwrap();
        assert_eq!(resolution, Resolution::Unmatched);
        assert_eq!(archive.searches().await.len(), 3);
    }

    #[tokio::test]
    async fn test_existing_match_is_sticky() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .add_search_result(
                "55231",
                date(2025, 2, 8),
                date(2025, 3, 24),
                vec![candidate(99, "Other", &[])],
            )
            .await;
        let resolver = resolver(&archive);

        let mut tx = acme_debit();
        let existing = MatchedDocument {
            id: 42,
            title: "Acme Invoice 55231".to_string(),
        };
        tx.matched = Some(existing.clone());

        for _ in 0..2 {
            let resolution = resolver.resolve(&tx).await.unwrap();
            assert_eq!(resolution, Resolution::AlreadyMatched(existing.clone()));
        }
        assert!(archive.searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_propagates() {
        let archive = Arc::new(InMemoryArchive::new());
        archive.fail_searches(true).await;
        let resolver = resolver(&archive);

        assert!(resolver.resolve(&acme_debit()).await.is_err());
    }
}
