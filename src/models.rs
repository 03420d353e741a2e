//! Core data models for the statement audit

use crate::error::AuditError;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

//
// ================= Transaction =================
//

/// Booking date of a transaction.
///
/// Anything that is not an ISO `YYYY-MM-DD` date is kept verbatim so the
/// transaction still counts towards coverage. Such transactions are searched
/// without a date filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionDate {
    Calendar(NaiveDate),
    Unparsed(String),
}

impl TransactionDate {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            Ok(date) => TransactionDate::Calendar(date),
            Err(_) => TransactionDate::Unparsed(trimmed.to_string()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TransactionDate::Calendar(date) => Some(*date),
            TransactionDate::Unparsed(_) => None,
        }
    }
}

impl From<NaiveDate> for TransactionDate {
    fn from(date: NaiveDate) -> Self {
        TransactionDate::Calendar(date)
    }
}

impl fmt::Display for TransactionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionDate::Calendar(date) => write!(f, "{}", date),
            TransactionDate::Unparsed(raw) => write!(f, "{}", raw),
        }
    }
}

impl Serialize for TransactionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionDate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(TransactionDate::parse(&raw))
    }
}

/// `null` text fields read as empty strings.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One line item of a bank statement.
///
/// Positive amounts are credits (money in), negative amounts are debits.
/// The match fields are serialized flat as `matched_doc_id` / `matched_title`
/// and are either both present or both absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub date: TransactionDate,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub counterparty: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub matched: Option<MatchedDocument>,
}

impl Transaction {
    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }

    /// Credits settle invoices that may be months old, so they get a wider search window.
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Absolute amount with exactly two decimals, as searched in the archive.
    pub fn search_amount(&self) -> String {
        format_amount(self.amount.abs())
    }
}

/// The archive document a transaction was matched to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchedDocument {
    #[serde(rename = "matched_doc_id")]
    pub id: u64,
    #[serde(rename = "matched_title", default)]
    pub title: String,
}

impl From<&MatchCandidate> for MatchedDocument {
    fn from(candidate: &MatchCandidate) -> Self {
        Self {
            id: candidate.id,
            title: candidate.title.clone(),
        }
    }
}

/// Format an amount with exactly two decimal places (`-120.5` → `-120.50`).
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

//
// ================= Extraction Output =================
//

/// Transaction as returned by the extraction collaborator, before matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedTransaction {
    pub date: TransactionDate,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub counterparty: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl From<ExtractedTransaction> for Transaction {
    fn from(extracted: ExtractedTransaction) -> Self {
        Self {
            date: extracted.date,
            amount: extracted.amount,
            counterparty: extracted.counterparty,
            description: extracted.description,
            reference: extracted.reference.filter(|r| !r.trim().is_empty()),
            matched: None,
        }
    }
}

//
// ================= Cache =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementRecord {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Everything extracted and matched for one (year, month).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonthCache {
    #[serde(default)]
    pub statements: BTreeMap<String, StatementRecord>,
}

//
// ================= Archive =================
//

/// A search hit from the document archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchCandidate {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<u64>,
}

impl MatchCandidate {
    pub fn has_tag(&self, tag_id: u64) -> bool {
        self.tags.contains(&tag_id)
    }
}

/// A bank statement document listed for the audited month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatementDocument {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
}

impl StatementDocument {
    pub fn cache_key(&self) -> String {
        self.id.to_string()
    }

    pub fn display_title(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Document #{}", self.id),
        }
    }
}

/// A note attached to an archive document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: u64,
    #[serde(default)]
    pub note: String,
}

/// Original file of a document, as uploaded.
#[derive(Debug, Clone)]
pub struct OriginalFile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

//
// ================= Period =================
//

/// Calendar month under audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuditPeriod {
    year: i32,
    month: u32,
}

impl AuditPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(AuditError::InvalidPeriod(format!(
                "{}-{:02} is not a valid month",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month (inclusive bound).
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following month (exclusive bound).
    pub fn next_month_first_day(&self) -> NaiveDate {
        let first = self.first_day();
        let (year, month) = if first.month() == 12 {
            (first.year() + 1, 1)
        } else {
            (first.year(), first.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for AuditPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}
