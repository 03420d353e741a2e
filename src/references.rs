//! Reference extraction from transaction descriptions
//!
//! Produces search tokens ordered from most to least specific. The explicit
//! `ref` field always comes first; description patterns follow in rule order.

use crate::models::Transaction;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Reference patterns in priority order. Rules with a capture group
    /// contribute the captured token; rules without one contribute the whole match.
    static ref REFERENCE_PATTERNS: Vec<Regex> = vec![
        // DH-202512-10218, INV-2025-042
        Regex::new(r"[A-Z]{2,}-\d[\d-]+\d").unwrap(),
        // Nr. 12345, nr 12345
        Regex::new(r"[Nn]r\.?\s*(\S+)").unwrap(),
        // rēķins / rēķinu Nr ...
        Regex::new(r"[Rr]ēķin\S*\s+\S*\s*(\S+)").unwrap(),
    ];
}

/// Extract searchable references from a transaction.
///
/// Duplicates are kept; searching the same token twice is harmless.
pub fn extract_refs(tx: &Transaction) -> Vec<String> {
    let mut refs = Vec::new();

    if let Some(reference) = tx.reference.as_deref() {
        if !reference.is_empty() {
            refs.push(reference.to_string());
        }
    }

    for pattern in REFERENCE_PATTERNS.iter() {
        for caps in pattern.captures_iter(&tx.description) {
            let token = caps.get(1).or_else(|| caps.get(0));
            if let Some(token) = token {
                refs.push(token.as_str().to_string());
            }
        }
    }

    refs
}
