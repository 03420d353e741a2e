//! Run configuration
//!
//! Everything the audit needs from the environment is read once, validated,
//! and handed to the components at construction.

use crate::error::AuditError;
use crate::Result;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Date windows used by the match tiers, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindows {
    /// Lookback for incoming payments; they often settle old invoices.
    pub credit_lookback_days: i64,
    pub debit_lookback_days: i64,
    pub lookahead_days: i64,
    /// Half-width of the window for the amount-only tier.
    pub amount_only_radius_days: i64,
}

impl Default for MatchWindows {
    fn default() -> Self {
        Self {
            credit_lookback_days: 365,
            debit_lookback_days: 30,
            lookahead_days: 14,
            amount_only_radius_days: 5,
        }
    }
}

#[derive(Clone)]
pub struct PaperlessConfig {
    pub base_url: String,
    pub token: String,
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Clone)]
pub struct AuditConfig {
    pub paperless: PaperlessConfig,
    pub openai: OpenAiConfig,
    /// Tag id marking bank statement documents in the archive.
    pub statement_tag_id: u64,
    /// Write audit notes back to the statements. Off by default, it mutates the archive.
    pub write_notes: bool,
    pub cache_dir: PathBuf,
    pub windows: MatchWindows,
}

impl AuditConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuditError::Config(format!("{} is not set", key)))
        };

        let base_url = required("PAPERLESS_URL")?
            .trim_end_matches('/')
            .to_string();
        let token = required("PAPERLESS_TOKEN")?;
        let api_key = required("OPENAI_API_KEY")?;

        let tag_raw = required("BANK_STATEMENT_TAG_ID")?;
        let statement_tag_id = tag_raw.parse::<u64>().map_err(|_| {
            AuditError::Config(format!(
                "BANK_STATEMENT_TAG_ID must be an integer, got '{}'",
                tag_raw
            ))
        })?;

        let write_notes = lookup("WRITE_NOTES")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let cache_dir = lookup("CACHE_DIR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());

        let model = lookup("OPENAI_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        let openai_base_url = lookup("OPENAI_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            paperless: PaperlessConfig { base_url, token },
            openai: OpenAiConfig {
                api_key,
                model,
                base_url: openai_base_url,
            },
            statement_tag_id,
            write_notes,
            cache_dir: PathBuf::from(cache_dir),
            windows: MatchWindows::default(),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("paperless_url", &self.paperless.base_url)
            .field("openai_model", &self.openai.model)
            .field("openai_base_url", &self.openai.base_url)
            .field("statement_tag_id", &self.statement_tag_id)
            .field("write_notes", &self.write_notes)
            .field("cache_dir", &self.cache_dir)
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}
