//! Error types for the statement audit

use thiserror::Error;

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {

    // =============================
    // Run Setup Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid audit period: {0}")]
    InvalidPeriod(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("Empty document content")]
    EmptyContent,

    #[error("Cache error: {0}")]
    Cache(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),
}
