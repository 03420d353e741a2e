use clap::Parser;
use statement_audit::{
    audit::{AuditOrchestrator, AuditReport, NoteOutcome, TransactionOrigin, TransactionOutcome},
    config::AuditConfig,
    extraction::TextSource,
    models::{format_amount, AuditPeriod},
    notes::NoteSync,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Cross-reference a month of bank statements with the Paperless archive.
#[derive(Parser, Debug)]
#[command(name = "statement-audit", version)]
struct Cli {
    /// Year to audit, e.g. 2025
    year: i32,
    /// Month to audit, 1-12
    month: u32,
    /// Write audit notes back onto the statements (overrides WRITE_NOTES)
    #[arg(long)]
    write_notes: bool,
    /// Directory holding the per-month cache files (overrides CACHE_DIR)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let period = AuditPeriod::new(cli.year, cli.month)?;

    // Configuration problems abort before anything touches the network
    let mut config = AuditConfig::from_env()?;
    if cli.write_notes {
        config.write_notes = true;
    }
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }

    info!(config = ?config, "Configuration loaded");

    let orchestrator = AuditOrchestrator::from_config(&config)?;

    println!("Auditing bank statements for {}", period);
    println!();

    match orchestrator.run(period).await {
        Ok(report) => {
            print_report(&report);
            match report.cache_error {
                Some(error) => Err(error.into()),
                None => Ok(()),
            }
        }
        Err(e) => {
            eprintln!("Audit failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

fn print_report(report: &AuditReport) {
    if report.statements.is_empty() && report.skipped.is_empty() {
        println!("No bank statements found for this month.");
        return;
    }

    for statement in &report.statements {
        println!("── {} (#{}) ──", statement.title, statement.doc_id);

        match &statement.origin {
            TransactionOrigin::Cached => println!(
                "  Using cached transactions ({} items)",
                statement.transactions.len()
            ),
            TransactionOrigin::Extracted(TextSource::Original { filename }) => println!(
                "  Parsed {}: {} transactions",
                filename,
                statement.transactions.len()
            ),
            TransactionOrigin::Extracted(TextSource::Ocr) => println!(
                "  Extracted from OCR text: {} transactions",
                statement.transactions.len()
            ),
        }

        for entry in &statement.transactions {
            let tx = &entry.transaction;
            let line = format!(
                "{} | {:>10} | {:<30}",
                tx.date,
                format_amount(tx.amount),
                tx.counterparty
            );

            match (&entry.outcome, &tx.matched) {
                (TransactionOutcome::NewlyMatched(tier), Some(doc)) => {
                    println!("  ✓ {} | → #{} {} ({})", line, doc.id, doc.title, tier)
                }
                (_, Some(doc)) => println!("  ✓ {} | → #{}", line, doc.id),
                (TransactionOutcome::SearchFailed(reason), None) => {
                    println!("  ✗ {} | SEARCH FAILED: {}", line, reason)
                }
                (_, None) => println!("  ✗ {} | NOT FOUND", line),
            }
        }

        match &statement.note {
            Some(NoteOutcome::Written(NoteSync::Unchanged)) => {
                println!("  📝 Note already up to date on #{}", statement.doc_id)
            }
            Some(NoteOutcome::Written(_)) => {
                println!("  📝 Note updated on #{}", statement.doc_id)
            }
            Some(NoteOutcome::Failed(reason)) => {
                println!("  ⚠️  Note not written on #{}: {}", statement.doc_id, reason)
            }
            None => {}
        }

        println!();
    }

    for skipped in &report.skipped {
        println!(
            "── {} (#{}) ── SKIPPED: {}",
            skipped.title, skipped.doc_id, skipped.reason
        );
    }
    if !report.skipped.is_empty() {
        println!();
    }

    println!("{}", "═".repeat(60));
    println!("Total: {} transactions", report.total());
    println!("  Matched:   {}", report.matched());
    println!("  Unmatched: {}", report.unmatched());
    println!("  Coverage:  {}%", report.coverage_percent());
    if !report.skipped.is_empty() {
        println!("  Skipped statements: {}", report.skipped.len());
    }
    if let Some(error) = &report.cache_error {
        println!("  ⚠️  Cache not saved: {}", error);
    }
}
