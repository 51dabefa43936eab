//! Command output: a human formatter for terminals and a JSON formatter for
//! scripts
//!
//! Besides plain messages, formatters render the two DrSync results a
//! command ends with: a finished transfer and a transfer plan.

use std::io::Write;

use drsync_core::domain::BackendKind;
use drsync_sync::transfer::{Direction, TransferReport};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// One planned file: remote path and local path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRow {
    pub remote: String,
    pub local: String,
}

/// Files a sync in `direction` would transfer
#[derive(Debug, Clone)]
pub struct PlanListing {
    pub direction: Direction,
    /// Timestamp of the upload the download plan restores
    pub last_sync: Option<String>,
    pub rows: Vec<PlanRow>,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    /// Rewrites the live status line; an empty message clears it
    fn status(&self, message: &str);
    /// Result of a finished `sync`
    fn transfer_done(&self, backend: BackendKind, account: &str, report: &TransferReport);
    /// Result of `plan`
    fn plan(&self, listing: &PlanListing);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
    fn status(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[2K{}", message);
        let _ = stderr.flush();
    }
    fn transfer_done(&self, _backend: BackendKind, _account: &str, report: &TransferReport) {
        self.success("Data has been synchronized successfully");
        self.info(&transfer_summary(report));
    }
    fn plan(&self, listing: &PlanListing) {
        self.success(&plan_heading(listing));
        let arrow = match listing.direction {
            Direction::Upload => "<-",
            Direction::Download => "->",
        };
        for row in &listing.rows {
            self.info(&format!("{}  {}  {}", row.remote, arrow, row.local));
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
    fn status(&self, _message: &str) {}
    fn transfer_done(&self, backend: BackendKind, account: &str, report: &TransferReport) {
        self.print_json(&transfer_json(backend, account, report));
    }
    fn plan(&self, listing: &PlanListing) {
        self.print_json(&plan_json(listing));
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

fn transfer_summary(report: &TransferReport) -> String {
    format!(
        "{} {} file(s), {} bytes in {:.1}s",
        match report.direction {
            Direction::Upload => "Uploaded",
            Direction::Download => "Downloaded",
        },
        report.files_transferred,
        report.bytes_transferred,
        report.duration_ms as f64 / 1000.0
    )
}

fn transfer_json(backend: BackendKind, account: &str, report: &TransferReport) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "backend": backend.as_str(),
        "account": account,
        "report": {
            "direction": report.direction.to_string(),
            "files_transferred": report.files_transferred,
            "bytes_transferred": report.bytes_transferred,
            "duration_ms": report.duration_ms,
        },
    })
}

fn plan_heading(listing: &PlanListing) -> String {
    let count = listing.rows.len();
    match (listing.direction, &listing.last_sync) {
        (Direction::Upload, _) => format!("{count} file(s) would be uploaded"),
        (Direction::Download, Some(last_sync)) => {
            format!("{count} file(s) would be downloaded (synchronized {last_sync})")
        }
        (Direction::Download, None) => format!("{count} file(s) would be downloaded"),
    }
}

fn plan_json(listing: &PlanListing) -> serde_json::Value {
    let files: Vec<_> = listing
        .rows
        .iter()
        .map(|row| serde_json::json!({"remote": row.remote, "local": row.local}))
        .collect();
    let mut value = serde_json::json!({
        "direction": listing.direction.to_string(),
        "count": files.len(),
        "files": files,
    });
    if let Some(last_sync) = &listing.last_sync {
        value["last_sync"] = serde_json::json!(last_sync);
    }
    value
}
