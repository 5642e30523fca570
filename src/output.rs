use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards pipeline progress to the log at `info` level.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_summary_text(summary: &RunSummary) {
    eprintln!("archive:      {}", summary.archive);
    eprintln!(
        "transactions: {} rows, {} malformed, {} zero-value, {} non-equity, {} admitted",
        summary.transactions.rows,
        summary.transactions.malformed,
        summary.admission.zero_value,
        summary.admission.rejected_title,
        summary.admission.admitted
    );
    eprintln!(
        "join:         {} enriched, {} without submission, {} without owner",
        summary.join.enriched, summary.join.missing_submission, summary.join.missing_owner
    );
    eprintln!(
        "store:        {} inserted, {} already present",
        summary.store.inserted, summary.store.ignored
    );
}
