use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum InsiderError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("not found: {0}")]
    #[diagnostic(help("check the dataset year/quarter, or use --latest"))]
    NotFound(String),

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("invalid archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("archive {path} has no member named {member}")]
    MissingMember { path: PathBuf, member: String },

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("accession {accession} has no matching {missing} record")]
    Join {
        accession: String,
        missing: &'static str,
    },

    #[error("cannot open output {path}: {message}")]
    Output { path: PathBuf, message: String },

    #[error("failed to write report: {0}")]
    Report(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid quarter: {0} (expected 1-4)")]
    InvalidQuarter(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("could not resolve latest dataset from {url}: {reason}")]
    ListingResolution { url: String, reason: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl InsiderError {
    /// Row-level failures that skip one record instead of ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InsiderError::MalformedRow { .. } | InsiderError::Join { .. }
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            InsiderError::Http { .. }
                | InsiderError::HttpStatus { .. }
                | InsiderError::NotFound(_)
                | InsiderError::RetriesExhausted { .. }
                | InsiderError::ListingResolution { .. }
        )
    }

    /// Process exit status for a fatal error: 2 network, 3 archive, 4 output,
    /// 1 anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            err if err.is_network() => 2,
            InsiderError::Archive { .. } | InsiderError::MissingMember { .. } => 3,
            InsiderError::Output { .. } | InsiderError::Report(_) => 4,
            _ => 1,
        }
    }
}
