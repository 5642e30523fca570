use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::InsiderError;
use crate::records::{EnrichedTransaction, OwnerRecord, SubmissionRecord, TransactionRecord};

pub trait Keyed {
    fn accession_number(&self) -> &str;
}

impl Keyed for SubmissionRecord {
    fn accession_number(&self) -> &str {
        &self.accession_number
    }
}

impl Keyed for OwnerRecord {
    fn accession_number(&self) -> &str {
        &self.accession_number
    }
}

/// Indexes `records` by accession number in one pass. The first record for a
/// key is kept; later ones (e.g. co-filing owners) are dropped.
pub fn index_by_accession<R: Keyed>(records: Vec<R>) -> HashMap<String, R> {
    let mut map = HashMap::with_capacity(records.len());
    let mut repeated = 0usize;
    for record in records {
        let key = record.accession_number().to_string();
        if map.contains_key(&key) {
            repeated += 1;
            continue;
        }
        map.insert(key, record);
    }
    if repeated > 0 {
        debug!("{repeated} records shared an accession number with an earlier one");
    }
    map
}

#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub enriched: Vec<EnrichedTransaction>,
    pub misses: Vec<InsiderError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub enriched: usize,
    pub missing_submission: usize,
    pub missing_owner: usize,
}

impl JoinOutcome {
    pub fn stats(&self) -> JoinStats {
        let mut stats = JoinStats {
            enriched: self.enriched.len(),
            ..JoinStats::default()
        };
        for miss in &self.misses {
            if let InsiderError::Join { missing, .. } = miss {
                match *missing {
                    "submission" => stats.missing_submission += 1,
                    _ => stats.missing_owner += 1,
                }
            }
        }
        stats
    }
}

/// Copies submission and owner fields onto each transaction. A transaction
/// whose accession number is absent from either map is skipped and recorded
/// in [`JoinOutcome::misses`].
pub fn join(
    transactions: Vec<TransactionRecord>,
    submissions: &HashMap<String, SubmissionRecord>,
    owners: &HashMap<String, OwnerRecord>,
) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();
    for transaction in transactions {
        let accession = transaction.accession_number.as_str();
        let Some(submission) = submissions.get(accession) else {
            outcome.misses.push(miss(accession, "submission"));
            continue;
        };
        let Some(owner) = owners.get(accession) else {
            outcome.misses.push(miss(accession, "owner"));
            continue;
        };
        outcome
            .enriched
            .push(EnrichedTransaction::new(transaction, submission, owner));
    }
    outcome
}

fn miss(accession: &str, missing: &'static str) -> InsiderError {
    let err = InsiderError::Join {
        accession: accession.to_string(),
        missing,
    };
    warn!("skipping transaction: {err}");
    err
}
