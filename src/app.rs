use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::archive::{open_member, validate_archive};
use crate::config::ResolvedConfig;
use crate::domain::{
    DatasetSelection, OWNERS_MEMBER, SUBMISSIONS_MEMBER, TRANSACTIONS_MEMBER,
};
use crate::error::InsiderError;
use crate::fetch::FetchClient;
use crate::join::{JoinStats, index_by_accession, join};
use crate::listing::resolve_latest_dataset_name;
use crate::normalize::{
    AdmissionStats, Relation, RelationStats, admit_transactions, largest_trades, read_relation,
};
use crate::records::{OwnerRecord, SubmissionRecord, TransactionRecord};
use crate::store::{InsertStats, Store};

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Re-download even if the archive is already in the download directory.
    pub force_download: bool,
    /// Keep only the N largest admitted trades by dollar value.
    pub top: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub archive: String,
    pub transactions: RelationStats,
    pub submissions: RelationStats,
    pub owners: RelationStats,
    pub admission: AdmissionStats,
    pub join: JoinStats,
    pub store: InsertStats,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// The three relations of one archive after normalization.
#[derive(Debug)]
pub struct Extracted {
    pub transactions: Relation<TransactionRecord>,
    pub submissions: Relation<SubmissionRecord>,
    pub owners: Relation<OwnerRecord>,
}

pub struct App<C: FetchClient> {
    client: C,
    config: ResolvedConfig,
}

impl<C: FetchClient> App<C> {
    pub fn new(client: C, config: ResolvedConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn dataset_url(&self, file_name: &str) -> String {
        format!("{}{}", self.config.base_url, file_name)
    }

    /// Name of the newest archive linked from the dataset listing page.
    pub fn resolve_latest(&self, sink: &dyn ProgressSink) -> Result<String, InsiderError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; reading listing {}", self.config.base_url),
            elapsed: None,
        });
        let name = resolve_latest_dataset_name(&self.client, &self.config.base_url)?;
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; latest dataset {name}"),
            elapsed: None,
        });
        Ok(name)
    }

    /// Local path of the archive for `selection`, downloading it first when
    /// needed.
    pub fn acquire(
        &self,
        selection: &DatasetSelection,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Utf8PathBuf, InsiderError> {
        let file_name = match selection {
            DatasetSelection::LocalArchive(path) => return Ok(path.clone()),
            DatasetSelection::Named(name) => name.file_name(),
            DatasetSelection::Latest => self.resolve_latest(sink)?,
        };

        let destination = self.config.download_dir.join(&file_name);
        if !force && destination.as_std_path().exists() {
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; reusing {destination}"),
                elapsed: None,
            });
            return Ok(destination);
        }

        let url = self.dataset_url(&file_name);
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; downloading {url}"),
            elapsed: None,
        });
        let start = Instant::now();
        let bytes = self.client.download(&url, destination.as_std_path())?;
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {bytes} bytes written to {destination}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(destination)
    }

    pub fn extract(
        &self,
        archive: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<Extracted, InsiderError> {
        let path = archive.as_std_path();
        validate_archive(
            path,
            &[TRANSACTIONS_MEMBER, SUBMISSIONS_MEMBER, OWNERS_MEMBER],
        )?;

        let start = Instant::now();
        let transactions = read_relation(open_member(path, TRANSACTIONS_MEMBER)?);
        let submissions = read_relation(open_member(path, SUBMISSIONS_MEMBER)?);
        let owners = read_relation(open_member(path, OWNERS_MEMBER)?);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Normalize; {} transactions, {} submissions, {} owners",
                transactions.records.len(),
                submissions.records.len(),
                owners.records.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok(Extracted {
            transactions,
            submissions,
            owners,
        })
    }

    /// Fetch, normalize, join and persist one archive.
    pub fn ingest(
        &self,
        store: &mut Store,
        selection: &DatasetSelection,
        options: &IngestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, InsiderError> {
        let start = Instant::now();
        let archive = self.acquire(selection, options.force_download, sink)?;
        let extracted = self.extract(&archive, sink)?;
        let summary = ingest_extracted(
            store,
            extracted,
            options.top,
            archive.to_string(),
            sink,
        )?;
        Ok(RunSummary {
            elapsed_ms: start.elapsed().as_millis(),
            ..summary
        })
    }
}

/// Filter, join and persist already-normalized relations.
pub fn ingest_extracted(
    store: &mut Store,
    extracted: Extracted,
    top: Option<usize>,
    archive: String,
    sink: &dyn ProgressSink,
) -> Result<RunSummary, InsiderError> {
    let start = Instant::now();
    let Extracted {
        transactions,
        submissions,
        owners,
    } = extracted;

    let (admitted, admission) = admit_transactions(transactions.records);
    let admitted = match top {
        Some(limit) => {
            debug!("keeping the {limit} largest of {} trades", admitted.len());
            largest_trades(admitted, limit)
        }
        None => admitted,
    };

    let submissions_by_accession = index_by_accession(submissions.records);
    let owners_by_accession = index_by_accession(owners.records);
    let outcome = join(admitted, &submissions_by_accession, &owners_by_accession);
    let join_stats = outcome.stats();
    sink.event(ProgressEvent {
        message: format!(
            "phase=Join; {} enriched, {} skipped",
            join_stats.enriched,
            outcome.misses.len()
        ),
        elapsed: None,
    });

    let store_stats = store.insert_all(&outcome.enriched)?;
    sink.event(ProgressEvent {
        message: format!(
            "phase=Store; {} inserted, {} already present",
            store_stats.inserted, store_stats.ignored
        ),
        elapsed: Some(start.elapsed()),
    });

    Ok(RunSummary {
        archive,
        transactions: transactions.stats,
        submissions: submissions.stats,
        owners: owners.stats,
        admission,
        join: join_stats,
        store: store_stats,
        elapsed_ms: start.elapsed().as_millis(),
    })
}
