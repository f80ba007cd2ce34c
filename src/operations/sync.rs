// Sync Engine
// Runs one migration batch: fetch, plan, then create/update/skip per record

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::account::AccountPolicy;
use super::connector::{ConnectorError, CrmConnector, SaveResult};
use super::plan::{PlanEngine, PlanEntry, SyncAction};
use crate::constants::ID_FIELD;
use crate::core::{AppConfig, ComparatorError, ObjectKind, Record, Timestamp};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Comparator(#[from] ComparatorError),
}

/// Options for sync operations
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Continue on individual record errors
    pub continue_on_error: bool,
    /// Dry run - decide but don't write to the destination
    pub dry_run: bool,
    /// Fields owned by the destination, stripped before writing
    pub system_fields: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        let app = AppConfig::default();
        Self {
            continue_on_error: app.defaults.continue_on_error,
            dry_run: app.defaults.dry_run,
            system_fields: app.system_fields,
        }
    }
}

/// Result of a sync batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Candidates returned by the source
    pub fetched: usize,
    /// Candidates dropped by exclude rules
    pub filtered: usize,
    /// Older copies dropped by deduplication
    pub duplicates: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One message per failed record
    pub errors: Vec<String>,
    /// `since` for the next batch: the newest candidate, held back below
    /// any record that failed or was not reached
    pub watermark: Option<Timestamp>,
}

impl SyncReport {
    /// Records written (or that would have been, in a dry run)
    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    fn record_failure(&mut self, record: &Record, err: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("{}: {}", record.label(), err));
    }
}

/// Engine driving lead migration batches
pub struct SyncEngine {
    options: SyncOptions,
    planner: PlanEngine,
    account_policy: AccountPolicy,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(SyncOptions::default(), PlanEngine::default(), AccountPolicy::default())
    }
}

impl SyncEngine {
    pub fn new(options: SyncOptions, planner: PlanEngine, account_policy: AccountPolicy) -> Self {
        Self {
            options,
            planner,
            account_policy,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn account_policy(&self) -> &AccountPolicy {
        &self.account_policy
    }

    /// Migrate leads modified after `since` from `source` to `destination`.
    ///
    /// A record that cannot be compared or written is counted as failed and
    /// the batch moves on (unless `continue_on_error` is off). Failing to
    /// fetch or look up records aborts the batch.
    ///
    /// The returned watermark stays below every failed or unprocessed
    /// record, so the next batch fetches them again.
    #[instrument(skip_all, fields(source = source.org(), destination = destination.org()))]
    pub async fn run_batch(
        &self,
        source: &dyn CrmConnector,
        destination: &dyn CrmConnector,
        since: Option<Timestamp>,
    ) -> Result<SyncReport, SyncError> {
        let candidates = source.fetch_candidates(ObjectKind::Lead, since).await?;
        let newest = self.newest(&candidates);

        let mut report = SyncReport {
            fetched: candidates.len(),
            ..SyncReport::default()
        };
        info!(fetched = report.fetched, since = ?since.map(|s| s.to_string()), "fetched candidates");

        let plan = self.planner.plan(ObjectKind::Lead, candidates, destination).await?;
        report.filtered = plan.filtered;
        report.duplicates = plan.duplicates;

        // Oldest modification among records that still need another attempt
        let mut unfinished: Option<Timestamp> = None;
        let mut entries = plan.entries.into_iter();

        while let Some(PlanEntry { source: record, action }) = entries.next() {
            let failure = match action {
                Err(err) => {
                    warn!(record = record.label(), error = %err, "cannot decide, skipping record");
                    SyncError::from(err)
                }
                Ok(action) => match self.sync_entry(&record, &action, source, destination).await {
                    Ok(_) => {
                        match action {
                            SyncAction::Create => report.created += 1,
                            SyncAction::Update { .. } => report.updated += 1,
                            SyncAction::Skip => report.skipped += 1,
                        }
                        continue;
                    }
                    Err(err) => {
                        warn!(record = record.label(), action = action.label(), error = %err, "write failed");
                        err
                    }
                },
            };

            report.record_failure(&record, &failure);
            unfinished = self.earliest(unfinished, &record);

            if !self.options.continue_on_error {
                for rest in entries.by_ref() {
                    unfinished = self.earliest(unfinished, &rest.source);
                }
                break;
            }
        }

        report.watermark = next_watermark(since, newest, unfinished);

        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            filtered = report.filtered,
            failed = report.failed,
            "batch finished"
        );

        Ok(report)
    }

    /// Apply one decided action; returns the write result, if anything was written
    pub async fn sync_entry(
        &self,
        record: &Record,
        action: &SyncAction,
        source: &dyn CrmConnector,
        destination: &dyn CrmConnector,
    ) -> Result<Option<SaveResult>, SyncError> {
        let destination_id = match action {
            SyncAction::Skip => {
                debug!(record = record.label(), "destination is up to date");
                return Ok(None);
            }
            SyncAction::Create => None,
            SyncAction::Update { destination_id } => Some(destination_id.as_str()),
        };

        if self.options.dry_run {
            info!(record = record.label(), action = action.label(), "would sync (dry run)");
            return Ok(None);
        }

        let mut outgoing = self.map_record(record);
        if let Some(id) = destination_id {
            outgoing.insert(ID_FIELD, id);
        }

        self.account_policy
            .link(&mut outgoing, record, source, destination, &self.options.system_fields)
            .await?;

        let saved = destination.create_or_update(ObjectKind::Lead, outgoing).await?;
        info!(record = record.label(), id = %saved.id, action = action.label(), "synced");

        Ok(Some(saved))
    }

    /// Source record minus the fields the destination owns
    fn map_record(&self, record: &Record) -> Record {
        record.without_fields(&self.options.system_fields)
    }

    fn modified_at(&self, record: &Record) -> Option<Timestamp> {
        record
            .get(self.planner.comparator().field())
            .and_then(|raw| Timestamp::parse(raw).ok())
    }

    /// Newest parseable modification time among the candidates
    fn newest(&self, candidates: &[Record]) -> Option<Timestamp> {
        candidates.iter().filter_map(|r| self.modified_at(r)).max()
    }

    /// Fold a record into the oldest-unfinished tracker.
    ///
    /// Records without a readable timestamp are fetched on every batch anyway.
    fn earliest(&self, current: Option<Timestamp>, record: &Record) -> Option<Timestamp> {
        match (current, self.modified_at(record)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Where the next batch should start: never before `since`, never past the
/// newest candidate, and strictly below the oldest unfinished record.
fn next_watermark(
    since: Option<Timestamp>,
    newest: Option<Timestamp>,
    unfinished: Option<Timestamp>,
) -> Option<Timestamp> {
    let reached = match unfinished {
        None => newest,
        Some(oldest) => match (newest, oldest.previous_millisecond()) {
            (Some(newest), Some(before)) => Some(newest.min(before)),
            _ => None,
        },
    };
    reached.max(since)
}
