// Plan Engine
// Filters, dedupes and matches source candidates, then decides create/update/skip

use std::collections::HashMap;
use tracing::{debug, warn};

use super::connector::{ConnectorError, CrmConnector};
use crate::constants::ID_FIELD;
use crate::core::{ComparatorError, LastModifiedComparator, ObjectKind, Record, Side};
use crate::utilities::FieldMatcher;

/// What the orchestrator should do with one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No destination record matches the business key
    Create,
    /// The source version is strictly newer than the destination's
    Update { destination_id: String },
    /// The destination is as new or newer
    Skip,
}

impl SyncAction {
    pub fn label(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update { .. } => "update",
            SyncAction::Skip => "skip",
        }
    }
}

/// A candidate and the decision taken for it
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Source record as fetched
    pub source: Record,
    /// Decision, or the comparator failure that prevented one
    pub action: Result<SyncAction, ComparatorError>,
}

/// Decisions for a whole batch
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    /// Candidates dropped by exclude rules
    pub filtered: usize,
    /// Older copies dropped while deduplicating by business key
    pub duplicates: usize,
}

/// Result of collapsing candidates that share a business key
#[derive(Debug, Default)]
pub struct Deduped {
    pub records: Vec<Result<Record, (Record, ComparatorError)>>,
    pub duplicates: usize,
}

/// Engine computing the per-record plan for a batch
#[derive(Debug, Clone, Default)]
pub struct PlanEngine {
    comparator: LastModifiedComparator,
    excludes: FieldMatcher,
}

impl PlanEngine {
    pub fn new(excludes: FieldMatcher) -> Self {
        Self {
            comparator: LastModifiedComparator::default(),
            excludes,
        }
    }

    pub fn with_comparator(mut self, comparator: LastModifiedComparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn comparator(&self) -> &LastModifiedComparator {
        &self.comparator
    }

    /// Drop candidates matching an exclude rule; returns the kept ones and the drop count
    pub fn filter(&self, candidates: Vec<Record>) -> (Vec<Record>, usize) {
        let before = candidates.len();
        let kept: Vec<Record> = candidates
            .into_iter()
            .filter(|record| match self.excludes.excluded_by(record) {
                Some(rule) => {
                    debug!(record = record.label(), field = %rule.field, pattern = %rule.pattern, "excluded");
                    false
                }
                None => true,
            })
            .collect();

        let dropped = before - kept.len();
        (kept, dropped)
    }

    /// Keep the newest candidate per business key, preserving first-seen order.
    ///
    /// Records without the key pass through untouched. If two copies cannot
    /// be compared, the key is reported as a failure instead of guessing.
    pub fn dedupe(&self, object: ObjectKind, candidates: Vec<Record>) -> Deduped {
        let key_field = object.match_field();
        let mut deduped = Deduped::default();
        let mut slot_by_key: HashMap<String, usize> = HashMap::new();

        for candidate in candidates {
            let Some(key) = candidate.get(key_field).map(str::to_string) else {
                deduped.records.push(Ok(candidate));
                continue;
            };

            let Some(&slot) = slot_by_key.get(&key) else {
                slot_by_key.insert(key, deduped.records.len());
                deduped.records.push(Ok(candidate));
                continue;
            };

            deduped.duplicates += 1;
            let current = &mut deduped.records[slot];
            let Ok(kept) = &mut *current else {
                continue;
            };

            match self.comparator.compare_present(&candidate, kept) {
                Ok(true) => *kept = candidate,
                Ok(false) => {}
                Err(err) => {
                    warn!(%key, error = %err, "cannot order duplicate candidates");
                    let kept = std::mem::take(kept);
                    *current = Err((kept, err));
                }
            }
        }

        deduped
    }

    /// Decide the action for one source record against its destination match
    pub fn determine_action(
        &self,
        source: &Record,
        destination: Option<&Record>,
    ) -> Result<SyncAction, ComparatorError> {
        let Some(destination) = destination else {
            return Ok(SyncAction::Create);
        };

        if !self.comparator.compare_present(source, destination)? {
            return Ok(SyncAction::Skip);
        }

        let destination_id = destination
            .id()
            .ok_or_else(|| ComparatorError::missing_field(Side::B, ID_FIELD))?;

        Ok(SyncAction::Update {
            destination_id: destination_id.to_string(),
        })
    }

    /// Filter, dedupe and match candidates against the destination.
    ///
    /// Lookup failures abort planning: a destination that cannot be queried
    /// makes every decision in the batch meaningless.
    pub async fn plan(
        &self,
        object: ObjectKind,
        candidates: Vec<Record>,
        destination: &dyn CrmConnector,
    ) -> Result<Plan, ConnectorError> {
        let (candidates, filtered) = self.filter(candidates);
        let deduped = self.dedupe(object, candidates);
        let key_field = object.match_field();

        let mut entries = Vec::with_capacity(deduped.records.len());
        for record in deduped.records {
            let entry = match record {
                Err((source, err)) => PlanEntry { source, action: Err(err) },
                Ok(source) => {
                    let matched = match source.get(key_field) {
                        Some(key) => destination.find_by_field(object, key_field, key).await?,
                        None => None,
                    };
                    let action = self.determine_action(&source, matched.as_ref());
                    PlanEntry { source, action }
                }
            };
            entries.push(entry);
        }

        Ok(Plan {
            entries,
            filtered,
            duplicates: deduped.duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::memory::InMemoryConnector;
    use crate::utilities::FieldPattern;

    fn lead(email: &str, modified: &str) -> Record {
        Record::new()
            .with("Email", email)
            .with("LastModifiedDate", modified)
    }

    #[test]
    fn test_no_match_creates() {
        let engine = PlanEngine::default();
        let source = lead("a@fakemail.com", "2013-12-09T22:15:33.001Z");

        assert_eq!(engine.determine_action(&source, None), Ok(SyncAction::Create));
    }

    #[test]
    fn test_newer_source_updates_destination_id() {
        let engine = PlanEngine::default();
        let source = lead("a@fakemail.com", "2013-12-10T22:15:33.001Z");
        let dest = lead("a@fakemail.com", "2013-12-09T22:15:33.001Z").with("Id", "00QB");

        assert_eq!(
            engine.determine_action(&source, Some(&dest)),
            Ok(SyncAction::Update { destination_id: "00QB".to_string() })
        );
    }

    #[test]
    fn test_equal_or_older_source_skips() {
        let engine = PlanEngine::default();
        let dest = lead("a@fakemail.com", "2013-12-09T22:15:33.001Z").with("Id", "00QB");

        let same = lead("a@fakemail.com", "2013-12-09T22:15:33.001Z");
        let older = lead("a@fakemail.com", "2013-12-08T22:15:33.001Z");

        assert_eq!(engine.determine_action(&same, Some(&dest)), Ok(SyncAction::Skip));
        assert_eq!(engine.determine_action(&older, Some(&dest)), Ok(SyncAction::Skip));
    }

    #[test]
    fn test_malformed_destination_timestamp_is_an_error() {
        let engine = PlanEngine::default();
        let source = lead("a@fakemail.com", "2013-12-09T22:15:33.001Z");
        let dest = lead("a@fakemail.com", "yesterday").with("Id", "00QB");

        assert_eq!(
            engine.determine_action(&source, Some(&dest)),
            Err(ComparatorError::malformed(Side::B, "yesterday"))
        );
    }

    #[test]
    fn test_filter_counts_excluded() {
        let engine = PlanEngine::new(FieldMatcher::new(vec![FieldPattern::new(
            "MailingCountry",
            "argentina",
        )]));
        let candidates = vec![
            Record::new().with("MailingCountry", "Argentina"),
            Record::new().with("MailingCountry", "United States"),
            Record::new(),
        ];

        let (kept, dropped) = engine.filter(candidates);
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_dedupe_keeps_newest_in_first_seen_order() {
        let engine = PlanEngine::default();
        let candidates = vec![
            lead("a@fakemail.com", "2013-12-08T00:00:00.000Z").with("FirstName", "old"),
            lead("b@fakemail.com", "2013-12-08T00:00:00.000Z"),
            lead("a@fakemail.com", "2013-12-10T00:00:00.000Z").with("FirstName", "new"),
            lead("a@fakemail.com", "2013-12-09T00:00:00.000Z").with("FirstName", "mid"),
            Record::new().with("FirstName", "no-email"),
        ];

        let deduped = engine.dedupe(ObjectKind::Lead, candidates);
        assert_eq!(deduped.duplicates, 2);

        let kept: Vec<Record> = deduped.records.into_iter().map(Result::unwrap).collect();
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].get("FirstName"), Some("new"));
        assert_eq!(kept[1].email(), Some("b@fakemail.com"));
        assert_eq!(kept[2].get("FirstName"), Some("no-email"));
    }

    #[test]
    fn test_dedupe_reports_unorderable_duplicates() {
        let engine = PlanEngine::default();
        let candidates = vec![
            lead("a@fakemail.com", "2013-12-08T00:00:00.000Z"),
            lead("a@fakemail.com", "not-a-date"),
            lead("a@fakemail.com", "2013-12-10T00:00:00.000Z"),
        ];

        let deduped = engine.dedupe(ObjectKind::Lead, candidates);
        assert_eq!(deduped.duplicates, 2);
        assert_eq!(deduped.records.len(), 1);
        let (_, err) = deduped.records[0].as_ref().unwrap_err();
        assert_eq!(err, &ComparatorError::malformed(Side::A, "not-a-date"));
    }

    #[tokio::test]
    async fn test_plan_matches_destination_by_email() {
        let destination = InMemoryConnector::new("B").with_records(
            ObjectKind::Lead,
            vec![
                lead("update@fakemail.com", "2013-12-09T00:00:00.000Z").with("Id", "00QU"),
                lead("skip@fakemail.com", "2013-12-09T00:00:00.000Z").with("Id", "00QS"),
            ],
        );
        let candidates = vec![
            lead("new@fakemail.com", "2013-12-10T00:00:00.000Z"),
            lead("update@fakemail.com", "2013-12-10T00:00:00.000Z"),
            lead("skip@fakemail.com", "2013-12-09T00:00:00.000Z"),
            Record::new().with("LastModifiedDate", "2013-12-10T00:00:00.000Z"),
        ];

        let plan = PlanEngine::default()
            .plan(ObjectKind::Lead, candidates, &destination)
            .await
            .unwrap();

        let actions: Vec<_> = plan.entries.iter().map(|e| e.action.clone().unwrap()).collect();
        assert_eq!(
            actions,
            vec![
                SyncAction::Create,
                SyncAction::Update { destination_id: "00QU".to_string() },
                SyncAction::Skip,
                SyncAction::Create,
            ]
        );
    }
}
