// In-Memory Connector
// A CRM organization held entirely in process, for tests and dry runs

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::connector::{check_writable, modified_after, system_clock, Clock, ConnectorError, CrmConnector, SaveResult};
use crate::constants::{ID_FIELD, LAST_MODIFIED_DATE};
use crate::core::{ObjectKind, Record};

#[derive(Default)]
struct Store {
    objects: BTreeMap<ObjectKind, Vec<Record>>,
    next_id: u64,
}

impl Store {
    fn assign_id(&mut self, object: ObjectKind) -> String {
        self.next_id += 1;
        format!("{}{:012}", object.id_prefix(), self.next_id)
    }
}

/// Organization backed by an in-process record list
pub struct InMemoryConnector {
    org: String,
    store: RwLock<Store>,
    clock: Clock,
}

impl InMemoryConnector {
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            store: RwLock::new(Store::default()),
            clock: system_clock(),
        }
    }

    /// Replace the clock used to stamp writes
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Seed existing records as-is; records without an `Id` get one
    pub fn with_records(mut self, object: ObjectKind, records: Vec<Record>) -> Self {
        let store = self.store.get_mut();
        for mut record in records {
            if record.id().is_none() {
                let id = store.assign_id(object);
                record.insert(ID_FIELD, id);
            }
            store.objects.entry(object).or_default().push(record);
        }
        self
    }

    /// Snapshot of every stored record of `object`
    pub async fn records(&self, object: ObjectKind) -> Vec<Record> {
        self.store
            .read()
            .await
            .objects
            .get(&object)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CrmConnector for InMemoryConnector {
    fn org(&self) -> &str {
        &self.org
    }

    async fn fetch_candidates(
        &self,
        object: ObjectKind,
        since: Option<crate::core::Timestamp>,
    ) -> Result<Vec<Record>, ConnectorError> {
        let store = self.store.read().await;
        Ok(store
            .objects
            .get(&object)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| modified_after(r, since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_field(
        &self,
        object: ObjectKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, ConnectorError> {
        let store = self.store.read().await;
        Ok(store
            .objects
            .get(&object)
            .and_then(|records| records.iter().find(|r| r.get(field) == Some(value)))
            .cloned())
    }

    async fn get(&self, object: ObjectKind, id: &str) -> Result<Option<Record>, ConnectorError> {
        self.find_by_field(object, ID_FIELD, id).await
    }

    async fn create_or_update(
        &self,
        object: ObjectKind,
        mut record: Record,
    ) -> Result<SaveResult, ConnectorError> {
        check_writable(object, &record)?;
        let modified = (self.clock)().to_string();
        let mut store = self.store.write().await;

        if let Some(id) = record.id().map(str::to_string) {
            let existing = store
                .objects
                .get_mut(&object)
                .and_then(|records| records.iter_mut().find(|r| r.id() == Some(id.as_str())))
                .ok_or_else(|| ConnectorError::NotFound {
                    org: self.org.clone(),
                    object,
                    id: id.clone(),
                })?;

            existing.merge(record);
            existing.insert(LAST_MODIFIED_DATE, modified);
            debug!(org = %self.org, %object, %id, "updated record");
            return Ok(SaveResult { id, created: false });
        }

        let id = store.assign_id(object);
        record.insert(ID_FIELD, id.clone());
        record.insert(LAST_MODIFIED_DATE, modified);
        store.objects.entry(object).or_default().push(record);
        debug!(org = %self.org, %object, %id, "created record");

        Ok(SaveResult { id, created: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Timestamp;
    use std::sync::Arc;

    fn fixed_clock(ts: &'static str) -> Clock {
        Arc::new(move || Timestamp::parse(ts).unwrap())
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_stamps_clock() {
        let org = InMemoryConnector::new("B").with_clock(fixed_clock("2014-01-01T00:00:00.000Z"));

        let saved = org
            .create_or_update(ObjectKind::Lead, Record::new().with("Email", "a@fakemail.com"))
            .await
            .unwrap();

        assert!(saved.created);
        assert_eq!(saved.id, "00Q000000000001");
        let stored = org.get(ObjectKind::Lead, &saved.id).await.unwrap().unwrap();
        assert_eq!(stored.get("LastModifiedDate"), Some("2014-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let org = InMemoryConnector::new("B")
            .with_clock(fixed_clock("2014-01-01T00:00:00.000Z"))
            .with_records(
                ObjectKind::Lead,
                vec![Record::new()
                    .with("Id", "00Q9")
                    .with("Email", "a@fakemail.com")
                    .with("Phone", "123")],
            );

        let saved = org
            .create_or_update(
                ObjectKind::Lead,
                Record::new().with("Id", "00Q9").with("FirstName", "Ana"),
            )
            .await
            .unwrap();

        assert!(!saved.created);
        let stored = org.get(ObjectKind::Lead, "00Q9").await.unwrap().unwrap();
        assert_eq!(stored.get("Phone"), Some("123"));
        assert_eq!(stored.get("FirstName"), Some("Ana"));
        assert_eq!(stored.get("LastModifiedDate"), Some("2014-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_update_of_unknown_id_fails() {
        let org = InMemoryConnector::new("B");
        let err = org
            .create_or_update(ObjectKind::Lead, Record::new().with("Id", "missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::NotFound { .. }));

        let err = org
            .create_or_update(ObjectKind::Lead, Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_fetch_honors_watermark_and_object_kind() {
        let org = InMemoryConnector::new("A")
            .with_records(
                ObjectKind::Lead,
                vec![
                    Record::new().with("LastModifiedDate", "2013-12-08T00:00:00.000Z"),
                    Record::new().with("LastModifiedDate", "2013-12-10T00:00:00.000Z"),
                ],
            )
            .with_records(ObjectKind::Account, vec![Record::new().with("Name", "ACME")]);

        let since = Timestamp::parse("2013-12-09T00:00:00.000Z").ok();
        let leads = org.fetch_candidates(ObjectKind::Lead, since).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].get("LastModifiedDate"), Some("2013-12-10T00:00:00.000Z"));

        let accounts = org.fetch_candidates(ObjectKind::Account, None).await.unwrap();
        assert_eq!(accounts[0].id(), Some("001000000000003"));
    }
}
