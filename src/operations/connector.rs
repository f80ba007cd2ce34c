// CRM Connector
// Contract between the sync orchestrator and one CRM organization

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::core::{ObjectKind, Record, Timestamp};

/// Source of `LastModifiedDate` values stamped on write
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Timestamp::now)
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{object} {id} not found in {org}")]
    NotFound {
        org: String,
        object: ObjectKind,
        id: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Outcome of a write against a connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    /// Id of the written record in the connector's organization
    pub id: String,
    /// True when the record did not exist before
    pub created: bool,
}

/// One CRM organization, as seen by the migration.
///
/// Writes stamp `LastModifiedDate` with the connector's own clock, the way
/// the organization itself would.
#[async_trait]
pub trait CrmConnector: Send + Sync {
    /// Organization label, for logs and reports
    fn org(&self) -> &str;

    /// All records of `object`, or only those modified strictly after `since`.
    ///
    /// Records whose timestamp cannot be read are always returned so the
    /// caller can report them.
    async fn fetch_candidates(
        &self,
        object: ObjectKind,
        since: Option<Timestamp>,
    ) -> Result<Vec<Record>, ConnectorError>;

    /// First record whose `field` equals `value`
    async fn find_by_field(
        &self,
        object: ObjectKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, ConnectorError>;

    async fn get(&self, object: ObjectKind, id: &str) -> Result<Option<Record>, ConnectorError>;

    /// Create the record when it has no `Id`, else merge it over the stored one
    async fn create_or_update(
        &self,
        object: ObjectKind,
        record: Record,
    ) -> Result<SaveResult, ConnectorError>;
}

/// Shared watermark test for connector implementations
pub(crate) fn modified_after(record: &Record, since: Option<Timestamp>) -> bool {
    let Some(since) = since else {
        return true;
    };

    match record
        .get(crate::constants::LAST_MODIFIED_DATE)
        .map(Timestamp::parse)
    {
        Some(Ok(modified)) => modified > since,
        // Unreadable timestamps are surfaced, not silently dropped
        _ => true,
    }
}

/// Reject writes no organization would accept
pub(crate) fn check_writable(object: ObjectKind, record: &Record) -> Result<(), ConnectorError> {
    if record.id().is_some_and(|id| id.trim().is_empty()) {
        return Err(ConnectorError::InvalidRecord(format!("{object} with an empty Id")));
    }
    if record.is_empty() {
        return Err(ConnectorError::InvalidRecord(format!("{object} without fields")));
    }
    Ok(())
}
