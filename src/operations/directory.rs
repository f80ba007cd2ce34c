// Directory Connector
// A CRM organization stored as one YAML file per record

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use super::connector::{check_writable, modified_after, system_clock, Clock, ConnectorError, CrmConnector, SaveResult};
use crate::constants::{ID_FIELD, LAST_MODIFIED_DATE};
use crate::core::{ObjectKind, Record, Timestamp};
use crate::utilities::is_yaml_file;

/// Organization backed by `<root>/<leads|accounts>/<Id>.yaml` files
///
/// Subdirectories are walked too. A file without an `Id` field takes its
/// file stem as the Id.
pub struct DirectoryConnector {
    org: String,
    root: PathBuf,
    clock: Clock,
}

impl DirectoryConnector {
    pub fn new(org: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            org: org.into(),
            root: root.into(),
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_dir(&self, object: ObjectKind) -> PathBuf {
        self.root.join(object.dir_name())
    }

    /// Every record file of `object`, sorted by path
    fn record_files(&self, object: ObjectKind) -> Vec<PathBuf> {
        let dir = self.object_dir(object);
        if !dir.exists() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(org = %self.org, error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && is_yaml_file(e.path()))
            .map(|e| e.into_path())
            .collect();

        files.sort();
        files
    }

    async fn load(path: &Path) -> Result<Record, ConnectorError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConnectorError::Io { path: path.to_path_buf(), source })?;

        let mut record: Record = serde_yaml::from_str(&content)
            .map_err(|source| ConnectorError::Yaml { path: path.to_path_buf(), source })?;

        if record.id().is_none() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                record.insert(ID_FIELD, stem);
            }
        }

        Ok(record)
    }

    /// Every readable record of `object`.
    ///
    /// A file that is not a valid record is logged and left out, so one
    /// hand-edited file cannot stall every batch. I/O failures still abort.
    async fn load_all(&self, object: ObjectKind) -> Result<Vec<(PathBuf, Record)>, ConnectorError> {
        let mut loaded = Vec::new();
        for path in self.record_files(object) {
            match Self::load(&path).await {
                Ok(record) => loaded.push((path, record)),
                Err(ConnectorError::Yaml { path, source }) => {
                    warn!(org = %self.org, path = %path.display(), error = %source, "skipping invalid record file");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(loaded)
    }

    async fn store(path: &Path, record: &Record) -> Result<(), ConnectorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConnectorError::Io { path: parent.to_path_buf(), source })?;
        }

        let content = serde_yaml::to_string(record)
            .map_err(|source| ConnectorError::Yaml { path: path.to_path_buf(), source })?;

        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConnectorError::Io { path: path.to_path_buf(), source })
    }

    fn new_id(object: ObjectKind) -> String {
        format!("{}{}", object.id_prefix(), uuid::Uuid::new_v4().simple())
    }
}

#[async_trait]
impl CrmConnector for DirectoryConnector {
    fn org(&self) -> &str {
        &self.org
    }

    #[instrument(level = "debug", skip(self), fields(org = %self.org))]
    async fn fetch_candidates(
        &self,
        object: ObjectKind,
        since: Option<Timestamp>,
    ) -> Result<Vec<Record>, ConnectorError> {
        Ok(self
            .load_all(object)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| modified_after(record, since))
            .collect())
    }

    async fn find_by_field(
        &self,
        object: ObjectKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, ConnectorError> {
        Ok(self
            .load_all(object)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .find(|record| record.get(field) == Some(value)))
    }

    async fn get(&self, object: ObjectKind, id: &str) -> Result<Option<Record>, ConnectorError> {
        self.find_by_field(object, ID_FIELD, id).await
    }

    #[instrument(level = "debug", skip(self, record), fields(org = %self.org))]
    async fn create_or_update(
        &self,
        object: ObjectKind,
        mut record: Record,
    ) -> Result<SaveResult, ConnectorError> {
        check_writable(object, &record)?;
        let modified = (self.clock)().to_string();

        if let Some(id) = record.id().map(str::to_string) {
            let (path, mut existing) = self
                .load_all(object)
                .await?
                .into_iter()
                .find(|(_, r)| r.id() == Some(id.as_str()))
                .ok_or_else(|| ConnectorError::NotFound {
                    org: self.org.clone(),
                    object,
                    id: id.clone(),
                })?;

            existing.merge(record);
            existing.insert(LAST_MODIFIED_DATE, modified);
            Self::store(&path, &existing).await?;
            debug!(path = %path.display(), "updated record file");
            return Ok(SaveResult { id, created: false });
        }

        let id = Self::new_id(object);
        record.insert(ID_FIELD, id.clone());
        record.insert(LAST_MODIFIED_DATE, modified);

        let path = self.object_dir(object).join(format!("{id}.yaml"));
        Self::store(&path, &record).await?;
        debug!(path = %path.display(), "created record file");

        Ok(SaveResult { id, created: true })
    }
}
