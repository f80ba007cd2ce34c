// Migration Configuration
// Runtime settings that define which organizations to migrate between and how

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::app_config::AppConfig;
use super::record::Record;
use super::timestamp::Timestamp;
use crate::constants::{CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use crate::operations::{AccountPolicy, SyncOptions};
use crate::utilities::{resolve_path, FieldMatcher, FieldPattern};

/// Runtime configuration, read from `lead-migration.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Organization leads are read from
    pub source: OrgConfig,

    /// Organization leads are written to
    pub destination: OrgConfig,

    /// Account linking; falls back to the compiled default mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_policy: Option<AccountPolicy>,

    #[serde(default)]
    pub filters: FilterSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

/// One CRM organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Label used in logs and reports
    pub name: String,

    #[serde(flatten)]
    pub store: StoreConfig,
}

/// Where an organization keeps its records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StoreConfig {
    /// Records listed inline, held in process
    Memory {
        #[serde(default)]
        leads: Vec<Record>,
        #[serde(default)]
        accounts: Vec<Record>,
    },
    /// One YAML file per record under `path`
    Directory { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterSettings {
    /// Leads matching any of these rules are never migrated
    #[serde(default)]
    pub exclude: Vec<FieldPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncSettings {
    /// Seconds between scheduled batches
    pub poll_interval_secs: Option<u64>,

    /// Continue on individual record errors
    pub continue_on_error: Option<bool>,

    /// Decide without writing to the destination
    pub dry_run: Option<bool>,

    /// Only migrate leads modified strictly after this instant
    pub watermark: Option<String>,

    /// Fields stripped before writing; replaces the compiled list
    pub system_fields: Option<Vec<String>>,
}

impl MigrationConfig {
    /// Load migration configuration from a file.
    ///
    /// Relative directory paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read migration config: {}", path.display()))?;

        let mut config: MigrationConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse migration config YAML: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);

        Ok(config)
    }

    /// Find the config file: explicit path, then the environment, then a walk up from cwd
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Self::find_upwards(&cwd).with_context(|| {
            format!(
                "No {} found in {} or its parents (set {} or pass --config)",
                CONFIG_FILE_NAME,
                cwd.display(),
                CONFIG_ENV_VAR
            )
        })
    }

    fn find_upwards(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Make directory store paths absolute relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        for org in [&mut self.source, &mut self.destination] {
            if let StoreConfig::Directory { path } = &mut org.store {
                *path = resolve_path(base, path);
            }
        }
    }

    /// Check for settings that would make every batch fail or misbehave
    pub fn validate(&self) -> Result<()> {
        if let Some(AccountPolicy::AssignDummyAccount { account_id }) = &self.account_policy {
            if account_id.trim().is_empty() {
                bail!("account_policy: assign-dummy-account requires a non-empty account_id");
            }
        }

        if self.sync.poll_interval_secs == Some(0) {
            bail!("sync.poll_interval_secs must be greater than zero");
        }

        if let (StoreConfig::Directory { path: a }, StoreConfig::Directory { path: b }) =
            (&self.source.store, &self.destination.store)
        {
            if a == b {
                bail!(
                    "source and destination use the same directory: {}",
                    a.display()
                );
            }
        }

        self.watermark()?;

        for (i, rule) in self.filters.exclude.iter().enumerate() {
            if rule.field.trim().is_empty() {
                bail!("filters.exclude[{}]: field must not be empty", i);
            }
            if rule.pattern.is_empty() {
                bail!("filters.exclude[{}]: pattern must not be empty", i);
            }
        }

        Ok(())
    }

    /// Starting watermark, if configured
    pub fn watermark(&self) -> Result<Option<Timestamp>> {
        self.sync
            .watermark
            .as_deref()
            .map(|raw| Timestamp::parse(raw).context("sync.watermark"))
            .transpose()
    }

    pub fn sync_options(&self, app: &AppConfig) -> SyncOptions {
        SyncOptions {
            continue_on_error: self
                .sync
                .continue_on_error
                .unwrap_or(app.defaults.continue_on_error),
            dry_run: self.sync.dry_run.unwrap_or(app.defaults.dry_run),
            system_fields: self
                .sync
                .system_fields
                .clone()
                .unwrap_or_else(|| app.system_fields.clone()),
        }
    }

    pub fn account_policy(&self, app: &AppConfig) -> Result<AccountPolicy> {
        match &self.account_policy {
            Some(policy) => Ok(policy.clone()),
            None => AccountPolicy::from_mode(&app.defaults.account_policy, None)
                .map_err(anyhow::Error::msg)
                .context("compiled account_policy default"),
        }
    }

    /// Compiled exclude rules followed by the configured ones
    pub fn exclude_rules(&self, app: &AppConfig) -> FieldMatcher {
        let rules = app
            .global_excludes
            .iter()
            .map(|(field, pattern)| FieldPattern::new(field.as_str(), pattern.as_str()))
            .chain(self.filters.exclude.iter().cloned())
            .collect();
        FieldMatcher::new(rules)
    }

    pub fn poll_interval(&self, app: &AppConfig) -> Duration {
        Duration::from_secs(
            self.sync
                .poll_interval_secs
                .unwrap_or(app.defaults.poll_interval_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY_CONFIG: &str = r#"
source:
  name: legacy
  kind: directory
  path: orgs/legacy
destination:
  name: target
  kind: directory
  path: /srv/orgs/target
account_policy:
  mode: assign-dummy-account
  account_id: 001n0000003gwUyAAI
filters:
  exclude:
    - field: MailingCountry
      pattern: argentina
sync:
  poll_interval_secs: 30
  watermark: "2013-12-09T22:15:33.001Z"
"#;

    fn parse(yaml: &str) -> MigrationConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, DIRECTORY_CONFIG).unwrap();

        let config = MigrationConfig::load(&path).unwrap();

        match &config.source.store {
            StoreConfig::Directory { path } => assert_eq!(path, &dir.path().join("orgs/legacy")),
            other => panic!("unexpected store: {other:?}"),
        }
        match &config.destination.store {
            StoreConfig::Directory { path } => assert_eq!(path, Path::new("/srv/orgs/target")),
            other => panic!("unexpected store: {other:?}"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_store_with_inline_records() {
        let config = parse(
            r#"
source:
  name: A
  kind: memory
  leads:
    - Email: a@fakemail.com
      LastModifiedDate: "2013-12-09T22:15:33.001Z"
      NumberOfEmployees: 12
destination:
  name: B
  kind: memory
"#,
        );

        match &config.source.store {
            StoreConfig::Memory { leads, accounts } => {
                assert_eq!(leads.len(), 1);
                assert_eq!(leads[0].get("NumberOfEmployees"), Some("12"));
                assert!(accounts.is_empty());
            }
            other => panic!("unexpected store: {other:?}"),
        }
        assert!(config.account_policy.is_none());
    }

    #[test]
    fn test_defaults_come_from_compiled_config() {
        let config = parse(
            "source: {name: A, kind: memory}\ndestination: {name: B, kind: memory}\n",
        );
        let app = AppConfig::default();

        let options = config.sync_options(&app);
        assert_eq!(options.continue_on_error, app.defaults.continue_on_error);
        assert_eq!(options.system_fields, app.system_fields);
        assert_eq!(
            config.poll_interval(&app),
            Duration::from_secs(app.defaults.poll_interval_secs)
        );
        assert_eq!(config.account_policy(&app).unwrap(), AccountPolicy::None);
        assert_eq!(config.watermark().unwrap(), None);

        let matcher = config.exclude_rules(&app);
        assert!(matcher.should_exclude(&Record::new().with("MailingCountry", "Argentina")));
        assert!(!matcher.should_exclude(&Record::new().with("MailingCountry", "United States")));
    }

    #[test]
    fn test_overrides_and_exclude_rules() {
        let config = parse(DIRECTORY_CONFIG);
        let app = AppConfig::default();

        assert_eq!(config.poll_interval(&app), Duration::from_secs(30));
        assert_eq!(
            config.watermark().unwrap(),
            Timestamp::parse("2013-12-09T22:15:33.001Z").ok()
        );

        let matcher = config.exclude_rules(&app);
        let argentina = Record::new().with("MailingCountry", "Argentina");
        assert!(matcher.should_exclude(&argentina));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = parse(DIRECTORY_CONFIG);
        config.account_policy = Some(AccountPolicy::AssignDummyAccount {
            account_id: " ".to_string(),
        });
        assert!(config.validate().is_err());

        let mut config = parse(DIRECTORY_CONFIG);
        config.sync.poll_interval_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = parse(DIRECTORY_CONFIG);
        config.sync.watermark = Some("2013-12-09".to_string());
        assert!(config.validate().is_err());

        let mut config = parse(DIRECTORY_CONFIG);
        config.filters.exclude.push(FieldPattern::new("", "x"));
        assert!(config.validate().is_err());

        let mut config = parse(DIRECTORY_CONFIG);
        config.destination.store = config.source.store.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_find_upwards() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), DIRECTORY_CONFIG).unwrap();

        assert_eq!(
            MigrationConfig::find_upwards(&nested),
            Some(dir.path().join(CONFIG_FILE_NAME))
        );
        assert_eq!(
            MigrationConfig::locate(Some(Path::new("explicit.yaml"))).unwrap(),
            PathBuf::from("explicit.yaml")
        );
    }
}
