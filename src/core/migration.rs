// Migration Setup
// Wires configuration into connectors, the sync engine and the poller

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::app_config::AppConfig;
use super::migration_config::{MigrationConfig, OrgConfig, StoreConfig};
use super::record::ObjectKind;
use crate::operations::{
    CrmConnector, DirectoryConnector, InMemoryConnector, PlanEngine, Poller, SyncEngine,
    SyncReport,
};

/// A configured migration between two organizations
pub struct Migration {
    /// Built-in defaults
    pub app_config: AppConfig,

    /// Settings loaded from lead-migration.yaml
    pub config: MigrationConfig,

    /// Where the settings were loaded from, if from a file
    pub config_path: Option<PathBuf>,

    source: Arc<dyn CrmConnector>,
    destination: Arc<dyn CrmConnector>,
}

impl Migration {
    /// Locate, load and validate the configuration, then open both organizations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = MigrationConfig::locate(explicit)?;
        let config = MigrationConfig::load(&path)?;
        config
            .validate()
            .with_context(|| format!("Invalid migration config: {}", path.display()))?;

        info!(path = %path.display(), "loaded migration config");

        let mut migration = Self::from_config(config);
        migration.config_path = Some(path);
        Ok(migration)
    }

    /// Build from an already validated configuration
    pub fn from_config(config: MigrationConfig) -> Self {
        let source = Self::connector(&config.source);
        let destination = Self::connector(&config.destination);

        Self {
            app_config: AppConfig::default(),
            config,
            config_path: None,
            source,
            destination,
        }
    }

    fn connector(org: &OrgConfig) -> Arc<dyn CrmConnector> {
        match &org.store {
            StoreConfig::Memory { leads, accounts } => Arc::new(
                InMemoryConnector::new(org.name.as_str())
                    .with_records(ObjectKind::Lead, leads.clone())
                    .with_records(ObjectKind::Account, accounts.clone()),
            ),
            StoreConfig::Directory { path } => {
                Arc::new(DirectoryConnector::new(org.name.as_str(), path.clone()))
            }
        }
    }

    pub fn source(&self) -> Arc<dyn CrmConnector> {
        Arc::clone(&self.source)
    }

    pub fn destination(&self) -> Arc<dyn CrmConnector> {
        Arc::clone(&self.destination)
    }

    /// Sync engine for the configured options; `force_dry_run` overrides the config
    pub fn engine(&self, force_dry_run: bool) -> Result<SyncEngine> {
        let mut options = self.config.sync_options(&self.app_config);
        options.dry_run |= force_dry_run;

        let planner = PlanEngine::new(self.config.exclude_rules(&self.app_config));
        let policy = self.config.account_policy(&self.app_config)?;

        Ok(SyncEngine::new(options, planner, policy))
    }

    /// Run a single batch from the configured watermark
    pub async fn run_once(&self, force_dry_run: bool) -> Result<SyncReport> {
        let engine = self.engine(force_dry_run)?;
        let since = self.config.watermark()?;

        let report = engine
            .run_batch(self.source.as_ref(), self.destination.as_ref(), since)
            .await
            .context("Migration batch failed")?;

        Ok(report)
    }

    /// Scheduled driver starting from the configured watermark
    pub fn poller(&self, force_dry_run: bool) -> Result<Poller> {
        let poller = Poller::new(
            self.engine(force_dry_run)?,
            self.source(),
            self.destination(),
            self.config.poll_interval(&self.app_config),
        )
        .with_watermark(self.config.watermark()?);

        Ok(poller)
    }
}
