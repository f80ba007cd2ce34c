// Application Configuration
// Defaults compiled from config.yaml at build time
// Modify config.yaml and rebuild to change these values

// Include the auto-generated config from build.rs
pub mod compiled {
    include!(concat!(env!("OUT_DIR"), "/compiled_config.rs"));
}

/// Built-in defaults that a runtime `lead-migration.yaml` may override
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default batch behavior
    pub defaults: DefaultSettings,

    /// Fields the destination owns; stripped before writing
    pub system_fields: Vec<String>,

    /// Exclude rules applied to every run, as (field, pattern)
    pub global_excludes: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct DefaultSettings {
    /// Seconds between scheduled batches
    pub poll_interval_secs: u64,

    /// Keep processing a batch after a record fails
    pub continue_on_error: bool,

    /// Plan without writing to the destination
    pub dry_run: bool,

    /// Account policy mode: "none", "assign-dummy-account", "create-account"
    pub account_policy: String,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: compiled::POLL_INTERVAL_SECS,
            continue_on_error: compiled::CONTINUE_ON_ERROR,
            dry_run: compiled::DRY_RUN,
            account_policy: compiled::ACCOUNT_POLICY.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultSettings::default(),
            system_fields: compiled::SYSTEM_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            global_excludes: compiled::GLOBAL_EXCLUDES
                .iter()
                .map(|(field, pattern)| (field.to_string(), pattern.to_string()))
                .collect(),
        }
    }
}
