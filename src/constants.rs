// Application Constants
// Field names and file names shared across modules

/// Field holding a record's last-modification timestamp (case-sensitive)
pub const LAST_MODIFIED_DATE: &str = "LastModifiedDate";

/// Record identifier assigned by the owning organization
pub const ID_FIELD: &str = "Id";

/// Business key used to match leads across organizations
pub const EMAIL_FIELD: &str = "Email";

/// Linking field from a lead to its account
pub const ACCOUNT_ID_FIELD: &str = "AccountId";

/// Business key used to match accounts across organizations
pub const NAME_FIELD: &str = "Name";

/// Runtime configuration file name
pub const CONFIG_FILE_NAME: &str = "lead-migration.yaml";

/// Environment variable pointing at the runtime configuration file
pub const CONFIG_ENV_VAR: &str = "LEAD_MIGRATION_CONFIG";
