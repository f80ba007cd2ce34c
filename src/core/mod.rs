// Core infrastructure module
// Record model, timestamps, the precedence comparator and configuration

pub mod app_config;
pub mod comparator;
pub mod error;
pub mod migration;
pub mod migration_config;
pub mod record;
pub mod timestamp;

pub use app_config::AppConfig;
pub use comparator::{is_after, LastModifiedComparator};
pub use error::{ComparatorError, ErrorKind, InvalidReason, Side};
pub use migration::Migration;
pub use migration_config::{MigrationConfig, OrgConfig, StoreConfig};
pub use record::{FieldSource, ObjectKind, Record};
pub use timestamp::{ParseTimestampError, Timestamp};
