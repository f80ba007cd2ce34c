// Lead Migration Library
// Migrates CRM leads between organizations, keeping whichever copy was modified last

// Core infrastructure - records, timestamps, comparator, configuration
pub mod core;

// Operations - connectors and sync logic
pub mod operations;

// Utilities - helper functions and tools
pub mod utilities;

// Application constants
pub mod constants;

// Re-export commonly used items for convenience
pub use crate::core::{is_after, ComparatorError, LastModifiedComparator, Migration, Record, Timestamp};
pub use operations::{CrmConnector, SyncEngine, SyncReport};
pub use constants::*;
