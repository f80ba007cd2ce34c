// Operations module
// Business logic for lead migration: connectors, planning, syncing and polling

pub mod account;
pub mod connector;
pub mod directory;
pub mod memory;
pub mod plan;
pub mod poller;
pub mod sync;

pub use account::AccountPolicy;
pub use connector::{system_clock, Clock, ConnectorError, CrmConnector, SaveResult};
pub use directory::DirectoryConnector;
pub use memory::InMemoryConnector;
pub use plan::{Plan, PlanEngine, PlanEntry, SyncAction};
pub use poller::Poller;
pub use sync::{SyncEngine, SyncError, SyncOptions, SyncReport};
