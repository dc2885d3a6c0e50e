// ============================================================================
// Calendar Event Store Library
// ============================================================================

pub mod config;
pub mod connection;
pub mod core;
pub mod prelude;
pub mod service;
pub mod storage;
pub mod worker;

// Re-export main types for convenience
pub use crate::core::{
    ErrorKind, Event, EventId, NewEvent, StoreError, StoreResult, UserId, Window,
    to_storage_precision,
};
pub use crate::service::EventService;
pub use crate::storage::{EventArchiver, EventStore, InMemoryEventStore, PgEventStore};

// Re-export connection and worker API
pub use crate::connection::PgStoreConfig;
pub use crate::worker::{ArchivalConfig, ArchivalWorker, ArchivalWorkerHandle, RunOutcome, WorkerState};
