//! Everything an application needs to wire a store, the service and the
//! archival worker together.

pub use crate::core::{ErrorKind, Event, EventId, NewEvent, StoreError, StoreResult, UserId};
pub use crate::service::EventService;
pub use crate::storage::{EventArchiver, EventStore, InMemoryEventStore, PgEventStore};
pub use crate::worker::{ArchivalConfig, ArchivalWorker, ArchivalWorkerHandle, WorkerState};
pub use crate::connection::PgStoreConfig;
