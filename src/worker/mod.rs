pub mod archival;

pub use archival::{ArchivalConfig, ArchivalWorker, ArchivalWorkerHandle, RunOutcome, WorkerState};
