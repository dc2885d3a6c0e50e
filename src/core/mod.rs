pub mod error;
pub mod event;
pub mod window;

pub use error::{ErrorKind, StoreError, StoreResult};
pub use event::{Event, EventId, NewEvent, UserId};
pub use window::{Window, month_end, to_storage_precision, week_end};
