pub mod config;
pub mod pool;

pub use config::PgStoreConfig;
pub use pool::{connect, connect_options, health_check};
