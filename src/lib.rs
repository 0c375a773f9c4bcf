pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod migration;

pub use error::{MigrationError, Result};
