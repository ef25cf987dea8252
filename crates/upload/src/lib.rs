//! Single-photo upload review: from file selection through persistence.

pub mod config;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod pending;
pub mod record;
pub mod validation;

pub use config::*;
pub use error::*;
pub use metadata::*;
pub use orchestrator::*;
pub use pending::*;
pub use record::*;
pub use validation::*;
