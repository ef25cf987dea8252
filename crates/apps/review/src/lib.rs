//! Async host for the upload review: collaborator seams, the tokio driver,
//! and scripted sessions.

pub mod collaborators;
pub mod driver;
pub mod scenario;

pub use collaborators::{
    BoxFuture, InMemoryUploader, MetadataExtractor, PhotoUploader, ScriptedExtractor,
};
pub use driver::{upload_with_timeout, ReviewDriver};
pub use scenario::{run_scenario, Scenario, ScenarioError, ScenarioReport};
