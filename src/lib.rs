//! Mahakrama - curriculum progression tracking
//!
//! An ordered catalog of curriculum steps, a CSV importer that appends steps
//! to it, per-person progression history, and the start/complete state
//! machine that moves a person along the catalog. Storage sits behind
//! [`store::MahakramaStore`]: the CLI talks to a server through
//! [`store::HttpStore`], and [`rest`] serves the same endpoints over
//! [`store::InMemoryStore`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod importer;
pub mod logging;
pub mod progression;
pub mod rest;
pub mod store;
pub mod transition;
pub mod types;

pub use catalog::StepCatalog;
pub use error::ProgressionError;
pub use importer::{CsvStepImporter, ImportError, ImportSummary};
pub use progression::PersonProgressionStore;
pub use transition::{CompletionAssessment, CompletionOutcome, Confirmation, TransitionEngine};
