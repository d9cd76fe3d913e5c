//! Data model shared by the client, the server and the engine.

pub mod history;
pub mod step;

pub use history::{
    by_display_order, CompleteProgressionRequest, HistoryStatus, MahakramaHistory,
    StartProgressionRequest,
};
pub use step::{by_sequence, MahakramaStep, StepInput, StepUpdate, MIN_SEQUENCE_NUMBER};
