//! Cleaning stage of an artifact-versioned listings pipeline.
//!
//! Resolves a raw CSV artifact, keeps rows whose `price` lies in a closed
//! range, retypes `last_review` as a date, and publishes the result as a new
//! artifact version with a provenance link to the input.

pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod infra;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

pub use app::{BasicCleaningUseCase, CleanOptions, CleaningOutcome};
pub use config::{RunConfig, Settings};
pub use error::{CleaningError, Result};
