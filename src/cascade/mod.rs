//! Model cascade module
//!
//! Drives credential selection, provider calls and health bookkeeping across
//! an ordered list of model variants.

pub mod orchestrator;
pub mod outcome;
pub mod variants;

pub use orchestrator::ModelCascadeOrchestrator;
pub use outcome::{AttemptError, AttemptResult, ErrorKind, RequestOutcome};
pub use variants::ModelCatalog;
