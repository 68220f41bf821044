//! Core pipeline orchestration and domain logic for LinkScout.
//!
//! Ties the listing navigator and the generative-text evaluator together
//! into an end-to-end search, and writes the results out.

pub mod evaluator;
pub mod export;
pub mod generation;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use evaluator::{ProfileEvaluator, parse_evaluation, parse_justification};
pub use export::{ExportMeta, ExportStats, export_contacts, export_stats};
pub use generation::{CompletionRequest, OllamaClient, TextGenerator};
pub use pipeline::{
    SearchOrchestrator, SearchOutcome, SearchProgress, SilentProgress, search_with_listing,
};
