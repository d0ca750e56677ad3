//! NBA pipeline stages
//!
//! Four stages over support conversations: reconstruct raw messages into
//! threads, tag threads, decide the next best action, evaluate and compare
//! the decisions. Stage outputs are JSON artifacts on disk; every stage is
//! re-creatable from the previous artifact. The runner fans the capability
//! stages out per thread with bounded concurrency and cancellation.

pub mod artifact;
pub mod decide;
pub mod evaluate;
pub mod export;
pub mod history;
pub mod ingest;
pub mod reconstruct;
pub mod runner;
pub mod tagging;

pub use artifact::ArtifactStore;
pub use decide::{decide, DecisionContext};
pub use evaluate::{compare, evaluate};
pub use export::export_csv;
pub use history::customer_histories;
pub use ingest::load_records;
pub use reconstruct::{reconstruct, ReconstructionReport, StructuralAnomaly};
pub use runner::{CancelHandle, RunSummary, Runner};
pub use tagging::{tag_thread, Tagger};
