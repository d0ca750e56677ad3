//! Core types and contracts for the support NBA pipeline
//!
//! This crate provides the types shared across all other crates:
//! - Raw message records and reconstructed conversation threads
//! - Versioned tags (support type, sentiment, resolution, personality)
//! - Next-best-action recommendations and their evaluations
//! - Error taxonomy
//! - The `Capability` trait for external classification/generation/judgment

pub mod action;
pub mod error;
pub mod message;
pub mod personality;
pub mod tag;
pub mod thread;
pub mod traits;

pub use action::{
    Channel, Comparison, Decision, Evaluation, PolicyVariant, Recommendation, SendTime,
    SignalBreakdown,
};
pub use error::{Error, Result};
pub use message::{MessageDirection, QuarantinedRecord, RawMessage, RawRecord, SourceChannel};
pub use personality::PersonalityType;
pub use tag::{CustomerHistory, Label, ResolutionStatus, Sentiment, SupportType, Tag};
pub use thread::{ConversationThread, ThreadStatus};
pub use traits::{
    Capability, CapabilityKind, CapabilityRequest, CapabilityResponse, ChannelStats,
    FixedChannelStats,
};
