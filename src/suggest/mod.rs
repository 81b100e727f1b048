//! AI-suggested batch variants
//!
//! A source batch and optional instructions go to a [`TextGenerator`]; the
//! structured answer is validated and stored as a new batch whose parent is
//! the source.

pub mod derive;
pub mod generator;
pub mod prompt;
pub mod proposal;

pub use derive::{derive_batch, derived_batch};
pub use generator::{AnthropicGenerator, GenerationError, ResponseSchema, TextGenerator};
pub use proposal::{proposal_schema, BatchProposal, RawProposal, ValidProposal, TOOL_NAME};
