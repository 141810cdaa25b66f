//! Dialogue runtime for the landlord assistant.
//!
//! A turn flows through a fixed pipeline:
//! 1. **Entity extraction** (`extraction`) - regex pass over the raw message
//! 2. **Intent detection** (`intent`) - keyword scoring, with a completion-backed classifier
//! 3. **Entity linking** (`linker`) - entities resolved onto task fields
//! 4. **Field collection** (`collectors`) - per-task state machine up to confirmation
//! 5. **Execution** - deterministic computation from `landlord-core`
//!
//! [`orchestrator::Orchestrator`] ties these together behind `handle_turn`.
//!
//! # Safety Principle
//!
//! The completion service only phrases questions and proposes field values. Rent estimates,
//! screening decisions and maintenance risk are computed deterministically, and only after
//! the user confirms the collected fields.

pub mod collectors;
pub mod extraction;
pub mod followups;
pub mod guardrails;
pub mod intent;
pub mod linker;
pub mod llm;
pub mod orchestrator;
pub mod responder;
pub mod schema;
pub mod synonyms;

#[cfg(test)]
mod testing;

pub use llm::{CompletionService, HttpCompletionService};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, TurnRequest, TurnResult};
