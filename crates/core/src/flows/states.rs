use serde::{Deserialize, Serialize};

use crate::domain::task::TaskType;

/// Where a task sits in the collect, confirm, execute cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionState {
    Collecting,
    AwaitingConfirmation,
    Executed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionEvent {
    FieldsMerged,
    ConfirmationReceived,
    ComputationFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CollectionContext {
    pub missing_required_fields: Vec<String>,
}

impl CollectionContext {
    pub fn from_missing(missing: &[&str]) -> Self {
        Self { missing_required_fields: missing.iter().map(|name| (*name).to_owned()).collect() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionAction {
    PromptForMissingFields,
    SummarizeForConfirmation,
    RunComputation,
    Apologize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub task: TaskType,
    pub from: CollectionState,
    pub to: CollectionState,
    pub event: CollectionEvent,
    pub actions: Vec<CollectionAction>,
}
