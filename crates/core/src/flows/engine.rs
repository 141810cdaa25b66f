use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::fields::CandidateFieldSet;
use crate::domain::task::TaskType;
use crate::flows::states::{
    CollectionAction, CollectionContext, CollectionEvent, CollectionState, TransitionOutcome,
};

pub trait FlowDefinition {
    fn task(&self) -> TaskType;
    fn initial_state(&self) -> CollectionState;
    fn transition(
        &self,
        current: &CollectionState,
        event: &CollectionEvent,
        context: &CollectionContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// The collect, confirm, execute cycle shared by every task.
#[derive(Clone, Copy, Debug)]
pub struct FieldCollectionFlow {
    task: TaskType,
}

impl FieldCollectionFlow {
    pub fn new(task: TaskType) -> Self {
        Self { task }
    }
}

impl FlowDefinition for FieldCollectionFlow {
    fn task(&self) -> TaskType {
        self.task
    }

    fn initial_state(&self) -> CollectionState {
        CollectionState::Collecting
    }

    fn transition(
        &self,
        current: &CollectionState,
        event: &CollectionEvent,
        context: &CollectionContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_field_collection(self.task, current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl FlowEngine<FieldCollectionFlow> {
    pub fn for_task(task: TaskType) -> Self {
        Self::new(FieldCollectionFlow::new(task))
    }
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn task(&self) -> TaskType {
        self.flow.task()
    }

    pub fn initial_state(&self) -> CollectionState {
        self.flow.initial_state()
    }

    /// Recovers the current state from what the caller carried over.
    ///
    /// The flow keeps no storage of its own: a completed task is `Executed`, a complete
    /// field set is waiting on the user's confirmation, anything else is still collecting.
    pub fn state_for(&self, fields: &CandidateFieldSet, task_completed: bool) -> CollectionState {
        if task_completed {
            CollectionState::Executed
        } else if fields.is_complete(self.task()) {
            CollectionState::AwaitingConfirmation
        } else {
            self.initial_state()
        }
    }

    pub fn context_for(&self, fields: &CandidateFieldSet) -> CollectionContext {
        CollectionContext::from_missing(&fields.missing(self.task()))
    }

    pub fn apply(
        &self,
        current: &CollectionState,
        event: &CollectionEvent,
        context: &CollectionContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &CollectionState,
        event: &CollectionEvent,
        context: &CollectionContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("task", outcome.task.wire_name())
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("task", self.task().wire_name())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: CollectionState, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: CollectionState, event: CollectionEvent },
}

fn transition_field_collection(
    task: TaskType,
    current: &CollectionState,
    event: &CollectionEvent,
    context: &CollectionContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use CollectionAction::{
        Apologize, PromptForMissingFields, RunComputation, SummarizeForConfirmation,
    };
    use CollectionEvent::{ComputationFailed, ConfirmationReceived, FieldsMerged};
    use CollectionState::{AwaitingConfirmation, Collecting, Executed};

    let complete = context.missing_required_fields.is_empty();
    let (to, actions) = match (current, event) {
        (Collecting | AwaitingConfirmation, FieldsMerged) if complete => {
            (AwaitingConfirmation, vec![SummarizeForConfirmation])
        }
        (Collecting | AwaitingConfirmation, FieldsMerged) => {
            (Collecting, vec![PromptForMissingFields])
        }
        (Collecting | AwaitingConfirmation, ConfirmationReceived) => {
            if !complete {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: current.clone(),
                    missing_fields: context.missing_required_fields.clone(),
                });
            }
            (Executed, vec![RunComputation])
        }
        (Executed, ComputationFailed) => (AwaitingConfirmation, vec![Apologize]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { task, from: current.clone(), to, event: event.clone(), actions })
}
