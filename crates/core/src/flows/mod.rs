pub mod engine;
pub mod states;

pub use engine::{FieldCollectionFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{
    CollectionAction, CollectionContext, CollectionEvent, CollectionState, TransitionOutcome,
};
