pub mod audit;
pub mod compute;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod resources;

pub use compute::{
    maintenance::{MaintenanceAction, MaintenanceAssessment},
    rent::{PredictionRecord, RentEstimate},
    screening::{
        DeterministicRuleEngine, Recommendation, RuleEngine, ScreeningInput, ScreeningOutcome,
    },
    ComputationError, FeatureRecord, LinearModel, NumericPredictor,
};
pub use domain::conversation::{Conversation, ConversationState, Role, Turn};
pub use domain::fields::{CandidateFieldSet, FieldKind, FieldSpec, FieldValue};
pub use domain::outcome::{TaskResult, TurnAction};
pub use domain::task::TaskType;
pub use errors::{ApplicationError, InterfaceError};
pub use flows::{CollectionState, FlowEngine, FlowTransitionError};
pub use resources::{
    ComparableListing, LookupTable, LookupTables, ResourceError, ResourceProvider,
    ResourceReadiness,
};
