use serde::{Deserialize, Serialize};

use crate::domain::fields::CandidateFieldSet;

/// What a turn did, reported to the caller alongside the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Chat,
    AskForInfo,
    ConfirmFields,
    Executed,
    ClarifyIntent,
    Greeting,
    FollowUp,
    Apology,
}

impl TurnAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::AskForInfo => "ask_for_info",
            Self::ConfirmFields => "confirm_fields",
            Self::Executed => "executed",
            Self::ClarifyIntent => "clarify_intent",
            Self::Greeting => "greeting",
            Self::FollowUp => "follow_up",
            Self::Apology => "apology",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub reply_text: String,
    pub action: TurnAction,
    pub fields_used: CandidateFieldSet,
}

impl TaskResult {
    pub fn new(
        reply_text: impl Into<String>,
        action: TurnAction,
        fields_used: CandidateFieldSet,
    ) -> Self {
        Self { reply_text: reply_text.into(), action, fields_used }
    }

    pub fn is_executed(&self) -> bool {
        self.action == TurnAction::Executed
    }
}
