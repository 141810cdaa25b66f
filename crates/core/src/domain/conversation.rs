use serde::{Deserialize, Serialize};

use crate::domain::fields::CandidateFieldSet;
use crate::domain::task::TaskType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(alias = "content")]
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Ordered history of a chat session, oldest turn first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `window` turns.
    pub fn recent(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.text.as_str())
    }

    /// `role: text` lines for the last `window` turns, as fed to prompts.
    pub fn transcript(&self, window: usize) -> String {
        self.recent(window)
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// State the caller carries between turns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub accumulated_fields: CandidateFieldSet,
    #[serde(default)]
    pub active_task: Option<TaskType>,
    #[serde(default)]
    pub task_completed: bool,
}

impl ConversationState {
    pub fn for_task(task: TaskType) -> Self {
        Self { active_task: Some(task), ..Self::default() }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::{Conversation, ConversationState, Role, Turn};
    use crate::domain::task::TaskType;

    #[test]
    fn recent_window_keeps_latest_turns() {
        let conversation = Conversation::new(vec![
            Turn::user("hi"),
            Turn::assistant("Hello!"),
            Turn::user("estimate rent"),
        ]);

        assert_eq!(conversation.recent(2).len(), 2);
        assert_eq!(conversation.recent(10).len(), 3);
        assert_eq!(conversation.transcript(1), "user: estimate rent");
        assert_eq!(conversation.last_assistant_text(), Some("Hello!"));
    }

    #[test]
    fn turns_accept_content_alias() {
        let turns: Conversation =
            serde_json::from_str(r#"[{"role":"user","content":"hello"}]"#).expect("parse");
        assert_eq!(turns.turns()[0].role, Role::User);
        assert_eq!(turns.turns()[0].text, "hello");
    }

    #[test]
    fn state_defaults_when_fields_are_absent() {
        let state: ConversationState =
            serde_json::from_str(r#"{"active_task":"tenant_screening"}"#).expect("parse");
        assert_eq!(state.active_task, Some(TaskType::ApplicantScreening));
        assert!(state.accumulated_fields.is_empty());
        assert!(!state.task_completed);
    }
}
