use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use landlord_agent::{CompletionService, HttpCompletionService, Orchestrator, TurnRequest};
use landlord_core::config::{AppConfig, LoadOptions};
use landlord_core::errors::ApplicationError;
use landlord_core::domain::conversation::{Conversation, ConversationState, Turn};
use landlord_core::resources::ResourceProvider;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CommandResult;

/// Everything one chat session carries between turns, stored as JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub history: Conversation,
    #[serde(default)]
    pub state: ConversationState,
}

impl ChatSession {
    /// A missing file starts a fresh session.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read session file `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("session file `{}` is not valid JSON", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to serialize session")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write session file `{}`", path.display()))
    }
}

/// Runs one turn against the session in `state_path` and writes the updated session back.
pub fn run(options: LoadOptions, state_path: &Path, message: &str) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure("chat", "invalid_input", "message must not be empty", 2);
    }

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return application_failure(ApplicationError::from(error)),
    };

    let mut session = match ChatSession::load(state_path) {
        Ok(session) => session,
        Err(error) => {
            return CommandResult::failure("chat", "session", format!("{error:#}"), 4);
        }
    };

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(error) => return application_failure(error),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                5,
            );
        }
    };

    let mut request = TurnRequest::new(message, session.history.clone(), session.state.clone());
    request.session_id = session.session_id.clone();
    let result = runtime.block_on(orchestrator.handle_turn(request));

    session.history.push(Turn::user(message));
    session.history.push(Turn::assistant(result.reply.clone()));
    session.state = result.state();
    if let Err(error) = session.save(state_path) {
        return CommandResult::failure("chat", "session", format!("{error:#}"), 4);
    }
    tracing::debug!(
        event_name = "cli.chat.session_saved",
        path = %state_path.display(),
        turns = session.history.len(),
        "session file updated"
    );

    CommandResult::success_with(
        "chat",
        result.reply,
        Some(json!({
            "action": result.action,
            "active_task": result.active_task,
            "task_completed": result.task_completed,
            "fields": result.fields,
        })),
    )
}

fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator, ApplicationError> {
    let resources = Arc::new(ResourceProvider::load(&config.resources)?);
    let completion: Arc<dyn CompletionService> = Arc::new(
        HttpCompletionService::from_config(&config.llm)
            .map_err(|error| ApplicationError::completion(format!("{error:#}")))?,
    );
    Ok(Orchestrator::builder(completion, resources).dialogue(config.dialogue.clone()).build())
}

fn application_failure(error: ApplicationError) -> CommandResult {
    CommandResult::failure("chat", error.error_class(), error.to_string(), error.exit_code())
}
