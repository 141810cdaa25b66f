//! JSON chat endpoint.
//!
//! - `POST /api/v1/chat` runs one turn and returns the reply plus the state for the next turn.
//!
//! The server keeps no session state; callers send the history and carried fields back.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use landlord_agent::{Orchestrator, TurnRequest, TurnResult};
use landlord_core::domain::conversation::{Conversation, ConversationState};
use landlord_core::domain::fields::CandidateFieldSet;
use landlord_core::domain::task::TaskType;
use landlord_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Conversation,
    #[serde(default)]
    pub fields: CandidateFieldSet,
    #[serde(default)]
    pub active_task: Option<TaskType>,
    #[serde(default)]
    pub task_completed: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new().route("/api/v1/chat", post(chat)).with_state(ChatState { orchestrator })
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<TurnResult>, (StatusCode, Json<ChatError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    if body.message.trim().is_empty() {
        let error = InterfaceError::bad_request("message must not be empty", &correlation_id);
        warn!(
            event_name = "transport.chat.rejected",
            correlation_id = %correlation_id,
            error = %error,
            "chat request rejected"
        );
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError { error: error.user_message().to_string(), correlation_id }),
        ));
    }

    info!(
        event_name = "transport.chat.received",
        correlation_id = %correlation_id,
        session_id = body.session_id.as_deref().unwrap_or("none"),
        history_turns = body.conversation_history.len(),
        "chat turn received"
    );

    let state_in = ConversationState {
        accumulated_fields: body.fields,
        active_task: body.active_task,
        task_completed: body.task_completed,
    };
    let request = TurnRequest {
        message: body.message,
        history: body.conversation_history,
        state: state_in,
        session_id: body.session_id,
        correlation_id,
    };

    Ok(Json(state.orchestrator.handle_turn(request).await))
}
