//! One conversational turn, end to end.
//!
//! [`Orchestrator::handle_turn`] never fails: every degraded step (completion outage, schema
//! mismatch, missing model) still produces a reply and the state to carry into the next turn.

use std::sync::Arc;

use landlord_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use landlord_core::compute::screening::{DeterministicRuleEngine, RuleEngine};
use landlord_core::config::DialogueConfig;
use landlord_core::domain::conversation::{Conversation, ConversationState};
use landlord_core::domain::fields::CandidateFieldSet;
use landlord_core::domain::outcome::{TaskResult, TurnAction};
use landlord_core::domain::task::TaskType;
use landlord_core::resources::ResourceProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collectors::{CollectionDriver, ScreeningCollector, StepInput};
use crate::extraction::{Entity, EntityExtractor};
use crate::followups::{
    FollowUpAction, FollowUpHandler, InMemoryRecordStore, KeywordSimilaritySearch, RecordStore,
    SimilaritySearch,
};
use crate::intent::{clarification_need, ClarificationNeed, Intent, IntentDetector, IntentKind};
use crate::linker::EntityLinker;
use crate::llm::CompletionService;
use crate::responder::{greeting, small_talk, UNSUPPORTED_REQUEST};
use crate::schema::{JsonSchemaParser, SchemaParser};

/// Phrases that abandon the current task and start detection afresh.
pub const TASK_SWITCH_PHRASES: &[&str] = &[
    "forget it",
    "let's do",
    "i want to do",
    "switch to",
    "change to",
    "do rent instead",
    "do tenant instead",
    "do maintenance instead",
    "not this",
    "wrong task",
    "that's not what i meant",
    "i want rent",
    "i want tenant",
    "i want maintenance",
];

pub fn is_task_switch(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TASK_SWITCH_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    #[serde(default)]
    pub history: Conversation,
    #[serde(default)]
    pub state: ConversationState,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "new_correlation_id")]
    pub correlation_id: String,
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

impl TurnRequest {
    pub fn new(
        message: impl Into<String>,
        history: Conversation,
        state: ConversationState,
    ) -> Self {
        Self {
            message: message.into(),
            history,
            state,
            session_id: None,
            correlation_id: new_correlation_id(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub reply: String,
    pub action: TurnAction,
    pub fields: CandidateFieldSet,
    pub active_task: Option<TaskType>,
    pub task_completed: bool,
}

impl TurnResult {
    fn from_task(result: TaskResult, active_task: Option<TaskType>, task_completed: bool) -> Self {
        Self {
            reply: result.reply_text,
            action: result.action,
            fields: result.fields_used,
            active_task,
            task_completed,
        }
    }

    fn reply(reply: impl Into<String>, action: TurnAction, state: ConversationState) -> Self {
        Self {
            reply: reply.into(),
            action,
            fields: state.accumulated_fields,
            active_task: state.active_task,
            task_completed: state.task_completed,
        }
    }

    /// State to send back with the next turn.
    pub fn state(&self) -> ConversationState {
        ConversationState {
            accumulated_fields: self.fields.clone(),
            active_task: self.active_task,
            task_completed: self.task_completed,
        }
    }
}

pub struct OrchestratorBuilder {
    completion: Arc<dyn CompletionService>,
    resources: Arc<ResourceProvider>,
    dialogue: DialogueConfig,
    parser: Arc<dyn SchemaParser>,
    audit_sink: Arc<dyn AuditSink>,
    search: Option<Arc<dyn SimilaritySearch>>,
    store: Arc<dyn RecordStore>,
    rule_engine: Arc<dyn RuleEngine>,
}

impl OrchestratorBuilder {
    pub fn dialogue(mut self, dialogue: DialogueConfig) -> Self {
        self.dialogue = dialogue;
        self
    }

    pub fn schema_parser(mut self, parser: Arc<dyn SchemaParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = audit_sink;
        self
    }

    pub fn similarity_search(mut self, search: Arc<dyn SimilaritySearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    pub fn rule_engine(mut self, rule_engine: Arc<dyn RuleEngine>) -> Self {
        self.rule_engine = rule_engine;
        self
    }

    pub fn build(self) -> Orchestrator {
        let search = self.search.unwrap_or_else(|| {
            Arc::new(KeywordSimilaritySearch::new(self.resources.listings().to_vec()))
        });
        let driver = CollectionDriver::new(
            self.completion.clone(),
            self.parser,
            self.resources.clone(),
            self.audit_sink.clone(),
            &self.dialogue,
        )
        .with_screening(ScreeningCollector::new(self.rule_engine));
        let follow_ups =
            FollowUpHandler::new(search, self.store, self.resources, self.audit_sink.clone());

        Orchestrator {
            extractor: EntityExtractor::new(),
            linker: EntityLinker::new(),
            detector: IntentDetector::new(self.completion, &self.dialogue),
            driver,
            follow_ups,
            audit_sink: self.audit_sink,
        }
    }
}

/// Routes each message to greeting, clarification, a task collector or a follow-up.
pub struct Orchestrator {
    extractor: EntityExtractor,
    linker: EntityLinker,
    detector: IntentDetector,
    driver: CollectionDriver,
    follow_ups: FollowUpHandler,
    audit_sink: Arc<dyn AuditSink>,
}

enum Route {
    Respond(TurnResult),
    Task(TaskType),
}

impl Orchestrator {
    pub fn builder(
        completion: Arc<dyn CompletionService>,
        resources: Arc<ResourceProvider>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            completion,
            resources,
            dialogue: DialogueConfig::default(),
            parser: Arc::new(JsonSchemaParser),
            audit_sink: Arc::new(TracingAuditSink),
            search: None,
            store: Arc::new(InMemoryRecordStore::default()),
            rule_engine: Arc::new(DeterministicRuleEngine),
        }
    }

    pub fn resources(&self) -> &ResourceProvider {
        self.driver.resources()
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResult {
        let TurnRequest { message, history, state, session_id, correlation_id } = request;
        let audit = AuditContext::new(session_id, correlation_id, "landlord-agent");
        self.audit_sink.emit(
            AuditEvent::from_context(
                &audit,
                "turn.received",
                AuditCategory::Ingress,
                AuditOutcome::Success,
            )
            .with_metadata("words", message.split_whitespace().count().to_string()),
        );

        let result = self.route_turn(&message, &history, state, &audit).await;

        tracing::info!(
            event_name = "dialogue.turn.completed",
            correlation_id = %audit.correlation_id,
            session_id = audit.session_id.as_deref().unwrap_or("none"),
            action = result.action.as_str(),
            active_task = result.active_task.map_or("none", TaskType::wire_name),
            task_completed = result.task_completed,
            "turn handled"
        );
        result
    }

    async fn route_turn(
        &self,
        message: &str,
        history: &Conversation,
        mut state: ConversationState,
        audit: &AuditContext,
    ) -> TurnResult {
        if is_task_switch(message) {
            tracing::info!(
                event_name = "dialogue.task.switched",
                correlation_id = %audit.correlation_id,
                previous_task = state.active_task.map_or("none", TaskType::wire_name),
                "user abandoned the current task"
            );
            state.clear();
        }

        if state.task_completed {
            if let Some(action) = FollowUpAction::parse(message) {
                if state.accumulated_fields.is_complete(TaskType::RentEstimation) {
                    let result =
                        self.follow_ups.handle(action, &state.accumulated_fields, audit).await;
                    return TurnResult::from_task(result, None, true);
                }
            }
            state.clear();
        }

        let entities = self.extractor.extract(message);
        let (intents, forced) = match state.active_task {
            Some(task) => (vec![Intent::for_active_task(task, &entities)], true),
            None => (self.detector.detect(message, history, &entities).await, false),
        };
        self.record_intent(&intents, forced, audit);

        let task = match self.route(message, &intents, &entities, forced, &state) {
            Route::Respond(result) => return result,
            Route::Task(task) => task,
        };

        let linked = self.linker.link(&entities, &intents, &state.accumulated_fields);
        let outcome = self
            .driver
            .step(&StepInput { task, message, conversation: history, linked: &linked, audit })
            .await;

        if outcome.is_executed() {
            TurnResult::from_task(outcome.result, None, true)
        } else {
            TurnResult::from_task(outcome.result, Some(task), false)
        }
    }

    fn route(
        &self,
        message: &str,
        intents: &[Intent],
        entities: &[Entity],
        forced: bool,
        state: &ConversationState,
    ) -> Route {
        let top = intents.first().map(|intent| intent.kind);
        if forced {
            if let Some(task) = top.and_then(IntentKind::task) {
                return Route::Task(task);
            }
        }

        match top {
            Some(IntentKind::Greeting) => {
                return Route::Respond(TurnResult::reply(
                    greeting(),
                    TurnAction::Greeting,
                    state.clone(),
                ));
            }
            Some(IntentKind::SmallTalk) => {
                return Route::Respond(TurnResult::reply(
                    small_talk(message),
                    TurnAction::Greeting,
                    state.clone(),
                ));
            }
            _ => {}
        }

        match clarification_need(intents, entities) {
            Some(ClarificationNeed::MissingEntities(task)) => {
                let mut next = state.clone();
                next.active_task = Some(task);
                return Route::Respond(TurnResult::reply(
                    ClarificationNeed::MissingEntities(task).message(),
                    TurnAction::AskForInfo,
                    next,
                ));
            }
            Some(need) => {
                return Route::Respond(TurnResult::reply(
                    need.message(),
                    TurnAction::ClarifyIntent,
                    state.clone(),
                ));
            }
            None => {}
        }

        match top.and_then(IntentKind::task) {
            Some(task) => Route::Task(task),
            None => Route::Respond(TurnResult::reply(
                UNSUPPORTED_REQUEST,
                TurnAction::ClarifyIntent,
                state.clone(),
            )),
        }
    }

    fn record_intent(&self, intents: &[Intent], forced: bool, audit: &AuditContext) {
        let top = intents.first();
        let event = AuditEvent::from_context(
            audit,
            "intent.resolved",
            AuditCategory::Intent,
            if top.is_some() { AuditOutcome::Success } else { AuditOutcome::Rejected },
        )
        .with_metadata("intent", top.map_or("none", |intent| intent.kind.label()))
        .with_metadata("confidence", top.map_or(0.0, |intent| intent.confidence).to_string())
        .with_metadata("forced", forced.to_string())
        .with_metadata("candidates", intents.len().to_string());
        self.audit_sink.emit(event);
    }
}
