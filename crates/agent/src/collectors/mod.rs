//! Field collection for the three tasks.
//!
//! Each task owns a [`FieldCollector`] that knows how to pull its fields out of a message,
//! summarise them for confirmation and run the computation once they are confirmed. The
//! [`CollectionDriver`] walks the collect, confirm, execute cycle through the flow engine so
//! every transition lands in the audit trail.

pub mod maintenance;
pub mod rent;
pub mod screening;

use std::sync::Arc;

use async_trait::async_trait;
use landlord_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use landlord_core::compute::rent::PredictionRecord;
use landlord_core::compute::ComputationError;
use landlord_core::config::DialogueConfig;
use landlord_core::domain::conversation::Conversation;
use landlord_core::domain::fields::CandidateFieldSet;
use landlord_core::domain::outcome::{TaskResult, TurnAction};
use landlord_core::domain::task::TaskType;
use landlord_core::flows::{
    CollectionEvent, CollectionState, FieldCollectionFlow, FlowEngine, FlowTransitionError,
    TransitionOutcome,
};
use landlord_core::resources::ResourceProvider;

use crate::guardrails::{still_need_prompt, ReplyGuardrail};
use crate::llm::CompletionService;
use crate::schema::{FieldSchema, SchemaParser};
use crate::synonyms::SynonymTable;

pub use maintenance::MaintenanceCollector;
pub use rent::RentCollector;
pub use screening::ScreeningCollector;

/// Replies that count as confirming a field summary. Matched whole, ignoring case.
pub const CONFIRMATION_PHRASES: [&str; 7] =
    ["yes", "correct", "that's right", "yep", "confirmed", "go ahead", "proceed"];

pub fn is_confirmation(message: &str) -> bool {
    let normalized = message.trim().to_lowercase();
    CONFIRMATION_PHRASES.contains(&normalized.as_str())
}

/// What a confirmed computation produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Execution {
    pub reply: String,
    pub record: Option<PredictionRecord>,
}

impl Execution {
    pub fn from_reply(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), record: None }
    }
}

pub struct ExtractionRequest<'a> {
    pub message: &'a str,
    pub conversation: &'a Conversation,
    /// Carried-over fields plus whatever the entity linker resolved this turn.
    pub linked: &'a CandidateFieldSet,
}

/// Pulls a task's fields out of the conversation.
///
/// One structured completion call is tried first and wins over the linked fields. When the
/// call fails or its reply does not fit the schema, the synonym and pattern scans fill the
/// gaps instead.
pub struct FieldExtractor {
    completion: Arc<dyn CompletionService>,
    parser: Arc<dyn SchemaParser>,
    history_window: usize,
}

impl FieldExtractor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        parser: Arc<dyn SchemaParser>,
        dialogue: &DialogueConfig,
    ) -> Self {
        Self { completion, parser, history_window: dialogue.history_window }
    }

    pub async fn extract(
        &self,
        task: TaskType,
        request: &ExtractionRequest<'_>,
    ) -> CandidateFieldSet {
        let schema = FieldSchema::for_task(task);
        let transcript = request.conversation.transcript(self.history_window);
        let synonyms = SynonymTable::for_task(task);
        let mut fields = request.linked.scoped_to(task);

        match self.structured(&schema, &transcript, request.message).await {
            Some(parsed) => {
                fields.merge_for_task(task, &parsed);
            }
            None => {
                let text = format!("{transcript}\n{}", request.message);
                fill_gaps(&mut fields, &synonyms.scan(&text));
            }
        }
        fill_gaps(&mut fields, &synonyms.scan_phrasings(request.message));
        fields
    }

    async fn structured(
        &self,
        schema: &FieldSchema,
        transcript: &str,
        message: &str,
    ) -> Option<CandidateFieldSet> {
        let prompt = extraction_prompt(schema, transcript, message);
        let reply = match self.completion.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    event_name = "dialogue.extraction.completion_failed",
                    task = schema.task().wire_name(),
                    error = %error,
                    "field extraction call failed, using pattern fallback"
                );
                return None;
            }
        };
        match self.parser.parse(&reply, schema) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                tracing::debug!(
                    event_name = "dialogue.extraction.schema_mismatch",
                    task = schema.task().wire_name(),
                    error = %error,
                    "extraction reply did not fit the schema, using pattern fallback"
                );
                None
            }
        }
    }
}

fn extraction_prompt(schema: &FieldSchema, transcript: &str, message: &str) -> String {
    format!(
        "You are an expert assistant for landlords. Extract the following fields from the \
         conversation and user message. If a field is missing, use an empty string or 0. \
         Output only the JSON object as specified by the schema: {}\n\n\
         Conversation so far:\n{transcript}\nUser message:\n{message}",
        schema.format_instructions()
    )
}

fn fill_gaps(fields: &mut CandidateFieldSet, fallback: &CandidateFieldSet) {
    for (name, value) in fallback.iter() {
        if !fields.is_filled(name) {
            fields.insert(name, value.clone());
        }
    }
}

/// One task's side of the collect, confirm, execute cycle.
#[async_trait]
pub trait FieldCollector: Send + Sync {
    fn task(&self) -> TaskType;

    /// Instructions for the completion service when it writes follow-up questions.
    fn persona(&self) -> &'static str;

    async fn extract(
        &self,
        extractor: &FieldExtractor,
        request: &ExtractionRequest<'_>,
    ) -> CandidateFieldSet {
        extractor.extract(self.task(), request).await
    }

    fn summarize(&self, fields: &CandidateFieldSet) -> String;

    /// Reply for a confirmation that arrived before every field was known.
    fn missing_message(&self, missing: &[&str]) -> String;

    fn try_execute(
        &self,
        fields: &CandidateFieldSet,
        resources: &ResourceProvider,
    ) -> Result<Execution, ComputationError>;
}

/// Markdown bullet list of `fields` in schema order.
pub(crate) fn field_lines(
    task: TaskType,
    fields: &CandidateFieldSet,
    label: impl Fn(&str) -> String,
) -> String {
    task.required_fields()
        .iter()
        .filter_map(|spec| {
            let value = fields.get(spec.name)?;
            Some(format!("- **{}**: {value}\n", label(spec.name)))
        })
        .collect()
}

pub struct StepInput<'a> {
    pub task: TaskType,
    pub message: &'a str,
    pub conversation: &'a Conversation,
    pub linked: &'a CandidateFieldSet,
    pub audit: &'a AuditContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub result: TaskResult,
    pub state: CollectionState,
    pub record: Option<PredictionRecord>,
}

impl StepOutcome {
    fn new(result: TaskResult, state: CollectionState) -> Self {
        Self { result, state, record: None }
    }

    pub fn is_executed(&self) -> bool {
        self.state == CollectionState::Executed
    }
}

/// Drives a task's collectors through the flow engine.
pub struct CollectionDriver {
    rent: RentCollector,
    screening: ScreeningCollector,
    maintenance: MaintenanceCollector,
    extractor: FieldExtractor,
    completion: Arc<dyn CompletionService>,
    resources: Arc<ResourceProvider>,
    audit_sink: Arc<dyn AuditSink>,
    history_window: usize,
}

impl CollectionDriver {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        parser: Arc<dyn SchemaParser>,
        resources: Arc<ResourceProvider>,
        audit_sink: Arc<dyn AuditSink>,
        dialogue: &DialogueConfig,
    ) -> Self {
        Self {
            rent: RentCollector::new(),
            screening: ScreeningCollector::default(),
            maintenance: MaintenanceCollector::new(),
            extractor: FieldExtractor::new(completion.clone(), parser, dialogue),
            completion,
            resources,
            audit_sink,
            history_window: dialogue.history_window,
        }
    }

    pub fn with_screening(mut self, screening: ScreeningCollector) -> Self {
        self.screening = screening;
        self
    }

    pub fn collector(&self, task: TaskType) -> &dyn FieldCollector {
        match task {
            TaskType::RentEstimation => &self.rent,
            TaskType::ApplicantScreening => &self.screening,
            TaskType::MaintenanceRisk => &self.maintenance,
        }
    }

    pub fn resources(&self) -> &ResourceProvider {
        &self.resources
    }

    pub async fn step(&self, input: &StepInput<'_>) -> StepOutcome {
        let collector = self.collector(input.task);
        let engine = FlowEngine::for_task(input.task);

        if is_confirmation(input.message) {
            let fields = input.linked.scoped_to(input.task);
            return self.confirm(collector, &engine, fields, input.audit);
        }

        let request = ExtractionRequest {
            message: input.message,
            conversation: input.conversation,
            linked: input.linked,
        };
        let fields = collector.extract(&self.extractor, &request).await;
        let current = engine.state_for(input.linked, false);
        let transition = engine.apply_with_audit(
            &current,
            &CollectionEvent::FieldsMerged,
            &engine.context_for(&fields),
            self.audit_sink.as_ref(),
            input.audit,
        );

        match transition {
            Ok(TransitionOutcome { to: CollectionState::AwaitingConfirmation, .. }) => {
                let summary = collector.summarize(&fields);
                StepOutcome::new(
                    TaskResult::new(summary, TurnAction::ConfirmFields, fields),
                    CollectionState::AwaitingConfirmation,
                )
            }
            Ok(_) | Err(_) => self.ask_for_missing(collector, input, fields).await,
        }
    }

    fn confirm(
        &self,
        collector: &dyn FieldCollector,
        engine: &FlowEngine<FieldCollectionFlow>,
        fields: CandidateFieldSet,
        audit: &AuditContext,
    ) -> StepOutcome {
        let current = engine.state_for(&fields, false);
        let transition = engine.apply_with_audit(
            &current,
            &CollectionEvent::ConfirmationReceived,
            &engine.context_for(&fields),
            self.audit_sink.as_ref(),
            audit,
        );

        match transition {
            Ok(_) => self.execute(collector, engine, fields, audit),
            Err(FlowTransitionError::MissingRequiredFields { .. })
            | Err(FlowTransitionError::InvalidTransition { .. }) => {
                let missing = fields.missing(collector.task());
                let reply = collector.missing_message(&missing);
                StepOutcome::new(
                    TaskResult::new(reply, TurnAction::AskForInfo, fields),
                    CollectionState::Collecting,
                )
            }
        }
    }

    fn execute(
        &self,
        collector: &dyn FieldCollector,
        engine: &FlowEngine<FieldCollectionFlow>,
        fields: CandidateFieldSet,
        audit: &AuditContext,
    ) -> StepOutcome {
        let task = collector.task();
        match collector.try_execute(&fields, &self.resources) {
            Ok(execution) => {
                self.audit_sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "computation.completed",
                        AuditCategory::Computation,
                        AuditOutcome::Success,
                    )
                    .with_metadata("task", task.wire_name()),
                );
                tracing::info!(
                    event_name = "dialogue.task.executed",
                    correlation_id = %audit.correlation_id,
                    task = task.wire_name(),
                    "task computation completed"
                );
                StepOutcome {
                    result: TaskResult::new(execution.reply, TurnAction::Executed, fields),
                    state: CollectionState::Executed,
                    record: execution.record,
                }
            }
            Err(error) => {
                self.audit_sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "computation.failed",
                        AuditCategory::Computation,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("task", task.wire_name())
                    .with_metadata("error", error.to_string()),
                );
                tracing::warn!(
                    event_name = "dialogue.task.computation_failed",
                    correlation_id = %audit.correlation_id,
                    task = task.wire_name(),
                    error = %error,
                    "task computation failed"
                );
                let state = engine
                    .apply_with_audit(
                        &CollectionState::Executed,
                        &CollectionEvent::ComputationFailed,
                        &engine.context_for(&fields),
                        self.audit_sink.as_ref(),
                        audit,
                    )
                    .map(|outcome| outcome.to)
                    .unwrap_or(CollectionState::AwaitingConfirmation);
                StepOutcome::new(
                    TaskResult::new(apology(task), TurnAction::Apology, fields),
                    state,
                )
            }
        }
    }

    async fn ask_for_missing(
        &self,
        collector: &dyn FieldCollector,
        input: &StepInput<'_>,
        fields: CandidateFieldSet,
    ) -> StepOutcome {
        let missing = fields.missing(collector.task());
        let prompt = self.follow_up_prompt(collector, input, &fields, &missing);

        let (reply, action) = match self.completion.complete(&prompt).await {
            Ok(reply) => {
                let guardrail = ReplyGuardrail::for_task(collector.task());
                let decision = guardrail.evaluate(&reply, &missing);
                if decision.is_degraded() {
                    tracing::info!(
                        event_name = "dialogue.guardrail.degraded",
                        correlation_id = %input.audit.correlation_id,
                        task = collector.task().wire_name(),
                        "follow-up reply was empty after filtering"
                    );
                    (decision.into_reply(), TurnAction::AskForInfo)
                } else {
                    (decision.into_reply(), TurnAction::Chat)
                }
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "dialogue.follow_up.completion_failed",
                    correlation_id = %input.audit.correlation_id,
                    task = collector.task().wire_name(),
                    error = %error,
                    "follow-up generation failed, asking with the static prompt"
                );
                (still_need_prompt(&missing), TurnAction::AskForInfo)
            }
        };

        StepOutcome::new(TaskResult::new(reply, action, fields), CollectionState::Collecting)
    }

    fn follow_up_prompt(
        &self,
        collector: &dyn FieldCollector,
        input: &StepInput<'_>,
        fields: &CandidateFieldSet,
        missing: &[&str],
    ) -> String {
        let collected: String = fields
            .iter()
            .filter(|(_, value)| value.is_filled())
            .map(|(name, value)| format!("- {name}: {value}\n"))
            .collect();
        let collected = if collected.is_empty() { "- nothing yet\n".to_owned() } else { collected };
        format!(
            "{}\n\nConversation so far:\n{}\n\nUser message:\n{}\n\n\
             Information collected so far:\n{collected}\n\
             Still missing: {}\n\n\
             Ask for all of the missing details together in one short, friendly message.",
            collector.persona(),
            input.conversation.transcript(self.history_window),
            input.message,
            missing.join(", ")
        )
    }
}

fn apology(task: TaskType) -> String {
    format!(
        "Sorry, I couldn't complete the {} just now. Please confirm again in a moment and I'll \
         retry.",
        task.display_name().to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use landlord_core::audit::{AuditContext, InMemoryAuditSink};
    use landlord_core::compute::LinearModel;
    use landlord_core::config::DialogueConfig;
    use landlord_core::domain::conversation::Conversation;
    use landlord_core::domain::fields::{CandidateFieldSet, FieldValue};
    use landlord_core::domain::outcome::TurnAction;
    use landlord_core::domain::task::TaskType;
    use landlord_core::flows::CollectionState;
    use landlord_core::resources::{LookupTable, LookupTables, ResourceProvider};

    use super::{is_confirmation, CollectionDriver, StepInput};
    use crate::schema::JsonSchemaParser;
    use crate::testing::ScriptedCompletion;

    fn resources() -> ResourceProvider {
        let lookups = LookupTables {
            address: LookupTable::from_pairs([("12 Baker Street", 1.0)]),
            subdistrict_code: LookupTable::from_pairs([("NW16XE", 2.0)]),
            property_type: LookupTable::from_pairs([("Flat", 3.0)]),
        };
        let model = LinearModel::new("rent", 2000.5_f64.ln_1p(), [("SIZE", 0.0)]);
        ResourceProvider::empty().with_lookups(lookups).with_rent_model(Arc::new(model))
    }

    fn driver(
        completion: Arc<ScriptedCompletion>,
        resources: ResourceProvider,
        sink: &InMemoryAuditSink,
    ) -> CollectionDriver {
        CollectionDriver::new(
            completion,
            Arc::new(JsonSchemaParser),
            Arc::new(resources),
            Arc::new(sink.clone()),
            &DialogueConfig::default(),
        )
    }

    fn complete_rent_fields() -> CandidateFieldSet {
        [
            ("address", FieldValue::text("12 Baker Street")),
            ("subdistrict_code", FieldValue::text("NW16XE")),
            ("BEDROOMS", FieldValue::Int(2)),
            ("BATHROOMS", FieldValue::Int(1)),
            ("SIZE", FieldValue::Float(800.0)),
            ("PROPERTY TYPE", FieldValue::text("Flat")),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
    }

    fn audit() -> AuditContext {
        AuditContext::new(Some("session-1".to_owned()), "corr-1", "tester")
    }

    #[test]
    fn confirmation_phrases_match_whole_message_only() {
        assert!(is_confirmation("  Yes "));
        assert!(is_confirmation("That's right"));
        assert!(is_confirmation("GO AHEAD"));
        assert!(!is_confirmation("yes please"));
        assert!(!is_confirmation("sure"));
    }

    #[tokio::test]
    async fn confirmed_complete_fields_execute_once() {
        let sink = InMemoryAuditSink::default();
        let completion = ScriptedCompletion::failing();
        let driver = driver(completion.clone(), resources(), &sink);
        let fields = complete_rent_fields();
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::RentEstimation,
                message: "yes",
                conversation: &Conversation::default(),
                linked: &fields,
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::Executed);
        assert_eq!(outcome.state, CollectionState::Executed);
        assert!(outcome.result.reply_text.contains("£2000"));
        assert!(outcome.record.is_some());
        assert!(completion.prompts().is_empty());
        assert!(sink.event_types().contains(&"computation.completed".to_owned()));
    }

    #[tokio::test]
    async fn confirmation_with_gaps_lists_missing_fields() {
        let sink = InMemoryAuditSink::default();
        let driver = driver(ScriptedCompletion::failing(), resources(), &sink);
        let mut fields = complete_rent_fields();
        fields.remove("SIZE");
        fields.remove("BATHROOMS");
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::RentEstimation,
                message: "correct",
                conversation: &Conversation::default(),
                linked: &fields,
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::AskForInfo);
        assert_eq!(outcome.state, CollectionState::Collecting);
        assert_eq!(
            outcome.result.reply_text,
            "I need the following details to estimate rent: BATHROOMS, SIZE. Please provide them."
        );
        assert!(sink.event_types().contains(&"flow.transition_rejected".to_owned()));
    }

    #[tokio::test]
    async fn screening_confirmation_names_only_absent_fields() {
        let sink = InMemoryAuditSink::default();
        let driver = driver(ScriptedCompletion::failing(), resources(), &sink);
        let mut fields = CandidateFieldSet::new();
        fields.insert("credit_score", FieldValue::Int(700));
        fields.insert("income", FieldValue::Float(4000.0));
        fields.insert("eviction_record", FieldValue::Bool(false));
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::ApplicantScreening,
                message: "yes",
                conversation: &Conversation::default(),
                linked: &fields,
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::AskForInfo);
        assert!(outcome.result.reply_text.contains("missing: rent, employment status."));
        assert!(!outcome.result.reply_text.contains("credit score"));
    }

    #[tokio::test]
    async fn failed_computation_apologises_and_waits_for_confirmation() {
        let sink = InMemoryAuditSink::default();
        let driver = driver(ScriptedCompletion::failing(), ResourceProvider::empty(), &sink);
        let fields = complete_rent_fields();
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::RentEstimation,
                message: "proceed",
                conversation: &Conversation::default(),
                linked: &fields,
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::Apology);
        assert_eq!(outcome.state, CollectionState::AwaitingConfirmation);
        assert!(outcome.result.reply_text.starts_with("Sorry"));
        assert!(sink.event_types().contains(&"computation.failed".to_owned()));
    }

    #[tokio::test]
    async fn completed_extraction_asks_for_confirmation() {
        let sink = InMemoryAuditSink::default();
        let extraction = r#"{"address": "12 Baker Street", "subdistrict_code": "NW16XE",
            "BEDROOMS": 2, "BATHROOMS": 1, "SIZE": 800, "PROPERTY_TYPE": "Flat"}"#;
        let driver = driver(ScriptedCompletion::replying([extraction]), resources(), &sink);
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::RentEstimation,
                message: "12 Baker Street NW1 6XE, 2 bed 1 bath flat, 800 sq ft",
                conversation: &Conversation::default(),
                linked: &CandidateFieldSet::new(),
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::ConfirmFields);
        assert_eq!(outcome.state, CollectionState::AwaitingConfirmation);
        assert!(outcome
            .result
            .reply_text
            .starts_with("**Property Information for Rent Estimation:**"));
        assert!(outcome.result.reply_text.contains("- **PROPERTY TYPE**: Flat"));
    }

    #[tokio::test]
    async fn failed_extraction_falls_back_to_synonyms_and_follow_up() {
        let sink = InMemoryAuditSink::default();
        let completion = ScriptedCompletion::new([None, Some("Great! How many bathrooms?")]);
        let driver = driver(completion.clone(), resources(), &sink);
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::RentEstimation,
                message: "bedrooms: 3",
                conversation: &Conversation::default(),
                linked: &CandidateFieldSet::new(),
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::Chat);
        assert_eq!(outcome.result.reply_text, "Great! How many bathrooms?");
        assert_eq!(outcome.result.fields_used.get("BEDROOMS"), Some(&FieldValue::Int(3)));
        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Still missing: address, subdistrict_code, BATHROOMS"));
    }

    #[tokio::test]
    async fn unavailable_follow_up_uses_static_prompt() {
        let sink = InMemoryAuditSink::default();
        let driver = driver(ScriptedCompletion::failing(), resources(), &sink);
        let audit = audit();

        let outcome = driver
            .step(&StepInput {
                task: TaskType::MaintenanceRisk,
                message: "the property at 12 Baker Street, built 40 years ago",
                conversation: &Conversation::default(),
                linked: &CandidateFieldSet::new(),
                audit: &audit,
            })
            .await;

        assert_eq!(outcome.result.action, TurnAction::AskForInfo);
        assert_eq!(
            outcome.result.reply_text,
            "I still need: last_service_years_ago, seasonality. Could you share them?"
        );
        assert_eq!(outcome.result.fields_used.get("age_years"), Some(&FieldValue::Int(40)));
    }
}
