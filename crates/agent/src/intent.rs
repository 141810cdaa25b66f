use std::sync::{Arc, LazyLock};

use landlord_core::config::DialogueConfig;
use landlord_core::domain::conversation::Conversation;
use landlord_core::domain::task::TaskType;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extraction::{describe_entities, Entity};
use crate::llm::CompletionService;
use crate::schema::extract_json_object;

const KEYWORD_STEP: f64 = 0.3;
const KEYWORD_CAP: f64 = 0.9;
const DEFAULT_COMPLETION_CONFIDENCE: f64 = 0.5;

pub const CONFIDENT_THRESHOLD: f64 = 0.5;
pub const COMPETING_THRESHOLD: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    RentEstimation,
    ApplicantScreening,
    MaintenanceRisk,
    Greeting,
    SmallTalk,
    Clarification,
    Unknown,
}

impl IntentKind {
    pub fn task(self) -> Option<TaskType> {
        match self {
            Self::RentEstimation => Some(TaskType::RentEstimation),
            Self::ApplicantScreening => Some(TaskType::ApplicantScreening),
            Self::MaintenanceRisk => Some(TaskType::MaintenanceRisk),
            Self::Greeting | Self::SmallTalk | Self::Clarification | Self::Unknown => None,
        }
    }

    pub fn from_task(task: TaskType) -> Self {
        match task {
            TaskType::RentEstimation => Self::RentEstimation,
            TaskType::ApplicantScreening => Self::ApplicantScreening,
            TaskType::MaintenanceRisk => Self::MaintenanceRisk,
        }
    }

    /// Classifier labels. Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "rent_prediction" => Self::RentEstimation,
            "tenant_screening" => Self::ApplicantScreening,
            "maintenance_prediction" => Self::MaintenanceRisk,
            "greeting" => Self::Greeting,
            "small_talk" => Self::SmallTalk,
            "clarification" => Self::Clarification,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RentEstimation => "rent_prediction",
            Self::ApplicantScreening => "tenant_screening",
            Self::MaintenanceRisk => "maintenance_prediction",
            Self::Greeting => "greeting",
            Self::SmallTalk => "small_talk",
            Self::Clarification => "clarification",
            Self::Unknown => "unknown",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::RentEstimation => "Rent Prediction",
            Self::ApplicantScreening => "Tenant Screening",
            Self::MaintenanceRisk => "Maintenance Prediction",
            Self::Greeting => "Greeting",
            Self::SmallTalk => "Small Talk",
            Self::Clarification => "Clarification",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Keyword,
    Completion,
    ActiveTask,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub confidence: f64,
    pub source: IntentSource,
    pub supporting_entities: Vec<Entity>,
}

impl Intent {
    /// The intent used while a task is mid-collection: the task, at full confidence.
    pub fn for_active_task(task: TaskType, entities: &[Entity]) -> Self {
        Self {
            kind: IntentKind::from_task(task),
            confidence: 1.0,
            source: IntentSource::ActiveTask,
            supporting_entities: entities.to_vec(),
        }
    }
}

const KEYWORDS: &[(IntentKind, &[&str])] = &[
    (
        IntentKind::RentEstimation,
        &["rent", "price", "estimate", "cost", "how much", "pricing", "value"],
    ),
    (
        IntentKind::ApplicantScreening,
        &["screen", "tenant", "applicant", "background", "check", "approve", "credit"],
    ),
    (
        IntentKind::MaintenanceRisk,
        &["maintenance", "repair", "fix", "upkeep", "service", "broken", "issue"],
    ),
    (
        IntentKind::Greeting,
        &["hello", "hi", "hey", "good morning", "good afternoon", "good evening"],
    ),
    (IntentKind::SmallTalk, &["how are you", "thank you", "thanks", "goodbye", "bye", "help"]),
];

static KEYWORD_RULES: LazyLock<Vec<(IntentKind, Vec<Regex>)>> = LazyLock::new(|| {
    KEYWORDS
        .iter()
        .map(|(kind, keywords)| {
            let patterns = keywords
                .iter()
                .filter_map(|keyword| {
                    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword))).ok()
                })
                .collect();
            (*kind, patterns)
        })
        .collect()
});

/// Keyword pass: one intent per kind with at least one whole-word hit.
pub fn keyword_intents(text: &str) -> Vec<Intent> {
    KEYWORD_RULES
        .iter()
        .filter_map(|(kind, patterns)| {
            let hits = patterns.iter().filter(|pattern| pattern.is_match(text)).count();
            (hits > 0).then(|| Intent {
                kind: *kind,
                confidence: (hits as f64 * KEYWORD_STEP).min(KEYWORD_CAP),
                source: IntentSource::Keyword,
                supporting_entities: Vec::new(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierReply {
    #[serde(default)]
    intents: Vec<ClassifiedIntent>,
}

#[derive(Debug, Deserialize)]
struct ClassifiedIntent {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Turns a classifier reply into intents. Malformed replies yield nothing.
pub fn parse_classifier_reply(reply: &str) -> Option<Vec<Intent>> {
    let body = extract_json_object(reply)?;
    let parsed: ClassifierReply = serde_json::from_str(body).ok()?;
    Some(
        parsed
            .intents
            .into_iter()
            .map(|candidate| Intent {
                kind: candidate.kind.as_deref().map_or(IntentKind::Unknown, IntentKind::from_label),
                confidence: candidate
                    .confidence
                    .filter(|confidence| confidence.is_finite())
                    .unwrap_or(DEFAULT_COMPLETION_CONFIDENCE)
                    .clamp(0.0, 1.0),
                source: IntentSource::Completion,
                supporting_entities: Vec::new(),
            })
            .collect(),
    )
}

/// Keyword heuristics, backed by the completion service for long or unrecognised messages.
pub struct IntentDetector {
    completion: Arc<dyn CompletionService>,
    history_window: usize,
    long_message_words: usize,
}

impl IntentDetector {
    pub fn new(completion: Arc<dyn CompletionService>, dialogue: &DialogueConfig) -> Self {
        Self {
            completion,
            history_window: dialogue.history_window,
            long_message_words: dialogue.long_message_words,
        }
    }

    /// Ranked intents for `text`, highest confidence first. Ties keep detection order.
    pub async fn detect(
        &self,
        text: &str,
        history: &Conversation,
        entities: &[Entity],
    ) -> Vec<Intent> {
        let mut intents = keyword_intents(text);

        let word_count = text.split_whitespace().count();
        if intents.is_empty() || word_count > self.long_message_words {
            for intent in self.classify(text, history, entities).await {
                if intents.iter().all(|existing| existing.kind != intent.kind) {
                    intents.push(intent);
                }
            }
        }

        for intent in &mut intents {
            if intent.kind.task().is_some() {
                intent.supporting_entities = entities.to_vec();
            }
        }
        intents.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
        intents
    }

    async fn classify(
        &self,
        text: &str,
        history: &Conversation,
        entities: &[Entity],
    ) -> Vec<Intent> {
        let prompt = self.classifier_prompt(text, history, entities);
        let reply = match self.completion.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(
                    event_name = "dialogue.intent.completion_failed",
                    error = %error,
                    "intent classification call failed"
                );
                return Vec::new();
            }
        };
        match parse_classifier_reply(&reply) {
            Some(intents) => intents,
            None => {
                tracing::warn!(
                    event_name = "dialogue.intent.reply_malformed",
                    "intent classification reply was not the expected JSON"
                );
                Vec::new()
            }
        }
    }

    fn classifier_prompt(&self, text: &str, history: &Conversation, entities: &[Entity]) -> String {
        let context = history.transcript(self.history_window);
        let entity_context = if entities.is_empty() {
            String::new()
        } else {
            format!("Entities found: {}", describe_entities(entities))
        };
        format!(
            "You classify requests sent to an assistant for landlords. Detect ALL plausible \
             intents in the user message.\n\n\
             Available intents:\n\
             - rent_prediction: the user wants to estimate the rent of a property\n\
             - tenant_screening: the user wants to screen a tenant applicant\n\
             - maintenance_prediction: the user wants to predict maintenance needs\n\
             - greeting: the user is greeting or starting the conversation\n\
             - small_talk: the user is making small talk, thanking, or ending the conversation\n\
             - clarification: the user is asking for clarification or help\n\
             - unknown: the intent is unclear or not supported\n\n\
             Conversation so far:\n{context}\n\n{entity_context}\n\n\
             User message: \"{text}\"\n\n\
             Reply with JSON only, in this shape:\n\
             {{\"intents\": [{{\"type\": \"intent_name\", \"confidence\": 0.85, \
             \"reasoning\": \"why\"}}]}}\n\
             Be conservative with confidence scores."
        )
    }
}

/// Why the orchestrator has to ask before routing.
#[derive(Clone, Debug, PartialEq)]
pub enum ClarificationNeed {
    NoConfidentIntent,
    MultipleIntents(Vec<IntentKind>),
    MissingEntities(TaskType),
}

impl ClarificationNeed {
    pub fn message(&self) -> String {
        match self {
            Self::NoConfidentIntent => "I'm not sure what you'd like me to help with. I can \
                assist you with:\n\
                - **Rent Pricing**: Estimate the rent for your property\n\
                - **Tenant Screening**: Assess a tenant applicant\n\
                - **Maintenance Prediction**: Predict maintenance needs\n\n\
                Which of these would you like to do?"
                .to_owned(),
            Self::MultipleIntents(kinds) => {
                let names: Vec<&str> = kinds.iter().map(|kind| kind.display_name()).collect();
                format!(
                    "I detected multiple requests: {}. Which one would you like to start with?",
                    names.join(", ")
                )
            }
            Self::MissingEntities(TaskType::RentEstimation) => "I understand you want a rent \
                estimate. To help you, I'll need some property details. Can you tell me about \
                the address, number of bedrooms and bathrooms, size, and property type?"
                .to_owned(),
            Self::MissingEntities(TaskType::ApplicantScreening) => "I can help screen a tenant. \
                I'll need the applicant's credit score, income, the monthly rent amount, \
                employment status, and whether they have any prior evictions."
                .to_owned(),
            Self::MissingEntities(TaskType::MaintenanceRisk) => "I can predict maintenance \
                needs. Please provide the property address, how old the property is, when it \
                was last serviced, and the current season."
                .to_owned(),
        }
    }
}

/// `None` when the top intent can be acted on directly.
pub fn clarification_need(intents: &[Intent], entities: &[Entity]) -> Option<ClarificationNeed> {
    if intents.iter().all(|intent| intent.confidence < CONFIDENT_THRESHOLD) {
        return Some(ClarificationNeed::NoConfidentIntent);
    }

    let competing: Vec<IntentKind> = intents
        .iter()
        .filter(|intent| intent.confidence > COMPETING_THRESHOLD)
        .map(|intent| intent.kind)
        .collect();
    if competing.len() > 1 {
        return Some(ClarificationNeed::MultipleIntents(competing));
    }

    let task = intents.first().and_then(|intent| intent.kind.task())?;
    entities.is_empty().then_some(ClarificationNeed::MissingEntities(task))
}

#[cfg(test)]
mod tests {
    use landlord_core::config::DialogueConfig;
    use landlord_core::domain::conversation::{Conversation, Turn};
    use landlord_core::domain::task::TaskType;

    use super::{
        clarification_need, keyword_intents, parse_classifier_reply, ClarificationNeed, Intent,
        IntentDetector, IntentKind, IntentSource,
    };
    use crate::extraction::EntityExtractor;
    use crate::testing::ScriptedCompletion;

    fn intent(kind: IntentKind, confidence: f64) -> Intent {
        Intent { kind, confidence, source: IntentSource::Keyword, supporting_entities: Vec::new() }
    }

    fn kinds(intents: &[Intent]) -> Vec<(IntentKind, f64)> {
        intents.iter().map(|intent| (intent.kind, intent.confidence)).collect()
    }

    #[test]
    fn keyword_hits_scale_confidence() {
        let intents = keyword_intents("What rent price should I estimate? How much is the value?");
        assert_eq!(kinds(&intents), vec![(IntentKind::RentEstimation, 0.9)]);

        let intents = keyword_intents("screen this tenant");
        assert_eq!(intents.len(), 1);
        assert!((intents[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert!(keyword_intents("this is a thin history").is_empty());
        assert_eq!(kinds(&keyword_intents("Hi!")), vec![(IntentKind::Greeting, 0.3)]);
    }

    #[test]
    fn classifier_reply_defaults_and_clamps() {
        let intents = parse_classifier_reply(
            "Sure:\n{\"intents\": [{\"type\": \"tenant_screening\", \"confidence\": 1.7},\
             {\"type\": \"weather\"}, {\"confidence\": 0.2}]}",
        )
        .expect("valid reply");

        assert_eq!(
            kinds(&intents),
            vec![
                (IntentKind::ApplicantScreening, 1.0),
                (IntentKind::Unknown, 0.5),
                (IntentKind::Unknown, 0.2)
            ]
        );
        assert!(parse_classifier_reply("no idea").is_none());
    }

    #[tokio::test]
    async fn short_keyword_messages_skip_the_completion_pass() {
        let completion = ScriptedCompletion::failing();
        let detector = IntentDetector::new(completion.clone(), &DialogueConfig::default());

        let intents = detector.detect("estimate rent", &Conversation::default(), &[]).await;

        assert_eq!(kinds(&intents), vec![(IntentKind::RentEstimation, 0.6)]);
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn completion_intents_fill_in_without_duplicating_kinds() {
        let completion = ScriptedCompletion::replying([r#"{"intents": [
            {"type": "rent_prediction", "confidence": 0.95},
            {"type": "maintenance_prediction", "confidence": 0.75}
        ]}"#]);
        let detector = IntentDetector::new(completion.clone(), &DialogueConfig::default());
        let history = Conversation::new(vec![Turn::user("hello"), Turn::assistant("Hi there!")]);
        let text = "I own a flat in Kensington and I am wondering what I should charge for it \
                    next year, also the boiler keeps making noises";
        let entities = EntityExtractor::new().extract(text);

        let intents = detector.detect(text, &history, &entities).await;

        assert_eq!(
            kinds(&intents),
            vec![(IntentKind::RentEstimation, 0.95), (IntentKind::MaintenanceRisk, 0.75)]
        );
        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("assistant: Hi there!"));
        assert!(prompts[0].contains("PROPERTY_TYPE=flat"));
    }

    #[tokio::test]
    async fn failed_classification_contributes_nothing() {
        let detector =
            IntentDetector::new(ScriptedCompletion::failing(), &DialogueConfig::default());
        let intents = detector.detect("asdf qwerty", &Conversation::default(), &[]).await;
        assert!(intents.is_empty());
    }

    #[test]
    fn ties_keep_detection_order() {
        let mut intents = vec![
            intent(IntentKind::RentEstimation, 0.6),
            Intent { source: IntentSource::Completion, ..intent(IntentKind::SmallTalk, 0.6) },
        ];
        intents.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
        assert_eq!(intents[0].kind, IntentKind::RentEstimation);
    }

    #[test]
    fn clarification_rules() {
        let entities = EntityExtractor::new().extract("2 bed flat");

        assert_eq!(
            clarification_need(&[intent(IntentKind::RentEstimation, 0.3)], &entities),
            Some(ClarificationNeed::NoConfidentIntent)
        );
        assert_eq!(clarification_need(&[], &entities), Some(ClarificationNeed::NoConfidentIntent));
        assert_eq!(
            clarification_need(
                &[
                    intent(IntentKind::RentEstimation, 0.9),
                    intent(IntentKind::ApplicantScreening, 0.9)
                ],
                &entities
            ),
            Some(ClarificationNeed::MultipleIntents(vec![
                IntentKind::RentEstimation,
                IntentKind::ApplicantScreening
            ]))
        );
        assert_eq!(
            clarification_need(&[intent(IntentKind::MaintenanceRisk, 0.6)], &[]),
            Some(ClarificationNeed::MissingEntities(TaskType::MaintenanceRisk))
        );
        assert_eq!(clarification_need(&[intent(IntentKind::RentEstimation, 0.6)], &entities), None);
        assert_eq!(clarification_need(&[intent(IntentKind::Greeting, 0.6)], &[]), None);
    }

    #[test]
    fn multi_intent_message_names_the_tasks() {
        let message = ClarificationNeed::MultipleIntents(vec![
            IntentKind::RentEstimation,
            IntentKind::ApplicantScreening,
        ])
        .message();
        assert_eq!(
            message,
            "I detected multiple requests: Rent Prediction, Tenant Screening. Which one would \
             you like to start with?"
        );
    }
}
