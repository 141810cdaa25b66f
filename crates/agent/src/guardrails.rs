use std::sync::LazyLock;

use landlord_core::domain::task::TaskType;
use regex::Regex;

/// Stalling and unsolicited-advice phrases cut out of generated follow-ups.
const BANNED_PHRASES: &[&str] = &[
    "please wait",
    "processing",
    "hold on",
    "one moment",
    "I'll process",
    "wait a moment",
    "it's important to exercise caution",
    "you may wish to consider",
    "you may want to explore",
    "consider requesting a guarantor",
    "By considering these factors",
    "Tips for Landlord",
    "Based on the information provided",
    "Summary:",
];

/// Screening follow-ups never ask for data the screening does not use.
const OUT_OF_SCOPE_MARKERS: &[&str] =
    &["full name", "rental history", "name:", "history:", "annual income", "tenant's name"];

static BANNED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BANNED_PHRASES
        .iter()
        .filter_map(|phrase| {
            let source = format!("(?i){}", regex::escape(phrase));
            match Regex::new(&source) {
                Ok(regex) => Some(regex),
                Err(error) => {
                    tracing::error!(
                        event_name = "dialogue.guardrail.pattern_invalid",
                        phrase = %phrase,
                        error = %error,
                        "skipping banned phrase"
                    );
                    None
                }
            }
        })
        .collect()
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow { reply: String },
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn into_reply(self) -> String {
        match self {
            Self::Allow { reply } => reply,
            Self::Degrade { user_message, .. } => user_message,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degrade { .. })
    }
}

/// Filters completion-generated follow-ups before they reach the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyGuardrail {
    task: TaskType,
    drop_out_of_scope_lines: bool,
}

impl ReplyGuardrail {
    pub fn for_task(task: TaskType) -> Self {
        Self { task, drop_out_of_scope_lines: task == TaskType::ApplicantScreening }
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn evaluate(&self, reply: &str, missing: &[&str]) -> GuardrailDecision {
        let filtered = self.filter(reply);
        if !filtered.chars().any(char::is_alphanumeric) {
            return GuardrailDecision::Degrade {
                reason_code: "follow_up_empty_after_filter",
                user_message: still_need_prompt(missing),
                fallback_path: "static_missing_fields_prompt",
            };
        }
        GuardrailDecision::Allow { reply: filtered }
    }

    pub fn filter(&self, reply: &str) -> String {
        let mut text = reply.to_owned();
        for pattern in BANNED_PATTERNS.iter() {
            text = pattern.replace_all(&text, "").into_owned();
        }
        let kept: Vec<&str> = text
            .lines()
            .filter(|line| {
                let lowered = line.to_lowercase();
                !(self.drop_out_of_scope_lines
                    && OUT_OF_SCOPE_MARKERS.iter().any(|marker| lowered.contains(marker)))
            })
            .map(strip_orphaned_punctuation)
            .collect();
        kept.join("\n").trim().to_owned()
    }
}

/// A removed phrase can leave its trailing punctuation at the start of a line.
fn strip_orphaned_punctuation(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with(['.', ',', '!']) {
        trimmed.trim_start_matches(['.', ',', '!', ' '])
    } else {
        line
    }
}

pub fn still_need_prompt(missing: &[&str]) -> String {
    if missing.is_empty() {
        return "Could you share a few more details?".to_owned();
    }
    format!("I still need: {}. Could you share them?", missing.join(", "))
}

#[cfg(test)]
mod tests {
    use landlord_core::domain::task::TaskType;

    use super::{GuardrailDecision, ReplyGuardrail, BANNED_PATTERNS, BANNED_PHRASES};

    #[test]
    fn every_banned_phrase_compiles() {
        assert_eq!(BANNED_PATTERNS.len(), BANNED_PHRASES.len());
    }

    #[test]
    fn stalling_phrases_are_removed_case_insensitively() {
        let guardrail = ReplyGuardrail::for_task(TaskType::RentEstimation);
        let decision =
            guardrail.evaluate("Please wait. How many bathrooms does it have?", &["BATHROOMS"]);

        assert_eq!(
            decision,
            GuardrailDecision::Allow { reply: "How many bathrooms does it have?".to_owned() }
        );
    }

    #[test]
    fn screening_drops_out_of_scope_requests() {
        let guardrail = ReplyGuardrail::for_task(TaskType::ApplicantScreening);
        let reply = "Thanks! I still need:\n- Credit score\n- Tenant's name\n- Rental history";

        let filtered = guardrail.filter(reply);

        assert_eq!(filtered, "Thanks! I still need:\n- Credit score");
    }

    #[test]
    fn other_tasks_keep_lines_mentioning_history() {
        let guardrail = ReplyGuardrail::for_task(TaskType::MaintenanceRisk);
        let filtered = guardrail.filter("Any service history: when was it last serviced?");
        assert!(filtered.contains("history:"));
    }

    #[test]
    fn reply_emptied_by_filter_degrades_to_static_prompt() {
        let guardrail = ReplyGuardrail::for_task(TaskType::ApplicantScreening);
        let decision = guardrail.evaluate("Processing... one moment", &["income", "rent"]);

        let (reason_code, user_message, fallback_path) = match decision {
            GuardrailDecision::Degrade { reason_code, user_message, fallback_path } => {
                (reason_code, user_message, fallback_path)
            }
            GuardrailDecision::Allow { .. } => ("", String::new(), ""),
        };

        assert_eq!(reason_code, "follow_up_empty_after_filter");
        assert_eq!(user_message, "I still need: income, rent. Could you share them?");
        assert_eq!(fallback_path, "static_missing_fields_prompt");
    }
}
