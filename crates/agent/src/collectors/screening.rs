use std::sync::Arc;

use landlord_core::compute::screening::{
    format_screening_reply, DeterministicRuleEngine, RuleEngine, ScreeningInput,
};
use landlord_core::compute::ComputationError;
use landlord_core::domain::fields::{title_case, CandidateFieldSet};
use landlord_core::domain::task::TaskType;
use landlord_core::resources::ResourceProvider;

use super::{field_lines, Execution, FieldCollector};

const PERSONA: &str = "You are LandlordBuddy, an expert and professional assistant for \
    landlords. You support rent pricing, tenant screening, and maintenance prediction. For \
    tenant screening you gather the credit score, income, rent, employment status and eviction \
    record, confirm them with the user, and only then run the screening. Never give your own \
    evaluation, summary or advice about the applicant. Never say 'please wait' or 'processing', \
    and never imply you will proceed without an explicit confirmation. Never ask for the \
    tenant's name, rental history or any other extra detail. Ask for every missing field \
    together in one clear, markdown-formatted list. Do not use the words script, model or AI.";

#[derive(Clone)]
pub struct ScreeningCollector {
    engine: Arc<dyn RuleEngine>,
}

impl Default for ScreeningCollector {
    fn default() -> Self {
        Self::new(Arc::new(DeterministicRuleEngine))
    }
}

impl ScreeningCollector {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self { engine }
    }
}

impl FieldCollector for ScreeningCollector {
    fn task(&self) -> TaskType {
        TaskType::ApplicantScreening
    }

    fn persona(&self) -> &'static str {
        PERSONA
    }

    fn summarize(&self, fields: &CandidateFieldSet) -> String {
        let lines = field_lines(self.task(), fields, |name| title_case(&name.replace('_', " ")));
        format!(
            "**Tenant Screening Details:**\n\n{lines}\nIs this correct? Please confirm so I can \
             screen the tenant."
        )
    }

    fn missing_message(&self, missing: &[&str]) -> String {
        let labels: Vec<String> =
            missing.iter().map(|name| name.replace('_', " ")).collect();
        format!(
            "Sorry, I couldn't run the tenant screening because some required information is \
             missing: {}. Please provide them.",
            labels.join(", ")
        )
    }

    fn try_execute(
        &self,
        fields: &CandidateFieldSet,
        _resources: &ResourceProvider,
    ) -> Result<Execution, ComputationError> {
        let input = ScreeningInput::from_fields(fields)?;
        let outcome = self.engine.screen(&input)?;
        tracing::debug!(
            event_name = "dialogue.screening.scored",
            risk_score = outcome.risk_score,
            recommendation = %outcome.recommendation,
            "applicant screened"
        );
        Ok(Execution::from_reply(format_screening_reply(&outcome)))
    }
}
