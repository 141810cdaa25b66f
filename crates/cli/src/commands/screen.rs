use landlord_core::compute::screening::{
    format_screening_reply, DeterministicRuleEngine, RuleEngine, ScreeningInput,
};
use landlord_core::domain::fields::{CandidateFieldSet, FieldValue};
use landlord_core::domain::task::TaskType;
use landlord_core::errors::ApplicationError;
use serde_json::json;

use super::CommandResult;

/// Applicant details as given on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenArgs {
    pub credit_score: i64,
    pub income: f64,
    pub rent: f64,
    pub employment_status: String,
    pub eviction_record: bool,
}

impl ScreenArgs {
    fn fields(&self) -> CandidateFieldSet {
        let mut fields = CandidateFieldSet::new();
        fields.insert("credit_score", FieldValue::Int(self.credit_score));
        fields.insert("income", FieldValue::Float(self.income));
        fields.insert("rent", FieldValue::Float(self.rent));
        fields.insert("employment_status", FieldValue::text(self.employment_status.trim()));
        fields.insert("eviction_record", FieldValue::Bool(self.eviction_record));
        fields
    }
}

/// Runs the rule engine offline; no completion service or model artefacts involved.
pub fn run(args: &ScreenArgs) -> CommandResult {
    let fields = args.fields();
    let missing = fields.missing(TaskType::ApplicantScreening);
    if !missing.is_empty() {
        return CommandResult::failure(
            "screen",
            "invalid_input",
            format!("missing or empty applicant details: {}", missing.join(", ")),
            2,
        );
    }

    let outcome = ScreeningInput::from_fields(&fields)
        .and_then(|input| DeterministicRuleEngine.screen(&input));
    match outcome {
        Ok(outcome) => CommandResult::success_with(
            "screen",
            format_screening_reply(&outcome),
            Some(json!({
                "recommendation": outcome.recommendation.to_string(),
                "risk_score": outcome.risk_score,
                "explanation": outcome.explanation,
            })),
        ),
        Err(error) => {
            let error = ApplicationError::from(error);
            let (class, code) = (error.error_class(), error.exit_code());
            CommandResult::failure("screen", class, error.to_string(), code)
        }
    }
}
