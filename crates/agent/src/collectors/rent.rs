use landlord_core::compute::rent::{estimate_rent, format_rent_reply, PredictionRecord};
use landlord_core::compute::ComputationError;
use landlord_core::domain::fields::CandidateFieldSet;
use landlord_core::domain::task::TaskType;
use landlord_core::resources::ResourceProvider;

use super::{field_lines, Execution, FieldCollector};

const PERSONA: &str = "You are LandlordBuddy, an expert and friendly assistant for landlords. \
    You support rent pricing, tenant screening, and maintenance prediction. Users may give \
    details in any format, with casual wording or synonyms; interpret them generously. The \
    information needed for a rent estimate is: address, subdistrict_code, BEDROOMS, BATHROOMS, \
    SIZE (in sq ft) and PROPERTY TYPE. If details are missing, ask for all of them together in \
    a friendly, casual way. Do not promise an estimate later, do not mention limitations, and \
    never say you are processing anything. Respond in markdown.";

#[derive(Clone, Copy, Debug, Default)]
pub struct RentCollector;

impl RentCollector {
    pub fn new() -> Self {
        Self
    }

    /// Re-runs the estimate for fields that were already confirmed, for follow-ups.
    pub fn record_for(
        &self,
        fields: &CandidateFieldSet,
        resources: &ResourceProvider,
    ) -> Result<PredictionRecord, ComputationError> {
        let scoped = fields.scoped_to(TaskType::RentEstimation);
        let estimate = estimate_rent(&scoped, resources.lookups(), resources.rent_model()?)?;
        Ok(PredictionRecord::new(scoped, estimate))
    }
}

impl FieldCollector for RentCollector {
    fn task(&self) -> TaskType {
        TaskType::RentEstimation
    }

    fn persona(&self) -> &'static str {
        PERSONA
    }

    fn summarize(&self, fields: &CandidateFieldSet) -> String {
        format!(
            "**Property Information for Rent Estimation:**\n\n{}\nIs this information correct? \
             Please confirm to proceed with the rent estimation.",
            field_lines(self.task(), fields, str::to_owned)
        )
    }

    fn missing_message(&self, missing: &[&str]) -> String {
        format!(
            "I need the following details to estimate rent: {}. Please provide them.",
            missing.join(", ")
        )
    }

    fn try_execute(
        &self,
        fields: &CandidateFieldSet,
        resources: &ResourceProvider,
    ) -> Result<Execution, ComputationError> {
        let record = self.record_for(fields, resources)?;
        Ok(Execution { reply: format_rent_reply(&record.estimate), record: Some(record) })
    }
}
