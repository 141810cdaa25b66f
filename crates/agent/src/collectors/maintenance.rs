use landlord_core::compute::maintenance::{assess_maintenance, format_maintenance_reply};
use landlord_core::compute::ComputationError;
use landlord_core::domain::fields::CandidateFieldSet;
use landlord_core::domain::task::TaskType;
use landlord_core::resources::ResourceProvider;

use super::{field_lines, Execution, FieldCollector};

const PERSONA: &str = "You are LandlordBuddy, an expert and friendly assistant for landlords. \
    You support rent pricing, tenant screening, and maintenance prediction. To predict \
    maintenance risk you need the property address, its age in years, how many years ago it \
    was last serviced, and the current season (Winter, Spring, Summer or Autumn). Users may \
    answer casually; interpret phrases such as 'built 30 years ago' or 'this winter'. Ask for \
    every missing detail together, never say you are processing anything, and respond in \
    markdown.";

#[derive(Clone, Copy, Debug, Default)]
pub struct MaintenanceCollector;

impl MaintenanceCollector {
    pub fn new() -> Self {
        Self
    }
}

impl FieldCollector for MaintenanceCollector {
    fn task(&self) -> TaskType {
        TaskType::MaintenanceRisk
    }

    fn persona(&self) -> &'static str {
        PERSONA
    }

    fn summarize(&self, fields: &CandidateFieldSet) -> String {
        format!(
            "**Property Information for Maintenance Prediction:**\n\n{}\nIs this information \
             correct? Please confirm to proceed with the maintenance risk assessment.",
            field_lines(self.task(), fields, str::to_owned)
        )
    }

    fn missing_message(&self, missing: &[&str]) -> String {
        format!(
            "I need the following details to predict maintenance risk: {}. Please provide them.",
            missing.join(", ")
        )
    }

    fn try_execute(
        &self,
        fields: &CandidateFieldSet,
        resources: &ResourceProvider,
    ) -> Result<Execution, ComputationError> {
        let model = resources.maintenance_model()?;
        let assessment = assess_maintenance(fields, resources.lookups(), model)?;
        Ok(Execution::from_reply(format_maintenance_reply(&assessment)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use landlord_core::compute::{ComputationError, LinearModel};
    use landlord_core::domain::fields::{CandidateFieldSet, FieldValue};
    use landlord_core::resources::{LookupTable, LookupTables, ResourceProvider};

    use super::MaintenanceCollector;
    use crate::collectors::FieldCollector;

    fn fields() -> CandidateFieldSet {
        [
            ("address", FieldValue::text("4 Elm Road")),
            ("age_years", FieldValue::Int(35)),
            ("last_service_years_ago", FieldValue::Int(3)),
            ("seasonality", FieldValue::text("Fall")),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
    }

    #[test]
    fn risk_score_is_banded() {
        let model = LinearModel::new(
            "maintenance",
            1.0,
            [("age_years", 0.2), ("last_service_years_ago", 0.5), ("seasonality_autumn", 0.25)],
        );
        let resources = ResourceProvider::empty()
            .with_lookups(LookupTables {
                address: LookupTable::from_pairs([("4 Elm Road", 7.0)]),
                ..LookupTables::default()
            })
            .with_maintenance_model(Arc::new(model));

        let execution =
            MaintenanceCollector::new().try_execute(&fields(), &resources).expect("assessed");

        assert!(execution.reply.contains("- **Predicted Maintenance Risk Score:** 9.75\n"));
        assert!(execution.reply.contains("- **Recommended Action:** Immediate Action\n"));
    }

    #[test]
    fn missing_model_is_an_error() {
        let error = MaintenanceCollector::new()
            .try_execute(&fields(), &ResourceProvider::empty())
            .expect_err("no model loaded");

        assert!(matches!(error, ComputationError::ModelUnavailable(_)));
    }

    #[test]
    fn missing_message_names_fields() {
        let message = MaintenanceCollector::new().missing_message(&["seasonality"]);
        assert_eq!(
            message,
            "I need the following details to predict maintenance risk: seasonality. Please \
             provide them."
        );
    }
}
