use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compute::{ComputationError, FeatureRecord, NumericPredictor};
use crate::domain::fields::{CandidateFieldSet, FieldValue};
use crate::resources::LookupTables;

const SEASONS: [&str; 4] = ["winter", "spring", "summer", "autumn"];

const EXPLANATION: &str = "\n**How this was calculated:**\n\
The risk score is based on property age, time since last service, seasonality, and past \
maintenance history. A higher score means more urgent maintenance is likely needed.\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceAction {
    ImmediateAction,
    Monitor,
    Routine,
}

impl MaintenanceAction {
    pub fn for_score(score: f64) -> Self {
        if score > 7.0 {
            Self::ImmediateAction
        } else if score > 4.0 {
            Self::Monitor
        } else {
            Self::Routine
        }
    }
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ImmediateAction => "Immediate Action",
            Self::Monitor => "Monitor",
            Self::Routine => "Routine",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceAssessment {
    pub risk_score: f64,
    pub action: MaintenanceAction,
}

/// Autumn is stored under its British name; "fall" maps onto it.
pub fn normalize_season(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_lowercase();
    let lowered = if lowered == "fall" { "autumn".to_owned() } else { lowered };
    SEASONS.iter().copied().find(|season| *season == lowered)
}

pub fn encode_maintenance_features(
    fields: &CandidateFieldSet,
    lookups: &LookupTables,
) -> Result<FeatureRecord, ComputationError> {
    let mut features = FeatureRecord::new();

    let address = fields.get("address").map(ToString::to_string).unwrap_or_default();
    let address_code = lookups.address.encode(&address).ok_or_else(|| {
        ComputationError::ModelUnavailable("lookup table for `address` is empty".to_owned())
    })?;
    features.insert("address".to_owned(), address_code);

    for name in ["age_years", "last_service_years_ago"] {
        let value = fields.get(name).and_then(FieldValue::as_f64).unwrap_or_default();
        features.insert(name.to_owned(), value.trunc());
    }

    let season = fields.get("seasonality").map(ToString::to_string).unwrap_or_default();
    let season = normalize_season(&season).ok_or_else(|| {
        ComputationError::InvalidInput(format!("unrecognised season `{season}`"))
    })?;
    for candidate in SEASONS {
        let flag = if candidate == season { 1.0 } else { 0.0 };
        features.insert(format!("seasonality_{candidate}"), flag);
    }

    Ok(features)
}

pub fn assess_maintenance(
    fields: &CandidateFieldSet,
    lookups: &LookupTables,
    model: &dyn NumericPredictor,
) -> Result<MaintenanceAssessment, ComputationError> {
    let features = encode_maintenance_features(fields, lookups)?;
    let risk_score = model.predict(&features)?;
    Ok(MaintenanceAssessment { risk_score, action: MaintenanceAction::for_score(risk_score) })
}

pub fn format_maintenance_reply(assessment: &MaintenanceAssessment) -> String {
    format!(
        "- **Predicted Maintenance Risk Score:** {:.2}\n\
         - **Recommended Action:** {}\n{EXPLANATION}",
        assessment.risk_score, assessment.action
    )
}
