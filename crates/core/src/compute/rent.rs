use serde::{Deserialize, Serialize};

use crate::compute::{ComputationError, FeatureRecord, NumericPredictor};
use crate::domain::fields::{format_number, CandidateFieldSet, FieldValue};
use crate::resources::LookupTables;

/// Hold-out RMSE of the rent model, in pounds.
pub const RENT_MODEL_RMSE: f64 = 1039.64;

const ONE_LINER: &str =
    "\n_This estimate is based on your property's size, features, and location._\n";
const EXPLANATION: &str = "\n**How this was calculated:**\n\
The suggested rent is determined by analyzing your property's size, number of bedrooms and \
bathrooms, type, and how close it is to public transport. Properties with more space, more \
rooms, and better access to stations generally command higher rents. The confidence score \
reflects how closely your property matches similar listings in the area.\n";
const FOLLOW_UPS: &str = "\n---\nWould you like to:\n\
- Compare this to similar listings nearby? (Reply or click: compare)\n\
- Save this property? (Reply or click: save)\n";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RentEstimate {
    pub monthly_rent: i64,
    pub lower: i64,
    pub upper: i64,
    pub confidence_pct: f64,
}

impl RentEstimate {
    /// The model predicts `ln(1 + rent)`.
    pub fn from_log_prediction(log_rent: f64) -> Result<Self, ComputationError> {
        let rent = log_rent.exp_m1();
        if !rent.is_finite() || rent <= 0.0 {
            return Err(ComputationError::Prediction(format!(
                "rent model returned an unusable value ({log_rent})"
            )));
        }
        let confidence = (1.0 - RENT_MODEL_RMSE / rent).max(0.0);
        Ok(Self {
            monthly_rent: rent.trunc() as i64,
            lower: (rent - 0.10 * rent).trunc() as i64,
            upper: (rent + 0.10 * rent).trunc() as i64,
            confidence_pct: (confidence * 10_000.0).round() / 100.0,
        })
    }
}

/// Turns collected rent fields into the model's numeric features.
pub fn encode_rent_features(
    fields: &CandidateFieldSet,
    lookups: &LookupTables,
) -> Result<FeatureRecord, ComputationError> {
    let mut features = FeatureRecord::new();
    for (name, table) in [
        ("address", &lookups.address),
        ("subdistrict_code", &lookups.subdistrict_code),
        ("PROPERTY TYPE", &lookups.property_type),
    ] {
        let label = fields.get(name).map(ToString::to_string).unwrap_or_default();
        let code = table.encode(&label).ok_or_else(|| {
            ComputationError::ModelUnavailable(format!("lookup table for `{name}` is empty"))
        })?;
        features.insert(name.to_owned(), code);
    }
    for name in ["BEDROOMS", "BATHROOMS", "SIZE"] {
        let value = fields.get(name).and_then(FieldValue::as_f64).unwrap_or_default();
        features.insert(name.to_owned(), value);
    }
    Ok(features)
}

pub fn estimate_rent(
    fields: &CandidateFieldSet,
    lookups: &LookupTables,
    model: &dyn NumericPredictor,
) -> Result<RentEstimate, ComputationError> {
    let features = encode_rent_features(fields, lookups)?;
    let log_rent = model.predict(&features)?;
    RentEstimate::from_log_prediction(log_rent)
}

pub fn format_rent_reply(estimate: &RentEstimate) -> String {
    let summary = format!(
        "- **Estimated Monthly Rent:** £{}\n- **Suggested Range:** £{}–£{}\n\
         - **Confidence Level:** {}%\n",
        estimate.monthly_rent,
        estimate.lower,
        estimate.upper,
        format_number(estimate.confidence_pct)
    );
    format!("{summary}{ONE_LINER}{EXPLANATION}{FOLLOW_UPS}")
}

/// An executed rent estimate together with the fields it was computed from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub fields: CandidateFieldSet,
    pub estimate: RentEstimate,
}

impl PredictionRecord {
    pub fn new(fields: CandidateFieldSet, estimate: RentEstimate) -> Self {
        Self { fields, estimate }
    }

    fn field_text(&self, name: &str) -> String {
        self.fields.get(name).map(ToString::to_string).unwrap_or_default()
    }

    /// One-line description used as the similarity search query.
    pub fn to_query_text(&self) -> String {
        format!(
            "{} bedroom {} in {}, {} sq ft, {} bathrooms, £{}/month",
            self.field_text("BEDROOMS"),
            self.field_text("PROPERTY TYPE"),
            self.field_text("subdistrict_code"),
            self.field_text("SIZE"),
            self.field_text("BATHROOMS"),
            self.estimate.monthly_rent
        )
    }
}
