//! Deterministic computations run once a task's fields are confirmed.
//!
//! Each task turns its confirmed [`CandidateFieldSet`](crate::domain::fields::CandidateFieldSet)
//! into a formatted reply. Numeric models sit behind [`NumericPredictor`] so the trained
//! artefacts can be swapped without touching the dialogue code.

pub mod maintenance;
pub mod rent;
pub mod screening;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComputationError {
    #[error("invalid computation input: {0}")]
    InvalidInput(String),
    #[error("model `{0}` is not available")]
    ModelUnavailable(String),
    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Encoded model input keyed by feature name.
pub type FeatureRecord = BTreeMap<String, f64>;

pub trait NumericPredictor: Send + Sync {
    fn model_id(&self) -> &str;
    fn predict(&self, features: &FeatureRecord) -> Result<f64, ComputationError>;
}

/// Linear model exported as JSON: `{"model_id", "intercept", "weights": {feature: w}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub model_id: String,
    pub intercept: f64,
    pub weights: BTreeMap<String, f64>,
}

impl LinearModel {
    pub fn new(
        model_id: impl Into<String>,
        intercept: f64,
        weights: impl IntoIterator<Item = (&'static str, f64)>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            intercept,
            weights: weights.into_iter().map(|(name, weight)| (name.to_owned(), weight)).collect(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ComputationError> {
        serde_json::from_str(raw)
            .map_err(|error| ComputationError::InvalidInput(format!("model json: {error}")))
    }

    pub fn from_path(path: &Path) -> Result<Self, ComputationError> {
        let raw = fs::read_to_string(path).map_err(|error| {
            ComputationError::ModelUnavailable(format!("{}: {error}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

impl NumericPredictor for LinearModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn predict(&self, features: &FeatureRecord) -> Result<f64, ComputationError> {
        let mut total = self.intercept;
        for (feature, weight) in &self.weights {
            let value = features.get(feature).ok_or_else(|| {
                ComputationError::InvalidInput(format!("missing feature `{feature}`"))
            })?;
            total += weight * value;
        }
        if total.is_finite() {
            Ok(total)
        } else {
            Err(ComputationError::Prediction(format!(
                "model `{}` produced a non-finite value",
                self.model_id
            )))
        }
    }
}
