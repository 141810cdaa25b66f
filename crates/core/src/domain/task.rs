use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::fields::{FieldKind, FieldSpec};

/// The tasks the assistant can complete once their fields are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "rent_prediction", alias = "rent_estimation")]
    RentEstimation,
    #[serde(rename = "tenant_screening", alias = "applicant_screening")]
    ApplicantScreening,
    #[serde(rename = "maintenance_prediction", alias = "maintenance_risk")]
    MaintenanceRisk,
}

const RENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("address", FieldKind::Text, "The property address or location"),
    FieldSpec::new("subdistrict_code", FieldKind::Text, "The subdistrict code or postcode"),
    FieldSpec::new("BEDROOMS", FieldKind::Integer, "Number of bedrooms"),
    FieldSpec::new("BATHROOMS", FieldKind::Integer, "Number of bathrooms"),
    FieldSpec::new("SIZE", FieldKind::Float, "Size in square feet"),
    FieldSpec::new("PROPERTY TYPE", FieldKind::Text, "Property type (e.g. flat, house, apartment)"),
];

const SCREENING_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("credit_score", FieldKind::Integer, "Applicant's credit score"),
    FieldSpec::new("income", FieldKind::Float, "Applicant's monthly income"),
    FieldSpec::new("rent", FieldKind::Float, "Monthly rent for the property"),
    FieldSpec::new(
        "employment_status",
        FieldKind::Text,
        "Employment status (e.g. employed, unemployed)",
    ),
    FieldSpec::new(
        "eviction_record",
        FieldKind::Boolean,
        "True if the applicant has a prior eviction, else false",
    ),
];

const MAINTENANCE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("address", FieldKind::Text, "The property address or location"),
    FieldSpec::new("age_years", FieldKind::Integer, "Property age in years"),
    FieldSpec::new("last_service_years_ago", FieldKind::Integer, "Years since last service"),
    FieldSpec::new(
        "seasonality",
        FieldKind::Text,
        "Current season (Winter, Spring, Summer, Autumn)",
    ),
];

impl TaskType {
    pub const ALL: [TaskType; 3] =
        [TaskType::RentEstimation, TaskType::ApplicantScreening, TaskType::MaintenanceRisk];

    /// Ordered required-field schema. Summaries and prompts follow this order.
    pub fn required_fields(self) -> &'static [FieldSpec] {
        match self {
            Self::RentEstimation => RENT_FIELDS,
            Self::ApplicantScreening => SCREENING_FIELDS,
            Self::MaintenanceRisk => MAINTENANCE_FIELDS,
        }
    }

    pub fn field_spec(self, name: &str) -> Option<&'static FieldSpec> {
        self.required_fields().iter().find(|spec| spec.name == name)
    }

    pub fn owns_field(self, name: &str) -> bool {
        self.field_spec(name).is_some()
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::RentEstimation => "rent_prediction",
            Self::ApplicantScreening => "tenant_screening",
            Self::MaintenanceRisk => "maintenance_prediction",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::RentEstimation => "Rent Prediction",
            Self::ApplicantScreening => "Tenant Screening",
            Self::MaintenanceRisk => "Maintenance Prediction",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rent_prediction" | "rent_estimation" | "rent" => Ok(Self::RentEstimation),
            "tenant_screening" | "applicant_screening" | "screening" | "tenant" => {
                Ok(Self::ApplicantScreening)
            }
            "maintenance_prediction" | "maintenance_risk" | "maintenance" => {
                Ok(Self::MaintenanceRisk)
            }
            other => Err(format!("unknown task `{other}`")),
        }
    }
}
