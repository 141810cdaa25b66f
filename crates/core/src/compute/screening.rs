use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::compute::ComputationError;
use crate::domain::fields::{format_number, CandidateFieldSet, FieldValue};

const MINIMUM_CREDIT_SCORE: i64 = 600;
const HARD_REJECT_CREDIT_SCORE: i64 = 500;
const INCOME_TO_RENT_MULTIPLE: i64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Accept,
    Review,
    Reject,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Accept => "Accept",
            Self::Review => "Review",
            Self::Reject => "Reject",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningInput {
    pub credit_score: i64,
    pub income: Decimal,
    pub rent: Decimal,
    pub employment_status: String,
    pub eviction_record: bool,
}

impl ScreeningInput {
    pub fn from_fields(fields: &CandidateFieldSet) -> Result<Self, ComputationError> {
        let credit_score = fields
            .get("credit_score")
            .and_then(FieldValue::as_f64)
            .map(|score| score.trunc() as i64)
            .unwrap_or_default();
        let income = decimal_field(fields, "income")?;
        let rent = decimal_field(fields, "rent")?;
        let employment_status = fields
            .get("employment_status")
            .map(ToString::to_string)
            .map(|status| status.trim().to_owned())
            .filter(|status| !status.is_empty())
            .unwrap_or_else(|| "unknown".to_owned());
        let eviction_record =
            fields.get("eviction_record").and_then(FieldValue::as_bool).unwrap_or(false);

        Ok(Self { credit_score, income, rent, employment_status, eviction_record })
    }
}

fn decimal_field(fields: &CandidateFieldSet, name: &str) -> Result<Decimal, ComputationError> {
    let value = fields.get(name).and_then(FieldValue::as_f64).unwrap_or_default();
    Decimal::try_from(value)
        .map_err(|error| ComputationError::InvalidInput(format!("{name} is not a number: {error}")))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub risk_score: u32,
    pub recommendation: Recommendation,
    pub explanation: Vec<String>,
}

pub trait RuleEngine: Send + Sync {
    fn screen(&self, input: &ScreeningInput) -> Result<ScreeningOutcome, ComputationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicRuleEngine;

impl RuleEngine for DeterministicRuleEngine {
    fn screen(&self, input: &ScreeningInput) -> Result<ScreeningOutcome, ComputationError> {
        if input.income < Decimal::ZERO || input.rent < Decimal::ZERO {
            return Err(ComputationError::InvalidInput(
                "income and rent cannot be negative".to_owned(),
            ));
        }
        Ok(screen_applicant(input))
    }
}

pub fn screen_applicant(input: &ScreeningInput) -> ScreeningOutcome {
    let mut explanation = Vec::new();
    let mut risk_score = 0;

    if input.credit_score < MINIMUM_CREDIT_SCORE {
        explanation.push(format!(
            "Credit score {} is below minimum ({MINIMUM_CREDIT_SCORE}).",
            input.credit_score
        ));
        risk_score += 40;
    } else {
        explanation.push(format!("Credit score {} meets minimum.", input.credit_score));
    }

    let income = money(input.income);
    let rent = money(input.rent);
    if input.income < input.rent * Decimal::from(INCOME_TO_RENT_MULTIPLE) {
        explanation.push(format!("Income (£{income}) is less than 3x rent (£{rent})."));
        risk_score += 40;
    } else {
        explanation.push(format!("Income (£{income}) is at least 3x rent (£{rent})."));
    }

    if !input.employment_status.eq_ignore_ascii_case("employed") {
        explanation.push(format!("Employment status is '{}'.", input.employment_status));
        risk_score += 10;
    } else {
        explanation.push("Employment status is employed.".to_owned());
    }

    if input.eviction_record {
        explanation.push("Prior eviction record found.".to_owned());
        risk_score += 30;
    } else {
        explanation.push("No prior eviction record.".to_owned());
    }

    let recommendation = if risk_score >= 60
        || input.credit_score < HARD_REJECT_CREDIT_SCORE
        || input.eviction_record
    {
        Recommendation::Reject
    } else if risk_score >= 30 {
        Recommendation::Review
    } else {
        Recommendation::Accept
    };

    ScreeningOutcome { risk_score, recommendation, explanation }
}

fn money(value: Decimal) -> String {
    value.to_f64().map(format_number).unwrap_or_else(|| value.normalize().to_string())
}

pub fn format_screening_reply(outcome: &ScreeningOutcome) -> String {
    let headline = match outcome.recommendation {
        Recommendation::Accept => {
            "✅ **Tenant Approved:** This applicant meets the screening criteria."
        }
        Recommendation::Review => {
            "⚠️ **Tenant Requires Further Review:** Some risk factors were detected."
        }
        Recommendation::Reject => {
            "❌ **Tenant Rejected:** This applicant does not meet the screening criteria."
        }
    };

    let mut reply = format!("{headline}\n\n**Tenant Screening Result:**\n\n");
    reply.push_str(&format!("- **Recommendation:** {}\n", outcome.recommendation));
    reply.push_str(&format!("- **Risk Score:** {}\n", outcome.risk_score));
    reply.push_str("- **Details:**\n");
    for line in &outcome.explanation {
        reply.push_str(&format!("  - {line}\n"));
    }
    reply
}
