use std::sync::LazyLock;

use landlord_core::domain::fields::{parse_number, title_case, FieldValue};
use regex::Regex;
use serde::{Deserialize, Serialize};

const PATTERN_CONFIDENCE: f64 = 0.9;
const GENERIC_CONFIDENCE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Address,
    Postcode,
    Bedrooms,
    Bathrooms,
    Size,
    PropertyType,
    CreditScore,
    Income,
    Rent,
    Number,
    Money,
}

impl EntityLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Address => "ADDRESS",
            Self::Postcode => "POSTCODE",
            Self::Bedrooms => "BEDROOMS",
            Self::Bathrooms => "BATHROOMS",
            Self::Size => "SIZE",
            Self::PropertyType => "PROPERTY_TYPE",
            Self::CreditScore => "CREDIT_SCORE",
            Self::Income => "INCOME",
            Self::Rent => "RENT",
            Self::Number => "NUMBER",
            Self::Money => "MONEY",
        }
    }

    /// Labels that carry no field meaning on their own and need the linker.
    pub fn is_generic(self) -> bool {
        matches!(self, Self::Number | Self::Money)
    }
}

/// A typed value found in user text. `start`/`end` are byte offsets into `source_context`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    pub normalized: FieldValue,
    pub source_context: String,
}

impl Entity {
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Up to `radius` bytes either side of the entity, clamped to char boundaries.
    pub fn window(&self, radius: usize) -> &str {
        let context = self.source_context.as_str();
        let mut start = self.start.saturating_sub(radius).min(context.len());
        while !context.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = self.end.saturating_add(radius).min(context.len());
        while !context.is_char_boundary(end) {
            end += 1;
        }
        context.get(start..end).unwrap_or(self.text.as_str())
    }
}

const PATTERN_SOURCES: &[(EntityLabel, &str)] = &[
    (
        EntityLabel::Address,
        r"\b\d+\s+[A-Za-z\s]+(?:Road|Rd|Street|St|Lane|Ln|Avenue|Ave|Drive|Dr|Place|Pl|Court|Ct|Way|Close|Crescent|Cres)\b",
    ),
    (EntityLabel::Address, r"\b[A-Za-z\s]+,\s*[A-Za-z\s]+,\s*[A-Z]{2,3}\s*\d{3,5}\b"),
    (EntityLabel::Postcode, r"\b[A-Z]{1,2}\d{1,2}[A-Z]?\s*\d[A-Z]{2}\b"),
    (EntityLabel::Postcode, r"\bUB\d+\b"),
    (EntityLabel::Bedrooms, r"\b(\d+)\s*(?:bed|bedroom|br)s?\b"),
    (EntityLabel::Bedrooms, r"\b(\d+)\s*b\b"),
    (EntityLabel::Bathrooms, r"\b(\d+)\s*(?:bath|bathroom)s?\b"),
    (EntityLabel::Bathrooms, r"\b(\d+)\s*ba\b"),
    (EntityLabel::Size, r"(\d+(?:\.\d+)?)\s*(?:sq\s*ft|sqft|square\s*feet|ft²)"),
    (EntityLabel::Size, r"(\d+(?:\.\d+)?)\s*(?:m²|square\s*met(?:er|re)s?)"),
    (
        EntityLabel::PropertyType,
        r"\b(?:apartment|flat|house|villa|condo|studio|maisonette|penthouse|bungalow)\b",
    ),
    (EntityLabel::CreditScore, r"credit\s*score\s*(?:is\s*|of\s*)?(\d{2,4})"),
    (EntityLabel::CreditScore, r"score\s*(?:is\s*|of\s*)?(\d{3})"),
    (EntityLabel::Income, r"£?(\d+(?:,\d{3})*(?:\.\d{2})?)\s*(?:per\s*month|monthly|/month)"),
    (EntityLabel::Income, r"income\s*(?:is\s*|of\s*)?£?(\d+(?:,\d{3})*(?:\.\d{2})?)"),
    (EntityLabel::Rent, r"rent\s*(?:is\s*|of\s*)?£?(\d+(?:,\d{3})*(?:\.\d{2})?)"),
    (EntityLabel::Rent, r"£(\d+(?:,\d{3})*(?:\.\d{2})?)\s*(?:per\s*month|monthly|/month|rent)"),
];

const GENERIC_SOURCES: &[(EntityLabel, &str)] = &[
    (EntityLabel::Money, r"£\s?\d+(?:,\d{3})*(?:\.\d+)?"),
    (EntityLabel::Money, r"\b\d+(?:,\d{3})*(?:\.\d+)?\s*(?:pounds|gbp)\b"),
    (EntityLabel::Number, r"\b\d+(?:\.\d+)?\b"),
];

struct PatternRule {
    label: EntityLabel,
    regex: Regex,
}

static PATTERN_RULES: LazyLock<Vec<PatternRule>> =
    LazyLock::new(|| compile_rules(PATTERN_SOURCES));
static GENERIC_RULES: LazyLock<Vec<PatternRule>> =
    LazyLock::new(|| compile_rules(GENERIC_SOURCES));

fn compile_rules(sources: &[(EntityLabel, &str)]) -> Vec<PatternRule> {
    sources
        .iter()
        .filter_map(|(label, source)| match Regex::new(&format!("(?i){source}")) {
            Ok(regex) => Some(PatternRule { label: *label, regex }),
            Err(error) => {
                tracing::error!(
                    event_name = "extraction.pattern.invalid",
                    label = label.as_str(),
                    error = %error,
                    "skipping entity pattern that failed to compile"
                );
                None
            }
        })
        .collect()
}

/// Pattern and generic-number entity extraction. Stateless; one instance serves every turn.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> Vec<Entity> {
        self.extract_with_context(text, text)
    }

    /// Entities in `text`, each remembering `context` for later disambiguation.
    ///
    /// `context` should contain `text` at the same offsets (usually it is the same message).
    pub fn extract_with_context(&self, text: &str, context: &str) -> Vec<Entity> {
        let mut entities = Vec::new();
        collect_matches(&PATTERN_RULES, PATTERN_CONFIDENCE, text, context, &mut entities);
        collect_matches(&GENERIC_RULES, GENERIC_CONFIDENCE, text, context, &mut entities);
        deduplicate(entities)
    }
}

fn collect_matches(
    rules: &[PatternRule],
    confidence: f64,
    text: &str,
    context: &str,
    entities: &mut Vec<Entity>,
) {
    for rule in rules {
        for captures in rule.regex.captures_iter(text) {
            let Some(found) = captures.get(1).or_else(|| captures.get(0)) else {
                continue;
            };
            let raw = found.as_str().trim();
            if raw.is_empty() {
                continue;
            }
            entities.push(Entity {
                text: raw.to_owned(),
                label: rule.label,
                start: found.start(),
                end: found.end(),
                confidence,
                normalized: normalize(rule.label, raw),
                source_context: context.to_owned(),
            });
        }
    }
}

/// Canonical value for an entity's raw text.
pub fn normalize(label: EntityLabel, raw: &str) -> FieldValue {
    let raw = raw.trim();
    let normalized = match label {
        EntityLabel::Bedrooms | EntityLabel::Bathrooms | EntityLabel::CreditScore => {
            parse_number(raw).map(|n| FieldValue::Int(n.trunc() as i64))
        }
        EntityLabel::Size | EntityLabel::Income | EntityLabel::Rent | EntityLabel::Money => {
            parse_number(raw).map(FieldValue::Float)
        }
        EntityLabel::Number => parse_number(raw).map(|n| {
            if n.fract() == 0.0 {
                FieldValue::Int(n as i64)
            } else {
                FieldValue::Float(n)
            }
        }),
        EntityLabel::Postcode => {
            let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
            Some(FieldValue::Text(compact.to_uppercase()))
        }
        EntityLabel::PropertyType => Some(FieldValue::Text(raw.to_lowercase())),
        EntityLabel::Address => Some(FieldValue::Text(title_case(raw))),
    };
    normalized.unwrap_or_else(|| FieldValue::text(raw))
}

/// Sorted by start; an overlapping entity only displaces the kept one with a strictly
/// higher confidence.
pub fn deduplicate(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by_key(|entity| entity.start);
    let mut kept: Vec<Entity> = Vec::with_capacity(entities.len());
    for entity in entities {
        match kept.last_mut() {
            Some(last) if last.overlaps(&entity) => {
                if entity.confidence > last.confidence {
                    *last = entity;
                }
            }
            _ => kept.push(entity),
        }
    }
    kept
}

/// Short `LABEL=value` listing used in prompts.
pub fn describe_entities(entities: &[Entity]) -> String {
    entities
        .iter()
        .map(|entity| format!("{}={}", entity.label.as_str(), entity.normalized))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use landlord_core::domain::fields::FieldValue;

    use super::{
        deduplicate, describe_entities, Entity, EntityExtractor, EntityLabel, GENERIC_RULES,
        GENERIC_SOURCES, PATTERN_RULES, PATTERN_SOURCES,
    };

    fn labels(text: &str) -> Vec<(EntityLabel, String)> {
        EntityExtractor::new()
            .extract(text)
            .into_iter()
            .map(|entity| (entity.label, entity.text))
            .collect()
    }

    fn entity(label: EntityLabel, start: usize, end: usize, confidence: f64) -> Entity {
        Entity {
            text: "x".repeat(end - start),
            label,
            start,
            end,
            confidence,
            normalized: FieldValue::Int(0),
            source_context: String::new(),
        }
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(PATTERN_RULES.len(), PATTERN_SOURCES.len());
        assert_eq!(GENERIC_RULES.len(), GENERIC_SOURCES.len());
    }

    #[test]
    fn rent_details_are_labelled() {
        let found = labels("2 bed flat, 800 sq ft, 1 bath");

        assert!(found.contains(&(EntityLabel::Bedrooms, "2".to_owned())));
        assert!(found.contains(&(EntityLabel::PropertyType, "flat".to_owned())));
        assert!(found.contains(&(EntityLabel::Size, "800".to_owned())));
        assert!(found.contains(&(EntityLabel::Bathrooms, "1".to_owned())));
        assert!(found.iter().all(|(label, _)| *label != EntityLabel::Number));
    }

    #[test]
    fn screening_amounts_use_capture_groups() {
        let entities =
            EntityExtractor::new().extract("credit score is 720 and rent of £1,200");
        let credit = entities
            .iter()
            .find(|entity| entity.label == EntityLabel::CreditScore)
            .expect("credit score");
        let rent = entities.iter().find(|entity| entity.label == EntityLabel::Rent).expect("rent");

        assert_eq!(credit.normalized, FieldValue::Int(720));
        assert_eq!(rent.text, "1,200");
        assert_eq!(rent.normalized, FieldValue::Float(1200.0));
        assert_eq!(&credit.source_context[credit.start..credit.end], "720");
    }

    #[test]
    fn postcode_and_address_are_normalized() {
        let entities = EntityExtractor::new().extract("It is at 12 baker street, nw1 6xe");
        let postcode = entities
            .iter()
            .find(|entity| entity.label == EntityLabel::Postcode)
            .expect("postcode");
        let address = entities
            .iter()
            .find(|entity| entity.label == EntityLabel::Address)
            .expect("address");

        assert_eq!(postcode.normalized, FieldValue::text("NW16XE"));
        assert_eq!(address.normalized, FieldValue::text("12 Baker Street"));
    }

    #[test]
    fn bare_numbers_fall_back_to_generic_labels() {
        let entities = EntityExtractor::new().extract("it has 3");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].label, EntityLabel::Number);
        assert_eq!(entities[0].confidence, 0.8);
        assert_eq!(entities[0].normalized, FieldValue::Int(3));
    }

    #[test]
    fn overlap_keeps_the_higher_confidence_entity() {
        let kept = deduplicate(vec![
            entity(EntityLabel::Number, 0, 4, 0.8),
            entity(EntityLabel::Rent, 1, 4, 0.9),
            entity(EntityLabel::Money, 2, 6, 0.9),
            entity(EntityLabel::Bedrooms, 10, 11, 0.9),
        ]);

        let labels: Vec<EntityLabel> = kept.iter().map(|entity| entity.label).collect();
        assert_eq!(labels, vec![EntityLabel::Rent, EntityLabel::Bedrooms]);
    }

    #[test]
    fn window_respects_char_boundaries() {
        let context = "£££ rent 1200 £££".to_owned();
        let start = context.find("1200").expect("offset");
        let entity = Entity {
            start,
            end: start + 4,
            source_context: context.clone(),
            ..entity(EntityLabel::Number, 0, 4, 0.8)
        };

        assert_eq!(entity.window(2), "t 1200 £");
        assert_eq!(entity.window(100), context);
    }

    #[test]
    fn entities_are_described_for_prompts() {
        let entities = EntityExtractor::new().extract("3 bedrooms");
        assert_eq!(describe_entities(&entities), "BEDROOMS=3");
    }
}
