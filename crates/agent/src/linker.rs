use std::collections::BTreeMap;

use landlord_core::domain::fields::{CandidateFieldSet, FieldValue};
use landlord_core::domain::task::TaskType;

use crate::extraction::{Entity, EntityLabel};
use crate::intent::{Intent, IntentKind};

const CONTEXT_RADIUS: usize = 50;

/// Context words that pin a bare number to a field, checked in order.
const CONTEXT_CLUES: &[(&[&str], &str)] = &[
    (&["bed", "bedroom", "br"], "BEDROOMS"),
    (&["bath", "bathroom"], "BATHROOMS"),
    (&["sq ft", "sqft", "square feet", "size"], "SIZE"),
    (&["credit", "score"], "credit_score"),
    (&["income", "salary", "earn"], "income"),
    (&["rent", "monthly", "£"], "rent"),
];

pub fn field_for_label(label: EntityLabel) -> Option<&'static str> {
    match label {
        EntityLabel::Address => Some("address"),
        EntityLabel::Postcode => Some("subdistrict_code"),
        EntityLabel::Bedrooms => Some("BEDROOMS"),
        EntityLabel::Bathrooms => Some("BATHROOMS"),
        EntityLabel::Size => Some("SIZE"),
        EntityLabel::PropertyType => Some("PROPERTY TYPE"),
        EntityLabel::CreditScore => Some("credit_score"),
        EntityLabel::Income => Some("income"),
        EntityLabel::Rent => Some("rent"),
        EntityLabel::Number | EntityLabel::Money => None,
    }
}

/// Maps extracted entities onto task field names.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityLinker;

impl EntityLinker {
    pub fn new() -> Self {
        Self
    }

    /// `accumulated` plus whatever the entities resolve to.
    ///
    /// Carried-over values hold no confidence, so any resolved entity replaces them; within
    /// one call a field only changes hands to a strictly more confident entity. An entity
    /// whose value reads as missing once coerced to the field's kind is ignored, so a stray
    /// "0.5" never clears a filled count.
    pub fn link(
        &self,
        entities: &[Entity],
        intents: &[Intent],
        accumulated: &CandidateFieldSet,
    ) -> CandidateFieldSet {
        let primary = intents.first().map(|intent| intent.kind);
        let mut linked: BTreeMap<&'static str, (FieldValue, f64)> = BTreeMap::new();

        for entity in entities {
            let Some(field) = self.resolve(entity, primary) else {
                continue;
            };
            if !fills_field(field, &entity.normalized) {
                continue;
            }
            let replace = linked
                .get(field)
                .map_or(true, |(_, confidence)| entity.confidence > *confidence);
            if replace {
                linked.insert(field, (entity.normalized.clone(), entity.confidence));
            }
        }

        let mut fields = accumulated.clone();
        for (field, (value, _)) in linked {
            fields.insert(field, value);
        }
        fields
    }

    pub fn resolve(&self, entity: &Entity, primary: Option<IntentKind>) -> Option<&'static str> {
        if let Some(field) = field_for_label(entity.label) {
            return Some(field);
        }
        let window = entity.window(CONTEXT_RADIUS).to_lowercase();
        CONTEXT_CLUES
            .iter()
            .find(|(words, _)| words.iter().any(|word| window.contains(word)))
            .map(|(_, field)| *field)
            .or_else(|| resolve_by_intent(entity, primary?))
    }
}

fn fills_field(field: &str, value: &FieldValue) -> bool {
    TaskType::ALL
        .iter()
        .find_map(|task| task.field_spec(field))
        .map_or_else(|| value.is_filled(), |spec| {
            value.coerce(spec.kind).is_some_and(|coerced| coerced.is_filled())
        })
}

fn resolve_by_intent(entity: &Entity, primary: IntentKind) -> Option<&'static str> {
    let value = entity.normalized.as_f64()?;
    match primary {
        IntentKind::RentEstimation if value < 10.0 => Some("BEDROOMS"),
        IntentKind::RentEstimation if value < 20.0 => Some("BATHROOMS"),
        IntentKind::RentEstimation if value > 100.0 => Some("SIZE"),
        IntentKind::ApplicantScreening if (300.0..=850.0).contains(&value) => Some("credit_score"),
        IntentKind::ApplicantScreening if value > 1000.0 => Some("income"),
        IntentKind::ApplicantScreening => Some("rent"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use landlord_core::domain::fields::{CandidateFieldSet, FieldValue};
    use landlord_core::domain::task::TaskType;

    use super::EntityLinker;
    use crate::extraction::{Entity, EntityExtractor, EntityLabel};
    use crate::intent::{Intent, IntentKind, IntentSource};

    fn intents(kind: IntentKind) -> Vec<Intent> {
        vec![Intent {
            kind,
            confidence: 0.9,
            source: IntentSource::Keyword,
            supporting_entities: Vec::new(),
        }]
    }

    fn link(text: &str, kind: IntentKind) -> CandidateFieldSet {
        let entities = EntityExtractor::new().extract(text);
        EntityLinker::new().link(&entities, &intents(kind), &CandidateFieldSet::new())
    }

    #[test]
    fn bare_number_under_rent_intent_is_bedrooms() {
        let fields = link("it has 3", IntentKind::RentEstimation);
        assert_eq!(fields.get("BEDROOMS"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn bare_numbers_use_rent_ranges() {
        let rent = IntentKind::RentEstimation;
        assert_eq!(link("12", rent).get("BATHROOMS"), Some(&FieldValue::Int(12)));
        assert_eq!(link("950", rent).get("SIZE"), Some(&FieldValue::Int(950)));
        assert!(link("50", rent).is_empty());
    }

    #[test]
    fn bare_numbers_use_screening_ranges() {
        assert!(link("700", IntentKind::ApplicantScreening).contains("credit_score"));
        assert!(link("4500", IntentKind::ApplicantScreening).contains("income"));
        assert!(link("250", IntentKind::ApplicantScreening).contains("rent"));
    }

    #[test]
    fn surrounding_words_beat_intent_ranges() {
        let fields = link("they earn 2500 a month", IntentKind::RentEstimation);
        assert_eq!(fields.get("income"), Some(&FieldValue::Int(2500)));
        assert!(!fields.contains("SIZE"));
    }

    #[test]
    fn labelled_entities_map_directly() {
        let fields = link("2 bed flat, 800 sq ft, nw1 6xe", IntentKind::RentEstimation);

        assert_eq!(fields.get("BEDROOMS"), Some(&FieldValue::Int(2)));
        assert_eq!(fields.get("SIZE"), Some(&FieldValue::Float(800.0)));
        assert_eq!(fields.get("PROPERTY TYPE"), Some(&FieldValue::text("flat")));
        assert_eq!(fields.get("subdistrict_code"), Some(&FieldValue::text("NW16XE")));
    }

    #[test]
    fn fractional_number_never_clears_a_filled_count() {
        let entities = EntityExtractor::new().extract("it is 0.5 miles from the station");
        let mut accumulated = CandidateFieldSet::new();
        accumulated.insert("BEDROOMS", FieldValue::Int(2));

        let fields = EntityLinker::new().link(
            &entities,
            &intents(IntentKind::RentEstimation),
            &accumulated,
        );

        assert_eq!(fields.get("BEDROOMS"), Some(&FieldValue::Int(2)));
        let scoped = fields.scoped_to(TaskType::RentEstimation);
        assert_eq!(scoped.get("BEDROOMS"), Some(&FieldValue::Int(2)));
    }

    #[test]
    fn stronger_entity_wins_and_accumulated_values_survive() {
        let context = "3 bedrooms or maybe 4".to_owned();
        let weak = Entity {
            text: "4".to_owned(),
            label: EntityLabel::Number,
            start: 20,
            end: 21,
            confidence: 0.8,
            normalized: FieldValue::Int(4),
            source_context: context.clone(),
        };
        let strong = Entity {
            text: "3".to_owned(),
            label: EntityLabel::Bedrooms,
            start: 0,
            end: 1,
            confidence: 0.9,
            normalized: FieldValue::Int(3),
            source_context: context,
        };
        let mut accumulated = CandidateFieldSet::new();
        accumulated.insert("address", FieldValue::text("12 Baker Street"));
        accumulated.insert("BEDROOMS", FieldValue::Int(1));

        let fields = EntityLinker::new().link(
            &[strong, weak],
            &intents(IntentKind::RentEstimation),
            &accumulated,
        );

        assert_eq!(fields.get("BEDROOMS"), Some(&FieldValue::Int(3)));
        assert_eq!(fields.get("address"), Some(&FieldValue::text("12 Baker Street")));
        assert!(fields.missing(TaskType::RentEstimation).contains(&"SIZE"));
    }
}
