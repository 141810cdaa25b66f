//! Fallback field extraction used when a completion reply does not fit the task schema.
//!
//! Three passes, all keyed on the task's required fields: free-text synonyms
//! (`credit score: 720`), markdown summary lines (`- **Bedrooms**: 2`) and a handful of
//! task-specific phrasings such as "built 40 years ago".

use std::collections::BTreeMap;
use std::sync::LazyLock;

use landlord_core::domain::fields::{CandidateFieldSet, FieldKind, FieldSpec, FieldValue};
use landlord_core::domain::task::TaskType;
use regex::Regex;

type SynonymEntries = &'static [(&'static str, &'static [&'static str])];

const RENT_SYNONYMS: SynonymEntries = &[
    ("address", &["address", "location", "property address"]),
    ("subdistrict_code", &["subdistrict code", "code", "postcode", "postal code"]),
    ("BEDROOMS", &["bedrooms", "beds", "bed"]),
    ("BATHROOMS", &["bathrooms", "washroom", "baths", "bath"]),
    ("SIZE", &["size", "area", "square feet", "sq ft", "sqft"]),
    ("PROPERTY TYPE", &["property type", "type", "apartment", "house", "flat"]),
];

const SCREENING_SYNONYMS: SynonymEntries = &[
    ("credit_score", &["credit score", "credit rating", "score"]),
    ("income", &["income", "salary", "monthly income"]),
    ("rent", &["rent", "monthly rent", "expected rent", "property rent", "asking rent"]),
    (
        "employment_status",
        &[
            "employment status",
            "job",
            "occupation",
            "employed",
            "unemployed",
            "self-employed",
            "work status",
        ],
    ),
    (
        "eviction_record",
        &[
            "eviction record",
            "prior eviction",
            "evicted",
            "has eviction",
            "any eviction",
            "eviction",
            "has prior eviction",
            "previous eviction",
            "eviction history",
        ],
    ),
];

const MAINTENANCE_SYNONYMS: SynonymEntries = &[
    ("address", &["address", "property address", "location"]),
    ("age_years", &["age", "property age", "years old"]),
    (
        "last_service_years_ago",
        &["last service", "last serviced", "last maintenance", "time since last service"],
    ),
    ("seasonality", &["seasonality", "season", "current season"]),
];

const MARKDOWN_FIELD_PATTERN: &str =
    r"(?i)(?:^|\n)[\-\d\.\*\s]*\*?\*?([A-Za-z0-9_\s]+?)\*?\*?\s*[:：]\s*([\w\-,.\/()'’\s]+)";

const ADDRESS_TAIL: &str = r"(?:,| constructed| built| last service| last serviced|\.|$)";

struct SynonymRule {
    field: &'static str,
    regex: Regex,
}

static SYNONYM_RULES: LazyLock<BTreeMap<TaskType, Vec<SynonymRule>>> = LazyLock::new(|| {
    TaskType::ALL
        .into_iter()
        .map(|task| {
            let rules = SynonymTable::for_task(task)
                .entries
                .iter()
                .flat_map(|(field, synonyms)| synonyms.iter().map(move |syn| (*field, *syn)))
                .filter_map(|(field, synonym)| {
                    let source = format!(
                        r"(?i)\b(?:{})\s*[:=\-]?\s*(\d[\d,]*\.?\d*|[\w\s,.'’\-]+)",
                        regex::escape(synonym)
                    );
                    compile(&source).map(|regex| SynonymRule { field, regex })
                })
                .collect();
            (task, rules)
        })
        .collect()
});

static MARKDOWN_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(MARKDOWN_FIELD_PATTERN));

static MAINTENANCE_FALLBACKS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("address", format!(r"(?i)property (?:at|on|in)?\s*([A-Za-z0-9,\- ]+?){ADDRESS_TAIL}")),
        ("address", format!(r"(?i)at ([A-Za-z0-9,\- ]+?){ADDRESS_TAIL}")),
        ("age_years", r"(?i)(?:constructed|built)\s*(\d{1,3})\s*years? ago".to_owned()),
        (
            "last_service_years_ago",
            r"(?i)last (?:service|serviced|maintenance)[^\d]*(\d{1,3})\s*years? ago".to_owned(),
        ),
        ("seasonality", r"(?i)this (winter|spring|summer|autumn|fall)".to_owned()),
    ]
    .into_iter()
    .filter_map(|(field, source)| compile(&source).map(|regex| (field, regex)))
    .collect()
});

fn compile(source: &str) -> Option<Regex> {
    match Regex::new(source) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::error!(
                event_name = "extraction.synonym_pattern.invalid",
                pattern = source,
                error = %error,
                "skipping fallback pattern that failed to compile"
            );
            None
        }
    }
}

/// Field-name synonyms for one task.
#[derive(Clone, Copy, Debug)]
pub struct SynonymTable {
    task: TaskType,
    entries: SynonymEntries,
}

impl SynonymTable {
    pub fn for_task(task: TaskType) -> Self {
        let entries = match task {
            TaskType::RentEstimation => RENT_SYNONYMS,
            TaskType::ApplicantScreening => SCREENING_SYNONYMS,
            TaskType::MaintenanceRisk => MAINTENANCE_SYNONYMS,
        };
        Self { task, entries }
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    /// Canonical field for a free-form label such as `Postal Code` or `no. of beds`.
    pub fn canonical_for(&self, raw_label: &str) -> Option<&'static str> {
        let label = raw_label.trim().to_lowercase().replace('_', " ");
        if label.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(field, synonyms)| {
                field.to_lowercase().replace('_', " ") == label
                    || synonyms.iter().any(|synonym| label.contains(synonym))
            })
            .map(|(field, _)| *field)
    }

    /// `synonym [:=-] value` mentions. The first usable mention of each field wins.
    pub fn scan_synonyms(&self, text: &str) -> CandidateFieldSet {
        let mut fields = CandidateFieldSet::new();
        let Some(rules) = SYNONYM_RULES.get(&self.task) else {
            return fields;
        };
        for rule in rules {
            if fields.contains(rule.field) {
                continue;
            }
            let Some(spec) = self.task.field_spec(rule.field) else {
                continue;
            };
            let value = rule
                .regex
                .captures_iter(text)
                .filter_map(|captures| captures.get(1))
                .find_map(|found| field_value(spec, found.as_str()));
            if let Some(value) = value {
                fields.insert(rule.field, value);
            }
        }
        fields
    }

    /// `**Label**: value` lines, as found in summaries the assistant produced earlier.
    /// Matched line by line; later lines overwrite earlier ones.
    pub fn scan_markdown(&self, text: &str) -> CandidateFieldSet {
        let mut fields = CandidateFieldSet::new();
        let Some(pattern) = MARKDOWN_FIELD.as_ref() else {
            return fields;
        };
        for captures in text.lines().filter_map(|line| pattern.captures(line)) {
            let (Some(label), Some(raw)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let Some(field) = self.canonical_for(label.as_str()) else {
                continue;
            };
            let Some(spec) = self.task.field_spec(field) else {
                continue;
            };
            if let Some(value) = field_value(spec, raw.as_str()) {
                fields.insert(field, value);
            }
        }
        fields
    }

    /// Task-specific phrasings that neither synonyms nor entities pick up.
    pub fn scan_phrasings(&self, text: &str) -> CandidateFieldSet {
        let mut fields = CandidateFieldSet::new();
        if self.task != TaskType::MaintenanceRisk {
            return fields;
        }
        for (field, regex) in MAINTENANCE_FALLBACKS.iter() {
            if fields.is_filled(field) {
                continue;
            }
            let Some(spec) = self.task.field_spec(field) else {
                continue;
            };
            let raw = regex.captures(text).and_then(|captures| captures.get(1));
            if let Some(value) = raw.and_then(|raw| field_value(spec, raw.as_str())) {
                fields.insert(*field, value);
            }
        }
        if let Some(FieldValue::Text(season)) = fields.get("seasonality").cloned() {
            fields.insert("seasonality", FieldValue::Text(capitalize(&season)));
        }
        fields
    }

    /// Every fallback pass over `text`, later passes filling only what earlier ones missed.
    pub fn scan(&self, text: &str) -> CandidateFieldSet {
        let mut fields = self.scan_markdown(text);
        for pass in [self.scan_synonyms(text), self.scan_phrasings(text)] {
            for (name, value) in pass.iter() {
                if !fields.is_filled(name) {
                    fields.insert(name, value.clone());
                }
            }
        }
        fields
    }
}

/// Eviction answers are free text; negations read as no record.
pub fn eviction_flag(raw: &str) -> bool {
    FieldValue::text(raw)
        .coerce(FieldKind::Boolean)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

fn field_value(spec: &FieldSpec, raw: &str) -> Option<FieldValue> {
    let line = raw.lines().next().unwrap_or_default();
    let cleaned = line.trim().trim_end_matches(['.', ',']).trim();
    if cleaned.is_empty() {
        return None;
    }
    let value = match spec.kind {
        FieldKind::Boolean => FieldValue::Bool(eviction_flag(cleaned)),
        FieldKind::Integer | FieldKind::Float => {
            let digits = cleaned.trim_start_matches('£');
            if !digits.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
                return None;
            }
            FieldValue::text(cleaned).coerce(spec.kind)?
        }
        FieldKind::Text if spec.name == "address" => FieldValue::text(cleaned),
        FieldKind::Text => {
            let first = cleaned.split(',').next().unwrap_or(cleaned);
            FieldValue::text(first.trim())
        }
    };
    value.is_filled().then_some(value)
}

fn capitalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
