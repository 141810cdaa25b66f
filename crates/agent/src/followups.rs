//! Actions offered after a rent estimate: compare it with nearby listings, save it, or both.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use landlord_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use landlord_core::compute::rent::PredictionRecord;
use landlord_core::domain::fields::{format_number, CandidateFieldSet, FieldValue};
use landlord_core::domain::outcome::{TaskResult, TurnAction};
use landlord_core::resources::{ComparableListing, ResourceProvider};

use crate::collectors::RentCollector;

pub const COMPARABLE_LIMIT: usize = 5;
const SIZE_TOLERANCE: f64 = 0.20;

const SAVED: &str = "✅ Property and prediction saved!";
const SAVE_FAILED: &str = "Sorry, I couldn't save this property just now. Please try again.";
const NO_COMPARABLES: &str = "No similar listings found nearby.";
const ESTIMATE_UNAVAILABLE: &str =
    "Sorry, I couldn't retrieve that estimate again. Please start a new rent estimation.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowUpAction {
    Compare,
    Save,
    Both,
}

impl FollowUpAction {
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim().to_lowercase().as_str() {
            "compare" => Some(Self::Compare),
            "save" => Some(Self::Save),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compare => "compare",
            Self::Save => "save",
            Self::Both => "both",
        }
    }
}

#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<ComparableListing>>;
}

/// Ranks listings by how many words their description shares with the query.
pub struct KeywordSimilaritySearch {
    listings: Vec<ComparableListing>,
}

impl KeywordSimilaritySearch {
    pub fn new(listings: Vec<ComparableListing>) -> Self {
        Self { listings }
    }
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn describe(listing: &ComparableListing) -> String {
    format!(
        "{} bedroom {} in {}, {} sq ft, {} bathrooms, £{}/month",
        listing.bedrooms,
        listing.property_type,
        listing.subdistrict_code,
        format_number(listing.size),
        listing.bathrooms,
        format_number(listing.rent)
    )
}

#[async_trait]
impl SimilaritySearch for KeywordSimilaritySearch {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<ComparableListing>> {
        let query = tokens(query_text);
        let mut scored: Vec<(usize, &ComparableListing)> = self
            .listings
            .iter()
            .map(|listing| (tokens(&describe(listing)).intersection(&query).count(), listing))
            .filter(|(overlap, _)| *overlap > 0)
            .collect();
        scored.sort_by(|left, right| right.0.cmp(&left.0));
        Ok(scored.into_iter().take(top_k).map(|(_, listing)| listing.clone()).collect())
    }
}

pub trait RecordStore: Send + Sync {
    fn save(&self, record: PredictionRecord) -> Result<()>;
}

pub const DEFAULT_RECORD_CAPACITY: usize = 1_000;

/// Process-local store holding the most recent saves. Once `capacity` is reached the oldest
/// record is dropped, so a long-running server stays bounded; nothing survives a restart.
pub struct InMemoryRecordStore {
    records: Mutex<VecDeque<PredictionRecord>>,
    capacity: usize,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECORD_CAPACITY)
    }
}

impl InMemoryRecordStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { records: Mutex::new(VecDeque::new()), capacity: capacity.max(1) }
    }

    /// Oldest first.
    pub fn records(&self) -> Vec<PredictionRecord> {
        match self.records.lock() {
            Ok(records) => records.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn save(&self, record: PredictionRecord) -> Result<()> {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        if records.len() >= self.capacity {
            records.pop_front();
            tracing::debug!(
                event_name = "dialogue.follow_up.record_evicted",
                capacity = self.capacity,
                "record store full, dropped the oldest saved prediction"
            );
        }
        records.push_back(record);
        Ok(())
    }
}

/// Listings in the same subdistrict with the same property type, one bedroom either way and
/// a size within 20%.
pub fn local_comparables<'a>(
    listings: &'a [ComparableListing],
    fields: &CandidateFieldSet,
) -> Vec<&'a ComparableListing> {
    let text = |name: &str| fields.get(name).and_then(FieldValue::as_str).unwrap_or_default();
    let number = |name: &str| fields.get(name).and_then(FieldValue::as_f64).unwrap_or_default();
    let subdistrict = compact(text("subdistrict_code"));
    let property_type = text("PROPERTY TYPE");
    let bedrooms = number("BEDROOMS");
    let size = number("SIZE");

    listings
        .iter()
        .filter(|listing| compact(&listing.subdistrict_code) == subdistrict)
        .filter(|listing| listing.property_type.eq_ignore_ascii_case(property_type))
        .filter(|listing| (f64::from(listing.bedrooms) - bedrooms).abs() <= 1.0)
        .filter(|listing| (listing.size - size).abs() <= size * SIZE_TOLERANCE)
        .take(COMPARABLE_LIMIT)
        .collect()
}

fn compact(code: &str) -> String {
    code.chars().filter(|ch| !ch.is_whitespace()).collect::<String>().to_uppercase()
}

fn listing_line(listing: &ComparableListing) -> String {
    format!(
        "- Address: {}, Bedrooms: {}, Bathrooms: {}, Size: {} sq ft, Property Type: {}, \
         Rent: £{}\n",
        listing.address,
        listing.bedrooms,
        listing.bathrooms,
        format_number(listing.size),
        listing.property_type,
        format_number(listing.rent)
    )
}

pub struct FollowUpHandler {
    rent: RentCollector,
    search: Arc<dyn SimilaritySearch>,
    store: Arc<dyn RecordStore>,
    resources: Arc<ResourceProvider>,
    audit_sink: Arc<dyn AuditSink>,
}

impl FollowUpHandler {
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        store: Arc<dyn RecordStore>,
        resources: Arc<ResourceProvider>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self { rent: RentCollector::new(), search, store, resources, audit_sink }
    }

    /// Acts on the field set of the rent estimate executed on the previous turn.
    pub async fn handle(
        &self,
        action: FollowUpAction,
        fields: &CandidateFieldSet,
        audit: &AuditContext,
    ) -> TaskResult {
        let record = match self.rent.record_for(fields, &self.resources) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(
                    event_name = "dialogue.follow_up.estimate_unavailable",
                    correlation_id = %audit.correlation_id,
                    action = action.as_str(),
                    error = %error,
                    "could not rebuild the rent estimate for a follow-up"
                );
                return TaskResult::new(ESTIMATE_UNAVAILABLE, TurnAction::Apology, fields.clone());
            }
        };

        let reply = match action {
            FollowUpAction::Save => self.save(record, audit).to_owned(),
            FollowUpAction::Compare => self.compare(&record, audit).await,
            FollowUpAction::Both => {
                let comparison = self.compare(&record, audit).await;
                format!("{}\n\n{comparison}", self.save(record, audit))
            }
        };
        TaskResult::new(reply, TurnAction::FollowUp, fields.clone())
    }

    fn save(&self, record: PredictionRecord, audit: &AuditContext) -> &'static str {
        let monthly_rent = record.estimate.monthly_rent;
        match self.store.save(record) {
            Ok(()) => {
                self.audit_sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "follow_up.record_saved",
                        AuditCategory::System,
                        AuditOutcome::Success,
                    )
                    .with_metadata("monthly_rent", monthly_rent.to_string()),
                );
                SAVED
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "dialogue.follow_up.save_failed",
                    correlation_id = %audit.correlation_id,
                    error = %error,
                    "prediction record was not saved"
                );
                SAVE_FAILED
            }
        }
    }

    async fn compare(&self, record: &PredictionRecord, audit: &AuditContext) -> String {
        let local = local_comparables(self.resources.listings(), &record.fields);
        let listings: Vec<ComparableListing> = if local.is_empty() {
            let query = record.to_query_text();
            match self.search.search(&query, COMPARABLE_LIMIT).await {
                Ok(found) => found,
                Err(error) => {
                    tracing::warn!(
                        event_name = "dialogue.follow_up.search_failed",
                        correlation_id = %audit.correlation_id,
                        error = %error,
                        "similarity search failed"
                    );
                    Vec::new()
                }
            }
        } else {
            local.into_iter().cloned().collect()
        };

        if listings.is_empty() {
            return NO_COMPARABLES.to_owned();
        }
        let lines: String = listings.iter().map(listing_line).collect();
        format!("**Similar Listings Nearby:**\n\n{lines}")
    }
}
