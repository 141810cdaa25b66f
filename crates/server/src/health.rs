use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use landlord_core::resources::{ResourceProvider, ResourceReadiness};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    resources: Arc<ResourceProvider>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub resources: ResourceReadiness,
    pub checked_at: String,
}

pub fn router(resources: Arc<ResourceProvider>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { resources })
}

/// Always answers 200: screening works without any artefacts, so a missing model degrades
/// the service rather than taking it down.
pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let resources = state.resources.readiness();
    let ready = resources.rent_model && resources.maintenance_model && resources.lookup_tables;

    Json(HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "landlord-server runtime initialized".to_string(),
        },
        resources,
        checked_at: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, Json};
    use landlord_core::compute::LinearModel;
    use landlord_core::resources::{LookupTable, LookupTables, ResourceProvider};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_is_ready_when_every_artefact_is_loaded() {
        let rent = LinearModel::new("rent", 7.0, [("SIZE", 0.0)]);
        let maintenance = LinearModel::new("maintenance", 1.0, [("age_years", 0.1)]);
        let resources = ResourceProvider::empty()
            .with_rent_model(Arc::new(rent))
            .with_maintenance_model(Arc::new(maintenance))
            .with_lookups(LookupTables {
                address: LookupTable::from_pairs([("Kensington", 1.0)]),
                ..LookupTables::default()
            });

        let Json(payload) = health(State(HealthState { resources: Arc::new(resources) })).await;

        assert_eq!(payload.status, "ready");
        assert!(payload.resources.rent_model);
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_is_degraded_without_models() {
        let state = HealthState { resources: Arc::new(ResourceProvider::empty()) };

        let Json(payload) = health(State(state)).await;

        assert_eq!(payload.status, "degraded");
        assert!(!payload.resources.maintenance_model);
        assert_eq!(payload.service.status, "ready");
    }
}
