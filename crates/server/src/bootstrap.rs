use std::sync::Arc;

use landlord_agent::{CompletionService, HttpCompletionService, Orchestrator};
use landlord_core::config::{AppConfig, LoadOptions};
use landlord_core::errors::ApplicationError;
use landlord_core::resources::ResourceProvider;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub resources: Arc<ResourceProvider>,
    pub orchestrator: Arc<Orchestrator>,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, ApplicationError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, ApplicationError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );

    let resources = Arc::new(ResourceProvider::load(&config.resources)?);
    let readiness = resources.readiness();
    info!(
        event_name = "system.bootstrap.resources_loaded",
        correlation_id = "bootstrap",
        rent_model = readiness.rent_model,
        maintenance_model = readiness.maintenance_model,
        lookup_tables = readiness.lookup_tables,
        listings = readiness.listings,
        "model artefacts loaded"
    );

    let completion: Arc<dyn CompletionService> = Arc::new(
        HttpCompletionService::from_config(&config.llm)
            .map_err(|error| ApplicationError::completion(format!("{error:#}")))?,
    );
    let orchestrator = Orchestrator::builder(completion, resources.clone())
        .dialogue(config.dialogue.clone())
        .build();

    Ok(Application { config, resources, orchestrator: Arc::new(orchestrator) })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use landlord_core::config::{ConfigOverrides, LoadOptions};
    use landlord_core::errors::ApplicationError;

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_without_artefacts_starts_degraded() {
        let app = bootstrap(LoadOptions::default()).await.expect("defaults bootstrap");

        let readiness = app.resources.readiness();
        assert!(!readiness.rent_model);
        assert!(!readiness.maintenance_model);
        assert_eq!(readiness.listings, 0);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_missing_model_file() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                rent_model_path: Some(PathBuf::from("/nonexistent/rent_model.json")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("missing model should fail bootstrap");
        assert!(matches!(error, ApplicationError::Resources(_)));
        assert_eq!(error.error_class(), "resources");
        assert!(error.to_string().contains("rent_model.json"));
    }
}
