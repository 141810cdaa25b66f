use thiserror::Error;

use crate::{compute::ComputationError, config::ConfigError, resources::ResourceError};

/// Failures that stop an operator surface from serving turns at all.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("resource loading failed: {0}")]
    Resources(#[from] ResourceError),
    #[error("completion client setup failed: {0}")]
    Completion(String),
    #[error("computation failed: {0}")]
    Computation(#[from] ComputationError),
}

impl ApplicationError {
    pub fn completion(error: impl std::fmt::Display) -> Self {
        Self::Completion(error.to_string())
    }

    /// Stable machine-readable class for CLI envelopes and logs.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::Resources(_) => "resources",
            Self::Completion(_) => "completion",
            Self::Computation(_) => "computation",
        }
    }

    /// Configuration problems are the caller's to fix; everything else is a runtime fault.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Resources(_) | Self::Completion(_) | Self::Computation(_) => 3,
        }
    }
}

/// A request the transport refuses before it reaches the orchestrator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("bad request: {message}")]
pub struct InterfaceError {
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self { message: message.into(), correlation_id: correlation_id.into() }
    }

    /// Text safe to show a caller; internal detail stays in `message`.
    pub fn user_message(&self) -> &'static str {
        "The request could not be processed. Check inputs and try again."
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::compute::ComputationError;
    use crate::config::ConfigError;
    use crate::errors::{ApplicationError, InterfaceError};
    use crate::resources::ResourceError;

    #[test]
    fn configuration_failures_are_caller_errors() {
        let error = ApplicationError::from(ConfigError::Validation("port must be > 0".to_owned()));

        assert_eq!(error.error_class(), "config_validation");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn resource_and_computation_failures_are_runtime_errors() {
        let resources = ApplicationError::from(ResourceError::ReadFile {
            path: PathBuf::from("/models/rent.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        });
        assert_eq!(resources.error_class(), "resources");
        assert_eq!(resources.exit_code(), 3);
        assert!(resources.to_string().contains("/models/rent.json"));

        let computation =
            ApplicationError::from(ComputationError::ModelUnavailable("rent".to_owned()));
        assert_eq!(computation.error_class(), "computation");
        assert_eq!(computation.exit_code(), 3);
    }

    #[test]
    fn bad_request_hides_detail_from_callers() {
        let error = InterfaceError::bad_request("message must not be empty", "req-1");

        assert_eq!(error.correlation_id(), "req-1");
        assert!(error.to_string().contains("message must not be empty"));
        assert!(!error.user_message().contains("empty"));
    }
}
