use thiserror::Error;
use tripdesk_core::errors::{ApplicationError, ConfigurationError, DomainError};
use tripdesk_core::flows::{PhaseTransitionError, RouteTransitionError};

/// Failures that end a routing cycle. None of them are retried: validation and search
/// problems never get this far, they become replies instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Routing(#[from] RouteTransitionError),
    #[error(transparent)]
    Phase(#[from] PhaseTransitionError),
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::Configuration(error) => Self::Configuration(error),
            AgentError::Routing(error) => Self::Domain(DomainError::RouteTransition(error)),
            AgentError::Phase(error) => {
                Self::Domain(DomainError::InvariantViolation(error.to_string()))
            }
        }
    }
}
