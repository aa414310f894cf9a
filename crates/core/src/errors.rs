use thiserror::Error;

use crate::domain::agent::AgentId;
use crate::flows::RouteTransitionError;
use crate::validation::ValidationReport;

/// Wiring mistakes. Never retried: the thread (or process) stops with a diagnostic.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown hand-off target `{0}` (expected supervisor|flights_advisor|hotel_advisor|human)")]
    UnknownHandoffTarget(String),
    #[error("no agent is bound for `{0}`")]
    MissingBinding(AgentId),
    #[error("more than {limit} hand-offs in one routing cycle (last target `{last}`)")]
    HandoffLoop { limit: usize, last: AgentId },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationReport),
    #[error(transparent)]
    RouteTransition(#[from] RouteTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl ApplicationError {
    /// Recoverable errors are reported to the user and the thread stays alive.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Domain(DomainError::Validation(_)) | Self::Integration(_)
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::Validation(report)) => Self::BadRequest {
                message: report.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Domain(DomainError::RouteTransition(_))
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => Self::Internal {
                message: "routing invariant violated".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(error) => {
                Self::Internal { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
