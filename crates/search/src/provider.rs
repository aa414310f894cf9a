use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tripdesk_core::domain::search::{FlightItinerary, FlightQuery, HotelListing, HotelQuery};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("search provider credentials are not configured")]
    MissingCredentials,
    #[error("search provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error talking to search provider: {0}")]
    Network(String),
    #[error("search provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("search provider rejected the request: {0}")]
    Api(String),
    #[error("could not decode search provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Transient failures that a second attempt may get past.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::MissingCredentials | Self::Api(_) | Self::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait FlightSearchProvider: Send + Sync {
    async fn search_flights(&self, query: &FlightQuery)
        -> Result<Vec<FlightItinerary>, ProviderError>;
}

#[async_trait]
pub trait HotelSearchProvider: Send + Sync {
    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<HotelListing>, ProviderError>;
}

/// Stands in for a provider when no credentials are configured; every call fails with
/// [`ProviderError::MissingCredentials`] so the advisor can report it and stay alive.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl FlightSearchProvider for UnconfiguredProvider {
    async fn search_flights(
        &self,
        _query: &FlightQuery,
    ) -> Result<Vec<FlightItinerary>, ProviderError> {
        Err(ProviderError::MissingCredentials)
    }
}

#[async_trait]
impl HotelSearchProvider for UnconfiguredProvider {
    async fn search_hotels(&self, _query: &HotelQuery) -> Result<Vec<HotelListing>, ProviderError> {
        Err(ProviderError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ProviderError;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(ProviderError::Http { status: 502, body: String::new() }.is_retryable());
        assert!(!ProviderError::Http { status: 401, body: String::new() }.is_retryable());
        assert!(!ProviderError::MissingCredentials.is_retryable());
        assert!(!ProviderError::Decode("eof".into()).is_retryable());
    }
}
