use std::sync::Arc;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};
use tripdesk_core::config::{RetryBackoff, SearchConfig};
use tripdesk_core::domain::search::{FlightQuery, HotelQuery, SearchResult};

use crate::provider::{FlightSearchProvider, HotelSearchProvider, ProviderError};

/// What an advisor sees when a search does not produce results. Always recoverable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("the search service could not be reached: {0}")]
    Provider(String),
    #[error("the search service took too long to answer")]
    Timeout,
    #[error("the search service sent a response that could not be read: {0}")]
    MalformedResponse(String),
    #[error("no results matched the search")]
    NoResults,
}

impl From<ProviderError> for SearchError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(_) => Self::Timeout,
            ProviderError::Decode(message) => Self::MalformedResponse(message),
            other => Self::Provider(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchPolicy {
    pub max_retries: u32,
    pub max_results: usize,
    pub backoff: RetryBackoff,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self { max_retries: 0, max_results: 5, backoff: RetryBackoff::default() }
    }
}

impl From<&SearchConfig> for SearchPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_results: config.max_results,
            backoff: config.backoff,
        }
    }
}

/// Runs `call` once, then again for each allowed retry while the failure is transient,
/// sleeping on the policy's backoff between attempts.
async fn with_retries<T, F, Fut>(
    policy: SearchPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<Vec<T>, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<T>, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Err(error) if error.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff.delay_for(attempt);
                warn!(
                    event_name = "search.adapter.retry",
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying search provider call"
                );
                sleep(delay).await;
            }
            result => return result,
        }
    }
}

fn finish<T>(
    operation: &'static str,
    result: Result<Vec<T>, ProviderError>,
    max_results: usize,
) -> Result<Vec<T>, SearchError> {
    match result {
        Ok(mut entries) if !entries.is_empty() => {
            entries.truncate(max_results.max(1));
            info!(event_name = "search.adapter.completed", operation, results = entries.len());
            Ok(entries)
        }
        Ok(_) => {
            info!(event_name = "search.adapter.empty", operation, "search returned no results");
            Err(SearchError::NoResults)
        }
        Err(error) => {
            warn!(event_name = "search.adapter.failed", operation, error = %error, "search failed");
            Err(error.into())
        }
    }
}

#[derive(Clone)]
pub struct FlightSearchAdapter {
    provider: Arc<dyn FlightSearchProvider>,
    policy: SearchPolicy,
}

impl FlightSearchAdapter {
    pub fn new(provider: Arc<dyn FlightSearchProvider>, policy: SearchPolicy) -> Self {
        Self { provider, policy }
    }

    /// `query` must already be validated; nothing is re-checked here.
    pub async fn search(&self, query: &FlightQuery) -> Result<SearchResult, SearchError> {
        let result =
            with_retries(self.policy, "flights", || self.provider.search_flights(query)).await;
        finish("flights", result, self.policy.max_results).map(SearchResult::Flights)
    }
}

#[derive(Clone)]
pub struct HotelSearchAdapter {
    provider: Arc<dyn HotelSearchProvider>,
    policy: SearchPolicy,
}

impl HotelSearchAdapter {
    pub fn new(provider: Arc<dyn HotelSearchProvider>, policy: SearchPolicy) -> Self {
        Self { provider, policy }
    }

    /// `query` must already be validated; nothing is re-checked here.
    pub async fn search(&self, query: &HotelQuery) -> Result<SearchResult, SearchError> {
        let result =
            with_retries(self.policy, "hotels", || self.provider.search_hotels(query)).await;
        finish("hotels", result, self.policy.max_results).map(SearchResult::Hotels)
    }
}
