//! Flight and hotel search behind a narrow provider boundary.
//!
//! - `provider`: the traits an external search service implements.
//! - `serpapi`: Google Flights / Google Hotels through SerpApi.
//! - `adapter`: what advisors call; maps provider failures to [`SearchError`].

pub mod adapter;
pub mod provider;
pub mod serpapi;

pub use adapter::{FlightSearchAdapter, HotelSearchAdapter, SearchError, SearchPolicy};
pub use provider::{
    FlightSearchProvider, HotelSearchProvider, ProviderError, UnconfiguredProvider,
};
pub use serpapi::{SerpApiClient, SerpApiSettings};
