//! SerpApi client for the `google_flights` and `google_hotels` engines.
//!
//! Response mapping is split out into pure functions so it can be exercised against
//! captured JSON without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use tripdesk_core::config::SearchConfig;
use tripdesk_core::domain::search::{
    FlightItinerary, FlightLeg, FlightQuery, HotelListing, HotelQuery, TripType,
};
use tripdesk_core::validation::DATE_FORMAT;

use crate::provider::{FlightSearchProvider, HotelSearchProvider, ProviderError};

const FLIGHTS_ENGINE: &str = "google_flights";
const HOTELS_ENGINE: &str = "google_hotels";
const MAX_RETURN_LOOKUPS: usize = 5;
const BEST_FLIGHT_TOKENS: usize = 3;
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone, Debug)]
pub struct SerpApiSettings {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout: Duration,
    pub language: String,
    pub country: String,
}

impl SerpApiSettings {
    pub fn from_config(config: &SearchConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(ProviderError::MissingCredentials)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            language: config.language.clone(),
            country: config.country.clone(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct SerpApiClient {
    client: Client,
    settings: SerpApiSettings,
}

impl SerpApiClient {
    pub fn new(settings: SerpApiSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| ProviderError::Network(error.to_string()))?;
        Ok(Self { client, settings })
    }

    fn locale_params(&self, engine: &'static str) -> Vec<(&'static str, String)> {
        vec![
            ("engine", engine.to_string()),
            ("hl", self.settings.language.clone()),
            ("gl", self.settings.country.clone()),
        ]
    }

    async fn fetch(&self, params: &[(&'static str, String)]) -> Result<Value, ProviderError> {
        let engine = params
            .iter()
            .find(|(key, _)| *key == "engine")
            .map(|(_, value)| value.as_str())
            .unwrap_or_default();
        debug!(event_name = "search.provider.request", engine, "calling search provider");

        let response = self
            .client
            .get(&self.settings.base_url)
            .query(params)
            .query(&[("api_key", self.settings.api_key.expose_secret())])
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: clip(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }

        let payload =
            response.json::<Value>().await.map_err(|error| self.transport_error(error))?;
        check_api_error(payload)
    }

    fn transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.settings.timeout)
        } else if error.is_decode() {
            ProviderError::Decode(error.to_string())
        } else {
            ProviderError::Network(error.without_url().to_string())
        }
    }

    async fn attach_return_legs(
        &self,
        query: &FlightQuery,
        base_params: &[(&'static str, String)],
        itineraries: &mut [FlightItinerary],
        tokens: Vec<(usize, String)>,
    ) {
        for (index, token) in tokens {
            let mut params = base_params.to_vec();
            params.push(("departure_token", token));

            match self.fetch(&params).await.and_then(|payload| parse_flights(payload, &query.currency))
            {
                Ok(returns) => {
                    if let (Some(itinerary), Some(first)) =
                        (itineraries.get_mut(index), returns.into_iter().next())
                    {
                        itinerary.return_legs = first.itinerary.legs;
                    }
                }
                Err(error) => {
                    warn!(
                        event_name = "search.provider.return_lookup_failed",
                        error = %error,
                        "return itinerary lookup failed; keeping outbound only"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl FlightSearchProvider for SerpApiClient {
    async fn search_flights(
        &self,
        query: &FlightQuery,
    ) -> Result<Vec<FlightItinerary>, ProviderError> {
        let mut params = self.locale_params(FLIGHTS_ENGINE);
        params.extend(flight_params(query));

        let options = parse_flights(self.fetch(&params).await?, &query.currency)?;
        let tokens = if query.trip_type == TripType::RoundTrip {
            select_return_tokens(&options)
        } else {
            Vec::new()
        };
        let mut itineraries: Vec<FlightItinerary> =
            options.into_iter().map(|option| option.itinerary).collect();

        if !tokens.is_empty() {
            self.attach_return_legs(query, &params, &mut itineraries, tokens).await;
        }

        info!(
            event_name = "search.provider.flights",
            origin = %query.origin,
            destination = %query.destination,
            results = itineraries.len(),
            "flight search completed"
        );
        Ok(itineraries)
    }
}

#[async_trait]
impl HotelSearchProvider for SerpApiClient {
    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<HotelListing>, ProviderError> {
        let mut params = self.locale_params(HOTELS_ENGINE);
        params.extend(hotel_params(query));

        let listings = parse_hotels(self.fetch(&params).await?, &query.currency)?;
        info!(
            event_name = "search.provider.hotels",
            location = %query.location,
            results = listings.len(),
            "hotel search completed"
        );
        Ok(listings)
    }
}

pub fn flight_params(query: &FlightQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("departure_id", query.origin.clone()),
        ("arrival_id", query.destination.clone()),
        ("outbound_date", query.depart_date.format(DATE_FORMAT).to_string()),
        ("currency", query.currency.clone()),
        ("adults", query.adults.to_string()),
        ("children", query.children.to_string()),
        ("infants_in_seat", query.infants_in_seat.to_string()),
        ("infants_on_lap", query.infants_on_lap.to_string()),
        ("stops", query.stops.provider_code().to_string()),
        ("type", query.trip_type.provider_code().to_string()),
    ];
    if let (TripType::RoundTrip, Some(return_date)) = (query.trip_type, query.return_date) {
        params.push(("return_date", return_date.format(DATE_FORMAT).to_string()));
    }
    params
}

pub fn hotel_params(query: &HotelQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", query.location.clone()),
        ("check_in_date", query.check_in.format(DATE_FORMAT).to_string()),
        ("check_out_date", query.check_out.format(DATE_FORMAT).to_string()),
        ("currency", query.currency.clone()),
        ("adults", query.adults.to_string()),
        ("children", query.children.to_string()),
        ("rooms", query.rooms.to_string()),
        ("sort_by", query.sort_by.provider_code().to_string()),
    ];
    if !query.hotel_class.is_empty() {
        let classes = query.hotel_class.iter().map(u8::to_string).collect::<Vec<_>>().join(",");
        params.push(("hotel_class", classes));
    }
    params
}

/// SerpApi reports "no results" through the `error` field; that case is an empty result set.
fn check_api_error(payload: Value) -> Result<Value, ProviderError> {
    let message = payload.get("error").and_then(Value::as_str).map(str::to_string);
    match message {
        Some(message) if message.contains("hasn't returned any results") => {
            Ok(Value::Object(Default::default()))
        }
        Some(message) => Err(ProviderError::Api(message)),
        None => Ok(payload),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlightOption {
    pub itinerary: FlightItinerary,
    pub departure_token: Option<String>,
    pub best: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FlightsPayload {
    #[serde(default)]
    best_flights: Vec<RawFlightOption>,
    #[serde(default)]
    other_flights: Vec<RawFlightOption>,
}

#[derive(Debug, Deserialize)]
struct RawFlightOption {
    #[serde(default)]
    flights: Vec<RawLeg>,
    price: Option<Decimal>,
    total_duration: Option<u32>,
    departure_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    #[serde(default)]
    airline: String,
    flight_number: Option<String>,
    departure_airport: RawAirport,
    arrival_airport: RawAirport,
    duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAirport {
    id: String,
    #[serde(default)]
    time: String,
}

/// Maps a `google_flights` payload; options without a price or legs are dropped.
pub fn parse_flights(payload: Value, currency: &str) -> Result<Vec<FlightOption>, ProviderError> {
    if !payload.is_object() {
        return Err(ProviderError::Decode("expected a JSON object".to_string()));
    }
    let raw: FlightsPayload =
        serde_json::from_value(payload).map_err(|error| ProviderError::Decode(error.to_string()))?;

    let best = raw.best_flights.into_iter().map(|option| (option, true));
    let other = raw.other_flights.into_iter().map(|option| (option, false));
    let options = best
        .chain(other)
        .filter_map(|(option, best)| {
            let price = option.price?;
            if option.flights.is_empty() {
                return None;
            }
            let legs = option
                .flights
                .into_iter()
                .map(|leg| FlightLeg {
                    airline: leg.airline,
                    flight_number: leg.flight_number,
                    departure_airport: leg.departure_airport.id,
                    departure_time: leg.departure_airport.time,
                    arrival_airport: leg.arrival_airport.id,
                    arrival_time: leg.arrival_airport.time,
                    duration_minutes: leg.duration,
                })
                .collect();
            Some(FlightOption {
                itinerary: FlightItinerary {
                    price,
                    currency: currency.to_string(),
                    legs,
                    return_legs: Vec::new(),
                    total_duration_minutes: option.total_duration,
                },
                departure_token: option.departure_token,
                best,
            })
        })
        .collect();

    Ok(options)
}

/// Picks up to five `departure_token`s: three from best flights, the rest from other flights.
pub fn select_return_tokens(options: &[FlightOption]) -> Vec<(usize, String)> {
    let with_token = |best: bool| {
        options.iter().enumerate().filter(move |(_, option)| option.best == best).filter_map(
            |(index, option)| option.departure_token.clone().map(|token| (index, token)),
        )
    };

    let mut tokens: Vec<(usize, String)> = with_token(true).take(BEST_FLIGHT_TOKENS).collect();
    let remaining = MAX_RETURN_LOOKUPS.saturating_sub(tokens.len());
    tokens.extend(with_token(false).take(remaining));
    tokens
}

#[derive(Debug, Default, Deserialize)]
struct HotelsPayload {
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    name: String,
    rate_per_night: Option<RawRate>,
    total_rate: Option<RawRate>,
    overall_rating: Option<f64>,
    reviews: Option<u32>,
    extracted_hotel_class: Option<u8>,
    check_in_time: Option<String>,
    check_out_time: Option<String>,
    #[serde(default)]
    amenities: Vec<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRate {
    extracted_lowest: Option<Decimal>,
}

/// Maps a `google_hotels` payload; properties without a nightly rate are dropped.
pub fn parse_hotels(payload: Value, currency: &str) -> Result<Vec<HotelListing>, ProviderError> {
    if !payload.is_object() {
        return Err(ProviderError::Decode("expected a JSON object".to_string()));
    }
    let raw: HotelsPayload =
        serde_json::from_value(payload).map_err(|error| ProviderError::Decode(error.to_string()))?;

    let listings = raw
        .properties
        .into_iter()
        .filter_map(|property| {
            let price_per_night = property.rate_per_night.and_then(|rate| rate.extracted_lowest)?;
            Some(HotelListing {
                name: property.name,
                price_per_night,
                total_price: property.total_rate.and_then(|rate| rate.extracted_lowest),
                currency: currency.to_string(),
                rating: property.overall_rating,
                reviews: property.reviews,
                hotel_class: property.extracted_hotel_class,
                check_in_time: property.check_in_time,
                check_out_time: property.check_out_time,
                amenities: property.amenities,
                link: property.link,
            })
        })
        .collect();

    Ok(listings)
}

/// At most `limit` bytes of `text`, cut on a character boundary.
fn clip(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let cut = (0..=limit).rev().find(|index| text.is_char_boundary(*index)).unwrap_or(0);
    &text[..cut]
}
