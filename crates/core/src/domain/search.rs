use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::params::{FieldSpec, ParameterSchema};

pub mod flight_fields {
    pub const ORIGIN: &str = "origin";
    pub const DESTINATION: &str = "destination";
    pub const DEPART_DATE: &str = "depart_date";
    pub const RETURN_DATE: &str = "return_date";
    pub const TRIP_TYPE: &str = "trip_type";
    pub const ADULTS: &str = "adults";
    pub const CHILDREN: &str = "children";
    pub const INFANTS_IN_SEAT: &str = "infants_in_seat";
    pub const INFANTS_ON_LAP: &str = "infants_on_lap";
    pub const STOPS: &str = "stops";
    pub const CURRENCY: &str = "currency";
}

pub mod hotel_fields {
    pub const LOCATION: &str = "location";
    pub const CHECK_IN: &str = "check_in";
    pub const CHECK_OUT: &str = "check_out";
    pub const ADULTS: &str = "adults";
    pub const CHILDREN: &str = "children";
    pub const ROOMS: &str = "rooms";
    pub const SORT_BY: &str = "sort_by";
    pub const HOTEL_CLASS: &str = "hotel_class";
    pub const CURRENCY: &str = "currency";
}

pub static FLIGHT_SCHEMA: ParameterSchema = ParameterSchema {
    name: "flight_search",
    fields: &[
        FieldSpec {
            name: flight_fields::ORIGIN,
            description: "Departure airport code (3-letter IATA)",
            required: true,
        },
        FieldSpec {
            name: flight_fields::DESTINATION,
            description: "Arrival airport code (3-letter IATA)",
            required: true,
        },
        FieldSpec {
            name: flight_fields::DEPART_DATE,
            description: "Outbound date, YYYY-MM-DD",
            required: true,
        },
        FieldSpec {
            name: flight_fields::RETURN_DATE,
            description: "Return date, YYYY-MM-DD; leave out for one-way trips",
            required: false,
        },
        FieldSpec {
            name: flight_fields::TRIP_TYPE,
            description: "round_trip or one_way; inferred from the return date when absent",
            required: false,
        },
        FieldSpec {
            name: flight_fields::ADULTS,
            description: "Number of adults, default 1",
            required: false,
        },
        FieldSpec {
            name: flight_fields::CHILDREN,
            description: "Number of children, default 0",
            required: false,
        },
        FieldSpec {
            name: flight_fields::INFANTS_IN_SEAT,
            description: "Number of infants in seat, default 0",
            required: false,
        },
        FieldSpec {
            name: flight_fields::INFANTS_ON_LAP,
            description: "Number of infants on lap, default 0",
            required: false,
        },
        FieldSpec {
            name: flight_fields::STOPS,
            description: "Maximum stops: any, nonstop, one or two",
            required: false,
        },
        FieldSpec {
            name: flight_fields::CURRENCY,
            description: "ISO currency code for prices",
            required: false,
        },
    ],
};

pub static HOTEL_SCHEMA: ParameterSchema = ParameterSchema {
    name: "hotel_search",
    fields: &[
        FieldSpec {
            name: hotel_fields::LOCATION,
            description: "City, area or hotel name",
            required: true,
        },
        FieldSpec {
            name: hotel_fields::CHECK_IN,
            description: "Check-in date, YYYY-MM-DD",
            required: true,
        },
        FieldSpec {
            name: hotel_fields::CHECK_OUT,
            description: "Check-out date, YYYY-MM-DD",
            required: true,
        },
        FieldSpec {
            name: hotel_fields::ADULTS,
            description: "Number of adult guests, default 1",
            required: false,
        },
        FieldSpec {
            name: hotel_fields::CHILDREN,
            description: "Number of children, default 0",
            required: false,
        },
        FieldSpec {
            name: hotel_fields::ROOMS,
            description: "Number of rooms, default 1",
            required: false,
        },
        FieldSpec {
            name: hotel_fields::SORT_BY,
            description: "price_low_to_high, price_high_to_low, rating_high_to_low or popularity",
            required: false,
        },
        FieldSpec {
            name: hotel_fields::HOTEL_CLASS,
            description: "Comma-separated star classes between 1 and 5, e.g. 3,4",
            required: false,
        },
        FieldSpec {
            name: hotel_fields::CURRENCY,
            description: "ISO currency code for prices",
            required: false,
        },
    ],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    RoundTrip,
    OneWay,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundTrip => "round_trip",
            Self::OneWay => "one_way",
        }
    }

    /// Google Flights `type` code.
    pub fn provider_code(&self) -> u8 {
        match self {
            Self::RoundTrip => 1,
            Self::OneWay => 2,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "round_trip" | "roundtrip" | "return" | "1" => Some(Self::RoundTrip),
            "one_way" | "oneway" | "single" | "2" => Some(Self::OneWay),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopsFilter {
    Any,
    Nonstop,
    OneOrFewer,
    TwoOrFewer,
}

impl StopsFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Nonstop => "nonstop",
            Self::OneOrFewer => "one",
            Self::TwoOrFewer => "two",
        }
    }

    /// Google Flights `stops` code.
    pub fn provider_code(&self) -> u8 {
        match self {
            Self::Any => 0,
            Self::Nonstop => 1,
            Self::OneOrFewer => 2,
            Self::TwoOrFewer => 3,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "any" | "0" => Some(Self::Any),
            "nonstop" | "non_stop" | "direct" | "1" => Some(Self::Nonstop),
            "one" | "one_stop" | "2" => Some(Self::OneOrFewer),
            "two" | "two_stops" | "3" => Some(Self::TwoOrFewer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotelSort {
    PriceLowToHigh,
    PriceHighToLow,
    RatingHighToLow,
    Popularity,
}

impl HotelSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceLowToHigh => "price_low_to_high",
            Self::PriceHighToLow => "price_high_to_low",
            Self::RatingHighToLow => "rating_high_to_low",
            Self::Popularity => "popularity",
        }
    }

    /// Google Hotels `sort_by` code.
    pub fn provider_code(&self) -> u8 {
        match self {
            Self::PriceLowToHigh => 1,
            Self::PriceHighToLow => 2,
            Self::RatingHighToLow => 8,
            Self::Popularity => 16,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "price_low_to_high" | "cheapest" | "1" => Some(Self::PriceLowToHigh),
            "price_high_to_low" | "2" => Some(Self::PriceHighToLow),
            "rating_high_to_low" | "rating" | "8" => Some(Self::RatingHighToLow),
            "popularity" | "popular" | "16" => Some(Self::Popularity),
            _ => None,
        }
    }
}

impl Default for HotelSort {
    fn default() -> Self {
        Self::RatingHighToLow
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub trip_type: TripType,
    pub adults: u32,
    pub children: u32,
    pub infants_in_seat: u32,
    pub infants_on_lap: u32,
    pub stops: StopsFilter,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelQuery {
    pub location: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub rooms: u32,
    pub sort_by: HotelSort,
    pub hotel_class: Vec<u8>,
    pub currency: String,
}

impl HotelQuery {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchQuery {
    Flight(FlightQuery),
    Hotel(HotelQuery),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightLeg {
    pub airline: String,
    pub flight_number: Option<String>,
    pub departure_airport: String,
    pub departure_time: String,
    pub arrival_airport: String,
    pub arrival_time: String,
    pub duration_minutes: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightItinerary {
    pub price: Decimal,
    pub currency: String,
    pub legs: Vec<FlightLeg>,
    #[serde(default)]
    pub return_legs: Vec<FlightLeg>,
    pub total_duration_minutes: Option<u32>,
}

impl FlightItinerary {
    pub fn stops(&self) -> usize {
        self.legs.len().saturating_sub(1)
    }

    /// `JFK → ORD → LAX` style route over the outbound legs.
    pub fn route(&self) -> String {
        let mut airports: Vec<&str> = Vec::with_capacity(self.legs.len() + 1);
        for leg in &self.legs {
            if airports.last() != Some(&leg.departure_airport.as_str()) {
                airports.push(&leg.departure_airport);
            }
            airports.push(&leg.arrival_airport);
        }
        airports.join(" → ")
    }

    pub fn airlines(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for leg in &self.legs {
            if !names.contains(&leg.airline.as_str()) {
                names.push(&leg.airline);
            }
        }
        names
    }

    pub fn departure_time(&self) -> Option<&str> {
        self.legs.first().map(|leg| leg.departure_time.as_str())
    }

    pub fn arrival_time(&self) -> Option<&str> {
        self.legs.last().map(|leg| leg.arrival_time.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelListing {
    pub name: String,
    pub price_per_night: Decimal,
    pub total_price: Option<Decimal>,
    pub currency: String,
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
    pub hotel_class: Option<u8>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum SearchResult {
    Flights(Vec<FlightItinerary>),
    Hotels(Vec<HotelListing>),
}

impl SearchResult {
    pub fn len(&self) -> usize {
        match self {
            Self::Flights(entries) => entries.len(),
            Self::Hotels(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
