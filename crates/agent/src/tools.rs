use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tripdesk_core::domain::params::{ParameterSchema, PartialParams};
use tripdesk_core::domain::search::{
    FlightItinerary, FlightLeg, FlightQuery, HotelListing, HotelQuery, SearchResult, TripType,
    FLIGHT_SCHEMA, HOTEL_SCHEMA,
};
use tripdesk_core::validation::ValidationReport;
use tripdesk_search::{FlightSearchAdapter, HotelSearchAdapter, SearchError};

/// Validators, search adapter and renderer that one advisor is bound to.
#[async_trait]
pub trait SearchTool: Send + Sync {
    type Query: Send + Sync;

    fn name(&self) -> &'static str;
    fn schema(&self) -> &'static ParameterSchema;
    fn validate(&self, params: &PartialParams, today: NaiveDate)
        -> Result<Self::Query, ValidationReport>;
    async fn search(&self, query: &Self::Query) -> Result<SearchResult, SearchError>;
    fn render(&self, query: &Self::Query, result: &SearchResult) -> String;
}

pub struct FlightsTool {
    adapter: FlightSearchAdapter,
}

impl FlightsTool {
    pub fn new(adapter: FlightSearchAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl SearchTool for FlightsTool {
    type Query = FlightQuery;

    fn name(&self) -> &'static str {
        "search_flights"
    }

    fn schema(&self) -> &'static ParameterSchema {
        &FLIGHT_SCHEMA
    }

    fn validate(&self, params: &PartialParams, today: NaiveDate) -> Result<FlightQuery, ValidationReport> {
        FlightQuery::from_params(params, today)
    }

    async fn search(&self, query: &FlightQuery) -> Result<SearchResult, SearchError> {
        self.adapter.search(query).await
    }

    fn render(&self, query: &FlightQuery, result: &SearchResult) -> String {
        match result {
            SearchResult::Flights(itineraries) => render_flights(query, itineraries),
            SearchResult::Hotels(_) => String::new(),
        }
    }
}

pub struct HotelsTool {
    adapter: HotelSearchAdapter,
}

impl HotelsTool {
    pub fn new(adapter: HotelSearchAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl SearchTool for HotelsTool {
    type Query = HotelQuery;

    fn name(&self) -> &'static str {
        "search_hotels"
    }

    fn schema(&self) -> &'static ParameterSchema {
        &HOTEL_SCHEMA
    }

    fn validate(&self, params: &PartialParams, today: NaiveDate) -> Result<HotelQuery, ValidationReport> {
        HotelQuery::from_params(params, today)
    }

    async fn search(&self, query: &HotelQuery) -> Result<SearchResult, SearchError> {
        self.adapter.search(query).await
    }

    fn render(&self, query: &HotelQuery, result: &SearchResult) -> String {
        match result {
            SearchResult::Hotels(listings) => render_hotels(query, listings),
            SearchResult::Flights(_) => String::new(),
        }
    }
}

fn render_flights(query: &FlightQuery, itineraries: &[FlightItinerary]) -> String {
    let trip = match (query.trip_type, query.return_date) {
        (TripType::RoundTrip, Some(back)) => format!("{}, returning {}", query.depart_date, back),
        _ => query.depart_date.to_string(),
    };
    let mut lines = vec![format!(
        "Here are the top {} flight option(s) from {} to {} on {}:",
        itineraries.len(),
        query.origin,
        query.destination,
        trip
    )];

    for (index, itinerary) in itineraries.iter().enumerate() {
        let stops = match itinerary.stops() {
            0 => "nonstop".to_string(),
            1 => "1 stop".to_string(),
            n => format!("{n} stops"),
        };
        let duration = itinerary
            .total_duration_minutes
            .map(|minutes| format!(", {}", format_minutes(minutes)))
            .unwrap_or_default();
        lines.push(format!(
            "{}. {} {} | {} | {} | {}{}",
            index + 1,
            format_price(itinerary.price),
            itinerary.currency,
            itinerary.airlines().join(", "),
            itinerary.route(),
            stops,
            duration
        ));
        for leg in &itinerary.legs {
            lines.push(format!("   outbound: {}", render_leg(leg)));
        }
        for leg in &itinerary.return_legs {
            lines.push(format!("   return: {}", render_leg(leg)));
        }
    }
    lines.join("\n")
}

fn render_leg(leg: &FlightLeg) -> String {
    let number = leg.flight_number.as_deref().map(|number| format!(" {number}")).unwrap_or_default();
    format!(
        "{}{} {} {} -> {} {}",
        leg.airline,
        number,
        leg.departure_airport,
        leg.departure_time,
        leg.arrival_airport,
        leg.arrival_time
    )
}

fn render_hotels(query: &HotelQuery, listings: &[HotelListing]) -> String {
    let mut lines = vec![format!(
        "Here are the top {} hotel(s) in {} from {} to {} ({} night(s), {} room(s)):",
        listings.len(),
        query.location,
        query.check_in,
        query.check_out,
        query.nights(),
        query.rooms
    )];

    for (index, listing) in listings.iter().enumerate() {
        let mut details = vec![format!(
            "{} {} per night",
            format_price(listing.price_per_night),
            listing.currency
        )];
        if let Some(total) = listing.total_price {
            details.push(format!("{} {} total", format_price(total), listing.currency));
        }
        if let Some(class) = listing.hotel_class {
            details.push(format!("{class}-star"));
        }
        if let Some(rating) = listing.rating {
            let reviews =
                listing.reviews.map(|count| format!(" from {count} reviews")).unwrap_or_default();
            details.push(format!("rated {rating:.1}{reviews}"));
        }
        if let (Some(check_in), Some(check_out)) = (&listing.check_in_time, &listing.check_out_time) {
            details.push(format!("check-in {check_in}, check-out {check_out}"));
        }
        lines.push(format!("{}. {} | {}", index + 1, listing.name, details.join(" | ")));
        if !listing.amenities.is_empty() {
            let shown = listing.amenities.iter().take(5).cloned().collect::<Vec<_>>();
            lines.push(format!("   amenities: {}", shown.join(", ")));
        }
    }
    lines.join("\n")
}

fn format_price(price: Decimal) -> String {
    price.round_dp(2).normalize().to_string()
}

fn format_minutes(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, rest) => format!("{rest}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, rest) => format!("{hours}h {rest}m"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tripdesk_core::domain::search::{
        FlightItinerary, FlightLeg, FlightQuery, HotelListing, HotelQuery, HotelSort, StopsFilter,
        TripType,
    };

    use super::{format_minutes, format_price, render_flights, render_hotels};

    fn leg(from: &str, to: &str, number: &str) -> FlightLeg {
        FlightLeg {
            airline: "Delta".to_string(),
            flight_number: Some(number.to_string()),
            departure_airport: from.to_string(),
            departure_time: "2026-11-02 08:00".to_string(),
            arrival_airport: to.to_string(),
            arrival_time: "2026-11-02 11:15".to_string(),
            duration_minutes: Some(195),
        }
    }

    #[test]
    fn flight_rendering_lists_price_route_and_schedule() {
        let query = FlightQuery {
            origin: "JFK".to_string(),
            destination: "LAX".to_string(),
            depart_date: NaiveDate::from_ymd_opt(2026, 11, 2).expect("date"),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 11, 9).expect("date")),
            trip_type: TripType::RoundTrip,
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
            stops: StopsFilter::Any,
            currency: "USD".to_string(),
        };
        let itinerary = FlightItinerary {
            price: Decimal::new(31950, 2),
            currency: "USD".to_string(),
            legs: vec![leg("JFK", "ORD", "DL 10"), leg("ORD", "LAX", "DL 11")],
            return_legs: vec![leg("LAX", "JFK", "DL 20")],
            total_duration_minutes: Some(405),
        };

        let text = render_flights(&query, &[itinerary]);

        assert!(text.starts_with(
            "Here are the top 1 flight option(s) from JFK to LAX on 2026-11-02, returning 2026-11-09:"
        ));
        assert!(text.contains("1. 319.5 USD | Delta | JFK → ORD → LAX | 1 stop, 6h 45m"));
        assert!(text.contains("   outbound: Delta DL 10 JFK 2026-11-02 08:00 -> ORD 2026-11-02 11:15"));
        assert!(text.contains("   return: Delta DL 20 LAX"));
    }

    #[test]
    fn hotel_rendering_lists_price_rating_and_stay() {
        let query = HotelQuery {
            location: "Porto".to_string(),
            check_in: NaiveDate::from_ymd_opt(2026, 12, 1).expect("date"),
            check_out: NaiveDate::from_ymd_opt(2026, 12, 3).expect("date"),
            adults: 2,
            children: 0,
            rooms: 1,
            sort_by: HotelSort::default(),
            hotel_class: Vec::new(),
            currency: "EUR".to_string(),
        };
        let listing = HotelListing {
            name: "Casa do Rio".to_string(),
            price_per_night: Decimal::from(95),
            total_price: Some(Decimal::from(190)),
            currency: "EUR".to_string(),
            rating: Some(4.64),
            reviews: Some(812),
            hotel_class: Some(4),
            check_in_time: Some("3:00 PM".to_string()),
            check_out_time: Some("11:00 AM".to_string()),
            amenities: vec!["Free Wi-Fi".to_string(), "Breakfast".to_string()],
            link: None,
        };

        let text = render_hotels(&query, &[listing]);

        assert!(text.starts_with(
            "Here are the top 1 hotel(s) in Porto from 2026-12-01 to 2026-12-03 (2 night(s), 1 room(s)):"
        ));
        assert!(text.contains(
            "1. Casa do Rio | 95 EUR per night | 190 EUR total | 4-star | rated 4.6 from 812 reviews"
        ));
        assert!(text.contains("   amenities: Free Wi-Fi, Breakfast"));
    }

    #[test]
    fn prices_and_durations_are_compact() {
        assert_eq!(format_price(Decimal::new(12000, 2)), "120");
        assert_eq!(format_price(Decimal::new(12346, 3)), "12.35");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(135), "2h 15m");
    }
}
