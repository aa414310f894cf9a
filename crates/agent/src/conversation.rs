//! Deterministic keyword reasoning.
//!
//! Good enough to drive the whole routing loop offline: intent comes from domain
//! keywords (or an `A to B` route), parameters from labelled dates, counts and a small
//! city → airport table. Values are passed through as written; judging them is the
//! validators' job.

use async_trait::async_trait;
use tripdesk_core::domain::intent::Intent;
use tripdesk_core::domain::params::{ParameterSchema, PartialParams};
use tripdesk_core::domain::search::{flight_fields, hotel_fields};

use crate::reasoning::ReasoningService;

const FLIGHT_KEYWORDS: &[&str] = &[
    "flight",
    "flights",
    "fly",
    "flying",
    "airfare",
    "airline",
    "airport",
    "plane",
    "one way",
    "one-way",
    "round trip",
    "round-trip",
    "nonstop",
    "layover",
];

const HOTEL_KEYWORDS: &[&str] = &[
    "hotel",
    "hotels",
    "room",
    "rooms",
    "stay",
    "accommodation",
    "accommodations",
    "lodging",
    "resort",
    "hostel",
    "check-in",
    "check in",
    "check-out",
    "check out",
    "nights",
];

const CITY_AIRPORTS: &[(&str, &str)] = &[
    ("new york", "JFK"),
    ("nyc", "JFK"),
    ("los angeles", "LAX"),
    ("la", "LAX"),
    ("san francisco", "SFO"),
    ("sf", "SFO"),
    ("chicago", "ORD"),
    ("boston", "BOS"),
    ("miami", "MIA"),
    ("seattle", "SEA"),
    ("dallas", "DFW"),
    ("atlanta", "ATL"),
    ("denver", "DEN"),
    ("las vegas", "LAS"),
    ("washington", "IAD"),
    ("toronto", "YYZ"),
    ("london", "LHR"),
    ("paris", "CDG"),
    ("amsterdam", "AMS"),
    ("frankfurt", "FRA"),
    ("madrid", "MAD"),
    ("rome", "FCO"),
    ("lisbon", "LIS"),
    ("dubai", "DXB"),
    ("singapore", "SIN"),
    ("tokyo", "HND"),
    ("sydney", "SYD"),
];

const CURRENCY_CODES: &[&str] =
    &["USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "INR", "CNY", "MXN", "BRL", "SGD"];

const CURRENCY_WORDS: &[(&str, &str)] =
    &[("dollars", "USD"), ("euros", "EUR"), ("euro", "EUR"), ("pounds", "GBP"), ("yen", "JPY")];

const NUMBER_WORDS: &[(&str, i64)] = &[
    ("zero", 0),
    ("no", 0),
    ("one", 1),
    ("a", 1),
    ("an", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

/// Words after `in` / `at` that end a place name.
const LOCATION_STOPWORDS: &[&str] = &[
    "from", "for", "on", "with", "and", "between", "starting", "check", "checking", "until",
    "to", "next", "this", "during", "arriving", "leaving", "please",
];

/// Words that cannot start a place name.
const LOCATION_REJECTS: &[&str] = &[
    "a", "an", "the", "my", "our", "seat", "hotel", "hotels", "flight", "flights", "room",
    "rooms", "advance", "total", "general", "particular", "mind",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DateRole {
    Start,
    End,
}

#[derive(Clone, Debug, Default)]
pub struct KeywordReasoner;

impl KeywordReasoner {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> Intent {
        let padded = format!(" {} ", normalize_text(text));
        let first_match = |keywords: &[&str]| {
            keywords.iter().filter_map(|keyword| padded.find(&format!(" {keyword} "))).min()
        };

        let tokens = tokenize(text);
        let route_position = extract_route(&tokens)
            .filter(|route| route.origin.is_some())
            .and_then(|route| padded.find(&format!(" {} ", tokens[route.to_index].lower)));

        let flights = [first_match(FLIGHT_KEYWORDS), route_position].into_iter().flatten().min();
        let hotels = first_match(HOTEL_KEYWORDS);

        match (flights, hotels) {
            (Some(_), None) => Intent::Flights,
            (None, Some(_)) => Intent::Hotels,
            (Some(flight_at), Some(hotel_at)) if flight_at <= hotel_at => Intent::Flights,
            (Some(_), Some(_)) => Intent::Hotels,
            (None, None) => Intent::Unclear,
        }
    }

    /// Every field this reasoner can recognise; callers narrow it to one schema.
    pub fn extract(&self, text: &str) -> PartialParams {
        let tokens = tokenize(text);
        let normalized = normalize_text(text);
        let mut params = PartialParams::new();

        if let Some(route) = extract_route(&tokens) {
            if let Some(origin) = route.origin {
                params.insert(flight_fields::ORIGIN, origin);
            }
            if let Some(destination) = route.destination {
                params.insert(flight_fields::DESTINATION, destination);
            }
        }

        let (start, end) = extract_dates(&tokens);
        if let Some(start) = start {
            params.insert(flight_fields::DEPART_DATE, start.clone());
            params.insert(hotel_fields::CHECK_IN, start);
        }
        if let Some(end) = end {
            params.insert(flight_fields::RETURN_DATE, end.clone());
            params.insert(hotel_fields::CHECK_OUT, end);
        }

        if let Some(trip_type) = extract_trip_type(&normalized) {
            params.insert(flight_fields::TRIP_TYPE, trip_type);
        }
        if let Some(location) = extract_location(&tokens) {
            params.insert(hotel_fields::LOCATION, location);
        }

        let counts = extract_counts(&tokens);
        for (field, value) in counts.fields {
            params.insert(field, value.to_string());
        }
        if !counts.hotel_classes.is_empty() {
            let classes =
                counts.hotel_classes.iter().map(ToString::to_string).collect::<Vec<_>>();
            params.insert(hotel_fields::HOTEL_CLASS, classes.join(","));
        }
        if let Some(stops) = counts.stops.or_else(|| extract_nonstop(&normalized)) {
            params.insert(flight_fields::STOPS, stops);
        }

        if let Some(sort_by) = extract_sort(&normalized) {
            params.insert(hotel_fields::SORT_BY, sort_by);
        }
        if let Some(currency) = extract_currency(&tokens) {
            params.insert(flight_fields::CURRENCY, currency);
        }

        params
    }
}

#[async_trait]
impl ReasoningService for KeywordReasoner {
    async fn classify_intent(&self, text: &str) -> Intent {
        self.classify(text)
    }

    async fn extract_parameters(&self, text: &str, schema: &ParameterSchema) -> PartialParams {
        self.extract(text).restricted_to(schema)
    }
}

#[derive(Clone, Debug)]
struct Token {
    /// As typed, minus surrounding punctuation.
    raw: String,
    lower: String,
    /// The original word ended in `,` `.` `;` or similar.
    ends_clause: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Route {
    origin: Option<String>,
    destination: Option<String>,
    to_index: usize,
}

#[derive(Debug, Default)]
struct Counts {
    fields: Vec<(&'static str, i64)>,
    hotel_classes: Vec<i64>,
    stops: Option<&'static str>,
}

fn normalize_text(text: &str) -> String {
    text.to_ascii_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(text: &str) -> Vec<Token> {
    let is_edge = |ch: char| !(ch.is_ascii_alphanumeric() || ch == '-');
    text.split_whitespace()
        .filter_map(|word| {
            let raw = word.trim_matches(is_edge);
            if raw.is_empty() {
                return None;
            }
            let ends_clause = word.ends_with([',', '.', ';', '!', '?', ':']);
            Some(Token { raw: raw.to_string(), lower: raw.to_ascii_lowercase(), ends_clause })
        })
        .collect()
}

/// `2026-11-02` shaped tokens, including impossible ones like `2026-13-40` so the
/// validator can report them.
fn looks_like_date(token: &str) -> bool {
    let parts = token.split('-').collect::<Vec<_>>();
    matches!(parts.as_slice(), [year, month, day]
        if year.len() == 4
            && (1..=2).contains(&month.len())
            && (1..=2).contains(&day.len())
            && parts.iter().all(|part| part.chars().all(|ch| ch.is_ascii_digit())))
}

fn place_at(tokens: &[Token], index: usize) -> Option<(String, usize)> {
    if let Some(pair) = tokens.get(index..index + 2) {
        let joined = format!("{} {}", pair[0].lower, pair[1].lower);
        if let Some((_, code)) = CITY_AIRPORTS.iter().find(|(city, _)| *city == joined) {
            return Some(((*code).to_string(), 2));
        }
    }

    let token = tokens.get(index)?;
    if let Some((_, code)) = CITY_AIRPORTS.iter().find(|(city, _)| *city == token.lower) {
        return Some(((*code).to_string(), 1));
    }
    let is_code = token.raw.len() == 3
        && token.raw.chars().all(|ch| ch.is_ascii_uppercase())
        && !CURRENCY_CODES.contains(&token.raw.as_str());
    is_code.then(|| (token.raw.clone(), 1))
}

fn place_before(tokens: &[Token], end: usize) -> Option<String> {
    if end >= 2 {
        if let Some((code, 2)) = place_at(tokens, end - 2) {
            return Some(code);
        }
    }
    if end >= 1 {
        return place_at(tokens, end - 1).map(|(code, _)| code);
    }
    None
}

fn extract_route(tokens: &[Token]) -> Option<Route> {
    let from_origin = tokens
        .iter()
        .position(|token| token.lower == "from")
        .and_then(|index| place_at(tokens, index + 1))
        .map(|(code, _)| code);

    for (index, token) in tokens.iter().enumerate() {
        if token.lower != "to" {
            continue;
        }
        let Some((destination, _)) = place_at(tokens, index + 1) else {
            continue;
        };
        let origin = place_before(tokens, index).or_else(|| from_origin.clone());
        return Some(Route { origin, destination: Some(destination), to_index: index });
    }

    from_origin.map(|origin| Route { origin: Some(origin), destination: None, to_index: 0 })
}

fn date_label(tokens: &[Token], index: usize) -> Option<DateRole> {
    let previous = |back: usize| {
        index.checked_sub(back).and_then(|at| tokens.get(at)).map(|token| token.lower.as_str())
    };

    match (previous(2), previous(1)) {
        (Some("check"), Some("in")) | (_, Some("check-in" | "checkin")) => Some(DateRole::Start),
        (Some("check"), Some("out")) | (_, Some("check-out" | "checkout")) => Some(DateRole::End),
        (_, Some("return" | "returning" | "back" | "until" | "till" | "through")) => {
            Some(DateRole::End)
        }
        (Some("coming" | "flying"), Some("home")) => Some(DateRole::End),
        (_, Some("depart" | "departing" | "departure" | "leaving" | "outbound" | "arriving")) => {
            Some(DateRole::Start)
        }
        _ => None,
    }
}

/// Labelled dates win; unlabelled ones fill the start slot, then the end slot.
fn extract_dates(tokens: &[Token]) -> (Option<String>, Option<String>) {
    let mut start = None;
    let mut end = None;
    let mut unlabelled = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        if !looks_like_date(&token.raw) {
            continue;
        }
        match date_label(tokens, index) {
            Some(DateRole::Start) if start.is_none() => start = Some(token.raw.clone()),
            Some(DateRole::End) if end.is_none() => end = Some(token.raw.clone()),
            _ => unlabelled.push(token.raw.clone()),
        }
    }

    for date in unlabelled {
        if start.is_none() {
            start = Some(date);
        } else if end.is_none() {
            end = Some(date);
        }
    }
    (start, end)
}

fn extract_trip_type(normalized: &str) -> Option<&'static str> {
    let padded = format!(" {normalized} ");
    if [" one way ", " one-way ", " oneway "].iter().any(|phrase| padded.contains(phrase)) {
        Some("one_way")
    } else if [" round trip ", " round-trip ", " return flight "]
        .iter()
        .any(|phrase| padded.contains(phrase))
    {
        Some("round_trip")
    } else {
        None
    }
}

fn extract_location(tokens: &[Token]) -> Option<String> {
    for (index, token) in tokens.iter().enumerate() {
        if !matches!(token.lower.as_str(), "in" | "at" | "near") {
            continue;
        }
        if index > 0 && tokens[index - 1].lower == "check" {
            continue;
        }

        let mut words = Vec::new();
        for word in tokens.iter().skip(index + 1).take(4) {
            let starts_name = words.is_empty();
            let stop = LOCATION_STOPWORDS.contains(&word.lower.as_str())
                || (starts_name && LOCATION_REJECTS.contains(&word.lower.as_str()))
                || CURRENCY_CODES.contains(&word.raw.as_str())
                || !word.raw.chars().all(|ch| ch.is_alphabetic() || ch == '-')
                || (!starts_name && !word.raw.starts_with(char::is_uppercase));
            if stop {
                break;
            }
            words.push(word.raw.as_str());
            if word.ends_clause {
                break;
            }
        }

        if !words.is_empty() {
            return Some(words.join(" "));
        }
    }
    None
}

fn parse_number(token: &str) -> Option<i64> {
    token.parse::<i64>().ok().or_else(|| {
        NUMBER_WORDS.iter().find(|(word, _)| *word == token).map(|(_, value)| *value)
    })
}

fn extract_counts(tokens: &[Token]) -> Counts {
    let mut counts = Counts::default();

    for (index, token) in tokens.iter().enumerate() {
        if let Some(stars) = token.lower.strip_suffix("-star").and_then(parse_number) {
            counts.hotel_classes.push(stars);
            continue;
        }

        let Some(value) = parse_number(&token.lower) else {
            continue;
        };
        let Some(unit) = tokens.get(index + 1).map(|next| next.lower.as_str()) else {
            continue;
        };
        let in_seat = tokens
            .get(index + 2..index + 4)
            .map(|rest| rest[0].lower == "in" && rest[1].lower == "seat")
            .unwrap_or(false);

        let field = match unit {
            "adult" | "adults" | "people" | "persons" | "guest" | "guests" | "traveler"
            | "travelers" | "traveller" | "travellers" | "passenger" | "passengers" => {
                Some(flight_fields::ADULTS)
            }
            "child" | "children" | "kid" | "kids" => Some(flight_fields::CHILDREN),
            "infant" | "infants" | "baby" | "babies" if in_seat => {
                Some(flight_fields::INFANTS_IN_SEAT)
            }
            "infant" | "infants" | "baby" | "babies" => Some(flight_fields::INFANTS_ON_LAP),
            "room" | "rooms" => Some(hotel_fields::ROOMS),
            "star" | "stars" | "star-rated" => {
                counts.hotel_classes.push(value);
                None
            }
            "stop" | "stops" => {
                counts.stops = match value {
                    0 => Some("nonstop"),
                    1 => Some("one"),
                    _ => Some("two"),
                };
                None
            }
            _ => None,
        };

        // Bare articles only count for singular units ("a room"), never "a adults".
        let is_article = matches!(token.lower.as_str(), "a" | "an" | "no");
        if let Some(field) = field {
            if is_article && !matches!(unit, "room" | "child" | "kid" | "infant" | "baby") {
                continue;
            }
            if counts.fields.iter().all(|(existing, _)| *existing != field) {
                counts.fields.push((field, value));
            }
        }
    }

    counts.hotel_classes.sort_unstable();
    counts.hotel_classes.dedup();
    counts
}

fn extract_nonstop(normalized: &str) -> Option<&'static str> {
    let padded = format!(" {normalized} ");
    [" nonstop ", " non-stop ", " direct "]
        .iter()
        .any(|phrase| padded.contains(phrase))
        .then_some("nonstop")
}

fn extract_sort(normalized: &str) -> Option<&'static str> {
    let padded = format!(" {normalized} ");
    let has = |phrases: &[&str]| phrases.iter().any(|phrase| padded.contains(phrase));

    if has(&[" cheapest ", " cheap ", " lowest price ", " budget "]) {
        Some("price_low_to_high")
    } else if has(&[" most expensive ", " luxury ", " highest price "]) {
        Some("price_high_to_low")
    } else if has(&[" best rated ", " top rated ", " highest rated ", " best reviewed "]) {
        Some("rating_high_to_low")
    } else if has(&[" popular ", " most popular "]) {
        Some("popularity")
    } else {
        None
    }
}

fn extract_currency(tokens: &[Token]) -> Option<String> {
    tokens.iter().find_map(|token| {
        if CURRENCY_CODES.contains(&token.raw.as_str()) {
            return Some(token.raw.clone());
        }
        CURRENCY_WORDS
            .iter()
            .find(|(word, _)| *word == token.lower)
            .map(|(_, code)| (*code).to_string())
    })
}

#[cfg(test)]
mod tests {
    use tripdesk_core::domain::intent::Intent;
    use tripdesk_core::domain::search::{FLIGHT_SCHEMA, HOTEL_SCHEMA};

    use super::KeywordReasoner;
    use crate::reasoning::ReasoningService;

    #[test]
    fn classifies_domain_keywords() {
        let reasoner = KeywordReasoner::new();
        assert_eq!(reasoner.classify("Hi there"), Intent::Unclear);
        assert_eq!(reasoner.classify("I need a flight to Paris"), Intent::Flights);
        assert_eq!(reasoner.classify("actually, show me hotels"), Intent::Hotels);
        assert_eq!(reasoner.classify("Book a room in Rome"), Intent::Hotels);
        assert_eq!(reasoner.classify("NYC to LA on 2020-01-01"), Intent::Flights);
        assert_eq!(reasoner.classify("2026-11-02"), Intent::Unclear);
    }

    #[test]
    fn earliest_domain_mention_wins() {
        let reasoner = KeywordReasoner::new();
        assert_eq!(
            reasoner.classify("flights to Lisbon, and later a hotel there"),
            Intent::Flights
        );
        assert_eq!(
            reasoner.classify("a hotel in Lisbon, and maybe flights too"),
            Intent::Hotels
        );
    }

    #[test]
    fn extracts_a_flight_request() {
        let params = KeywordReasoner::new()
            .extract("Round trip from New York to LA departing 2026-11-02 returning 2026-11-09 for 2 adults, nonstop, in EUR")
            .restricted_to(&FLIGHT_SCHEMA);

        assert_eq!(params.get("origin"), Some("JFK"));
        assert_eq!(params.get("destination"), Some("LAX"));
        assert_eq!(params.get("depart_date"), Some("2026-11-02"));
        assert_eq!(params.get("return_date"), Some("2026-11-09"));
        assert_eq!(params.get("trip_type"), Some("round_trip"));
        assert_eq!(params.get("adults"), Some("2"));
        assert_eq!(params.get("stops"), Some("nonstop"));
        assert_eq!(params.get("currency"), Some("EUR"));
    }

    #[test]
    fn past_and_malformed_dates_are_passed_through() {
        let reasoner = KeywordReasoner::new();
        let params = reasoner.extract("NYC to LA on 2020-01-01").restricted_to(&FLIGHT_SCHEMA);
        assert_eq!(params.get("origin"), Some("JFK"));
        assert_eq!(params.get("destination"), Some("LAX"));
        assert_eq!(params.get("depart_date"), Some("2020-01-01"));

        let params = reasoner.extract("JFK to SFO 2026-13-40").restricted_to(&FLIGHT_SCHEMA);
        assert_eq!(params.get("depart_date"), Some("2026-13-40"));
    }

    #[test]
    fn extracts_a_hotel_request() {
        let params = KeywordReasoner::new()
            .extract("Find me a 4-star hotel in Paris, check-in 2025-06-10, check-out 2025-06-08, 2 adults and 1 child, 2 rooms, cheapest first")
            .restricted_to(&HOTEL_SCHEMA);

        assert_eq!(params.get("location"), Some("Paris"));
        assert_eq!(params.get("check_in"), Some("2025-06-10"));
        assert_eq!(params.get("check_out"), Some("2025-06-08"));
        assert_eq!(params.get("adults"), Some("2"));
        assert_eq!(params.get("children"), Some("1"));
        assert_eq!(params.get("rooms"), Some("2"));
        assert_eq!(params.get("hotel_class"), Some("4"));
        assert_eq!(params.get("sort_by"), Some("price_low_to_high"));
        assert!(!params.contains("origin"));
    }

    #[test]
    fn multi_word_locations_stop_at_connectors() {
        let reasoner = KeywordReasoner::new();
        let params = reasoner.extract("hotels in New York from 2026-12-01 until 2026-12-04");
        assert_eq!(params.get("location"), Some("New York"));
        assert_eq!(params.get("check_in"), Some("2026-12-01"));
        assert_eq!(params.get("check_out"), Some("2026-12-04"));

        let params = reasoner.extract("I'm interested in hotels");
        assert!(!params.contains("location"));
    }

    #[test]
    fn labelled_return_date_stays_in_the_end_slot() {
        let params = KeywordReasoner::new().extract("coming back 2026-11-09, leaving 2026-11-02");
        assert_eq!(params.get("depart_date"), Some("2026-11-02"));
        assert_eq!(params.get("return_date"), Some("2026-11-09"));
    }

    #[test]
    fn bare_date_fills_the_start_slot() {
        let params = KeywordReasoner::new().extract("2026-11-02");
        assert_eq!(params.get("depart_date"), Some("2026-11-02"));
        assert!(!params.contains("return_date"));
    }

    #[tokio::test]
    async fn reasoning_service_narrows_to_the_schema() {
        let reasoner = KeywordReasoner::new();
        let params = reasoner
            .extract_parameters("hotel in Rome check in 2026-12-01 for two guests", &HOTEL_SCHEMA)
            .await;

        assert_eq!(params.get("location"), Some("Rome"));
        assert_eq!(params.get("check_in"), Some("2026-12-01"));
        assert_eq!(params.get("adults"), Some("2"));
        assert!(!params.contains("depart_date"));
        assert_eq!(reasoner.classify_intent("hotel please").await, Intent::Hotels);
    }
}
