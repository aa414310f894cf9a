//! Field-level checks shared by both advisors.
//!
//! Every function is pure: "today" is passed in, errors are returned as typed values and
//! malformed input is never coerced into something valid.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::params::PartialParams;
use crate::domain::search::{
    flight_fields, hotel_fields, FlightQuery, HotelQuery, HotelSort, StopsFilter, TripType,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    Missing,
    BadFormat,
    PastDate,
    RangeInvalid,
    NonPositive,
    Inconsistent,
}

impl ValidationErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "MISSING",
            Self::BadFormat => "BAD_FORMAT",
            Self::PastDate => "PAST_DATE",
            Self::RangeInvalid => "RANGE_INVALID",
            Self::NonPositive => "NON_POSITIVE",
            Self::Inconsistent => "INCONSISTENT",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self { field: field.to_string(), kind, message: message.into() }
    }

    fn missing(field: &str) -> Self {
        Self::new(field, ValidationErrorKind::Missing, format!("{field} is required"))
    }
}

/// Every field error found while validating one query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.errors.iter().find(|error| error.field == field)
    }

    pub fn has(&self, field: &str, kind: ValidationErrorKind) -> bool {
        self.errors.iter().any(|error| error.field == field && error.kind == kind)
    }

    fn capture<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }
}

impl From<ValidationError> for ValidationReport {
    fn from(error: ValidationError) -> Self {
        Self { errors: vec![error] }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .errors
            .iter()
            .map(|error| format!("{} ({})", error, error.kind.code()))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {rendered}")
    }
}

impl std::error::Error for ValidationReport {}

pub fn validate_date(
    field: &str,
    candidate: &str,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(ValidationError::missing(field));
    }

    let shaped = candidate.len() == 10
        && candidate.char_indices().all(|(index, ch)| match index {
            4 | 7 => ch == '-',
            _ => ch.is_ascii_digit(),
        });
    let parsed = shaped.then(|| NaiveDate::parse_from_str(candidate, DATE_FORMAT).ok()).flatten();
    let Some(date) = parsed else {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::BadFormat,
            format!("Date must be a calendar date in YYYY-MM-DD format, got {candidate}"),
        ));
    };

    if date < today {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::PastDate,
            format!("Date {candidate} is in the past"),
        ));
    }

    Ok(date)
}

/// Rejects ranges where `end` is not strictly after `start`; reported against `end_field`.
pub fn validate_date_range(
    start_field: &str,
    start: NaiveDate,
    end_field: &str,
    end: NaiveDate,
) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::new(
            end_field,
            ValidationErrorKind::RangeInvalid,
            format!("{end_field} {end} must be after {start_field} {start}"),
        ));
    }
    Ok(())
}

pub fn validate_positive_count(n: i64, field: &str) -> Result<u32, ValidationError> {
    if n <= 0 {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::NonPositive,
            format!("{field} must be a positive number, got {n}"),
        ));
    }
    to_u32(n, field)
}

pub fn validate_non_negative_count(n: i64, field: &str) -> Result<u32, ValidationError> {
    if n < 0 {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::NonPositive,
            format!("{field} cannot be negative, got {n}"),
        ));
    }
    to_u32(n, field)
}

fn to_u32(n: i64, field: &str) -> Result<u32, ValidationError> {
    u32::try_from(n).map_err(|_| {
        ValidationError::new(field, ValidationErrorKind::BadFormat, format!("{field} is too large"))
    })
}

pub fn parse_count(field: &str, raw: &str) -> Result<i64, ValidationError> {
    raw.trim().parse::<i64>().map_err(|_| {
        ValidationError::new(
            field,
            ValidationErrorKind::BadFormat,
            format!("{field} must be a whole number, got {raw}"),
        )
    })
}

pub fn validate_airport_code(field: &str, raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim();
    if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::BadFormat,
            format!("Airport code must be a 3-letter IATA code, got {code}"),
        ));
    }
    Ok(code.to_ascii_uppercase())
}

pub fn validate_currency(field: &str, raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim();
    if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::BadFormat,
            format!("Currency must be a 3-letter ISO code, got {code}"),
        ));
    }
    Ok(code.to_ascii_uppercase())
}

/// Comma-separated star classes, each in `1..=5`. Empty input means "all classes".
pub fn validate_hotel_class(field: &str, raw: &str) -> Result<Vec<u8>, ValidationError> {
    let mut classes = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let class = part.parse::<u8>().ok().filter(|class| (1..=5).contains(class)).ok_or_else(
            || {
                ValidationError::new(
                    field,
                    ValidationErrorKind::BadFormat,
                    format!("Hotel class must be comma-separated numbers between 1 and 5, got {raw}"),
                )
            },
        )?;
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    classes.sort_unstable();
    Ok(classes)
}

fn count_field(
    report: &mut ValidationReport,
    params: &PartialParams,
    field: &str,
    default: u32,
    positive: bool,
) -> u32 {
    let Some(raw) = params.get(field) else {
        return default;
    };
    let checked = parse_count(field, raw).and_then(|n| {
        if positive {
            validate_positive_count(n, field)
        } else {
            validate_non_negative_count(n, field)
        }
    });
    report.capture(checked).unwrap_or(default)
}

fn currency_field(report: &mut ValidationReport, params: &PartialParams, field: &str) -> String {
    match params.get(field) {
        Some(raw) => report.capture(validate_currency(field, raw)).unwrap_or_default(),
        None => DEFAULT_CURRENCY.to_string(),
    }
}

fn required<'a>(
    report: &mut ValidationReport,
    params: &'a PartialParams,
    field: &str,
) -> Option<&'a str> {
    let value = params.get(field);
    if value.is_none() {
        report.push(ValidationError::missing(field));
    }
    value
}

impl FlightQuery {
    pub fn from_params(params: &PartialParams, today: NaiveDate) -> Result<Self, ValidationReport> {
        use flight_fields::*;

        let mut report = ValidationReport::default();

        let origin = required(&mut report, params, ORIGIN)
            .and_then(|raw| report.capture(validate_airport_code(ORIGIN, raw)));
        let destination = required(&mut report, params, DESTINATION)
            .and_then(|raw| report.capture(validate_airport_code(DESTINATION, raw)));
        if let (Some(origin), Some(destination)) = (&origin, &destination) {
            if origin == destination {
                report.push(ValidationError::new(
                    DESTINATION,
                    ValidationErrorKind::Inconsistent,
                    format!("Destination {destination} must differ from origin {origin}"),
                ));
            }
        }

        let depart_date = required(&mut report, params, DEPART_DATE)
            .and_then(|raw| report.capture(validate_date(DEPART_DATE, raw, today)));
        let return_raw = params.get(RETURN_DATE);
        let return_date =
            return_raw.and_then(|raw| report.capture(validate_date(RETURN_DATE, raw, today)));

        let trip_type = match params.get(TRIP_TYPE) {
            Some(raw) => TripType::parse(raw).or_else(|| {
                report.push(ValidationError::new(
                    TRIP_TYPE,
                    ValidationErrorKind::BadFormat,
                    format!("Trip type must be round_trip or one_way, got {raw}"),
                ));
                None
            }),
            None if return_raw.is_some() => Some(TripType::RoundTrip),
            None => Some(TripType::OneWay),
        };

        match trip_type {
            Some(TripType::OneWay) if return_raw.is_some() => {
                report.push(ValidationError::new(
                    RETURN_DATE,
                    ValidationErrorKind::Inconsistent,
                    "Return date should not be provided for one-way flights",
                ));
            }
            Some(TripType::RoundTrip) if return_raw.is_none() => {
                report.push(ValidationError::new(
                    RETURN_DATE,
                    ValidationErrorKind::Missing,
                    "Return date is required for round-trip flights",
                ));
            }
            Some(TripType::RoundTrip) => {
                if let (Some(depart), Some(ret)) = (depart_date, return_date) {
                    report.capture(validate_date_range(DEPART_DATE, depart, RETURN_DATE, ret));
                }
            }
            _ => {}
        }

        let adults = count_field(&mut report, params, ADULTS, 1, true);
        let children = count_field(&mut report, params, CHILDREN, 0, false);
        let infants_in_seat = count_field(&mut report, params, INFANTS_IN_SEAT, 0, false);
        let infants_on_lap = count_field(&mut report, params, INFANTS_ON_LAP, 0, false);

        let stops = match params.get(STOPS) {
            Some(raw) => StopsFilter::parse(raw).unwrap_or_else(|| {
                report.push(ValidationError::new(
                    STOPS,
                    ValidationErrorKind::BadFormat,
                    format!("Stops must be any, nonstop, one or two, got {raw}"),
                ));
                StopsFilter::Any
            }),
            None => StopsFilter::Any,
        };
        let currency = currency_field(&mut report, params, CURRENCY);

        match (origin, destination, depart_date, trip_type) {
            (Some(origin), Some(destination), Some(depart_date), Some(trip_type))
                if report.is_empty() =>
            {
                Ok(Self {
                    origin,
                    destination,
                    depart_date,
                    return_date: if trip_type == TripType::RoundTrip { return_date } else { None },
                    trip_type,
                    adults,
                    children,
                    infants_in_seat,
                    infants_on_lap,
                    stops,
                    currency,
                })
            }
            _ => Err(report),
        }
    }

    pub fn to_params(&self) -> PartialParams {
        use flight_fields::*;

        let mut params = PartialParams::new()
            .with(ORIGIN, self.origin.clone())
            .with(DESTINATION, self.destination.clone())
            .with(DEPART_DATE, self.depart_date.format(DATE_FORMAT).to_string())
            .with(TRIP_TYPE, self.trip_type.as_str())
            .with(ADULTS, self.adults.to_string())
            .with(CHILDREN, self.children.to_string())
            .with(INFANTS_IN_SEAT, self.infants_in_seat.to_string())
            .with(INFANTS_ON_LAP, self.infants_on_lap.to_string())
            .with(STOPS, self.stops.as_str())
            .with(CURRENCY, self.currency.clone());
        if let Some(return_date) = self.return_date {
            params.insert(RETURN_DATE, return_date.format(DATE_FORMAT).to_string());
        }
        params
    }
}

impl HotelQuery {
    pub fn from_params(params: &PartialParams, today: NaiveDate) -> Result<Self, ValidationReport> {
        use hotel_fields::*;

        let mut report = ValidationReport::default();

        let location = required(&mut report, params, LOCATION).map(str::to_string);
        let check_in = required(&mut report, params, CHECK_IN)
            .and_then(|raw| report.capture(validate_date(CHECK_IN, raw, today)));
        let check_out = required(&mut report, params, CHECK_OUT)
            .and_then(|raw| report.capture(validate_date(CHECK_OUT, raw, today)));
        if let (Some(check_in), Some(check_out)) = (check_in, check_out) {
            report.capture(validate_date_range(CHECK_IN, check_in, CHECK_OUT, check_out));
        }

        let adults = count_field(&mut report, params, ADULTS, 1, true);
        let children = count_field(&mut report, params, CHILDREN, 0, false);
        let rooms = count_field(&mut report, params, ROOMS, 1, true);

        let sort_by = match params.get(SORT_BY) {
            Some(raw) => HotelSort::parse(raw).unwrap_or_else(|| {
                report.push(ValidationError::new(
                    SORT_BY,
                    ValidationErrorKind::BadFormat,
                    format!(
                        "Sort must be price_low_to_high, price_high_to_low, rating_high_to_low or popularity, got {raw}"
                    ),
                ));
                HotelSort::default()
            }),
            None => HotelSort::default(),
        };
        let hotel_class = params
            .get(HOTEL_CLASS)
            .and_then(|raw| report.capture(validate_hotel_class(HOTEL_CLASS, raw)))
            .unwrap_or_default();
        let currency = currency_field(&mut report, params, CURRENCY);

        match (location, check_in, check_out) {
            (Some(location), Some(check_in), Some(check_out)) if report.is_empty() => Ok(Self {
                location,
                check_in,
                check_out,
                adults,
                children,
                rooms,
                sort_by,
                hotel_class,
                currency,
            }),
            _ => Err(report),
        }
    }

    pub fn to_params(&self) -> PartialParams {
        use hotel_fields::*;

        let mut params = PartialParams::new()
            .with(LOCATION, self.location.clone())
            .with(CHECK_IN, self.check_in.format(DATE_FORMAT).to_string())
            .with(CHECK_OUT, self.check_out.format(DATE_FORMAT).to_string())
            .with(ADULTS, self.adults.to_string())
            .with(CHILDREN, self.children.to_string())
            .with(ROOMS, self.rooms.to_string())
            .with(SORT_BY, self.sort_by.as_str())
            .with(CURRENCY, self.currency.clone());
        if !self.hotel_class.is_empty() {
            let classes =
                self.hotel_class.iter().map(u8::to_string).collect::<Vec<_>>().join(",");
            params.insert(HOTEL_CLASS, classes);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::{
        validate_airport_code, validate_date, validate_date_range, validate_hotel_class,
        validate_positive_count, ValidationErrorKind,
    };
    use crate::domain::params::PartialParams;
    use crate::domain::search::{FlightQuery, HotelQuery, HotelSort, TripType};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    fn days_from_today(days: u64) -> String {
        (today() + Days::new(days)).format("%Y-%m-%d").to_string()
    }

    #[test]
    fn every_date_before_today_is_rejected_as_past() {
        for days_back in [1_u64, 2, 30, 365, 3_650] {
            let candidate = (today() - Days::new(days_back)).format("%Y-%m-%d").to_string();
            let error = validate_date("depart_date", &candidate, today()).expect_err("past date");
            assert_eq!(error.kind, ValidationErrorKind::PastDate, "{candidate}");
            assert_eq!(error.field, "depart_date");
        }
    }

    #[test]
    fn today_and_future_dates_are_accepted() {
        assert_eq!(validate_date("check_in", "2026-10-18", today()), Ok(today()));
        assert!(validate_date("check_in", &days_from_today(90), today()).is_ok());
    }

    #[test]
    fn malformed_dates_are_rejected_not_clamped() {
        for candidate in ["2026/11/01", "2026-13-01", "2026-02-30", "tomorrow", "2026-1-05", "+2026-11-01"]
        {
            let error = validate_date("check_in", candidate, today()).expect_err("malformed");
            assert_eq!(error.kind, ValidationErrorKind::BadFormat, "{candidate}");
        }
        let error = validate_date("check_in", "  ", today()).expect_err("empty");
        assert_eq!(error.kind, ValidationErrorKind::Missing);
    }

    #[test]
    fn date_range_requires_end_strictly_after_start() {
        let start = today();
        for offset in 0..3_u64 {
            let end_before_or_equal = start - Days::new(offset);
            let error = validate_date_range("check_in", start, "check_out", end_before_or_equal)
                .expect_err("end <= start");
            assert_eq!(error.kind, ValidationErrorKind::RangeInvalid);
            assert_eq!(error.field, "check_out");
        }
        for offset in 1..4_u64 {
            assert!(validate_date_range("check_in", start, "check_out", start + Days::new(offset))
                .is_ok());
        }
    }

    #[test]
    fn non_positive_counts_fail_and_positive_counts_pass() {
        for n in [-10_i64, -1, 0] {
            let error = validate_positive_count(n, "rooms").expect_err("non positive");
            assert_eq!(error.kind, ValidationErrorKind::NonPositive);
            assert_eq!(error.field, "rooms");
        }
        for n in [1_i64, 2, 9, 250] {
            assert_eq!(validate_positive_count(n, "rooms"), Ok(n as u32));
        }
    }

    #[test]
    fn airport_codes_are_upper_cased_and_length_checked() {
        assert_eq!(validate_airport_code("origin", "jfk"), Ok("JFK".to_string()));
        assert!(validate_airport_code("origin", "LA").is_err());
        assert!(validate_airport_code("origin", "J1K").is_err());
    }

    #[test]
    fn hotel_class_accepts_one_to_five_only() {
        assert_eq!(validate_hotel_class("hotel_class", "4, 3,4"), Ok(vec![3, 4]));
        assert_eq!(validate_hotel_class("hotel_class", ""), Ok(Vec::new()));
        assert!(validate_hotel_class("hotel_class", "2,6").is_err());
        assert!(validate_hotel_class("hotel_class", "three").is_err());
    }

    #[test]
    fn flight_query_reports_every_failing_field() {
        let params = PartialParams::new()
            .with("origin", "NYC")
            .with("destination", "LA")
            .with("depart_date", "2020-01-01")
            .with("adults", "0");

        let report = FlightQuery::from_params(&params, today()).expect_err("invalid query");
        assert!(report.has("depart_date", ValidationErrorKind::PastDate));
        assert!(report.has("destination", ValidationErrorKind::BadFormat));
        assert!(report.has("adults", ValidationErrorKind::NonPositive));
        assert!(report.field("origin").is_none());
    }

    #[test]
    fn flight_trip_type_is_inferred_and_checked_for_consistency() {
        let one_way = PartialParams::new()
            .with("origin", "JFK")
            .with("destination", "LAX")
            .with("depart_date", days_from_today(10));
        let query = FlightQuery::from_params(&one_way, today()).expect("valid one-way");
        assert_eq!(query.trip_type, TripType::OneWay);
        assert_eq!(query.return_date, None);

        let round_trip_without_return = one_way.clone().with("trip_type", "round_trip");
        let report = FlightQuery::from_params(&round_trip_without_return, today())
            .expect_err("missing return");
        assert!(report.has("return_date", ValidationErrorKind::Missing));

        let one_way_with_return = one_way
            .clone()
            .with("trip_type", "one_way")
            .with("return_date", days_from_today(12));
        let report =
            FlightQuery::from_params(&one_way_with_return, today()).expect_err("inconsistent");
        assert!(report.has("return_date", ValidationErrorKind::Inconsistent));

        let return_before_departure = one_way.with("return_date", days_from_today(5));
        let report =
            FlightQuery::from_params(&return_before_departure, today()).expect_err("range");
        assert!(report.has("return_date", ValidationErrorKind::RangeInvalid));
    }

    #[test]
    fn hotel_query_rejects_checkout_before_checkin() {
        let params = PartialParams::new()
            .with("location", "Lisbon")
            .with("check_in", days_from_today(20))
            .with("check_out", days_from_today(18));

        let report = HotelQuery::from_params(&params, today()).expect_err("range invalid");
        assert!(report.has("check_out", ValidationErrorKind::RangeInvalid));
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn hotel_query_applies_defaults() {
        let params = PartialParams::new()
            .with("location", "Lisbon")
            .with("check_in", days_from_today(20))
            .with("check_out", days_from_today(23));

        let query = HotelQuery::from_params(&params, today()).expect("valid");
        assert_eq!(query.adults, 1);
        assert_eq!(query.rooms, 1);
        assert_eq!(query.sort_by, HotelSort::RatingHighToLow);
        assert_eq!(query.currency, "USD");
        assert_eq!(query.nights(), 3);
    }

    #[test]
    fn revalidating_a_valid_query_leaves_it_unchanged() {
        let flight = FlightQuery::from_params(
            &PartialParams::new()
                .with("origin", "jfk")
                .with("destination", "lax")
                .with("depart_date", days_from_today(3))
                .with("return_date", days_from_today(9))
                .with("adults", "2")
                .with("stops", "nonstop")
                .with("currency", "eur"),
            today(),
        )
        .expect("valid flight");
        assert_eq!(FlightQuery::from_params(&flight.to_params(), today()), Ok(flight.clone()));

        let hotel = HotelQuery::from_params(
            &PartialParams::new()
                .with("location", "Kyoto")
                .with("check_in", days_from_today(40))
                .with("check_out", days_from_today(44))
                .with("rooms", "2")
                .with("hotel_class", "5,4")
                .with("sort_by", "popularity"),
            today(),
        )
        .expect("valid hotel");
        assert_eq!(HotelQuery::from_params(&hotel.to_params(), today()), Ok(hotel));
    }
}
