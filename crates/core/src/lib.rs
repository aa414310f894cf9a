pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod handoff;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::agent::AgentId;
pub use domain::conversation::{ConversationState, Message, Role};
pub use domain::intent::Intent;
pub use domain::params::{FieldSpec, ParameterSchema, PartialParams};
pub use domain::search::{
    FlightItinerary, FlightLeg, FlightQuery, HotelListing, HotelQuery, HotelSort, SearchQuery,
    SearchResult, StopsFilter, TripType, FLIGHT_SCHEMA, HOTEL_SCHEMA,
};
pub use domain::thread::{ThreadId, ThreadSnapshot};
pub use errors::{ApplicationError, ConfigurationError, DomainError, InterfaceError};
pub use flows::{AdvisorPhase, RouteEvent, RouteState, RouteTransition, RoutingEngine};
pub use handoff::{HandoffRequest, HandoffTool};
pub use validation::{ValidationError, ValidationErrorKind, ValidationReport};
