use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;

/// Outcome of classifying one user line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Flights,
    Hotels,
    Unclear,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flights => "flights",
            Self::Hotels => "hotels",
            Self::Unclear => "unclear",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flights" | "flight" => Self::Flights,
            "hotels" | "hotel" => Self::Hotels,
            _ => Self::Unclear,
        }
    }

    /// Advisor responsible for this intent, if any.
    pub fn advisor(&self) -> Option<AgentId> {
        match self {
            Self::Flights => Some(AgentId::FlightsAdvisor),
            Self::Hotels => Some(AgentId::HotelAdvisor),
            Self::Unclear => None,
        }
    }
}
