use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// Identifier of a component that can hold control of a conversation thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    Supervisor,
    FlightsAdvisor,
    HotelAdvisor,
    /// Pseudo-agent standing for the person on the other end of the thread.
    Human,
}

impl AgentId {
    pub const ALL: [AgentId; 4] =
        [AgentId::Supervisor, AgentId::FlightsAdvisor, AgentId::HotelAdvisor, AgentId::Human];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::FlightsAdvisor => "flights_advisor",
            Self::HotelAdvisor => "hotel_advisor",
            Self::Human => "human",
        }
    }

    pub fn is_advisor(&self) -> bool {
        matches!(self, Self::FlightsAdvisor | Self::HotelAdvisor)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|agent| agent.as_str() == normalized)
            .ok_or_else(|| ConfigurationError::UnknownHandoffTarget(value.to_string()))
    }
}
