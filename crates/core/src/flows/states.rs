use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::intent::Intent;

/// Routing position of one conversation thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RouteState {
    AwaitingIntent,
    RoutingToFlights,
    RoutingToHotels,
    /// Control is with the user; `resume` gets it back on the next line of input.
    AwaitingHuman { resume: AgentId },
}

impl RouteState {
    /// The single agent holding control in this state.
    pub fn active_agent(&self) -> AgentId {
        match self {
            Self::AwaitingIntent => AgentId::Supervisor,
            Self::RoutingToFlights => AgentId::FlightsAdvisor,
            Self::RoutingToHotels => AgentId::HotelAdvisor,
            Self::AwaitingHuman { .. } => AgentId::Human,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingIntent => "awaiting_intent",
            Self::RoutingToFlights => "routing_to_flights",
            Self::RoutingToHotels => "routing_to_hotels",
            Self::AwaitingHuman { .. } => "awaiting_human",
        }
    }

    /// State in which `agent` is active. `Human` yields back to `source`.
    pub fn held_by(agent: AgentId, source: AgentId) -> Self {
        match agent {
            AgentId::Supervisor => Self::AwaitingIntent,
            AgentId::FlightsAdvisor => Self::RoutingToFlights,
            AgentId::HotelAdvisor => Self::RoutingToHotels,
            AgentId::Human => Self::AwaitingHuman { resume: source },
        }
    }
}

impl Default for RouteState {
    fn default() -> Self {
        Self::AwaitingIntent
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouteEvent {
    IntentClassified { intent: Intent },
    HandoffReceived { from: AgentId, to: AgentId },
    HumanInputRequired { agent: AgentId },
    HumanInputReceived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    PromptForIntent,
    CedeTo(AgentId),
    ReturnToUser,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorPhase {
    AwaitingParameters,
    Ready,
    Searching,
    Responding,
}

impl AdvisorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingParameters => "awaiting_parameters",
            Self::Ready => "ready",
            Self::Searching => "searching",
            Self::Responding => "responding",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorEvent {
    ParametersRejected,
    ParametersValidated,
    SearchStarted,
    SearchSucceeded,
    SearchFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorAction {
    RequestParameters,
    InvokeSearch,
    RenderResults,
    ReportSearchError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition<S, E, A> {
    pub from: S,
    pub to: S,
    pub event: E,
    pub actions: Vec<A>,
}

pub type RouteTransition = Transition<RouteState, RouteEvent, RouteAction>;
pub type PhaseTransition = Transition<AdvisorPhase, AdvisorEvent, AdvisorAction>;
