use thiserror::Error;

use crate::domain::agent::AgentId;
use crate::domain::intent::Intent;
use crate::flows::states::{
    AdvisorAction, AdvisorEvent, AdvisorPhase, PhaseTransition, RouteAction, RouteEvent,
    RouteState, RouteTransition, Transition,
};

pub trait FlowDefinition {
    type State: Clone;
    type Event: Clone;
    type Action;
    type Error;

    fn initial_state(&self) -> Self::State;
    fn transition(
        &self,
        current: &Self::State,
        event: &Self::Event,
    ) -> Result<Transition<Self::State, Self::Event, Self::Action>, Self::Error>;
}

/// Supervisor routing: which agent holds control of a thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoutingFlow;

impl FlowDefinition for RoutingFlow {
    type State = RouteState;
    type Event = RouteEvent;
    type Action = RouteAction;
    type Error = RouteTransitionError;

    fn initial_state(&self) -> RouteState {
        RouteState::AwaitingIntent
    }

    fn transition(
        &self,
        current: &RouteState,
        event: &RouteEvent,
    ) -> Result<RouteTransition, RouteTransitionError> {
        transition_route(current, event)
    }
}

/// Per-turn phases of a search advisor.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdvisorFlow;

impl FlowDefinition for AdvisorFlow {
    type State = AdvisorPhase;
    type Event = AdvisorEvent;
    type Action = AdvisorAction;
    type Error = PhaseTransitionError;

    fn initial_state(&self) -> AdvisorPhase {
        AdvisorPhase::AwaitingParameters
    }

    fn transition(
        &self,
        current: &AdvisorPhase,
        event: &AdvisorEvent,
    ) -> Result<PhaseTransition, PhaseTransitionError> {
        transition_phase(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> F::State {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &F::State,
        event: &F::Event,
    ) -> Result<Transition<F::State, F::Event, F::Action>, F::Error> {
        self.flow.transition(current, event)
    }
}

pub type RoutingEngine = FlowEngine<RoutingFlow>;
pub type AdvisorEngine = FlowEngine<AdvisorFlow>;

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new(RoutingFlow)
    }
}

impl Default for AdvisorEngine {
    fn default() -> Self {
        Self::new(AdvisorFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RouteTransitionError {
    #[error("invalid routing transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RouteState, event: RouteEvent },
    #[error("`{source_agent}` cannot act while `{active}` holds control")]
    InactiveSource { active: AgentId, source_agent: AgentId },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid advisor transition from {phase:?} using event {event:?}")]
pub struct PhaseTransitionError {
    pub phase: AdvisorPhase,
    pub event: AdvisorEvent,
}

fn transition_route(
    current: &RouteState,
    event: &RouteEvent,
) -> Result<RouteTransition, RouteTransitionError> {
    use RouteAction::{CedeTo, PromptForIntent, ReturnToUser};
    use RouteEvent::{HandoffReceived, HumanInputReceived, HumanInputRequired, IntentClassified};
    use RouteState::{AwaitingHuman, AwaitingIntent};

    let ensure_active = |agent: AgentId| {
        let active = current.active_agent();
        if active == agent {
            Ok(())
        } else {
            Err(RouteTransitionError::InactiveSource { active, source_agent: agent })
        }
    };

    let (to, actions) = match (current, event) {
        (AwaitingIntent, IntentClassified { intent }) => match intent.advisor() {
            Some(advisor) => (RouteState::held_by(advisor, AgentId::Supervisor), vec![CedeTo(advisor)]),
            None => (AwaitingIntent, vec![PromptForIntent]),
        },
        (AwaitingHuman { resume }, HumanInputReceived) if *resume != AgentId::Human => {
            (RouteState::held_by(*resume, *resume), vec![CedeTo(*resume)])
        }
        (AwaitingHuman { .. }, _) | (_, HumanInputReceived) | (_, IntentClassified { .. }) => {
            return Err(RouteTransitionError::InvalidTransition { state: *current, event: *event });
        }
        (_, HandoffReceived { from, to }) => {
            ensure_active(*from)?;
            let next = RouteState::held_by(*to, *from);
            let actions = if *to == AgentId::Human { vec![ReturnToUser] } else { vec![CedeTo(*to)] };
            (next, actions)
        }
        (_, HumanInputRequired { agent }) => {
            ensure_active(*agent)?;
            (AwaitingHuman { resume: *agent }, vec![ReturnToUser])
        }
    };

    Ok(Transition { from: *current, to, event: *event, actions })
}

fn transition_phase(
    current: &AdvisorPhase,
    event: &AdvisorEvent,
) -> Result<PhaseTransition, PhaseTransitionError> {
    use AdvisorAction::{InvokeSearch, RenderResults, ReportSearchError, RequestParameters};
    use AdvisorEvent::{
        ParametersRejected, ParametersValidated, SearchFailed, SearchStarted, SearchSucceeded,
    };
    use AdvisorPhase::{AwaitingParameters, Ready, Responding, Searching};

    let (to, actions) = match (current, event) {
        (AwaitingParameters, ParametersRejected) => (AwaitingParameters, vec![RequestParameters]),
        (AwaitingParameters, ParametersValidated) => (Ready, Vec::new()),
        (Ready, SearchStarted) => (Searching, vec![InvokeSearch]),
        (Searching, SearchSucceeded) => (Responding, vec![RenderResults]),
        (Searching, SearchFailed) => (AwaitingParameters, vec![ReportSearchError]),
        _ => return Err(PhaseTransitionError { phase: *current, event: *event }),
    };

    Ok(Transition { from: *current, to, event: *event, actions })
}

#[cfg(test)]
mod tests {
    use super::{AdvisorEngine, PhaseTransitionError, RouteTransitionError, RoutingEngine};
    use crate::domain::agent::AgentId;
    use crate::domain::intent::Intent;
    use crate::flows::states::{
        AdvisorAction, AdvisorEvent, AdvisorPhase, RouteAction, RouteEvent, RouteState,
    };

    fn all_states() -> Vec<RouteState> {
        let mut states =
            vec![RouteState::AwaitingIntent, RouteState::RoutingToFlights, RouteState::RoutingToHotels];
        for agent in [AgentId::Supervisor, AgentId::FlightsAdvisor, AgentId::HotelAdvisor] {
            states.push(RouteState::AwaitingHuman { resume: agent });
        }
        states
    }

    #[test]
    fn unclear_intent_stays_awaiting_intent_and_prompts() {
        let engine = RoutingEngine::default();
        let outcome = engine
            .apply(&engine.initial_state(), &RouteEvent::IntentClassified { intent: Intent::Unclear })
            .expect("unclear -> awaiting intent");

        assert_eq!(outcome.to, RouteState::AwaitingIntent);
        assert_eq!(outcome.actions, vec![RouteAction::PromptForIntent]);
        assert_eq!(outcome.to.active_agent(), AgentId::Supervisor);
    }

    #[test]
    fn classified_intent_cedes_to_the_matching_advisor() {
        let engine = RoutingEngine::default();
        let flights = engine
            .apply(&RouteState::AwaitingIntent, &RouteEvent::IntentClassified { intent: Intent::Flights })
            .expect("flights");
        assert_eq!(flights.to, RouteState::RoutingToFlights);
        assert_eq!(flights.actions, vec![RouteAction::CedeTo(AgentId::FlightsAdvisor)]);

        let hotels = engine
            .apply(&RouteState::AwaitingIntent, &RouteEvent::IntentClassified { intent: Intent::Hotels })
            .expect("hotels");
        assert_eq!(hotels.to.active_agent(), AgentId::HotelAdvisor);
    }

    #[test]
    fn handoff_always_lands_on_its_target() {
        let engine = RoutingEngine::default();
        for state in all_states() {
            let from = state.active_agent();
            if from == AgentId::Human {
                continue;
            }
            for to in AgentId::ALL {
                let outcome = engine
                    .apply(&state, &RouteEvent::HandoffReceived { from, to })
                    .expect("handoff from the active agent");
                assert_eq!(outcome.to.active_agent(), to, "{state:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn handoff_to_human_resumes_the_source() {
        let engine = RoutingEngine::default();
        let yielded = engine
            .apply(
                &RouteState::RoutingToFlights,
                &RouteEvent::HandoffReceived { from: AgentId::FlightsAdvisor, to: AgentId::Human },
            )
            .expect("yield to human");
        assert_eq!(yielded.to, RouteState::AwaitingHuman { resume: AgentId::FlightsAdvisor });
        assert_eq!(yielded.actions, vec![RouteAction::ReturnToUser]);

        let resumed =
            engine.apply(&yielded.to, &RouteEvent::HumanInputReceived).expect("human replied");
        assert_eq!(resumed.to, RouteState::RoutingToFlights);
    }

    #[test]
    fn handoff_from_an_inactive_agent_is_rejected() {
        let engine = RoutingEngine::default();
        let error = engine
            .apply(
                &RouteState::RoutingToHotels,
                &RouteEvent::HandoffReceived { from: AgentId::FlightsAdvisor, to: AgentId::Supervisor },
            )
            .expect_err("flights advisor is not active");
        assert_eq!(
            error,
            RouteTransitionError::InactiveSource {
                active: AgentId::HotelAdvisor,
                source_agent: AgentId::FlightsAdvisor,
            }
        );
    }

    #[test]
    fn exactly_one_agent_is_active_after_every_transition() {
        let engine = RoutingEngine::default();
        let events = [
            RouteEvent::IntentClassified { intent: Intent::Flights },
            RouteEvent::HumanInputRequired { agent: AgentId::FlightsAdvisor },
            RouteEvent::HumanInputReceived,
            RouteEvent::HandoffReceived { from: AgentId::FlightsAdvisor, to: AgentId::HotelAdvisor },
            RouteEvent::HandoffReceived { from: AgentId::HotelAdvisor, to: AgentId::Supervisor },
            RouteEvent::IntentClassified { intent: Intent::Unclear },
        ];

        let mut state = engine.initial_state();
        let mut seen = Vec::new();
        for event in events {
            state = engine.apply(&state, &event).expect("scripted transition").to;
            seen.push(state.active_agent());
        }
        assert_eq!(
            seen,
            vec![
                AgentId::FlightsAdvisor,
                AgentId::Human,
                AgentId::FlightsAdvisor,
                AgentId::HotelAdvisor,
                AgentId::Supervisor,
                AgentId::Supervisor,
            ]
        );
    }

    #[test]
    fn classification_outside_awaiting_intent_is_rejected() {
        let engine = RoutingEngine::default();
        assert!(engine
            .apply(&RouteState::RoutingToHotels, &RouteEvent::IntentClassified { intent: Intent::Flights })
            .is_err());
        assert!(engine.apply(&RouteState::AwaitingIntent, &RouteEvent::HumanInputReceived).is_err());
    }

    #[test]
    fn advisor_phases_follow_the_search_cycle() {
        let engine = AdvisorEngine::default();
        let mut phase = engine.initial_state();

        let rejected = engine.apply(&phase, &AdvisorEvent::ParametersRejected).expect("rejected");
        assert_eq!(rejected.to, AdvisorPhase::AwaitingParameters);
        assert_eq!(rejected.actions, vec![AdvisorAction::RequestParameters]);

        for (event, expected) in [
            (AdvisorEvent::ParametersValidated, AdvisorPhase::Ready),
            (AdvisorEvent::SearchStarted, AdvisorPhase::Searching),
            (AdvisorEvent::SearchFailed, AdvisorPhase::AwaitingParameters),
            (AdvisorEvent::ParametersValidated, AdvisorPhase::Ready),
            (AdvisorEvent::SearchStarted, AdvisorPhase::Searching),
            (AdvisorEvent::SearchSucceeded, AdvisorPhase::Responding),
        ] {
            phase = engine.apply(&phase, &event).expect("scripted phase").to;
            assert_eq!(phase, expected);
        }
    }

    #[test]
    fn search_cannot_start_before_parameters_validate() {
        let engine = AdvisorEngine::default();
        assert_eq!(
            engine.apply(&AdvisorPhase::AwaitingParameters, &AdvisorEvent::SearchStarted),
            Err(PhaseTransitionError {
                phase: AdvisorPhase::AwaitingParameters,
                event: AdvisorEvent::SearchStarted,
            })
        );
        assert!(engine.apply(&AdvisorPhase::Responding, &AdvisorEvent::SearchStarted).is_err());
    }
}
