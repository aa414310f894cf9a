pub mod engine;
pub mod states;

pub use engine::{
    AdvisorEngine, AdvisorFlow, FlowDefinition, FlowEngine, PhaseTransitionError, RouteTransitionError,
    RoutingEngine, RoutingFlow,
};
pub use states::{
    AdvisorAction, AdvisorEvent, AdvisorPhase, PhaseTransition, RouteAction, RouteEvent, RouteState,
    RouteTransition, Transition,
};
