//! Search advisors.
//!
//! One [`Advisor`] per domain, each bound to its own [`SearchTool`]. A turn walks the
//! `AwaitingParameters → Ready → Searching → Responding` phases; validation and search
//! failures turn into replies and the advisor keeps control.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};
use tripdesk_core::clock::Clock;
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::conversation::{ConversationState, Message};
use tripdesk_core::domain::intent::Intent;
use tripdesk_core::domain::params::{ParameterSchema, PartialParams};
use tripdesk_core::domain::search::{FLIGHT_SCHEMA, HOTEL_SCHEMA};
use tripdesk_core::errors::ConfigurationError;
use tripdesk_core::flows::{AdvisorEngine, AdvisorEvent, AdvisorPhase, PhaseTransition};
use tripdesk_core::handoff::{HandoffRequest, HandoffTool};
use tripdesk_core::validation::{ValidationErrorKind, ValidationReport};

use crate::errors::AgentError;
use crate::reasoning::ReasoningService;
use crate::tools::SearchTool;

const CURRENCY_FIELD: &str = "currency";

/// How an agent's turn ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// Finished producing output for this line.
    Continue,
    /// Asked the user something and is waiting for the answer.
    NeedsHuman,
    HandoffTo(HandoffRequest),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdvisorTurn {
    pub phase: AdvisorPhase,
    pub phases: Vec<PhaseTransition>,
    pub outcome: TurnOutcome,
    /// Agent and tool messages for the runtime to append, in order.
    pub messages: Vec<Message>,
    /// Parameters to carry into this advisor's next turn.
    pub draft: PartialParams,
}

pub struct AdvisorInput<'a> {
    pub text: &'a str,
    pub conversation: &'a ConversationState,
    pub draft: PartialParams,
}

#[async_trait]
pub trait AdvisorAgent: Send + Sync {
    fn id(&self) -> AgentId;
    async fn take_turn(&self, input: AdvisorInput<'_>) -> Result<AdvisorTurn, AgentError>;
}

pub struct Advisor<T> {
    id: AgentId,
    tool: T,
    reasoner: Arc<dyn ReasoningService>,
    clock: Arc<dyn Clock>,
    phases: AdvisorEngine,
    default_currency: String,
    handoffs: BTreeMap<AgentId, HandoffTool>,
}

impl<T> Advisor<T>
where
    T: SearchTool,
{
    /// Can hand off to the supervisor and to every other advisor.
    pub fn new(
        id: AgentId,
        tool: T,
        reasoner: Arc<dyn ReasoningService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let handoffs = AgentId::ALL
            .into_iter()
            .filter(|agent| *agent != id && *agent != AgentId::Human)
            .map(|agent| (agent, HandoffTool::to(agent)))
            .collect();

        Self {
            id,
            tool,
            reasoner,
            clock,
            phases: AdvisorEngine::default(),
            default_currency: tripdesk_core::validation::DEFAULT_CURRENCY.to_string(),
            handoffs,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Restricts hand-offs to the named targets.
    pub fn with_handoff_targets(mut self, targets: &[&str]) -> Result<Self, ConfigurationError> {
        self.handoffs = targets
            .iter()
            .map(|name| HandoffTool::for_target(name).map(|tool| (tool.target(), tool)))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    fn domain(&self) -> &'static str {
        match self.id {
            AgentId::FlightsAdvisor => "flights",
            AgentId::HotelAdvisor => "hotels",
            _ => self.tool.name(),
        }
    }

    fn handoff(
        &self,
        target: AgentId,
        reason: String,
        conversation: &ConversationState,
    ) -> Result<HandoffRequest, ConfigurationError> {
        let tool = self.handoffs.get(&target).ok_or(ConfigurationError::MissingBinding(target))?;
        info!(
            event_name = "agent.advisor.handoff",
            agent = self.id.as_str(),
            target = target.as_str(),
            tool = %tool.name(),
            reason = %reason,
            "advisor ceding control"
        );
        Ok(tool.emit(self.id, reason, conversation))
    }

    fn step(
        &self,
        phase: &mut AdvisorPhase,
        event: AdvisorEvent,
        log: &mut Vec<PhaseTransition>,
    ) -> Result<(), AgentError> {
        let transition = self.phases.apply(phase, &event)?;
        debug!(
            event_name = "agent.advisor.phase",
            agent = self.id.as_str(),
            from = transition.from.as_str(),
            to = transition.to.as_str()
        );
        *phase = transition.to;
        log.push(transition);
        Ok(())
    }

    /// Text that mentions another domain still counts as an answer here when it fills at
    /// least as many of this advisor's fields as the other advisor's.
    async fn belongs_to(&self, target: AgentId, text: &str, extracted: &PartialParams) -> bool {
        if extracted.is_empty() {
            return true;
        }
        let Some(schema) = schema_for(target) else {
            return true;
        };
        let theirs = self.reasoner.extract_parameters(text, schema).await.restricted_to(schema);
        debug!(
            event_name = "agent.advisor.contested",
            agent = self.id.as_str(),
            target = target.as_str(),
            ours = extracted.len(),
            theirs = theirs.len()
        );
        theirs.len() > extracted.len()
    }

    fn with_default_currency(&self, draft: &PartialParams) -> PartialParams {
        let mut candidate = draft.clone();
        if !candidate.contains(CURRENCY_FIELD) && self.tool.schema().field(CURRENCY_FIELD).is_some() {
            candidate.insert(CURRENCY_FIELD, self.default_currency.clone());
        }
        candidate
    }
}

#[async_trait]
impl<T> AdvisorAgent for Advisor<T>
where
    T: SearchTool,
{
    fn id(&self) -> AgentId {
        self.id
    }

    async fn take_turn(&self, input: AdvisorInput<'_>) -> Result<AdvisorTurn, AgentError> {
        let mut phase = self.phases.initial_state();
        let mut phases = Vec::new();
        let mut messages = Vec::new();

        let intent = self.reasoner.classify_intent(input.text).await;
        let schema = self.tool.schema();
        let extracted =
            self.reasoner.extract_parameters(input.text, schema).await.restricted_to(schema);

        if let Some(target) = intent.advisor().filter(|target| *target != self.id) {
            if self.belongs_to(target, input.text, &extracted).await {
                let reason = format!("user asked about {}", intent.as_str());
                let request = self.handoff(target, reason, input.conversation)?;
                return Ok(AdvisorTurn {
                    phase,
                    phases,
                    outcome: TurnOutcome::HandoffTo(request),
                    messages,
                    draft: input.draft,
                });
            }
        }

        if intent == Intent::Unclear && extracted.is_empty() && input.draft.is_empty() {
            let reason = format!("request is not about {}", self.domain());
            let request = self.handoff(AgentId::Supervisor, reason, input.conversation)?;
            return Ok(AdvisorTurn {
                phase,
                phases,
                outcome: TurnOutcome::HandoffTo(request),
                messages,
                draft: input.draft,
            });
        }

        let mut draft = input.draft;
        draft.merge(extracted);

        let query = match self.tool.validate(&self.with_default_currency(&draft), self.clock.today()) {
            Ok(query) => query,
            Err(report) => {
                self.step(&mut phase, AdvisorEvent::ParametersRejected, &mut phases)?;
                info!(
                    event_name = "agent.advisor.rejected",
                    agent = self.id.as_str(),
                    errors = report.errors().len(),
                    "parameters failed validation"
                );
                for error in report.errors() {
                    if error.kind != ValidationErrorKind::Missing {
                        draft.remove(&error.field);
                    }
                }
                messages.push(Message::agent(self.id, clarification(self.domain(), schema, &report)));
                return Ok(AdvisorTurn {
                    phase,
                    phases,
                    outcome: TurnOutcome::NeedsHuman,
                    messages,
                    draft,
                });
            }
        };

        self.step(&mut phase, AdvisorEvent::ParametersValidated, &mut phases)?;
        self.step(&mut phase, AdvisorEvent::SearchStarted, &mut phases)?;

        match self.tool.search(&query).await {
            Ok(result) => {
                self.step(&mut phase, AdvisorEvent::SearchSucceeded, &mut phases)?;
                let payload = serde_json::to_value(&result)
                    .unwrap_or_else(|_| json!({ "results": result.len() }));
                messages.push(Message::tool(self.id, self.tool.name(), payload));
                messages.push(Message::agent(self.id, self.tool.render(&query, &result)));
                Ok(AdvisorTurn {
                    phase,
                    phases,
                    outcome: TurnOutcome::Continue,
                    messages,
                    draft: PartialParams::new(),
                })
            }
            Err(error) => {
                self.step(&mut phase, AdvisorEvent::SearchFailed, &mut phases)?;
                warn!(
                    event_name = "agent.advisor.search_failed",
                    agent = self.id.as_str(),
                    error = %error,
                    "search failed, keeping the collected details for a retry"
                );
                messages.push(Message::agent(
                    self.id,
                    format!(
                        "I couldn't complete the {} search: {error}. Say \"retry\" to try again, or change any of the details.",
                        self.domain()
                    ),
                ));
                Ok(AdvisorTurn {
                    phase,
                    phases,
                    outcome: TurnOutcome::NeedsHuman,
                    messages,
                    draft,
                })
            }
        }
    }
}

fn schema_for(agent: AgentId) -> Option<&'static ParameterSchema> {
    match agent {
        AgentId::FlightsAdvisor => Some(&FLIGHT_SCHEMA),
        AgentId::HotelAdvisor => Some(&HOTEL_SCHEMA),
        AgentId::Supervisor | AgentId::Human => None,
    }
}

/// Names every invalid field with its reason, then every missing one with a hint.
fn clarification(domain: &str, schema: &ParameterSchema, report: &ValidationReport) -> String {
    let (missing, invalid): (Vec<_>, Vec<_>) =
        report.errors().iter().partition(|error| error.kind == ValidationErrorKind::Missing);

    let mut lines = Vec::new();
    if !invalid.is_empty() {
        lines.push("Some details need fixing:".to_string());
        for error in invalid {
            lines.push(format!("- {}: {} ({})", error.field, error.message, error.kind.code()));
        }
    }
    if !missing.is_empty() {
        lines.push(format!("To search {domain} I still need:"));
        for error in missing {
            let hint = schema.field(&error.field).map(|field| field.description).unwrap_or_default();
            lines.push(format!("- {}: {}", error.field, hint));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tripdesk_core::clock::FixedClock;
    use tripdesk_core::domain::agent::AgentId;
    use tripdesk_core::domain::conversation::{ConversationState, Message, Role};
    use tripdesk_core::domain::params::PartialParams;
    use tripdesk_core::domain::search::{FlightItinerary, FlightLeg, FlightQuery};
    use tripdesk_core::errors::ConfigurationError;
    use tripdesk_core::flows::{AdvisorEvent, AdvisorPhase};
    use tripdesk_search::{
        FlightSearchAdapter, FlightSearchProvider, ProviderError, SearchPolicy,
    };

    use super::{Advisor, AdvisorAgent, AdvisorInput, TurnOutcome};
    use crate::conversation::KeywordReasoner;
    use crate::tools::FlightsTool;

    struct CountingFlights {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FlightSearchProvider for CountingFlights {
        async fn search_flights(
            &self,
            query: &FlightQuery,
        ) -> Result<Vec<FlightItinerary>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Network("connection reset".to_string()));
            }
            Ok(vec![FlightItinerary {
                price: Decimal::from(240),
                currency: query.currency.clone(),
                legs: vec![FlightLeg {
                    airline: "JetBlue".to_string(),
                    flight_number: Some("B6 23".to_string()),
                    departure_airport: query.origin.clone(),
                    departure_time: "2026-11-02 07:00".to_string(),
                    arrival_airport: query.destination.clone(),
                    arrival_time: "2026-11-02 10:20".to_string(),
                    duration_minutes: Some(380),
                }],
                return_legs: Vec::new(),
                total_duration_minutes: Some(380),
            }])
        }
    }

    fn build(fail: bool) -> (Advisor<FlightsTool>, Arc<CountingFlights>) {
        let provider = Arc::new(CountingFlights { calls: AtomicUsize::new(0), fail });
        let adapter = FlightSearchAdapter::new(provider.clone(), SearchPolicy::default());
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).expect("date");
        let advisor = Advisor::new(
            AgentId::FlightsAdvisor,
            FlightsTool::new(adapter),
            Arc::new(KeywordReasoner::new()),
            Arc::new(FixedClock::on(today)),
        );
        (advisor, provider)
    }

    fn input<'a>(text: &'a str, conversation: &'a ConversationState) -> AdvisorInput<'a> {
        AdvisorInput { text, conversation, draft: PartialParams::new() }
    }

    #[tokio::test]
    async fn missing_fields_are_requested_without_searching() {
        let (advisor, provider) = build(false);
        let conversation = ConversationState::new();

        let turn = advisor
            .take_turn(input("I need a flight from JFK to LAX", &conversation))
            .await
            .expect("turn");

        assert_eq!(turn.phase, AdvisorPhase::AwaitingParameters);
        assert_eq!(turn.outcome, TurnOutcome::NeedsHuman);
        assert_eq!(turn.phases[0].event, AdvisorEvent::ParametersRejected);
        assert!(turn.messages[0].content.contains("- depart_date: Outbound date"));
        assert_eq!(turn.draft.get("origin"), Some("JFK"));
        assert!(!turn.draft.contains("currency"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn draft_is_completed_on_a_later_turn() {
        let (advisor, provider) = build(false);
        let conversation = ConversationState::new();
        let draft = PartialParams::new().with("origin", "JFK").with("destination", "LAX");

        let turn = advisor
            .take_turn(AdvisorInput { text: "2026-11-02", conversation: &conversation, draft })
            .await
            .expect("turn");

        assert_eq!(turn.phase, AdvisorPhase::Responding);
        assert_eq!(turn.outcome, TurnOutcome::Continue);
        assert_eq!(turn.messages[0].role, Role::Tool);
        assert!(turn.messages[1].content.contains("from JFK to LAX on 2026-11-02"));
        assert!(turn.messages[1].content.contains("240 USD"));
        assert!(turn.draft.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_fields_are_dropped_from_the_draft() {
        let (advisor, _provider) = build(false);
        let conversation = ConversationState::new();

        let turn = advisor
            .take_turn(input("flights from JFK to LAX on 2020-01-01", &conversation))
            .await
            .expect("turn");

        assert!(turn.messages[0].content.contains("(PAST_DATE)"));
        assert!(!turn.draft.contains("depart_date"));
        assert_eq!(turn.draft.get("destination"), Some("LAX"));
    }

    #[tokio::test]
    async fn search_failure_keeps_the_advisor_in_charge() {
        let (advisor, provider) = build(true);
        let conversation = ConversationState::new();

        let turn = advisor
            .take_turn(input("fly JFK to LAX on 2026-11-02", &conversation))
            .await
            .expect("turn");

        assert_eq!(turn.phase, AdvisorPhase::AwaitingParameters);
        assert_eq!(turn.outcome, TurnOutcome::NeedsHuman);
        assert_eq!(turn.phases.last().map(|t| t.event), Some(AdvisorEvent::SearchFailed));
        assert!(turn.messages[0].content.starts_with("I couldn't complete the flights search"));
        assert_eq!(turn.draft.get("depart_date"), Some("2026-11-02"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let retry = advisor
            .take_turn(AdvisorInput { text: "retry", conversation: &conversation, draft: turn.draft })
            .await
            .expect("retry turn");
        assert_eq!(retry.phase, AdvisorPhase::AwaitingParameters);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_domain_hands_off_with_full_history() {
        let (advisor, provider) = build(false);
        let mut conversation = ConversationState::new();
        conversation.append(Message::user("I need a flight from JFK to LAX"));
        conversation.append(Message::user("actually, show me hotels"));

        let turn = advisor
            .take_turn(input("actually, show me hotels", &conversation))
            .await
            .expect("turn");

        match turn.outcome {
            TurnOutcome::HandoffTo(request) => {
                assert_eq!(request.source, AgentId::FlightsAdvisor);
                assert_eq!(request.target, AgentId::HotelAdvisor);
                assert_eq!(request.carried_state, conversation);
            }
            other => panic!("expected hand-off, got {other:?}"),
        }
        assert!(turn.messages.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn answers_that_mention_another_domain_stay_with_the_advisor() {
        let (advisor, provider) = build(false);
        let conversation = ConversationState::new();
        let draft = PartialParams::new()
            .with("origin", "JFK")
            .with("destination", "LAX")
            .with("depart_date", "2026-11-02");

        let turn = advisor
            .take_turn(AdvisorInput {
                text: "returning 2026-11-09, staying 7 nights",
                conversation: &conversation,
                draft,
            })
            .await
            .expect("turn");

        assert_eq!(turn.outcome, TurnOutcome::Continue);
        assert!(turn.messages[1].content.contains("on 2026-11-02, returning 2026-11-09"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn requests_that_fit_another_domain_better_are_handed_off() {
        let (advisor, provider) = build(false);
        let conversation = ConversationState::new();
        let draft = PartialParams::new().with("origin", "JFK");

        let turn = advisor
            .take_turn(AdvisorInput {
                text: "hotels in Rome, check-in 2026-12-01, check-out 2026-12-04",
                conversation: &conversation,
                draft,
            })
            .await
            .expect("turn");

        assert!(matches!(
            turn.outcome,
            TurnOutcome::HandoffTo(ref request) if request.target == AgentId::HotelAdvisor
        ));
        assert_eq!(turn.draft.get("origin"), Some("JFK"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unrelated_text_goes_back_to_the_supervisor() {
        let (advisor, _provider) = build(false);
        let conversation = ConversationState::new();

        let turn = advisor.take_turn(input("what's the weather like?", &conversation)).await.expect("turn");

        assert!(matches!(
            turn.outcome,
            TurnOutcome::HandoffTo(ref request) if request.target == AgentId::Supervisor
        ));
    }

    #[tokio::test]
    async fn restricted_targets_reject_unknown_names() {
        let (advisor, _provider) = build(false);
        assert!(matches!(
            advisor.with_handoff_targets(&["supervisor", "car_advisor"]),
            Err(ConfigurationError::UnknownHandoffTarget(name)) if name == "car_advisor"
        ));

        let (advisor, _provider) = build(false);
        let advisor = advisor.with_handoff_targets(&["supervisor"]).expect("known target");
        let conversation = ConversationState::new();
        let error = advisor
            .take_turn(input("show me hotels", &conversation))
            .await
            .expect_err("hotel advisor is not reachable");
        assert_eq!(
            error,
            crate::errors::AgentError::Configuration(ConfigurationError::MissingBinding(
                AgentId::HotelAdvisor
            ))
        );
    }
}
