use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};
use tripdesk_core::clock::Clock;
use tripdesk_core::config::{AppConfig, LlmProvider};
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::conversation::{Message, Role};
use tripdesk_core::domain::thread::ThreadSnapshot;
use tripdesk_core::errors::ConfigurationError;
use tripdesk_core::flows::{
    PhaseTransition, RouteAction, RouteEvent, RouteState, RouteTransition, RoutingEngine,
};
use tripdesk_core::handoff::HandoffRequest;
use tripdesk_search::{
    FlightSearchAdapter, FlightSearchProvider, HotelSearchAdapter, HotelSearchProvider,
    SearchPolicy, SerpApiClient, SerpApiSettings, UnconfiguredProvider,
};

use crate::advisor::{Advisor, AdvisorAgent, AdvisorInput, TurnOutcome};
use crate::conversation::KeywordReasoner;
use crate::errors::AgentError;
use crate::llm::HttpLlmClient;
use crate::reasoning::{LlmReasoner, ReasoningService};
use crate::supervisor::Supervisor;
use crate::tools::{FlightsTool, HotelsTool};

/// Hand-offs allowed while handling a single line of user input.
pub const DEFAULT_MAX_HANDOFFS: usize = 4;

/// What happened while handling one line of user input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnReport {
    pub transitions: Vec<RouteTransition>,
    pub phases: Vec<(AgentId, PhaseTransition)>,
    pub handoffs: Vec<HandoffRequest>,
    /// Agent messages to show the user, oldest first.
    pub replies: Vec<Message>,
}

pub struct AgentRuntime {
    supervisor: Supervisor,
    advisors: BTreeMap<AgentId, Arc<dyn AdvisorAgent>>,
    routing: RoutingEngine,
    clock: Arc<dyn Clock>,
    max_handoffs: usize,
}

#[derive(Default)]
pub struct AgentRuntimeBuilder {
    reasoner: Option<Arc<dyn ReasoningService>>,
    advisors: BTreeMap<AgentId, Arc<dyn AdvisorAgent>>,
    clock: Option<Arc<dyn Clock>>,
    max_handoffs: Option<usize>,
}

impl AgentRuntimeBuilder {
    pub fn reasoner(mut self, reasoner: Arc<dyn ReasoningService>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    /// Registers an advisor under its own identifier, replacing any earlier one.
    pub fn advisor(mut self, advisor: Arc<dyn AdvisorAgent>) -> Self {
        self.advisors.insert(advisor.id(), advisor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn max_handoffs(mut self, limit: usize) -> Self {
        self.max_handoffs = Some(limit);
        self
    }

    /// Every agent a state can name must be bound before the runtime exists.
    pub fn build(self) -> Result<AgentRuntime, ConfigurationError> {
        let reasoner = self.reasoner.ok_or(ConfigurationError::MissingBinding(AgentId::Supervisor))?;
        for agent in AgentId::ALL.into_iter().filter(AgentId::is_advisor) {
            if !self.advisors.contains_key(&agent) {
                return Err(ConfigurationError::MissingBinding(agent));
            }
        }

        Ok(AgentRuntime {
            supervisor: Supervisor::new(reasoner),
            advisors: self.advisors,
            routing: RoutingEngine::default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(tripdesk_core::clock::SystemClock)),
            max_handoffs: self.max_handoffs.unwrap_or(DEFAULT_MAX_HANDOFFS),
        })
    }
}

impl AgentRuntime {
    pub fn builder() -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::default()
    }

    /// Wires reasoning and search from configuration.
    ///
    /// Without a search API key both advisors still run; their searches fail with a
    /// recoverable error that is reported in the chat.
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let reasoner: Arc<dyn ReasoningService> = match config.llm.provider {
            LlmProvider::Heuristic => Arc::new(KeywordReasoner::new()),
            provider => {
                let client = HttpLlmClient::from_config(&config.llm)
                    .with_context(|| format!("failed to set up {} client", provider.as_str()))?;
                Arc::new(LlmReasoner::new(client, clock.clone()))
            }
        };

        let (flights, hotels): (Arc<dyn FlightSearchProvider>, Arc<dyn HotelSearchProvider>) =
            if config.has_search_credentials() {
                let settings = SerpApiSettings::from_config(&config.search)
                    .context("invalid search provider settings")?;
                let client =
                    Arc::new(SerpApiClient::new(settings).context("failed to set up search client")?);
                (client.clone(), client)
            } else {
                warn!(
                    event_name = "agent.runtime.search_unconfigured",
                    "no search API key configured; searches will report an error"
                );
                (Arc::new(UnconfiguredProvider), Arc::new(UnconfiguredProvider))
            };
        let policy = SearchPolicy::from(&config.search);

        let flights_advisor = Advisor::new(
            AgentId::FlightsAdvisor,
            FlightsTool::new(FlightSearchAdapter::new(flights, policy)),
            reasoner.clone(),
            clock.clone(),
        )
        .with_currency(config.search.currency.clone());
        let hotel_advisor = Advisor::new(
            AgentId::HotelAdvisor,
            HotelsTool::new(HotelSearchAdapter::new(hotels, policy)),
            reasoner.clone(),
            clock.clone(),
        )
        .with_currency(config.search.currency.clone());

        info!(
            event_name = "agent.runtime.ready",
            reasoning = config.llm.provider.as_str(),
            search = if config.has_search_credentials() { "serpapi" } else { "unconfigured" },
            "agent runtime assembled"
        );

        Ok(Self::builder()
            .reasoner(reasoner)
            .clock(clock)
            .advisor(Arc::new(flights_advisor))
            .advisor(Arc::new(hotel_advisor))
            .build()?)
    }

    /// Runs one routing cycle for `text`.
    ///
    /// On error `snapshot` is left exactly as it was, so the caller can keep the thread.
    pub async fn handle_thread_message(
        &self,
        snapshot: &mut ThreadSnapshot,
        text: &str,
    ) -> Result<TurnReport, AgentError> {
        let mut thread = snapshot.clone();
        let mut report = TurnReport::default();

        thread.conversation.append(Message::user(text));
        let first_new = thread.conversation.len();
        let correlation_id = format!("{}#{}", thread.thread_id.as_str(), first_new);
        if matches!(thread.route, RouteState::AwaitingHuman { .. }) {
            self.advance(&mut thread, RouteEvent::HumanInputReceived, &mut report, &correlation_id)?;
        }

        let mut hops = 0;
        loop {
            match thread.route.active_agent() {
                AgentId::Human => break,
                AgentId::Supervisor => {
                    let intent = self.supervisor.classify(text).await;
                    let transition = self.advance(
                        &mut thread,
                        RouteEvent::IntentClassified { intent },
                        &mut report,
                        &correlation_id,
                    )?;
                    if transition.actions.contains(&RouteAction::PromptForIntent) {
                        let prompt = self.supervisor.options_prompt(&thread.conversation);
                        thread.conversation.append(Message::agent(AgentId::Supervisor, prompt));
                        break;
                    }
                }
                agent => {
                    let advisor =
                        self.advisors.get(&agent).ok_or(ConfigurationError::MissingBinding(agent))?;
                    let turn = advisor
                        .take_turn(AdvisorInput {
                            text,
                            conversation: &thread.conversation,
                            draft: thread.draft(agent),
                        })
                        .await?;

                    report.phases.extend(turn.phases.into_iter().map(|phase| (agent, phase)));
                    for message in turn.messages {
                        thread.conversation.append(message);
                    }
                    thread.store_draft(agent, turn.draft);

                    match turn.outcome {
                        TurnOutcome::Continue | TurnOutcome::NeedsHuman => {
                            self.advance(
                                &mut thread,
                                RouteEvent::HumanInputRequired { agent },
                                &mut report,
                                &correlation_id,
                            )?;
                            break;
                        }
                        TurnOutcome::HandoffTo(request) => {
                            hops += 1;
                            if hops > self.max_handoffs {
                                warn!(
                                    event_name = "agent.runtime.handoff_loop",
                                    thread_id = thread.thread_id.as_str(),
                                    correlation_id = correlation_id.as_str(),
                                    limit = self.max_handoffs,
                                    "too many hand-offs for one message"
                                );
                                return Err(ConfigurationError::HandoffLoop {
                                    limit: self.max_handoffs,
                                    last: request.target,
                                }
                                .into());
                            }
                            thread.conversation.append(Message::tool(
                                request.source,
                                format!("transferred to {}: {}", request.target.as_str(), request.reason),
                                json!({
                                    "handoff": {
                                        "from": request.source.as_str(),
                                        "to": request.target.as_str(),
                                        "reason": request.reason,
                                    }
                                }),
                            ));
                            self.advance(
                                &mut thread,
                                RouteEvent::HandoffReceived { from: request.source, to: request.target },
                                &mut report,
                                &correlation_id,
                            )?;
                            report.handoffs.push(request);
                        }
                    }
                }
            }
        }

        report.replies = thread
            .conversation
            .messages_since(first_new)
            .iter()
            .filter(|message| message.role == Role::Agent)
            .cloned()
            .collect();
        thread.updated_at = self.clock.now();
        *snapshot = thread;
        Ok(report)
    }

    fn advance(
        &self,
        thread: &mut ThreadSnapshot,
        event: RouteEvent,
        report: &mut TurnReport,
        correlation_id: &str,
    ) -> Result<RouteTransition, AgentError> {
        let transition = self.routing.apply(&thread.route, &event)?;
        info!(
            event_name = "agent.runtime.route",
            thread_id = thread.thread_id.as_str(),
            correlation_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            active = transition.to.active_agent().as_str()
        );
        thread.route = transition.to;
        report.transitions.push(transition.clone());
        Ok(transition)
    }
}
