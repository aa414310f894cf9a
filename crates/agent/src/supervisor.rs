use std::sync::Arc;

use tracing::info;
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::conversation::{ConversationState, Role};
use tripdesk_core::domain::intent::Intent;

use crate::reasoning::ReasoningService;

const GREETING: &str = "Hello! I'm the travel desk assistant. I can help you with:\n\
- Flights: fares between two airports, one-way or round trip\n\
- Hotels: places to stay in a city for your dates and group\n\
What would you like to plan?";

const OPTIONS: &str = "I can help with flights or hotels. Which one would you like?";

/// Entry point of every thread. Never searches; only decides who handles the request.
pub struct Supervisor {
    reasoner: Arc<dyn ReasoningService>,
}

impl Supervisor {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }

    pub async fn classify(&self, text: &str) -> Intent {
        let intent = self.reasoner.classify_intent(text).await;
        info!(event_name = "agent.supervisor.classified", intent = intent.as_str());
        intent
    }

    /// Full greeting the first time the supervisor speaks in a thread, a short reminder after.
    pub fn options_prompt(&self, conversation: &ConversationState) -> &'static str {
        let greeted = conversation
            .messages()
            .iter()
            .any(|message| message.role == Role::Agent && message.author == AgentId::Supervisor.as_str());
        if greeted {
            OPTIONS
        } else {
            GREETING
        }
    }
}
