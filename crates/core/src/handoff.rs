//! Control transfer between agents.
//!
//! A [`HandoffTool`] is bound to exactly one known target when it is built, so an emitted
//! [`HandoffRequest`] can never name an agent the runtime does not know about.

use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::conversation::ConversationState;
use crate::errors::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub source: AgentId,
    pub target: AgentId,
    pub reason: String,
    pub carried_state: ConversationState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandoffTool {
    target: AgentId,
}

impl HandoffTool {
    pub fn for_target(name: &str) -> Result<Self, ConfigurationError> {
        name.parse::<AgentId>().map(Self::to)
    }

    pub fn to(target: AgentId) -> Self {
        Self { target }
    }

    pub fn target(&self) -> AgentId {
        self.target
    }

    /// Tool name exposed to a reasoning service, e.g. `transfer_to_hotel_advisor`.
    pub fn name(&self) -> String {
        format!("transfer_to_{}", self.target.as_str())
    }

    pub fn emit(
        &self,
        source: AgentId,
        reason: impl Into<String>,
        conversation: &ConversationState,
    ) -> HandoffRequest {
        HandoffRequest {
            source,
            target: self.target,
            reason: reason.into(),
            carried_state: conversation.clone(),
        }
    }
}
