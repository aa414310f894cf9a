//! Agent runtime for the travel desk.
//!
//! A thread is always held by exactly one agent:
//! 1. The **supervisor** (`supervisor`) classifies what the traveller wants and cedes control.
//! 2. A **search advisor** (`advisor`) collects parameters, validates them and calls its
//!    search tool (`tools`). It hands off when the request belongs to someone else.
//! 3. The **runtime** (`runtime`) drives the routing state machine for each line of input.
//!
//! Free text is only ever read through a [`ReasoningService`]: a language model
//! (`llm`, `reasoning`) or deterministic keyword matching (`conversation`). Prices,
//! dates and routing decisions never come from the model.

pub mod advisor;
pub mod conversation;
pub mod errors;
pub mod llm;
pub mod reasoning;
pub mod runtime;
pub mod supervisor;
pub mod tools;

pub use advisor::{Advisor, AdvisorAgent, AdvisorInput, AdvisorTurn, TurnOutcome};
pub use conversation::KeywordReasoner;
pub use errors::AgentError;
pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use reasoning::{LlmReasoner, ReasoningService};
pub use runtime::{AgentRuntime, AgentRuntimeBuilder, TurnReport, DEFAULT_MAX_HANDOFFS};
pub use supervisor::Supervisor;
pub use tools::{FlightsTool, HotelsTool, SearchTool};
