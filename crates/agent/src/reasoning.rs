//! The reasoning boundary: intent classification and parameter extraction.
//!
//! Routing and validation never look at free text themselves; they ask a
//! [`ReasoningService`] and work with the structured answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use tripdesk_core::clock::Clock;
use tripdesk_core::domain::intent::Intent;
use tripdesk_core::domain::params::{ParameterSchema, PartialParams};
use tripdesk_core::validation::DATE_FORMAT;

use crate::conversation::KeywordReasoner;
use crate::llm::LlmClient;

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn classify_intent(&self, text: &str) -> Intent;

    /// Only fields named in `schema` are returned; anything else is dropped.
    async fn extract_parameters(&self, text: &str, schema: &ParameterSchema) -> PartialParams;
}

const CLASSIFY_SYSTEM: &str = "You route requests for a travel agency that has a flights \
advisor and a hotel advisor. Reply with exactly one word: flights, hotels or unclear.";

const EXTRACT_SYSTEM: &str = "You extract search parameters for a travel agency. Reply with a \
single JSON object and nothing else. Include only fields the traveller actually stated; never \
guess. Dates use YYYY-MM-DD exactly as written by the traveller, even if they are in the past.";

/// Language-model reasoning. Any model failure falls back to keyword matching so a
/// flaky endpoint never ends the conversation.
pub struct LlmReasoner<C> {
    client: C,
    clock: Arc<dyn Clock>,
    fallback: KeywordReasoner,
}

impl<C> LlmReasoner<C>
where
    C: LlmClient,
{
    pub fn new(client: C, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock, fallback: KeywordReasoner::new() }
    }

    fn extraction_prompt(&self, text: &str, schema: &ParameterSchema) -> String {
        let fields = schema
            .fields
            .iter()
            .map(|field| format!("- {}: {}", field.name, field.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Today is {today}.\nFields for `{name}`:\n{fields}\n\nTraveller said:\n{text}",
            today = self.clock.today().format(DATE_FORMAT),
            name = schema.name,
        )
    }
}

#[async_trait]
impl<C> ReasoningService for LlmReasoner<C>
where
    C: LlmClient,
{
    async fn classify_intent(&self, text: &str) -> Intent {
        match self.client.complete(CLASSIFY_SYSTEM, text).await {
            Ok(answer) => parse_intent_answer(&answer),
            Err(error) => {
                warn!(
                    event_name = "agent.reasoning.fallback",
                    operation = "classify_intent",
                    error = %error,
                    "language model unavailable, using keyword reasoning"
                );
                self.fallback.classify_intent(text).await
            }
        }
    }

    async fn extract_parameters(&self, text: &str, schema: &ParameterSchema) -> PartialParams {
        let prompt = self.extraction_prompt(text, schema);
        let answer = match self.client.complete(EXTRACT_SYSTEM, &prompt).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(
                    event_name = "agent.reasoning.fallback",
                    operation = "extract_parameters",
                    error = %error,
                    "language model unavailable, using keyword reasoning"
                );
                return self.fallback.extract_parameters(text, schema).await;
            }
        };

        match parse_params_answer(&answer) {
            Some(params) => params.restricted_to(schema),
            None => {
                warn!(
                    event_name = "agent.reasoning.unparseable",
                    schema = schema.name,
                    "language model answer was not a JSON object"
                );
                self.fallback.extract_parameters(text, schema).await
            }
        }
    }
}

/// First word of the answer decides; anything unexpected is `Unclear`.
fn parse_intent_answer(answer: &str) -> Intent {
    let word = answer
        .split(|ch: char| !ch.is_ascii_alphabetic())
        .find(|word| !word.is_empty())
        .unwrap_or_default();
    Intent::parse(word)
}

/// Pulls the outermost `{...}` out of the answer, tolerating code fences around it.
fn parse_params_answer(answer: &str) -> Option<PartialParams> {
    let start = answer.find('{')?;
    let end = answer.rfind('}')?;
    if end < start {
        return None;
    }
    let object = match serde_json::from_str::<Value>(&answer[start..=end]).ok()? {
        Value::Object(object) => object,
        _ => return None,
    };

    let mut params = PartialParams::new();
    for (field, value) in object {
        let text = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Null | Value::Object(_) => continue,
        };
        params.insert(&field, text);
    }
    Some(params)
}
