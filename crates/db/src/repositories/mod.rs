use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::thread::{ThreadId, ThreadSnapshot};
use tripdesk_core::flows::RouteState;

pub mod memory;
pub mod thread;

pub use memory::InMemoryThreadRepository;
pub use thread::SqlThreadRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("checkpoint for thread `{thread_id}` would drop {missing} stored message(s)")]
    HistoryRewritten { thread_id: String, missing: usize },
}

/// Listing row for operator tooling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadSummary {
    pub thread_id: ThreadId,
    pub active_agent: AgentId,
    pub route: RouteState,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&ThreadSnapshot> for ThreadSummary {
    fn from(snapshot: &ThreadSnapshot) -> Self {
        Self {
            thread_id: snapshot.thread_id.clone(),
            active_agent: snapshot.active_agent(),
            route: snapshot.route,
            message_count: snapshot.conversation.len(),
            updated_at: snapshot.updated_at,
        }
    }
}

/// Checkpoint store keyed by thread id. Saving the same snapshot twice is a no-op.
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn load(&self, id: &ThreadId) -> Result<Option<ThreadSnapshot>, RepositoryError>;
    async fn save(&self, snapshot: &ThreadSnapshot) -> Result<(), RepositoryError>;
    async fn list_recent(&self, limit: u32) -> Result<Vec<ThreadSummary>, RepositoryError>;
}
