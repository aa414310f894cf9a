use std::collections::HashMap;

use tokio::sync::RwLock;
use tripdesk_core::domain::thread::{ThreadId, ThreadSnapshot};

use super::{RepositoryError, ThreadRepository, ThreadSummary};

/// Process-local checkpoints; lost on restart.
#[derive(Default)]
pub struct InMemoryThreadRepository {
    threads: RwLock<HashMap<String, ThreadSnapshot>>,
}

#[async_trait::async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn load(&self, id: &ThreadId) -> Result<Option<ThreadSnapshot>, RepositoryError> {
        let threads = self.threads.read().await;
        Ok(threads.get(id.as_str()).cloned())
    }

    async fn save(&self, snapshot: &ThreadSnapshot) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().await;
        if let Some(stored) = threads.get(snapshot.thread_id.as_str()) {
            let stored_len = stored.conversation.len();
            if stored_len > snapshot.conversation.len() {
                return Err(RepositoryError::HistoryRewritten {
                    thread_id: snapshot.thread_id.to_string(),
                    missing: stored_len - snapshot.conversation.len(),
                });
            }
        }
        threads.insert(snapshot.thread_id.0.clone(), snapshot.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ThreadSummary>, RepositoryError> {
        let threads = self.threads.read().await;
        let mut summaries: Vec<ThreadSummary> = threads.values().map(ThreadSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit as usize);
        Ok(summaries)
    }
}
