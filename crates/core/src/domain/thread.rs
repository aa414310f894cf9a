use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::conversation::ConversationState;
use crate::domain::params::PartialParams;
use crate::flows::RouteState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

/// Everything needed to resume a conversation thread after a restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub thread_id: ThreadId,
    pub conversation: ConversationState,
    pub route: RouteState,
    /// Parameters an advisor collected on earlier turns but could not yet search with.
    #[serde(default)]
    pub drafts: BTreeMap<AgentId, PartialParams>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadSnapshot {
    pub fn new(thread_id: ThreadId, now: DateTime<Utc>) -> Self {
        Self {
            thread_id,
            conversation: ConversationState::new(),
            route: RouteState::AwaitingIntent,
            drafts: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn active_agent(&self) -> AgentId {
        self.route.active_agent()
    }

    pub fn draft(&self, agent: AgentId) -> PartialParams {
        self.drafts.get(&agent).cloned().unwrap_or_default()
    }

    pub fn store_draft(&mut self, agent: AgentId, draft: PartialParams) {
        if draft.is_empty() {
            self.drafts.remove(&agent);
        } else {
            self.drafts.insert(agent, draft);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ThreadId, ThreadSnapshot};
    use crate::domain::agent::AgentId;
    use crate::domain::params::PartialParams;

    #[test]
    fn generated_thread_ids_are_uuid_v4() {
        let id = ThreadId::generate();
        let parsed = uuid::Uuid::parse_str(id.as_str()).expect("uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(id, ThreadId::generate());
    }

    #[test]
    fn new_snapshot_starts_with_the_supervisor() {
        let snapshot = ThreadSnapshot::new(ThreadId::from("t-1"), Utc::now());
        assert_eq!(snapshot.active_agent(), AgentId::Supervisor);
        assert!(snapshot.conversation.is_empty());
    }

    #[test]
    fn empty_drafts_are_not_kept() {
        let mut snapshot = ThreadSnapshot::new(ThreadId::from("t-2"), Utc::now());
        snapshot.store_draft(AgentId::FlightsAdvisor, PartialParams::new().with("origin", "JFK"));
        assert_eq!(snapshot.draft(AgentId::FlightsAdvisor).get("origin"), Some("JFK"));

        snapshot.store_draft(AgentId::FlightsAdvisor, PartialParams::new());
        assert!(snapshot.drafts.is_empty());
    }

    #[test]
    fn snapshot_survives_json_encoding() {
        let mut snapshot = ThreadSnapshot::new(ThreadId::from("t-3"), Utc::now());
        snapshot.store_draft(AgentId::HotelAdvisor, PartialParams::new().with("location", "Rome"));
        let encoded = serde_json::to_string(&snapshot).expect("encode");
        let decoded: ThreadSnapshot = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, snapshot);
    }
}
