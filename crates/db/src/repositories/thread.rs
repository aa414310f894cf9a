use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::conversation::{ConversationState, Message, Role};
use tripdesk_core::domain::params::PartialParams;
use tripdesk_core::domain::thread::{ThreadId, ThreadSnapshot};
use tripdesk_core::flows::RouteState;

use super::{RepositoryError, ThreadRepository, ThreadSummary};
use crate::DbPool;

/// SQLite checkpoints: one `conversation_thread` row per thread plus its ordered messages.
pub struct SqlThreadRepository {
    pool: DbPool,
}

impl SqlThreadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThreadRepository for SqlThreadRepository {
    async fn load(&self, id: &ThreadId) -> Result<Option<ThreadSnapshot>, RepositoryError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, route_state, drafts_json, created_at, updated_at
            FROM conversation_thread
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let messages = sqlx::query(
            r#"
            SELECT role, author, content, payload_json, created_at
            FROM conversation_message
            WHERE thread_id = ?
            ORDER BY sequence ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(message_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let route_state: String = row.try_get("route_state")?;
        let drafts_json: String = row.try_get("drafts_json")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Some(ThreadSnapshot {
            thread_id: ThreadId(row.try_get("id")?),
            conversation: ConversationState::from_messages(messages),
            route: decode_json::<RouteState>("route_state", &route_state)?,
            drafts: decode_json::<BTreeMap<AgentId, PartialParams>>("drafts_json", &drafts_json)?,
            created_at: parse_timestamp("created_at", created_at)?,
            updated_at: parse_timestamp("updated_at", updated_at)?,
        }))
    }

    async fn save(&self, snapshot: &ThreadSnapshot) -> Result<(), RepositoryError> {
        let thread_id = snapshot.thread_id.as_str();
        let messages = snapshot.conversation.messages();
        let route_state = encode_json("route_state", &snapshot.route)?;
        let drafts_json = encode_json("drafts_json", &snapshot.drafts)?;

        let mut tx = self.pool.begin().await?;

        let stored: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM conversation_message WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("count")?;
        let stored = usize::try_from(stored).unwrap_or_default();
        if stored > messages.len() {
            return Err(RepositoryError::HistoryRewritten {
                thread_id: thread_id.to_string(),
                missing: stored - messages.len(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO conversation_thread (
                id, route_state, active_agent, drafts_json, message_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                route_state = excluded.route_state,
                active_agent = excluded.active_agent,
                drafts_json = excluded.drafts_json,
                message_count = excluded.message_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(&route_state)
        .bind(snapshot.active_agent().as_str())
        .bind(&drafts_json)
        .bind(messages.len() as i64)
        .bind(snapshot.created_at.to_rfc3339())
        .bind(snapshot.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (sequence, message) in messages.iter().enumerate().skip(stored) {
            let payload_json = message
                .payload
                .as_ref()
                .map(|payload| encode_json("payload_json", payload))
                .transpose()?;

            sqlx::query(
                r#"
                INSERT INTO conversation_message (
                    thread_id, sequence, role, author, content, payload_json, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(thread_id)
            .bind(sequence as i64)
            .bind(message.role.as_str())
            .bind(&message.author)
            .bind(&message.content)
            .bind(payload_json)
            .bind(message.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ThreadSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, route_state, active_agent, message_count, updated_at
            FROM conversation_thread
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message, RepositoryError> {
    let role: String = row.try_get("role")?;
    let payload_json: Option<String> = row.try_get("payload_json")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Message {
        role: Role::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid role: {role}")))?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        payload: payload_json.map(|raw| decode_json("payload_json", &raw)).transpose()?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<ThreadSummary, RepositoryError> {
    let route_state: String = row.try_get("route_state")?;
    let active_agent: String = row.try_get("active_agent")?;
    let message_count: i64 = row.try_get("message_count")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ThreadSummary {
        thread_id: ThreadId(row.try_get("id")?),
        active_agent: active_agent
            .parse()
            .map_err(|_| RepositoryError::Decode(format!("invalid active_agent: {active_agent}")))?,
        route: decode_json("route_state", &route_state)?,
        message_count: usize::try_from(message_count).unwrap_or_default(),
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

fn encode_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Decode(format!("could not encode `{column}`: {e}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("invalid json in `{column}`: {e}")))
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}
