use serde::Serialize;
use tripdesk_core::config::{AppConfig, LoadOptions};
use tripdesk_db::{connect_with_config, migrations, SqlThreadRepository, ThreadRepository, ThreadSummary};

use crate::commands::{async_runtime, CommandResult};

#[derive(Debug, Serialize)]
struct ThreadListing {
    command: &'static str,
    status: &'static str,
    count: usize,
    threads: Vec<ThreadRow>,
}

#[derive(Debug, Serialize)]
struct ThreadRow {
    thread_id: String,
    state: &'static str,
    active_agent: &'static str,
    messages: usize,
    updated_at: String,
}

impl From<ThreadSummary> for ThreadRow {
    fn from(summary: ThreadSummary) -> Self {
        Self {
            thread_id: summary.thread_id.to_string(),
            state: summary.route.as_str(),
            active_agent: summary.active_agent.as_str(),
            messages: summary.message_count,
            updated_at: summary.updated_at.to_rfc3339(),
        }
    }
}

pub fn run(options: LoadOptions, limit: u32) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "threads",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match async_runtime("threads") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let summaries = SqlThreadRepository::new(pool.clone())
            .list_recent(limit)
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(summaries)
    });

    match result {
        Ok(summaries) => {
            let threads: Vec<ThreadRow> = summaries.into_iter().map(ThreadRow::from).collect();
            let listing =
                ThreadListing { command: "threads", status: "ok", count: threads.len(), threads };
            match serde_json::to_string(&listing) {
                Ok(output) => CommandResult { exit_code: 0, output },
                Err(error) => CommandResult::failure("threads", "serialization", error.to_string(), 1),
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("threads", error_class, message, exit_code)
        }
    }
}
