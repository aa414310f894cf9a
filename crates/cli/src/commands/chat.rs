use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tripdesk_agent::AgentRuntime;
use tripdesk_core::clock::{Clock, SystemClock};
use tripdesk_core::config::{AppConfig, LoadOptions};
use tripdesk_core::domain::thread::{ThreadId, ThreadSnapshot};
use tripdesk_core::errors::ApplicationError;
use tripdesk_db::{connect_with_config, migrations, SqlThreadRepository, ThreadRepository};

use crate::commands::{async_runtime, CommandResult};
use crate::logging;

const EXIT_WORDS: &[&str] = &["exit", "quit"];

pub fn run(options: LoadOptions, thread: Option<String>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    logging::init(&config.logging);

    let runtime = match async_runtime("chat") {
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

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let agents = AgentRuntime::from_config(&config, clock.clone())
            .map_err(|error| ("agent_setup", format!("{error:#}"), 6u8))?;
        let threads = SqlThreadRepository::new(pool.clone());
        let session = ChatSession::new(&agents, &threads, clock);

        let outcome = session
            .run(
                thread.as_deref().map(ThreadId::from),
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
            .map_err(|error| ("chat", format!("{error:#}"), 7u8));
        pool.close().await;
        outcome.map(|_| ())
    });

    match result {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Line-oriented conversation over any reader/writer pair, checkpointing after every turn.
pub struct ChatSession<'a> {
    agents: &'a AgentRuntime,
    threads: &'a dyn ThreadRepository,
    clock: Arc<dyn Clock>,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        agents: &'a AgentRuntime,
        threads: &'a dyn ThreadRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { agents, threads, clock }
    }

    /// Resumes `thread_id` when it has a checkpoint; otherwise starts a new thread under it
    /// (or under a fresh id).
    pub async fn open(&self, thread_id: Option<ThreadId>) -> anyhow::Result<ThreadSnapshot> {
        let thread_id = thread_id.unwrap_or_else(ThreadId::generate);
        let stored = self
            .threads
            .load(&thread_id)
            .await
            .with_context(|| format!("failed to load thread `{thread_id}`"))?;

        match stored {
            Some(snapshot) => {
                info!(
                    event_name = "cli.chat.resumed",
                    thread_id = thread_id.as_str(),
                    messages = snapshot.conversation.len(),
                    active_agent = snapshot.active_agent().as_str()
                );
                Ok(snapshot)
            }
            None => {
                info!(event_name = "cli.chat.started", thread_id = thread_id.as_str());
                Ok(ThreadSnapshot::new(thread_id, self.clock.now()))
            }
        }
    }

    /// Runs until end of input or an exit word. Returns the final checkpointed snapshot.
    pub async fn run<R, W>(
        &self,
        thread_id: Option<ThreadId>,
        input: R,
        mut output: W,
    ) -> anyhow::Result<ThreadSnapshot>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut snapshot = self.open(thread_id).await?;
        let header = if snapshot.conversation.is_empty() {
            format!("thread: {}\n", snapshot.thread_id)
        } else {
            format!(
                "thread: {} (resumed, {} earlier messages)\n",
                snapshot.thread_id,
                snapshot.conversation.len()
            )
        };
        output.write_all(header.as_bytes()).await?;
        output.flush().await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if EXIT_WORDS.contains(&text.to_ascii_lowercase().as_str()) {
                break;
            }

            match self.agents.handle_thread_message(&mut snapshot, text).await {
                Ok(report) => {
                    for reply in &report.replies {
                        let line = format!("{}: {}\n", reply.author, reply.content);
                        output.write_all(line.as_bytes()).await?;
                    }
                }
                Err(agent_error) => {
                    // Agent errors mean the runtime is misconfigured; the turn is not checkpointed.
                    let failure = ApplicationError::from(agent_error);
                    error!(
                        event_name = "cli.chat.turn_failed",
                        thread_id = snapshot.thread_id.as_str(),
                        error = %failure,
                        "routing cycle failed"
                    );
                    let interface = failure.clone().into_interface(snapshot.thread_id.as_str());
                    output
                        .write_all(format!("error: {}\n", interface.user_message()).as_bytes())
                        .await?;
                    output.flush().await?;
                    return Err(anyhow!(failure));
                }
            }
            output.flush().await?;

            self.threads
                .save(&snapshot)
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))
                .with_context(|| format!("failed to checkpoint thread `{}`", snapshot.thread_id))?;
        }

        output.flush().await?;
        Ok(snapshot)
    }
}
