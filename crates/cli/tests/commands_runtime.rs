use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tripdesk_agent::{Advisor, AgentRuntime, FlightsTool, HotelsTool, ReasoningService};
use tripdesk_cli::commands::chat::ChatSession;
use tripdesk_cli::commands::{doctor, migrate, threads};
use tripdesk_core::clock::{Clock, SystemClock};
use tripdesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::conversation::Message;
use tripdesk_core::domain::intent::Intent;
use tripdesk_core::domain::params::{ParameterSchema, PartialParams};
use tripdesk_core::domain::thread::{ThreadId, ThreadSnapshot};
use tripdesk_core::flows::RouteState;
use tripdesk_db::{
    connect_with_settings, migrations, InMemoryThreadRepository, SqlThreadRepository,
    ThreadRepository,
};
use tripdesk_search::{FlightSearchAdapter, HotelSearchAdapter, SearchPolicy, UnconfiguredProvider};

fn agents() -> AgentRuntime {
    AgentRuntime::from_config(&AppConfig::default(), Arc::new(SystemClock))
        .expect("default configuration needs no credentials")
}

async fn chat(
    agents: &AgentRuntime,
    threads: &dyn ThreadRepository,
    thread_id: &str,
    input: &str,
) -> (ThreadSnapshot, String) {
    let session = ChatSession::new(agents, threads, Arc::new(SystemClock));
    let mut output = Vec::new();
    let snapshot = session
        .run(Some(ThreadId::from(thread_id)), input.as_bytes(), &mut output)
        .await
        .expect("chat session");
    (snapshot, String::from_utf8(output).expect("utf-8 transcript"))
}

#[tokio::test]
async fn chat_prints_agent_replies_and_checkpoints_every_turn() {
    let agents = agents();
    let threads = InMemoryThreadRepository::default();

    let (snapshot, transcript) = chat(
        &agents,
        &threads,
        "t-chat",
        "Hi there\n\nflights from JFK to LAX on 2099-06-01\n",
    )
    .await;

    assert!(transcript.starts_with("thread: t-chat\n"));
    assert!(transcript.contains("supervisor: Hello!"));
    assert!(transcript.contains("flights_advisor: I couldn't complete the flights search"));
    assert_eq!(snapshot.route, RouteState::AwaitingHuman { resume: AgentId::FlightsAdvisor });

    let stored = threads.load(&ThreadId::from("t-chat")).await.expect("load").expect("checkpoint");
    assert_eq!(stored, snapshot);
    assert_eq!(stored.conversation.len(), 4);
    assert_eq!(stored.draft(AgentId::FlightsAdvisor).get("origin"), Some("JFK"));
}

#[tokio::test]
async fn chat_resumes_a_checkpointed_thread() {
    let agents = agents();
    let threads = InMemoryThreadRepository::default();
    chat(&agents, &threads, "t-resume", "I need a hotel in Lisbon\n").await;

    let (snapshot, transcript) =
        chat(&agents, &threads, "t-resume", "check-in 2099-03-01, check-out 2099-03-04\nquit\nhello\n")
            .await;

    assert!(transcript.starts_with("thread: t-resume (resumed, 2 earlier messages)\n"));
    assert!(transcript.contains("hotel_advisor: I couldn't complete the hotels search"));
    assert_eq!(snapshot.conversation.len(), 4);
    assert!(snapshot.conversation.messages().iter().all(|message| message.content != "hello"));
}

#[tokio::test]
async fn chat_ends_cleanly_on_empty_input() {
    let agents = agents();
    let threads = InMemoryThreadRepository::default();

    let (snapshot, transcript) = chat(&agents, &threads, "t-empty", "").await;

    assert_eq!(transcript, "thread: t-empty\n");
    assert!(snapshot.conversation.is_empty());
}

/// Flips between flights and hotels on every call, so advisors never stop handing off.
struct Indecisive {
    calls: AtomicUsize,
}

#[async_trait]
impl ReasoningService for Indecisive {
    async fn classify_intent(&self, _text: &str) -> Intent {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            Intent::Flights
        } else {
            Intent::Hotels
        }
    }

    async fn extract_parameters(&self, _text: &str, _schema: &ParameterSchema) -> PartialParams {
        PartialParams::new()
    }
}

fn looping_agents() -> AgentRuntime {
    let reasoner: Arc<dyn ReasoningService> = Arc::new(Indecisive { calls: AtomicUsize::new(0) });
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = Arc::new(UnconfiguredProvider);

    AgentRuntime::builder()
        .reasoner(reasoner.clone())
        .clock(clock.clone())
        .advisor(Arc::new(Advisor::new(
            AgentId::FlightsAdvisor,
            FlightsTool::new(FlightSearchAdapter::new(provider.clone(), SearchPolicy::default())),
            reasoner.clone(),
            clock.clone(),
        )))
        .advisor(Arc::new(Advisor::new(
            AgentId::HotelAdvisor,
            HotelsTool::new(HotelSearchAdapter::new(provider, SearchPolicy::default())),
            reasoner,
            clock,
        )))
        .build()
        .expect("complete bindings")
}

#[tokio::test]
async fn chat_aborts_on_a_handoff_loop_without_checkpointing_the_turn() {
    let agents = looping_agents();
    let threads = InMemoryThreadRepository::default();
    let mut earlier = ThreadSnapshot::new(ThreadId::from("t-loop"), SystemClock.now());
    earlier.conversation.append(Message::user("hello"));
    threads.save(&earlier).await.expect("seed checkpoint");

    let session = ChatSession::new(&agents, &threads, Arc::new(SystemClock));
    let mut output = Vec::new();
    let result = session
        .run(Some(ThreadId::from("t-loop")), "flights please\nstill here\n".as_bytes(), &mut output)
        .await;

    let transcript = String::from_utf8(output).expect("utf-8 transcript");
    assert!(result.is_err(), "a hand-off loop must end the session");
    assert_eq!(transcript.matches("error: ").count(), 1, "{transcript}");

    let stored = threads.load(&ThreadId::from("t-loop")).await.expect("load").expect("checkpoint");
    assert_eq!(stored, earlier);
}

#[test]
fn migrate_returns_success_with_in_memory_database() {
    with_env(&[("TRIPDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_bad_env() {
    with_env(&[("TRIPDESK_SEARCH_MAX_RESULTS", "lots")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn threads_lists_checkpoints_newest_first() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("threads.db").display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let pool = connect_with_settings(&url, 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repository = SqlThreadRepository::new(pool.clone());

        let mut snapshot = ThreadSnapshot::new(ThreadId::from("t-listed"), SystemClock.now());
        snapshot.conversation.append(Message::user("hotels in Rome"));
        snapshot.route = RouteState::AwaitingHuman { resume: AgentId::HotelAdvisor };
        repository.save(&snapshot).await.expect("save");
        pool.close().await;
    });

    with_env(&[], || {
        let options = LoadOptions {
            overrides: ConfigOverrides { database_url: Some(url.clone()), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        };
        let result = threads::run(options, 5);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["threads"][0]["thread_id"], "t-listed");
        assert_eq!(payload["threads"][0]["state"], "awaiting_human");
        assert_eq!(payload["threads"][0]["messages"], 1);
    });
}

#[test]
fn doctor_flags_missing_search_credentials() {
    with_env(&[("TRIPDESK_DATABASE_URL", "sqlite::memory:")], || {
        let payload = parse_payload(&doctor::run(LoadOptions::default(), true));

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks");
        let status = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status("config_validation"), "pass");
        assert_eq!(status("search_credentials"), "fail");
        assert_eq!(status("reasoning_setup"), "pass");
        assert_eq!(status("database_connectivity"), "pass");
    });
}

#[test]
fn doctor_passes_with_search_key() {
    with_env(
        &[("TRIPDESK_DATABASE_URL", "sqlite::memory:"), ("SERPAPI_API_KEY", "serp-test-key")],
        || {
            let report = doctor::run(LoadOptions::default(), false);
            assert!(report.starts_with("doctor: all readiness checks passed"), "{report}");
            assert!(report.contains("- [ok] search_credentials"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TRIPDESK_DATABASE_URL",
        "TRIPDESK_DATABASE_MAX_CONNECTIONS",
        "TRIPDESK_DATABASE_TIMEOUT_SECS",
        "TRIPDESK_LLM_PROVIDER",
        "TRIPDESK_LLM_API_KEY",
        "TRIPDESK_LLM_BASE_URL",
        "TRIPDESK_LLM_MODEL",
        "TRIPDESK_LLM_TIMEOUT_SECS",
        "TRIPDESK_LLM_MAX_RETRIES",
        "TRIPDESK_LLM_RETRY_INITIAL_DELAY_MS",
        "TRIPDESK_LLM_RETRY_BACKOFF_MULTIPLIER",
        "TRIPDESK_LLM_RETRY_MAX_DELAY_MS",
        "TRIPDESK_SEARCH_API_KEY",
        "SERPAPI_API_KEY",
        "TRIPDESK_SEARCH_BASE_URL",
        "TRIPDESK_SEARCH_TIMEOUT_SECS",
        "TRIPDESK_SEARCH_MAX_RETRIES",
        "TRIPDESK_SEARCH_RETRY_INITIAL_DELAY_MS",
        "TRIPDESK_SEARCH_RETRY_BACKOFF_MULTIPLIER",
        "TRIPDESK_SEARCH_RETRY_MAX_DELAY_MS",
        "TRIPDESK_SEARCH_CURRENCY",
        "TRIPDESK_SEARCH_LANGUAGE",
        "TRIPDESK_SEARCH_COUNTRY",
        "TRIPDESK_SEARCH_MAX_RESULTS",
        "TRIPDESK_LOGGING_LEVEL",
        "TRIPDESK_LOGGING_FORMAT",
        "TRIPDESK_LOG_LEVEL",
        "TRIPDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
