use chrono::Utc;
use tempfile::TempDir;
use tripdesk_core::domain::agent::AgentId;
use tripdesk_core::domain::conversation::Message;
use tripdesk_core::domain::params::PartialParams;
use tripdesk_core::domain::thread::{ThreadId, ThreadSnapshot};
use tripdesk_core::flows::RouteState;
use tripdesk_db::{connect_with_settings, migrations, SqlThreadRepository, ThreadRepository};

async fn open(url: &str) -> (tripdesk_db::DbPool, SqlThreadRepository) {
    let pool = connect_with_settings(url, 2, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    (pool.clone(), SqlThreadRepository::new(pool))
}

#[tokio::test]
async fn checkpoint_survives_a_restart_and_keeps_growing() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("threads.db").display());
    let thread_id = ThreadId::from("t-restart");

    let (pool, repository) = open(&url).await;
    let mut snapshot = ThreadSnapshot::new(thread_id.clone(), Utc::now());
    snapshot.conversation.append(Message::user("I need a flight from JFK to LAX"));
    snapshot.conversation.append(Message::agent(
        AgentId::FlightsAdvisor,
        "To search flights I still need:\n- depart_date: Outbound date, YYYY-MM-DD",
    ));
    snapshot.route = RouteState::AwaitingHuman { resume: AgentId::FlightsAdvisor };
    snapshot.store_draft(
        AgentId::FlightsAdvisor,
        PartialParams::new().with("origin", "JFK").with("destination", "LAX"),
    );
    repository.save(&snapshot).await.expect("first checkpoint");
    pool.close().await;

    let (pool, repository) = open(&url).await;
    let mut resumed = repository.load(&thread_id).await.expect("load").expect("stored thread");
    assert_eq!(resumed.route, RouteState::AwaitingHuman { resume: AgentId::FlightsAdvisor });
    assert_eq!(resumed.conversation.len(), 2);
    assert_eq!(resumed.draft(AgentId::FlightsAdvisor).get("destination"), Some("LAX"));

    resumed.conversation.append(Message::user("2099-06-01"));
    resumed.updated_at = Utc::now();
    repository.save(&resumed).await.expect("second checkpoint");
    repository.save(&resumed).await.expect("saving twice is harmless");

    let reloaded = repository.load(&thread_id).await.expect("load").expect("stored thread");
    assert_eq!(reloaded.conversation.len(), 3);
    assert_eq!(reloaded.conversation.last_user_text(), Some("2099-06-01"));
    pool.close().await;
}
