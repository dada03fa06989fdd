//! End-to-end: scheduler tick → pending item → watcher → steering → a real
//! agent producing a response, with no manual driving of any component.

use async_trait::async_trait;
use chrono::Utc;
use prowl_agent::Agent;
use prowl_core::error::ProviderError;
use prowl_core::event::EventBus;
use prowl_core::message::{Message, Role};
use prowl_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use prowl_proactive::ProactiveCoordinator;
use prowl_scheduler::{Scheduler, TaskAction, TaskKind, TaskSpec, Trigger};
use std::sync::Arc;
use std::time::Duration;

/// Replies "pong" to everything.
struct PongProvider;

#[async_trait]
impl Provider for PongProvider {
    fn name(&self) -> &str {
        "pong"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant("pong"),
            usage: Some(Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            }),
            model: "pong-model".into(),
        })
    }
}

#[tokio::test]
async fn scheduled_task_reaches_agent_and_gets_answered() {
    let dir = tempfile::TempDir::new().unwrap();
    let event_bus = Arc::new(EventBus::default());

    let agent = Arc::new(Agent::new(
        Arc::new(PongProvider),
        "pong-model",
        0.7,
        "You are a test agent.",
        event_bus.clone(),
    ));

    let scheduler = Arc::new(
        Scheduler::new(dir.path(), Duration::from_millis(500), event_bus.clone()).unwrap(),
    );

    let coordinator = ProactiveCoordinator::start(
        agent.clone(),
        scheduler.clone(),
        event_bus,
        Duration::from_secs(1),
    );

    // Fire 2 seconds in the future with prompt "ping"
    scheduler
        .create_task(TaskSpec {
            name: "e2e".into(),
            kind: TaskKind::Scheduled,
            trigger: Trigger {
                at: Some(Utc::now() + chrono::Duration::seconds(2)),
                every: None,
            },
            action: TaskAction {
                prompt: "ping".into(),
                allowed_tools: None,
            },
            enabled: true,
            max_runs: None,
        })
        .await
        .unwrap();

    // Nothing should have been delivered yet
    assert!(!agent
        .log_snapshot()
        .iter()
        .any(|m| m.content.contains("ping")));

    // Wait out the trigger, the tick, and the delivery
    let deadline = Duration::from_secs(8);
    let mut waited = Duration::ZERO;
    loop {
        let log = agent.log_snapshot();
        let answered = log.iter().any(|m| m.role == Role::Assistant);
        if answered || waited >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
    }

    let log = agent.log_snapshot();
    let user_msg = log
        .iter()
        .find(|m| m.role == Role::User)
        .expect("steered user message");
    assert!(user_msg.content.contains("ping"));
    assert!(log.iter().any(|m| m.role == Role::Assistant && m.content == "pong"));
    assert!(agent.is_idle());

    // The pending item was consumed
    assert!(scheduler.pending_store().list().unwrap().is_empty());

    coordinator.stop();
}
